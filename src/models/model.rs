use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// What an upstream model is served for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Chat,
    Embedding,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Chat => "chat",
            ModelType::Embedding => "embedding",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(ModelType::Chat),
            "embedding" => Ok(ModelType::Embedding),
            _ => Err(format!("Invalid model type: {}", s)),
        }
    }
}

/// A model served by a registered provider. Ledger rows reference it by `model_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub provider_id: i64,
    pub name: String,
    pub model_type: ModelType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateModel {
    pub provider_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub model_type: ModelType,
}

/// Registered models per type. Both types are always reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelCounts {
    pub chat: i64,
    pub embedding: i64,
}

impl ModelCounts {
    pub fn get(&self, model_type: ModelType) -> i64 {
        match model_type {
            ModelType::Chat => self.chat,
            ModelType::Embedding => self.embedding,
        }
    }
}
