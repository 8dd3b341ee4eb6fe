use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validators::{validate_base_url, validate_provider_api_version};
use crate::providers::{ProviderDescriptor, ProviderKind};

/// A configured upstream endpoint. Completions reference it by `upstream_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    /// Credential sent upstream. Never serialized back out.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    pub fn descriptor(&self) -> ProviderDescriptor {
        self.kind.describe()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_provider_api_version"))]
pub struct CreateProvider {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub kind: ProviderKind,
    #[validate(custom(function = "validate_base_url"))]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub api_version: Option<String>,
}
