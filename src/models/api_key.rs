use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A gateway-issued API key. The raw secret is never stored, only its hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    /// First 8 characters of the key hash, for display
    pub key_prefix: String,
    pub comment: Option<String>,
    /// Identifier assigned by an external provisioner (unique when present)
    pub external_id: Option<String>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateApiKey {
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub external_id: Option<String>,
}

/// Returned on creation only (contains the raw key)
#[derive(Debug, Clone, Serialize)]
pub struct CreatedApiKey {
    #[serde(flatten)]
    pub api_key: ApiKey,
    /// The raw API key (only shown once at creation)
    pub key: String,
}
