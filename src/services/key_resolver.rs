use std::sync::Arc;

use serde::Serialize;

use crate::{
    db::{ApiKeyRepo, DbResult},
    models::{UNKNOWN_API_KEY_ID, hash_api_key},
};

/// Identity a completion is attributed to.
///
/// `id` is [`UNKNOWN_API_KEY_ID`] when the credential was absent, unknown or revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyIdentity {
    pub id: i64,
}

impl KeyIdentity {
    pub const UNKNOWN: KeyIdentity = KeyIdentity {
        id: UNKNOWN_API_KEY_ID,
    };

    pub fn is_known(&self) -> bool {
        self.id != UNKNOWN_API_KEY_ID
    }
}

/// Result of looking a credential up in the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLookup {
    Active(i64),
    Revoked(i64),
    Unknown,
}

impl KeyLookup {
    /// Only active keys attribute a completion.
    pub fn identity(self) -> KeyIdentity {
        match self {
            KeyLookup::Active(id) => KeyIdentity { id },
            KeyLookup::Revoked(_) | KeyLookup::Unknown => KeyIdentity::UNKNOWN,
        }
    }

    /// Stored key id, whether or not the key is still active.
    pub fn key_id(self) -> Option<i64> {
        match self {
            KeyLookup::Active(id) | KeyLookup::Revoked(id) => Some(id),
            KeyLookup::Unknown => None,
        }
    }
}

/// Maps a presented credential to the stored API key it belongs to.
#[derive(Clone)]
pub struct KeyResolver {
    keys: Arc<dyn ApiKeyRepo>,
}

impl KeyResolver {
    pub fn new(keys: Arc<dyn ApiKeyRepo>) -> Self {
        Self { keys }
    }

    /// Look up a credential.
    ///
    /// Blank credentials are `Unknown` without a storage round-trip. A miss is
    /// `Unknown`; only storage failures are errors.
    pub async fn lookup(&self, credential: &str) -> DbResult<KeyLookup> {
        if credential.trim().is_empty() {
            return Ok(KeyLookup::Unknown);
        }

        let key_hash = hash_api_key(credential);
        let lookup = match self.keys.find_by_hash(&key_hash).await? {
            Some(key) if key.revoked => {
                tracing::debug!(
                    api_key_id = key.id,
                    key_prefix = %key.key_prefix,
                    reason = "revoked",
                    "Credential matched a revoked API key"
                );
                KeyLookup::Revoked(key.id)
            }
            Some(key) => KeyLookup::Active(key.id),
            None => {
                tracing::debug!(reason = "unknown", "Credential did not match any API key");
                KeyLookup::Unknown
            }
        };

        Ok(lookup)
    }

    /// Resolve a credential to the identity a completion is recorded under.
    pub async fn resolve(&self, credential: &str) -> DbResult<KeyIdentity> {
        Ok(self.lookup(credential).await?.identity())
    }
}
