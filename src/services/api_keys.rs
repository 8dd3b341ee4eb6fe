use std::sync::Arc;

use validator::Validate;

use super::ServiceResult;
use crate::{
    db::{DbError, DbPool, DbResult},
    models::{ApiKey, CreateApiKey, CreatedApiKey, generate_api_key, hash_api_key},
    services::ServiceError,
};

/// Outcome of [`ApiKeyService::ensure_by_external_id`].
#[derive(Debug, Clone)]
pub enum EnsuredApiKey {
    /// A key with this external id already existed; its secret is not available.
    Existing(ApiKey),
    /// A new key was issued.
    Created(CreatedApiKey),
}

impl EnsuredApiKey {
    pub fn api_key(&self) -> &ApiKey {
        match self {
            EnsuredApiKey::Existing(key) => key,
            EnsuredApiKey::Created(created) => &created.api_key,
        }
    }

    /// The raw credential, only present when the key was issued by this call.
    /// Keys are stored hashed, so an existing key's secret cannot be returned.
    pub fn raw_key(&self) -> Option<&str> {
        match self {
            EnsuredApiKey::Existing(_) => None,
            EnsuredApiKey::Created(created) => Some(&created.key),
        }
    }
}

/// Service layer for API key operations
#[derive(Clone)]
pub struct ApiKeyService {
    db: Arc<DbPool>,
    prefix: String,
}

impl ApiKeyService {
    pub fn new(db: Arc<DbPool>, prefix: impl Into<String>) -> Self {
        Self {
            db,
            prefix: prefix.into(),
        }
    }

    /// Create a new API key.
    /// Returns both the stored key and the raw key (only shown once)
    pub async fn create(&self, input: CreateApiKey) -> ServiceResult<CreatedApiKey> {
        input.validate()?;

        let generated = generate_api_key(&self.prefix);
        let api_key = self.db.api_keys().create(input, &generated.hash).await?;

        tracing::info!(
            api_key_id = api_key.id,
            key_prefix = %api_key.key_prefix,
            "API key created"
        );

        Ok(CreatedApiKey {
            api_key,
            key: generated.raw,
        })
    }

    /// Return the key provisioned for `external_id`, creating it if needed.
    ///
    /// Safe to call repeatedly: a concurrent create for the same id resolves to
    /// the key that won. Only the first call sees the raw key; later calls get
    /// [`EnsuredApiKey::Existing`] with metadata only.
    pub async fn ensure_by_external_id(
        &self,
        external_id: &str,
        comment: Option<String>,
    ) -> ServiceResult<EnsuredApiKey> {
        if let Some(existing) = self.db.api_keys().get_by_external_id(external_id).await? {
            return Ok(EnsuredApiKey::Existing(existing));
        }

        let input = CreateApiKey {
            comment,
            external_id: Some(external_id.to_string()),
        };
        match self.create(input).await {
            Ok(created) => Ok(EnsuredApiKey::Created(created)),
            Err(ServiceError::Database(DbError::Conflict(_))) => self
                .db
                .api_keys()
                .get_by_external_id(external_id)
                .await?
                .map(EnsuredApiKey::Existing)
                .ok_or_else(|| ServiceError::NotFound(format!("API key '{external_id}'"))),
            Err(e) => Err(e),
        }
    }

    /// Get API key by ID (without the raw key)
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<ApiKey>> {
        self.db.api_keys().get_by_id(id).await
    }

    /// Revoke the key a raw credential belongs to and return its updated record.
    pub async fn revoke_by_credential(&self, credential: &str) -> ServiceResult<ApiKey> {
        let repo = self.db.api_keys();
        let key = repo
            .find_by_hash(&hash_api_key(credential))
            .await?
            .ok_or_else(|| ServiceError::NotFound("API key".to_string()))?;

        if key.revoked {
            return Ok(key);
        }

        repo.revoke(key.id).await?;
        tracing::info!(api_key_id = key.id, "API key revoked");

        repo.get_by_id(key.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("API key {}", key.id)))
    }

    /// Revoke an API key by id. Returns false when no such key exists.
    pub async fn revoke(&self, id: i64) -> DbResult<bool> {
        self.db.api_keys().revoke(id).await
    }

    pub async fn count_active(&self) -> DbResult<i64> {
        self.db.api_keys().count_active().await
    }
}
