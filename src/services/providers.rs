use std::sync::Arc;

use validator::Validate;

use super::{ServiceError, ServiceResult};
use crate::{
    db::{DbPool, DbResult, ListParams},
    models::{CreateModel, CreateProvider, Model, ModelCounts, ModelType, Provider},
};

/// Service layer for upstream provider records
#[derive(Clone)]
pub struct ProviderService {
    db: Arc<DbPool>,
}

impl ProviderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Validate against the provider kind's policy, then persist.
    pub async fn create(&self, input: CreateProvider) -> ServiceResult<Provider> {
        input.validate()?;

        let provider = self.db.providers().create(input).await?;
        tracing::info!(
            provider_id = provider.id,
            name = %provider.name,
            kind = %provider.kind,
            "Provider created"
        );

        Ok(provider)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Provider>> {
        self.db.providers().get_by_id(id).await
    }

    pub async fn list(&self, params: ListParams) -> DbResult<Vec<Provider>> {
        self.db.providers().list(params).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        self.db.providers().count().await
    }

    /// Register a model under an existing provider.
    ///
    /// The provider kind must be able to serve the model type.
    pub async fn add_model(&self, input: CreateModel) -> ServiceResult<Model> {
        input.validate()?;

        let provider = self
            .db
            .providers()
            .get_by_id(input.provider_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Provider {}", input.provider_id)))?;

        let capabilities = provider.descriptor().capabilities;
        let supported = match input.model_type {
            ModelType::Chat => {
                capabilities.chat_completions || capabilities.responses || capabilities.messages
            }
            ModelType::Embedding => capabilities.embeddings,
        };
        if !supported {
            return Err(ServiceError::Unsupported(format!(
                "Provider kind '{}' does not serve {} models",
                provider.kind, input.model_type
            )));
        }

        let model = self.db.models().create(input).await?;
        tracing::info!(
            model_id = model.id,
            provider_id = model.provider_id,
            name = %model.name,
            model_type = %model.model_type,
            "Model registered"
        );

        Ok(model)
    }

    pub async fn list_models(&self, provider_id: i64) -> DbResult<Vec<Model>> {
        self.db.models().list_by_provider(provider_id).await
    }

    pub async fn count_models(&self) -> DbResult<ModelCounts> {
        self.db.models().count_by_type().await
    }
}
