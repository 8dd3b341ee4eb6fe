mod api_keys;
mod completions;
mod diagnostics;
mod embeddings;
mod error;
mod key_resolver;
mod providers;
mod usage;

use std::sync::Arc;

pub use api_keys::{ApiKeyService, EnsuredApiKey};
pub use completions::{CompletionRecorder, RecordError};
pub use diagnostics::correlate;
pub use embeddings::EmbeddingRecorder;
pub use error::{ServiceError, ServiceResult};
pub use key_resolver::{KeyIdentity, KeyLookup, KeyResolver};
pub use providers::ProviderService;
pub use usage::UsageService;

use crate::{config::KeysConfig, db::DbPool};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub api_keys: ApiKeyService,
    pub providers: ProviderService,
    pub usage: UsageService,
    pub recorder: CompletionRecorder,
    pub embeddings: EmbeddingRecorder,
}

impl Services {
    pub fn new(db: Arc<DbPool>, keys: &KeysConfig) -> Self {
        Self {
            api_keys: ApiKeyService::new(db.clone(), keys.prefix.clone()),
            providers: ProviderService::new(db.clone()),
            usage: UsageService::new(db.clone()),
            recorder: CompletionRecorder::new(&db),
            embeddings: EmbeddingRecorder::new(&db),
        }
    }

    /// Refresh the key, provider and model inventory gauges.
    pub async fn report_inventory(&self) -> crate::db::DbResult<()> {
        let active_keys = self.api_keys.count_active().await?;
        let providers = self.providers.count().await?;
        let models = self.providers.count_models().await?;
        crate::observability::metrics::set_inventory(active_keys, providers, models);
        Ok(())
    }
}
