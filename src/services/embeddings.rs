use std::sync::Arc;

use super::{KeyResolver, RecordError};
use crate::{
    db::{ApiKeyRepo, DbPool, EmbeddingRepo},
    models::{Embedding, EmbeddingOutcome, NewEmbedding},
    observability::metrics,
};

/// Writes one embedding ledger row per upstream embedding call.
///
/// Attribution follows [`CompletionRecorder`](super::CompletionRecorder):
/// unknown, revoked and blank credentials are recorded under the unknown key.
#[derive(Clone)]
pub struct EmbeddingRecorder {
    resolver: KeyResolver,
    embeddings: Arc<dyn EmbeddingRepo>,
}

impl EmbeddingRecorder {
    pub fn new(db: &DbPool) -> Self {
        Self::with_repos(db.api_keys(), db.embeddings())
    }

    pub fn with_repos(keys: Arc<dyn ApiKeyRepo>, embeddings: Arc<dyn EmbeddingRepo>) -> Self {
        Self {
            resolver: KeyResolver::new(keys),
            embeddings,
        }
    }

    /// Record the outcome of an upstream embedding call.
    ///
    /// Returns `Ok(None)` when the insert fails. Only a key store failure is
    /// an error, and then nothing is written.
    #[tracing::instrument(
        skip(self, outcome, credential),
        fields(model = %outcome.model, status = %outcome.status)
    )]
    pub async fn record(
        &self,
        outcome: EmbeddingOutcome,
        credential: &str,
    ) -> Result<Option<Embedding>, RecordError> {
        let identity = self
            .resolver
            .resolve(credential)
            .await
            .map_err(RecordError::KeyResolution)?;

        match self
            .embeddings
            .create(NewEmbedding::new(identity.id, outcome))
            .await
        {
            Ok(embedding) => {
                metrics::record_embedding(&embedding);
                tracing::debug!(
                    embedding_id = embedding.id,
                    api_key_id = identity.id,
                    "Embedding recorded"
                );
                Ok(Some(embedding))
            }
            Err(e) => {
                tracing::error!(
                    api_key_id = identity.id,
                    error = %e,
                    "Embedding insert failed"
                );
                metrics::record_ledger_write_failure("embeddings");
                Ok(None)
            }
        }
    }
}
