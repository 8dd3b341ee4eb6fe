use std::sync::Arc;

use thiserror::Error;

use super::{KeyResolver, diagnostics::correlate};
use crate::{
    db::{ApiKeyRepo, CompletionRepo, DbError, DbPool, LogRepo},
    models::{Completion, CompletionOutcome, DiagnosticInput, NewCompletion},
    observability::metrics,
};

/// Failures of [`CompletionRecorder::record`] and
/// [`EmbeddingRecorder::record`](super::EmbeddingRecorder::record) that the
/// caller must handle.
///
/// A failed ledger insert is not one of them: it is logged and reported as
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The key store could not be reached. Nothing was written.
    #[error("API key lookup failed: {0}")]
    KeyResolution(#[source] DbError),

    /// The completion was written but its log entry was not.
    #[error("Completion {completion_id} was recorded but its log entry was not: {source}")]
    LogWrite {
        completion_id: i64,
        #[source]
        source: DbError,
    },
}

/// Writes one ledger row per upstream call, plus an optional log entry.
#[derive(Clone)]
pub struct CompletionRecorder {
    resolver: KeyResolver,
    completions: Arc<dyn CompletionRepo>,
    logs: Arc<dyn LogRepo>,
}

impl CompletionRecorder {
    pub fn new(db: &DbPool) -> Self {
        Self::with_repos(db.api_keys(), db.completions(), db.logs())
    }

    pub fn with_repos(
        keys: Arc<dyn ApiKeyRepo>,
        completions: Arc<dyn CompletionRepo>,
        logs: Arc<dyn LogRepo>,
    ) -> Self {
        Self {
            resolver: KeyResolver::new(keys),
            completions,
            logs,
        }
    }

    /// Record the outcome of an upstream call.
    ///
    /// Steps run in order: resolve the credential, insert the completion, then
    /// insert the diagnostic log entry if one was given. The completion is
    /// written for every status. Returns `Ok(None)` when the completion insert
    /// fails, in which case no log entry is attempted. The two writes are not
    /// transactional; a log failure leaves the completion in place.
    #[tracing::instrument(
        skip(self, outcome, credential, diagnostic),
        fields(
            model = %outcome.model,
            status = %outcome.status,
            has_diagnostic = diagnostic.is_some()
        )
    )]
    pub async fn record(
        &self,
        outcome: CompletionOutcome,
        credential: &str,
        diagnostic: Option<DiagnosticInput>,
    ) -> Result<Option<Completion>, RecordError> {
        let identity = self
            .resolver
            .resolve(credential)
            .await
            .map_err(RecordError::KeyResolution)?;

        let completion = match self
            .completions
            .create(NewCompletion::new(identity.id, outcome))
            .await
        {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!(
                    api_key_id = identity.id,
                    error = %e,
                    dropped_diagnostic = diagnostic.is_some(),
                    "Completion insert failed"
                );
                metrics::record_ledger_write_failure("completions");
                return Ok(None);
            }
        };

        metrics::record_completion(&completion);

        if let Some(diagnostic) = diagnostic {
            let entry = correlate(
                diagnostic,
                identity.id,
                completion.upstream_id,
                completion.id,
            );
            if let Err(source) = self.logs.create(entry).await {
                tracing::warn!(
                    completion_id = completion.id,
                    error = %source,
                    "Log entry insert failed"
                );
                metrics::record_ledger_write_failure("logs");
                return Err(RecordError::LogWrite {
                    completion_id: completion.id,
                    source,
                });
            }
        }

        tracing::debug!(
            completion_id = completion.id,
            api_key_id = identity.id,
            "Completion recorded"
        );

        Ok(Some(completion))
    }
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::{
        db::{
            DateRange, DbResult, ListParams,
            tests::harness::{create_sqlite_pool, run_sqlite_migrations},
        },
        models::{
            ApiKey, CompletionErrorDetails, CompletionStatus, CreateApiKey, LogDetails, LogEntry,
            LogSeverity, NewLogEntry, TOKENS_NOT_REPORTED, UNKNOWN_API_KEY_ID, UsageSummary,
            hash_api_key,
        },
    };

    // ============================================================================
    // Test doubles
    // ============================================================================

    struct FailingCompletions;

    #[async_trait]
    impl CompletionRepo for FailingCompletions {
        async fn create(&self, _input: NewCompletion) -> DbResult<Completion> {
            Err(DbError::Internal("disk full".into()))
        }

        async fn get_by_id(&self, _id: i64) -> DbResult<Option<Completion>> {
            Ok(None)
        }

        async fn list_by_api_key(
            &self,
            _api_key_id: i64,
            _params: ListParams,
        ) -> DbResult<Vec<Completion>> {
            Ok(Vec::new())
        }

        async fn usage_by_api_key(
            &self,
            api_key_id: i64,
            _range: DateRange,
        ) -> DbResult<UsageSummary> {
            Ok(UsageSummary {
                api_key_id,
                ..Default::default()
            })
        }
    }

    /// Captures log writes, optionally failing them.
    #[derive(Default)]
    struct CapturingLogs {
        fail: bool,
        attempts: Mutex<Vec<NewLogEntry>>,
    }

    #[async_trait]
    impl LogRepo for CapturingLogs {
        async fn create(&self, input: NewLogEntry) -> DbResult<LogEntry> {
            self.attempts.lock().unwrap().push(input.clone());
            if self.fail {
                return Err(DbError::Internal("log table locked".into()));
            }
            Ok(LogEntry {
                id: 1,
                level: input.level,
                message: input.message,
                details: input.details,
                related_api_key_id: input.related_api_key_id,
                related_upstream_id: input.related_upstream_id,
                related_completion_id: input.related_completion_id,
                created_at: Utc::now(),
            })
        }

        async fn get_by_id(&self, _id: i64) -> DbResult<Option<LogEntry>> {
            Ok(None)
        }

        async fn list_by_completion(&self, _completion_id: i64) -> DbResult<Vec<LogEntry>> {
            Ok(Vec::new())
        }
    }

    struct DownKeys;

    #[async_trait]
    impl ApiKeyRepo for DownKeys {
        async fn create(&self, _input: CreateApiKey, _key_hash: &str) -> DbResult<ApiKey> {
            Err(DbError::NotConfigured)
        }

        async fn get_by_id(&self, _id: i64) -> DbResult<Option<ApiKey>> {
            Err(DbError::NotConfigured)
        }

        async fn find_by_hash(&self, _key_hash: &str) -> DbResult<Option<ApiKey>> {
            Err(DbError::NotConfigured)
        }

        async fn get_by_external_id(&self, _external_id: &str) -> DbResult<Option<ApiKey>> {
            Err(DbError::NotConfigured)
        }

        async fn revoke(&self, _id: i64) -> DbResult<bool> {
            Err(DbError::NotConfigured)
        }

        async fn count_active(&self) -> DbResult<i64> {
            Err(DbError::NotConfigured)
        }
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    async fn create_db() -> (Arc<DbPool>, sqlx::SqlitePool) {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        (Arc::new(DbPool::from_sqlite(pool.clone())), pool)
    }

    /// Insert a key with a fixed id, bypassing the autoincrement sequence.
    async fn insert_key(pool: &sqlx::SqlitePool, id: i64, credential: &str, revoked: bool) {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO api_keys (id, key_hash, key_prefix, revoked, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(hash_api_key(credential))
        .bind("testkey0")
        .bind(revoked)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("Failed to insert key");
    }

    async fn count_rows(pool: &sqlx::SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .expect("Failed to count rows")
    }

    fn outcome(status: CompletionStatus) -> CompletionOutcome {
        CompletionOutcome {
            model: "gpt-4".to_string(),
            upstream_id: Some(3),
            model_id: None,
            prompt: json!({"messages": [{"role": "user", "content": "ping"}]}),
            prompt_tokens: 10,
            completion: json!({"choices": []}),
            completion_tokens: 20,
            status,
            ttft_ms: 120,
            duration_ms: 980,
        }
    }

    fn timeout_diagnostic() -> DiagnosticInput {
        DiagnosticInput {
            level: LogSeverity::Error,
            message: "upstream timeout".to_string(),
            details: Some(LogDetails::CompletionError(CompletionErrorDetails {
                kind: "timeout".to_string(),
                message: None,
                status: Some(504),
            })),
        }
    }

    // ============================================================================
    // Recording against SQLite
    // ============================================================================

    #[tokio::test]
    async fn test_known_key_without_diagnostic() {
        let (db, pool) = create_db().await;
        insert_key(&pool, 42, "sk-test-123", false).await;
        let recorder = CompletionRecorder::new(&db);

        let completion = recorder
            .record(outcome(CompletionStatus::Success), "sk-test-123", None)
            .await
            .unwrap()
            .expect("Completion should be recorded");

        assert_eq!(completion.api_key_id, 42);
        assert_eq!(completion.model, "gpt-4");
        assert_eq!(completion.prompt_tokens, 10);
        assert_eq!(completion.completion_tokens, 20);
        assert_eq!(completion.ttft_ms, 120);
        assert_eq!(completion.duration_ms, 980);
        assert_eq!(count_rows(&pool, "completions").await, 1);
        assert_eq!(count_rows(&pool, "logs").await, 0);
    }

    #[tokio::test]
    async fn test_empty_credential_with_diagnostic() {
        let (db, pool) = create_db().await;
        let recorder = CompletionRecorder::new(&db);

        let completion = recorder
            .record(
                outcome(CompletionStatus::Error),
                "",
                Some(timeout_diagnostic()),
            )
            .await
            .unwrap()
            .expect("Completion should be recorded");

        assert_eq!(completion.api_key_id, UNKNOWN_API_KEY_ID);
        assert_eq!(completion.status, CompletionStatus::Error);

        let logs = db.logs().list_by_completion(completion.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.related_api_key_id, UNKNOWN_API_KEY_ID);
        assert_eq!(log.related_completion_id, completion.id);
        assert_eq!(log.related_upstream_id, Some(3));
        assert_eq!(log.level, LogSeverity::Error);
        assert_eq!(log.message, "upstream timeout");
        assert_eq!(log.details, timeout_diagnostic().details);
        assert_eq!(count_rows(&pool, "logs").await, 1);
    }

    #[tokio::test]
    async fn test_unknown_credential_recorded_under_sentinel() {
        let (db, pool) = create_db().await;
        insert_key(&pool, 42, "sk-test-123", false).await;
        let recorder = CompletionRecorder::new(&db);

        for credential in ["sk-nope", "sk-test-1234", " "] {
            let completion = recorder
                .record(outcome(CompletionStatus::Success), credential, None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(completion.api_key_id, UNKNOWN_API_KEY_ID);
        }
        assert_eq!(count_rows(&pool, "completions").await, 3);
    }

    #[tokio::test]
    async fn test_revoked_key_recorded_under_sentinel() {
        let (db, pool) = create_db().await;
        insert_key(&pool, 7, "sk-revoked", true).await;
        let recorder = CompletionRecorder::new(&db);

        let completion = recorder
            .record(outcome(CompletionStatus::Success), "sk-revoked", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completion.api_key_id, UNKNOWN_API_KEY_ID);
    }

    #[tokio::test]
    async fn test_one_completion_per_call_for_every_status() {
        let (db, pool) = create_db().await;
        insert_key(&pool, 42, "sk-test-123", false).await;
        let recorder = CompletionRecorder::new(&db);

        let statuses = [
            CompletionStatus::Pending,
            CompletionStatus::Success,
            CompletionStatus::Error,
            CompletionStatus::Aborted,
            CompletionStatus::CacheHit,
        ];
        for (i, status) in statuses.into_iter().enumerate() {
            let diagnostic = (i % 2 == 0).then(timeout_diagnostic);
            recorder
                .record(outcome(status), "sk-test-123", diagnostic)
                .await
                .unwrap()
                .unwrap();
        }

        assert_eq!(count_rows(&pool, "completions").await, 5);
        // Diagnostics were attached to calls 0, 2 and 4
        assert_eq!(count_rows(&pool, "logs").await, 3);
    }

    #[tokio::test]
    async fn test_unreported_tokens_kept_as_sentinel() {
        let (db, _pool) = create_db().await;
        let recorder = CompletionRecorder::new(&db);

        let mut unreported = outcome(CompletionStatus::Error);
        unreported.prompt_tokens = TOKENS_NOT_REPORTED;
        unreported.completion_tokens = TOKENS_NOT_REPORTED;

        let completion = recorder
            .record(unreported, "", None)
            .await
            .unwrap()
            .unwrap();
        let stored = db
            .completions()
            .get_by_id(completion.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stored.prompt_tokens, TOKENS_NOT_REPORTED);
        assert_eq!(stored.completion_tokens, TOKENS_NOT_REPORTED);
    }

    #[tokio::test]
    async fn test_concurrent_recordings_get_distinct_ids() {
        let (db, pool) = create_db().await;
        let recorder = CompletionRecorder::new(&db);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder
                        .record(
                            outcome(CompletionStatus::Success),
                            "",
                            Some(timeout_diagnostic()),
                        )
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().unwrap().id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(count_rows(&pool, "logs").await, 8);
    }

    // ============================================================================
    // Failure paths
    // ============================================================================

    #[tokio::test]
    async fn test_completion_failure_skips_log_write() {
        let (db, _pool) = create_db().await;
        let logs = Arc::new(CapturingLogs::default());
        let recorder =
            CompletionRecorder::with_repos(db.api_keys(), Arc::new(FailingCompletions), logs.clone());

        let result = recorder
            .record(
                outcome(CompletionStatus::Error),
                "",
                Some(timeout_diagnostic()),
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(logs.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_without_diagnostic() {
        let (db, _pool) = create_db().await;
        let logs = Arc::new(CapturingLogs::default());
        let recorder =
            CompletionRecorder::with_repos(db.api_keys(), Arc::new(FailingCompletions), logs.clone());

        let result = recorder
            .record(outcome(CompletionStatus::Success), "sk-any", None)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(logs.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_failure_keeps_completion() {
        let (db, pool) = create_db().await;
        let logs = Arc::new(CapturingLogs {
            fail: true,
            ..Default::default()
        });
        let recorder = CompletionRecorder::with_repos(db.api_keys(), db.completions(), logs.clone());

        let err = recorder
            .record(
                outcome(CompletionStatus::Error),
                "",
                Some(timeout_diagnostic()),
            )
            .await
            .unwrap_err();

        let completion_id = match err {
            RecordError::LogWrite { completion_id, .. } => completion_id,
            other => panic!("expected LogWrite, got {other:?}"),
        };
        assert!(db.completions().get_by_id(completion_id).await.unwrap().is_some());
        assert_eq!(count_rows(&pool, "completions").await, 1);

        let attempts = logs.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].related_completion_id, completion_id);
    }

    #[tokio::test]
    async fn test_key_store_failure_writes_nothing() {
        let (db, pool) = create_db().await;
        let recorder = CompletionRecorder::with_repos(Arc::new(DownKeys), db.completions(), db.logs());

        let err = recorder
            .record(
                outcome(CompletionStatus::Success),
                "sk-test-123",
                Some(timeout_diagnostic()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::KeyResolution(_)));
        assert_eq!(count_rows(&pool, "completions").await, 0);
        assert_eq!(count_rows(&pool, "logs").await, 0);
    }

    #[tokio::test]
    async fn test_empty_credential_tolerates_key_store_failure() {
        let (db, pool) = create_db().await;
        let recorder = CompletionRecorder::with_repos(Arc::new(DownKeys), db.completions(), db.logs());

        let completion = recorder
            .record(outcome(CompletionStatus::Success), "", None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(completion.api_key_id, UNKNOWN_API_KEY_ID);
        assert_eq!(count_rows(&pool, "completions").await, 1);
    }
}
