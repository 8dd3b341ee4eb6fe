//! Shared tests for CompletionRepo implementations
//!
//! Covers the not-reported token sentinel and usage aggregation over it.

use chrono::{Duration, Utc};
use serde_json::json;

use crate::{
    db::{
        error::DbError,
        repos::{CompletionRepo, DateRange, ListParams, SortOrder},
    },
    models::{
        CompletionOutcome, CompletionStatus, NewCompletion, TOKENS_NOT_REPORTED,
        UNKNOWN_API_KEY_ID,
    },
};

pub struct CompletionTestContext<'a> {
    pub repo: &'a dyn CompletionRepo,
}

fn outcome(
    model: &str,
    prompt_tokens: i32,
    completion_tokens: i32,
    status: CompletionStatus,
) -> CompletionOutcome {
    CompletionOutcome {
        model: model.to_string(),
        upstream_id: Some(3),
        model_id: None,
        prompt: json!({"messages": [{"role": "user", "content": "hi"}]}),
        prompt_tokens,
        completion: json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]}),
        completion_tokens,
        status,
        ttft_ms: 150,
        duration_ms: 1200,
    }
}

fn success(api_key_id: i64, prompt_tokens: i32, completion_tokens: i32) -> NewCompletion {
    NewCompletion::new(
        api_key_id,
        outcome(
            "gpt-4o",
            prompt_tokens,
            completion_tokens,
            CompletionStatus::Success,
        ),
    )
}

// ============================================================================
// Shared Test Functions
// ============================================================================

pub async fn test_create_completion(ctx: &CompletionTestContext<'_>) {
    let completion = ctx
        .repo
        .create(success(42, 12, 30))
        .await
        .expect("Failed to create completion");

    assert!(completion.id > 0);
    assert_eq!(completion.api_key_id, 42);
    assert_eq!(completion.upstream_id, Some(3));
    assert_eq!(completion.model, "gpt-4o");
    assert_eq!(completion.prompt_tokens, 12);
    assert_eq!(completion.completion_tokens, 30);
    assert_eq!(completion.status, CompletionStatus::Success);
}

pub async fn test_get_by_id_round_trip(ctx: &CompletionTestContext<'_>) {
    let created = ctx
        .repo
        .create(NewCompletion::new(
            7,
            outcome("claude-3", 5, 9, CompletionStatus::CacheHit),
        ))
        .await
        .expect("Failed to create completion");

    let fetched = ctx
        .repo
        .get_by_id(created.id)
        .await
        .expect("Query failed")
        .expect("Completion should exist");

    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.prompt, created.prompt);
    assert_eq!(fetched.completion, created.completion);
    assert_eq!(fetched.status, CompletionStatus::CacheHit);
    assert_eq!(fetched.ttft_ms, 150);
    assert_eq!(fetched.duration_ms, 1200);
}

pub async fn test_get_by_id_not_found(ctx: &CompletionTestContext<'_>) {
    assert!(ctx.repo.get_by_id(999).await.unwrap().is_none());
}

pub async fn test_unreported_tokens_stored_as_sentinel(ctx: &CompletionTestContext<'_>) {
    let created = ctx
        .repo
        .create(success(42, TOKENS_NOT_REPORTED, TOKENS_NOT_REPORTED))
        .await
        .expect("Sentinel token counts must be accepted");

    let fetched = ctx.repo.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.prompt_tokens, TOKENS_NOT_REPORTED);
    assert_eq!(fetched.completion_tokens, TOKENS_NOT_REPORTED);
    assert_eq!(fetched.reported_prompt_tokens(), None);
    assert_eq!(fetched.reported_completion_tokens(), None);
}

pub async fn test_invalid_token_count_rejected(ctx: &CompletionTestContext<'_>) {
    let result = ctx.repo.create(success(42, -5, 10)).await;
    assert!(matches!(result, Err(DbError::Validation(_))));
}

pub async fn test_negative_timings_rejected(ctx: &CompletionTestContext<'_>) {
    let mut input = success(42, 10, 10);
    input.outcome.duration_ms = -1;
    let result = ctx.repo.create(input).await;
    assert!(matches!(result, Err(DbError::Validation(_))));

    let mut input = success(42, 10, 10);
    input.outcome.ttft_ms = -40;
    let result = ctx.repo.create(input).await;
    assert!(matches!(result, Err(DbError::Validation(_))));

    let listed = ctx
        .repo
        .list_by_api_key(42, ListParams::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

pub async fn test_unknown_key_accepted(ctx: &CompletionTestContext<'_>) {
    let created = ctx
        .repo
        .create(success(UNKNOWN_API_KEY_ID, 1, 1))
        .await
        .expect("Completions for unresolved keys must be recorded");

    assert_eq!(created.api_key_id, UNKNOWN_API_KEY_ID);
    assert!(!created.has_known_api_key());
}

pub async fn test_null_completion_payload(ctx: &CompletionTestContext<'_>) {
    let mut input = success(42, 10, TOKENS_NOT_REPORTED);
    input.outcome.completion = serde_json::Value::Null;
    input.outcome.status = CompletionStatus::Error;

    let created = ctx.repo.create(input).await.expect("Failed to create");
    let fetched = ctx.repo.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.completion, serde_json::Value::Null);
    assert_eq!(fetched.status, CompletionStatus::Error);
}

pub async fn test_ids_are_unique(ctx: &CompletionTestContext<'_>) {
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(ctx.repo.create(success(42, 1, 1)).await.unwrap().id);
    }
    let mut deduped = ids.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), ids.len());
}

pub async fn test_list_by_api_key(ctx: &CompletionTestContext<'_>) {
    let first = ctx.repo.create(success(1, 1, 1)).await.unwrap();
    let second = ctx.repo.create(success(1, 2, 2)).await.unwrap();
    ctx.repo.create(success(2, 3, 3)).await.unwrap();

    let listed = ctx
        .repo
        .list_by_api_key(1, ListParams::default())
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let listed = ctx
        .repo
        .list_by_api_key(
            1,
            ListParams {
                limit: Some(1),
                sort_order: SortOrder::Asc,
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, first.id);
}

pub async fn test_usage_skips_unreported_tokens(ctx: &CompletionTestContext<'_>) {
    ctx.repo.create(success(42, 100, 50)).await.unwrap();
    ctx.repo
        .create(success(42, TOKENS_NOT_REPORTED, 20))
        .await
        .unwrap();
    ctx.repo
        .create(success(42, 30, TOKENS_NOT_REPORTED))
        .await
        .unwrap();
    ctx.repo
        .create(NewCompletion::new(
            42,
            outcome(
                "gpt-4o",
                TOKENS_NOT_REPORTED,
                TOKENS_NOT_REPORTED,
                CompletionStatus::Error,
            ),
        ))
        .await
        .unwrap();
    // Another key's usage must not leak in
    ctx.repo.create(success(43, 1000, 1000)).await.unwrap();

    let usage = ctx
        .repo
        .usage_by_api_key(42, DateRange::all_time())
        .await
        .unwrap();

    assert_eq!(usage.api_key_id, 42);
    assert_eq!(usage.completions, 4);
    assert_eq!(usage.errors, 1);
    assert_eq!(usage.prompt_tokens, 130);
    assert_eq!(usage.completion_tokens, 70);
    assert_eq!(usage.unreported_prompt_tokens, 2);
    assert_eq!(usage.unreported_completion_tokens, 2);
    assert_eq!(usage.total_tokens(), 200);
}

pub async fn test_usage_respects_date_range(ctx: &CompletionTestContext<'_>) {
    ctx.repo.create(success(42, 10, 10)).await.unwrap();

    let future = DateRange {
        start: Utc::now() + Duration::days(1),
        end: Utc::now() + Duration::days(2),
    };
    let usage = ctx.repo.usage_by_api_key(42, future).await.unwrap();
    assert_eq!(usage.completions, 0);
    assert_eq!(usage.prompt_tokens, 0);
    assert_eq!(usage.completion_tokens, 0);
}

// ============================================================================
// SQLite Tests - Fast, in-memory
// ============================================================================

#[cfg(all(test, feature = "database-sqlite"))]
mod sqlite_tests {
    use super::*;
    use crate::db::{
        sqlite::SqliteCompletionRepo,
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    async fn create_repo() -> SqliteCompletionRepo {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        SqliteCompletionRepo::new(pool)
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let repo = create_repo().await;
                let ctx = CompletionTestContext { repo: &repo };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_create_completion);
    sqlite_test!(test_get_by_id_round_trip);
    sqlite_test!(test_get_by_id_not_found);
    sqlite_test!(test_unreported_tokens_stored_as_sentinel);
    sqlite_test!(test_invalid_token_count_rejected);
    sqlite_test!(test_negative_timings_rejected);
    sqlite_test!(test_unknown_key_accepted);
    sqlite_test!(test_null_completion_payload);
    sqlite_test!(test_ids_are_unique);
    sqlite_test!(test_list_by_api_key);
    sqlite_test!(test_usage_skips_unreported_tokens);
    sqlite_test!(test_usage_respects_date_range);
}

// ============================================================================
// PostgreSQL Tests - Require Docker, run with `cargo test -- --ignored`
// ============================================================================

#[cfg(all(test, feature = "database-postgres"))]
mod postgres_tests {
    use super::*;
    use crate::db::{
        postgres::PostgresCompletionRepo,
        tests::harness::postgres::{create_isolated_postgres_pool, run_postgres_migrations},
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let repo = PostgresCompletionRepo::new(pool, None);
                let ctx = CompletionTestContext { repo: &repo };
                super::$name(&ctx).await;
            }
        };
    }

    postgres_test!(test_create_completion);
    postgres_test!(test_get_by_id_round_trip);
    postgres_test!(test_get_by_id_not_found);
    postgres_test!(test_unreported_tokens_stored_as_sentinel);
    postgres_test!(test_invalid_token_count_rejected);
    postgres_test!(test_negative_timings_rejected);
    postgres_test!(test_unknown_key_accepted);
    postgres_test!(test_null_completion_payload);
    postgres_test!(test_ids_are_unique);
    postgres_test!(test_list_by_api_key);
    postgres_test!(test_usage_skips_unreported_tokens);
    postgres_test!(test_usage_respects_date_range);
}
