//! Shared tests for ModelRepo implementations

use crate::{
    db::{
        error::DbError,
        repos::{ModelRepo, ProviderRepo},
    },
    models::{CreateModel, CreateProvider, ModelCounts, ModelType},
    providers::ProviderKind,
};

pub struct ModelTestContext<'a> {
    pub repo: &'a dyn ModelRepo,
    pub provider_repo: &'a dyn ProviderRepo,
}

impl ModelTestContext<'_> {
    async fn create_provider(&self, name: &str) -> i64 {
        self.provider_repo
            .create(CreateProvider {
                name: name.to_string(),
                kind: ProviderKind::OpenAi,
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                api_version: None,
            })
            .await
            .expect("Failed to create provider")
            .id
    }
}

fn model(provider_id: i64, name: &str, model_type: ModelType) -> CreateModel {
    CreateModel {
        provider_id,
        name: name.to_string(),
        model_type,
    }
}

// ============================================================================
// Shared Test Functions
// ============================================================================

pub async fn test_create_and_get(ctx: &ModelTestContext<'_>) {
    let provider_id = ctx.create_provider("openai").await;

    let created = ctx
        .repo
        .create(model(provider_id, "gpt-4o", ModelType::Chat))
        .await
        .expect("Failed to create model");
    assert!(created.id > 0);
    assert_eq!(created.provider_id, provider_id);

    let fetched = ctx
        .repo
        .get_by_id(created.id)
        .await
        .expect("Query failed")
        .expect("Model should exist");
    assert_eq!(fetched.name, "gpt-4o");
    assert_eq!(fetched.model_type, ModelType::Chat);
}

pub async fn test_unknown_provider_rejected(ctx: &ModelTestContext<'_>) {
    let result = ctx
        .repo
        .create(model(9999, "gpt-4o", ModelType::Chat))
        .await;
    assert!(matches!(result, Err(DbError::Validation(_))));
}

pub async fn test_duplicate_name_per_provider(ctx: &ModelTestContext<'_>) {
    let first = ctx.create_provider("primary").await;
    let second = ctx.create_provider("secondary").await;

    ctx.repo
        .create(model(first, "gpt-4o", ModelType::Chat))
        .await
        .unwrap();
    let result = ctx
        .repo
        .create(model(first, "gpt-4o", ModelType::Chat))
        .await;
    assert!(matches!(result, Err(DbError::Conflict(_))));

    // The same name under another provider is a different model
    ctx.repo
        .create(model(second, "gpt-4o", ModelType::Chat))
        .await
        .expect("Names are unique per provider only");
}

pub async fn test_count_by_type(ctx: &ModelTestContext<'_>) {
    assert_eq!(ctx.repo.count_by_type().await.unwrap(), ModelCounts::default());

    let provider_id = ctx.create_provider("openai").await;
    for (name, model_type) in [
        ("gpt-4o", ModelType::Chat),
        ("gpt-4o-mini", ModelType::Chat),
        ("o3", ModelType::Chat),
        ("text-embedding-3-large", ModelType::Embedding),
    ] {
        ctx.repo
            .create(model(provider_id, name, model_type))
            .await
            .unwrap();
    }

    let counts = ctx.repo.count_by_type().await.unwrap();
    assert_eq!(counts.chat, 3);
    assert_eq!(counts.embedding, 1);

    let listed = ctx.repo.list_by_provider(provider_id).await.unwrap();
    assert_eq!(listed.len(), 4);
    assert!(ctx.repo.list_by_provider(provider_id + 1).await.unwrap().is_empty());
}

// ============================================================================
// SQLite Tests - Fast, in-memory
// ============================================================================

#[cfg(all(test, feature = "database-sqlite"))]
mod sqlite_tests {
    use super::*;
    use crate::db::{
        sqlite::{SqliteModelRepo, SqliteProviderRepo},
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let pool = create_sqlite_pool().await;
                run_sqlite_migrations(&pool).await;
                let repo = SqliteModelRepo::new(pool.clone());
                let provider_repo = SqliteProviderRepo::new(pool);
                let ctx = ModelTestContext {
                    repo: &repo,
                    provider_repo: &provider_repo,
                };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_create_and_get);
    sqlite_test!(test_unknown_provider_rejected);
    sqlite_test!(test_duplicate_name_per_provider);
    sqlite_test!(test_count_by_type);
}

// ============================================================================
// PostgreSQL Tests - Require Docker, run with `cargo test -- --ignored`
// ============================================================================

#[cfg(all(test, feature = "database-postgres"))]
mod postgres_tests {
    use super::*;
    use crate::db::{
        postgres::{PostgresModelRepo, PostgresProviderRepo},
        tests::harness::postgres::{create_isolated_postgres_pool, run_postgres_migrations},
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                run_postgres_migrations(&pool).await;
                let repo = PostgresModelRepo::new(pool.clone(), None);
                let provider_repo = PostgresProviderRepo::new(pool, None);
                let ctx = ModelTestContext {
                    repo: &repo,
                    provider_repo: &provider_repo,
                };
                super::$name(&ctx).await;
            }
        };
    }

    postgres_test!(test_create_and_get);
    postgres_test!(test_unknown_provider_rejected);
    postgres_test!(test_duplicate_name_per_provider);
    postgres_test!(test_count_by_type);
}
