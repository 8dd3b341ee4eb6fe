use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::parse_text_enum;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ModelRepo,
    },
    models::{CreateModel, Model, ModelCounts, ModelType},
};

pub struct PostgresModelRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresModelRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn parse_model(row: &sqlx::postgres::PgRow) -> DbResult<Model> {
        Ok(Model {
            id: row.get("id"),
            provider_id: row.get("provider_id"),
            name: row.get("name"),
            model_type: parse_text_enum(row.get("model_type"), "model type")?,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ModelRepo for PostgresModelRepo {
    async fn create(&self, input: CreateModel) -> DbResult<Model> {
        let row = sqlx::query(
            r#"
            INSERT INTO models (provider_id, name, model_type)
            VALUES ($1, $2, $3)
            RETURNING id, provider_id, name, model_type, created_at
            "#,
        )
        .bind(input.provider_id)
        .bind(&input.name)
        .bind(input.model_type.as_str())
        .fetch_one(&self.write_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::Conflict(
                format!("Provider {} already serves model '{}'", input.provider_id, input.name),
            ),
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Provider {} does not exist", input.provider_id))
            }
            _ => DbError::from(e),
        })?;

        Self::parse_model(&row)
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<Model>> {
        let row = sqlx::query(
            "SELECT id, provider_id, name, model_type, created_at FROM models WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.read_pool)
        .await?;

        row.as_ref().map(Self::parse_model).transpose()
    }

    async fn list_by_provider(&self, provider_id: i64) -> DbResult<Vec<Model>> {
        let rows = sqlx::query(
            r#"
            SELECT id, provider_id, name, model_type, created_at
            FROM models
            WHERE provider_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(provider_id)
        .fetch_all(&self.read_pool)
        .await?;

        rows.iter().map(Self::parse_model).collect()
    }

    async fn count_by_type(&self) -> DbResult<ModelCounts> {
        let rows = sqlx::query(
            "SELECT model_type, COUNT(*) AS count FROM models GROUP BY model_type",
        )
        .fetch_all(&self.read_pool)
        .await?;

        let mut counts = ModelCounts::default();
        for row in &rows {
            let count: i64 = row.get("count");
            match parse_text_enum::<ModelType>(row.get("model_type"), "model type")? {
                ModelType::Chat => counts.chat = count,
                ModelType::Embedding => counts.embedding = count,
            }
        }
        Ok(counts)
    }
}
