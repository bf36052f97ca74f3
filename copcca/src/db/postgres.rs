//! PostgreSQL storage backend: one `kv_store` table of JSONB documents.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::instrument;

use crate::db::{errors::Result, kv::KvStore};

#[derive(Clone)]
pub struct PostgresKv {
    pool: PgPool,
}

impl PostgresKv {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl KvStore for PostgresKv {
    #[instrument(skip(self), err)]
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = sqlx::query_scalar::<_, Value>("SELECT value FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    #[instrument(skip(self, value), err)]
    async fn set(&self, key: &str, value: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn del(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = $1").bind(key).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(count = keys.len()), err)]
    async fn mdel(&self, keys: &[String]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ANY($1)")
            .bind(keys)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        let rows = sqlx::query_as::<_, (String, Value)>("SELECT key, value FROM kv_store WHERE starts_with(key, $1) ORDER BY key")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
