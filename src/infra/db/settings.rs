use async_trait::async_trait;
use serde_json::Value;

use crate::application::repos::{RepoError, SettingsRepo};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl SettingsRepo for PostgresRepositories {
    async fn load_setting(&self, key: &str) -> Result<Option<Value>, RepoError> {
        sqlx::query_scalar::<_, Value>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn store_setting(&self, key: &str, value: Value) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
