//! Preferences over the settings table

use addbook_core::prefs::Preferences;
use addbook_core::StoreError;
use async_trait::async_trait;

use crate::store::{backend, SqliteStore};

#[async_trait]
impl Preferences for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, Option<String>>(
            "SELECT value FROM settings WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await
        .map_err(backend)?;

        Ok(value.flatten())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE
                SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await
        .map_err(backend)?;

        Ok(())
    }
}
