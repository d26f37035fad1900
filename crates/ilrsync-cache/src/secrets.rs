//! SQLite implementation of ISecretStore

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use ilrsync_core::domain::SecretType;
use ilrsync_core::ports::ISecretStore;

use crate::crypto::TextEncryptor;

/// Secrets stored encrypted in the `encrypted_text` table
pub struct SqliteSecretStore {
    pool: SqlitePool,
    encryptor: TextEncryptor,
}

impl SqliteSecretStore {
    pub fn new(pool: SqlitePool, encryptor: TextEncryptor) -> Self {
        Self { pool, encryptor }
    }
}

#[async_trait::async_trait]
impl ISecretStore for SqliteSecretStore {
    async fn get_secret(&self, secret_type: SecretType) -> anyhow::Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM encrypted_text WHERE secret_type = ?")
            .bind(secret_type.tag())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: String = row.get("value");
        if value.is_empty() {
            return Ok(None);
        }
        let plaintext = self.encryptor.decrypt(&value)?;
        Ok(if plaintext.is_empty() {
            None
        } else {
            Some(plaintext)
        })
    }

    async fn set_secret(&self, secret_type: SecretType, plaintext: &str) -> anyhow::Result<()> {
        let sealed = self.encryptor.encrypt(plaintext)?;
        sqlx::query(
            "INSERT OR REPLACE INTO encrypted_text (secret_type, value, updated_at) \
             VALUES (?, ?, ?)",
        )
        .bind(secret_type.tag())
        .bind(&sealed)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(secret_type = %secret_type, "Secret updated");
        Ok(())
    }
}
