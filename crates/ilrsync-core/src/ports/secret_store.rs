//! Secret store port (driven/secondary port)
//!
//! Values are encrypted at rest by the implementation; callers only ever
//! see plaintext.

use anyhow::Result;

use crate::domain::SecretType;

/// Encrypted-at-rest text secrets keyed by type tag
#[async_trait::async_trait]
pub trait ISecretStore: Send + Sync {
    /// Returns the decrypted secret, or `None` when unset or empty
    async fn get_secret(&self, secret_type: SecretType) -> Result<Option<String>>;

    /// Encrypts and stores a secret, replacing any previous value
    async fn set_secret(&self, secret_type: SecretType, plaintext: &str) -> Result<()>;
}
