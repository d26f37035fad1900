//! Secret command - Manage the archive decryption password
//!
//! The password is stored encrypted with the key derived from the
//! `encryption` section. It is never printed; `status` only reports
//! whether one is set.

use anyhow::{Context, Result};
use clap::Subcommand;
use ilrsync_core::domain::SecretType;
use ilrsync_core::ports::ISecretStore;
use tracing::info;

use super::{open_database, secret_store, CliContext};

#[derive(Debug, Subcommand)]
pub enum SecretCommand {
    /// Store the password used to decrypt archives; an empty value clears it
    SetArchivePassword {
        /// New password
        value: String,
    },
    /// Show whether an archive password is stored
    Status,
}

impl SecretCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let pool = open_database(&config).await?;
        let secrets = secret_store(&pool, &config)?;

        match self {
            SecretCommand::SetArchivePassword { value } => {
                secrets
                    .set_secret(SecretType::ArchiveDecryptionPassword, value)
                    .await
                    .context("Failed to store archive password")?;
                info!(cleared = value.is_empty(), "Archive password updated");

                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "secret": SecretType::ArchiveDecryptionPassword.to_string(),
                        "set": !value.is_empty(),
                    }));
                } else if value.is_empty() {
                    formatter.success("Archive password cleared");
                } else {
                    formatter.success("Archive password stored");
                }
            }
            SecretCommand::Status => {
                let set = secrets
                    .get_secret(SecretType::ArchiveDecryptionPassword)
                    .await
                    .context("Failed to read archive password")?
                    .is_some();

                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "secret": SecretType::ArchiveDecryptionPassword.to_string(),
                        "set": set,
                    }));
                } else if set {
                    formatter.success("Archive password is set");
                } else {
                    formatter.warn("No archive password set; encrypted archives will fail");
                }
            }
        }

        pool.close().await;
        Ok(())
    }
}
