//! Sync command - Run one sync cycle now
//!
//! Provides the `ilrsync sync` CLI command which:
//! 1. Loads and validates the configuration and opens the database
//! 2. Builds the synchronizer over the SQLite stores and the SFTP adapter
//! 3. Runs one cycle through the same feature flag and lock as the daemon
//! 4. Displays the outcome and per-phase counters

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use ilrsync_core::domain::{Feature, SyncCycle, SyncPhase};
use ilrsync_core::ports::IRemoteSessionFactory;
use ilrsync_sftp::SftpSessionFactory;
use tracing::{info, warn};

use super::{build_synchronizer, open_database, CliContext};

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_valid_config()?;

        let pool = open_database(&config).await?;
        let sessions = Arc::new(SftpSessionFactory::new());
        let synchronizer = build_synchronizer(&config, &pool, sessions.clone())?;

        info!(host = %config.remote.host, "Running manual sync cycle");
        let cycle = synchronizer.run_cycle(&config.remote_endpoint()).await;

        if let Err(e) = sessions.close_all().await {
            warn!(error = %e, "Failed to close SFTP sessions");
        }
        pool.close().await;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&cycle)?);
        } else {
            match cycle.outcome {
                SyncPhase::Completed => formatter.success(&format!(
                    "Sync completed in {} ms",
                    cycle.duration_ms
                )),
                SyncPhase::SkippedDisabled => formatter.warn(&format!(
                    "Sync is disabled. Enable it with 'ilrsync feature enable {}'",
                    Feature::SfaFtpSync
                )),
                SyncPhase::SkippedLockContention => {
                    formatter.warn("Another sync cycle is in progress, skipped")
                }
                _ => {}
            }
            formatter.lines(&summary_lines(&cycle));
        }

        if cycle.outcome == SyncPhase::FailedWithError {
            bail!(
                "Sync failed: {}",
                cycle.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}

/// Counter lines shown after a cycle that reached the transfer phase
fn summary_lines(cycle: &SyncCycle) -> Vec<String> {
    let mut lines = Vec::new();
    if cycle.skipped() {
        if let Some(message) = &cycle.error_message {
            lines.push(format!("Reason: {}", message));
        }
        return lines;
    }

    let s = &cycle.stats;
    lines.push(format!(
        "Transferred: {} ({} already staged or accepted)",
        s.files_transferred, s.files_skipped_remote
    ));
    lines.push(format!(
        "Extracted:   {} ({} archive(s) failed)",
        s.files_extracted, s.archives_failed
    ));
    lines.push(format!(
        "Ingested:    {}, skipped {}, failed {}",
        s.files_ingested, s.files_skipped, s.files_failed
    ));
    lines.push(format!("Staged now:  {}", s.local_files));
    lines
}
