//! Feature command - View and toggle runtime feature flags
//!
//! Overrides are stored in the database and take effect at the next cycle
//! of every running instance. `reset` drops them so the configured defaults
//! apply again.

use anyhow::{Context, Result};
use clap::Subcommand;
use ilrsync_core::domain::{Feature, FeatureState};
use ilrsync_core::ports::IFeatureStore;

use super::{feature_store, open_database, CliContext};

#[derive(Debug, Subcommand)]
pub enum FeatureCommand {
    /// Show every flag and its current state
    List,
    /// Turn a flag on (SFA_FTP_SYNC or OPS_CONNECTION)
    Enable { feature: Feature },
    /// Turn a flag off
    Disable { feature: Feature },
    /// Remove all overrides and fall back to the configured defaults
    Reset,
}

impl FeatureCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let pool = open_database(&config).await?;
        let features = feature_store(&pool, &config);

        match self {
            FeatureCommand::List => {}
            FeatureCommand::Enable { feature } => {
                features
                    .set_active(*feature, true)
                    .await
                    .with_context(|| format!("Failed to enable {}", feature))?;
                formatter.success(&format!("{} enabled", feature));
            }
            FeatureCommand::Disable { feature } => {
                features
                    .set_active(*feature, false)
                    .await
                    .with_context(|| format!("Failed to disable {}", feature))?;
                formatter.success(&format!("{} disabled", feature));
            }
            FeatureCommand::Reset => {
                features
                    .reset_defaults()
                    .await
                    .context("Failed to reset feature flags")?;
                formatter.success("Feature flags reset to configured defaults");
            }
        }

        let states = features.list().await.context("Failed to list feature flags")?;
        pool.close().await;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&states)?);
        } else {
            formatter.lines(&state_lines(&states));
        }
        Ok(())
    }
}

fn state_lines(states: &[FeatureState]) -> Vec<String> {
    states
        .iter()
        .map(|s| {
            format!(
                "{:<16} {:<4} {:<9} {}",
                s.feature.name(),
                if s.active { "on" } else { "off" },
                if s.overridden { "override" } else { "default" },
                s.feature.description()
            )
        })
        .collect()
}
