//! Push command - Send an import's funding summary to the partner API
//!
//! Runs the partner push for one data import. Partner rejections are shown
//! with the partner's own description.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use ilrsync_core::domain::PipelineError;
use ilrsync_core::usecases::{PushFundingSummaryUseCase, PushOutcome};
use ilrsync_partner::PartnerClient;

use super::{feature_store, import_repository, open_database, CliContext};

#[derive(Debug, Args)]
pub struct PushCommand {
    /// Data import id (see `ilrsync imports list`)
    pub import_id: i64,
}

impl PushCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;

        let partner = PartnerClient::new(
            config.partner.base_url.clone(),
            config.partner.summary_path.clone(),
            Duration::from_secs(config.partner.timeout_secs),
        )
        .context("Cannot create partner client")?;

        let pool = open_database(&config).await?;
        let use_case = PushFundingSummaryUseCase::new(
            import_repository(&pool),
            feature_store(&pool, &config),
            Arc::new(partner),
        );

        let result = use_case.execute(self.import_id).await;
        pool.close().await;

        let outcome = result.map_err(|e| match PipelineError::find_in(&e) {
            Some(PipelineError::PartnerApi(description)) => {
                anyhow!("Partner rejected the push: {}", description)
            }
            _ => e,
        })?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&outcome)?);
            return Ok(());
        }

        match outcome {
            PushOutcome::Pushed { records } => formatter.success(&format!(
                "Pushed {} funding record(s) for import {}",
                records, self.import_id
            )),
            PushOutcome::SkippedNoRecords => formatter.warn(&format!(
                "Import {} has no funding summary rows; nothing sent",
                self.import_id
            )),
            PushOutcome::SkippedDisabled => formatter.warn(
                "Partner connection is disabled. Enable it with 'ilrsync feature enable OPS_CONNECTION'",
            ),
        }
        Ok(())
    }
}
