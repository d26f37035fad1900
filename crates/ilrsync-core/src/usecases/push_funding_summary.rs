//! Partner push use case
//!
//! Sends the funding summary rows of an import's (academic year, period)
//! to the partner API, converted to the partner wire format and collapsed
//! into a set. Nothing is sent when the period has no rows or the partner
//! connection flag is off.
//!
//! Only the newest completed import of a type and period can be pushed:
//! its rows are the ones stored for that period.
//!
//! On success the import record is stamped with the push time. A re-push
//! overwrites the stamp.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::domain::import_type::get_by_code;
use crate::domain::{Feature, FundingRecord, ImportStatus};
use crate::ports::{IFeatureStore, IImportRepository, IPartnerApi};

/// Result of a push attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PushOutcome {
    /// Records were accepted by the partner
    Pushed { records: usize },
    /// The period has no funding rows; nothing was sent
    SkippedNoRecords,
    /// The partner connection flag is off; nothing was sent
    SkippedDisabled,
}

/// Use case for pushing funding summaries to the partner API
pub struct PushFundingSummaryUseCase {
    imports: Arc<dyn IImportRepository + Send + Sync>,
    features: Arc<dyn IFeatureStore + Send + Sync>,
    partner: Arc<dyn IPartnerApi + Send + Sync>,
}

impl PushFundingSummaryUseCase {
    /// Creates a new PushFundingSummaryUseCase
    ///
    /// # Arguments
    ///
    /// * `imports` - Import records and funding rows
    /// * `features` - Feature flags (reads `OPS_CONNECTION`)
    /// * `partner` - Partner API client
    pub fn new(
        imports: Arc<dyn IImportRepository + Send + Sync>,
        features: Arc<dyn IFeatureStore + Send + Sync>,
        partner: Arc<dyn IPartnerApi + Send + Sync>,
    ) -> Self {
        Self {
            imports,
            features,
            partner,
        }
    }

    /// Pushes the funding summary behind import `import_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the import does not exist, is not a pushable
    /// type, lacks its period key, is not the newest `Complete` import of
    /// its type and period, or if the partner rejects the request.
    /// Partner rejections surface as
    /// [`PipelineError::PartnerApi`](crate::domain::PipelineError::PartnerApi)
    /// with the partner's description.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, import_id: i64) -> Result<PushOutcome> {
        let mut import = self
            .imports
            .get_import(import_id)
            .await
            .context("Failed to load import record")?
            .ok_or_else(|| anyhow!("Import {} not found", import_id))?;

        if !get_by_code(import.import_type).can_push_to_partner {
            bail!(
                "Import {} is of type {} which cannot be pushed to the partner",
                import_id,
                import.import_type
            );
        }
        let (academic_year, period) = import
            .period_key()
            .ok_or_else(|| anyhow!("Import {} has no academic year and period", import_id))?;
        if import.status != ImportStatus::Complete {
            bail!(
                "Import {} has status {} and cannot be pushed",
                import_id,
                import.status
            );
        }
        let latest = self
            .imports
            .latest_completed_import(import.import_type, academic_year, period)
            .await
            .context("Failed to look up the latest import of the period")?;
        if latest != Some(import_id) {
            bail!(
                "Import {} is not the latest completed {} import for {} R{:02}",
                import_id,
                import.import_type,
                academic_year,
                period
            );
        }

        let rows = self
            .imports
            .funding_summary_rows(academic_year, period)
            .await
            .context("Failed to load funding summary rows")?;
        let records: HashSet<FundingRecord> =
            rows.iter().map(|r| r.to_funding_record()).collect();

        if records.is_empty() {
            info!(import_id, academic_year, period, "No funding records to push");
            return Ok(PushOutcome::SkippedNoRecords);
        }
        if !self.features.is_active(Feature::OpsConnection).await? {
            info!(import_id, "Partner connection disabled, push skipped");
            return Ok(PushOutcome::SkippedDisabled);
        }

        let records: Vec<FundingRecord> = records.into_iter().collect();
        self.partner
            .push_funding_summary(academic_year, period, &records)
            .await?;

        import.mark_exported(Utc::now());
        self.imports
            .update_import(&import)
            .await
            .context("Failed to stamp import export date")?;

        info!(
            import_id,
            academic_year,
            period,
            records = records.len(),
            "Funding summary pushed"
        );
        Ok(PushOutcome::Pushed {
            records: records.len(),
        })
    }
}
