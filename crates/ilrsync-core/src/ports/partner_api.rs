//! Partner API port (driven/secondary port)

use anyhow::Result;

use crate::domain::FundingRecord;

/// Outbound client for the partner system
#[async_trait::async_trait]
pub trait IPartnerApi: Send + Sync {
    /// Posts a period's funding records
    ///
    /// # Errors
    ///
    /// A [`PipelineError::PartnerApi`](crate::domain::PipelineError::PartnerApi)
    /// carrying the partner's description when the partner rejects the
    /// request; the transport error otherwise.
    async fn push_funding_summary(
        &self,
        academic_year: i32,
        period: u32,
        records: &[FundingRecord],
    ) -> Result<()>;
}
