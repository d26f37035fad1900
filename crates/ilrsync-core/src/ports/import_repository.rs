//! Import repository port (driven/secondary port)
//!
//! Persists [`DataImport`] records and the funding summary rows read from
//! funding summary reports.
//!
//! ## Design Notes
//!
//! - Funding rows are keyed by (academic year, period); importing a report
//!   for a period replaces every row stored for it.
//! - The newest completed import of a type and period is the one whose rows
//!   are stored, and the only one that may be pushed to the partner.

use anyhow::Result;

use crate::domain::{DataImport, FundingSummaryRecord, ImportTypeCode};

#[async_trait::async_trait]
pub trait IImportRepository: Send + Sync {
    /// Inserts a new import record and returns its assigned id
    async fn insert_import(&self, import: &DataImport) -> Result<i64>;

    /// Updates an existing import record (matched by `import.id`)
    async fn update_import(&self, import: &DataImport) -> Result<()>;

    /// Loads an import record by id
    async fn get_import(&self, id: i64) -> Result<Option<DataImport>>;

    /// Returns the most recent import records, newest first
    async fn list_imports(&self, limit: u32) -> Result<Vec<DataImport>>;

    /// Id of the newest `Complete` import of `import_type` for a period
    async fn latest_completed_import(
        &self,
        import_type: ImportTypeCode,
        academic_year: i32,
        period: u32,
    ) -> Result<Option<i64>>;

    /// Replaces all funding summary rows of a period
    ///
    /// # Returns
    ///
    /// The number of rows stored.
    async fn replace_funding_summary(
        &self,
        academic_year: i32,
        period: u32,
        rows: &[FundingSummaryRecord],
    ) -> Result<u64>;

    /// Loads the funding summary rows of a period
    async fn funding_summary_rows(
        &self,
        academic_year: i32,
        period: u32,
    ) -> Result<Vec<FundingSummaryRecord>>;
}
