//! Data import records
//!
//! Every file handed to the downstream importer is tracked by a
//! [`DataImport`] record. Records of periodic types carry the academic year
//! and return period parsed from the file name (see [`MonthlyReportFile`]),
//! which is also the key the partner push reads funding rows by.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::import_type::ImportTypeCode;

/// Creator recorded for imports started by the pipeline
pub const SYSTEM_USER: &str = "System";

// ============================================================================
// ImportStatus
// ============================================================================

/// Processing status of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Processing,
    Complete,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Processing => "PROCESSING",
            ImportStatus::Complete => "COMPLETE",
            ImportStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(ImportStatus::Processing),
            "COMPLETE" => Ok(ImportStatus::Complete),
            "FAILED" => Ok(ImportStatus::Failed),
            other => Err(DomainError::UnknownImportStatus(other.to_string())),
        }
    }
}

// ============================================================================
// DataImport
// ============================================================================

/// One ingested file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataImport {
    /// Store-assigned identifier; `None` until first saved
    pub id: Option<i64>,
    pub file_name: String,
    pub import_type: ImportTypeCode,
    pub status: ImportStatus,
    pub created_on: DateTime<Utc>,
    pub created_by: String,
    pub academic_year: Option<i32>,
    pub period: Option<u32>,
    pub rows_processed: u64,
    /// Last successful push to the partner API
    pub last_export_date: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl DataImport {
    /// Creates a new record in the `Processing` state
    pub fn new(
        file_name: impl Into<String>,
        import_type: ImportTypeCode,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            file_name: file_name.into(),
            import_type,
            status: ImportStatus::Processing,
            created_on: Utc::now(),
            created_by: created_by.into(),
            academic_year: None,
            period: None,
            rows_processed: 0,
            last_export_date: None,
            error_message: None,
        }
    }

    /// Sets the academic year and period key
    pub fn with_period(mut self, academic_year: i32, period: u32) -> Self {
        self.academic_year = Some(academic_year);
        self.period = Some(period);
        self
    }

    /// Marks the import complete with the number of rows processed
    pub fn complete(&mut self, rows_processed: u64) {
        self.status = ImportStatus::Complete;
        self.rows_processed = rows_processed;
        self.error_message = None;
    }

    /// Marks the import failed
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ImportStatus::Failed;
        self.error_message = Some(message.into());
    }

    /// Stamps a successful partner push, replacing any earlier stamp
    pub fn mark_exported(&mut self, at: DateTime<Utc>) {
        self.last_export_date = Some(at);
    }

    /// Returns the (academic year, period) key, if both are known
    pub fn period_key(&self) -> Option<(i32, u32)> {
        Some((self.academic_year?, self.period?))
    }
}

// ============================================================================
// MonthlyReportFile
// ============================================================================

/// Year and return period parsed from a monthly report file name
///
/// Names look like `Funding Summary Report 2019 03.csv`: a ` Report` marker,
/// then anything, then `YYYY MM` right before the `.csv` extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyReportFile {
    pub year: i32,
    pub month: u32,
}

/// Length of the `YYYY MM.csv` tail
const PERIOD_TAIL_LEN: usize = 11;

impl MonthlyReportFile {
    /// Parses a file name; returns `None` when it does not have the shape
    pub fn parse(file_name: &str) -> Option<Self> {
        let split = file_name.len().checked_sub(PERIOD_TAIL_LEN)?;
        let head = file_name.get(..split)?;
        let tail = file_name.get(split..)?;

        if !head.to_ascii_lowercase().contains(" report") {
            return None;
        }

        let bytes = tail.as_bytes();
        let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
        if !digits(0..4) || bytes[4] != b' ' || !digits(5..7) {
            return None;
        }
        if !tail[7..].eq_ignore_ascii_case(".csv") {
            return None;
        }

        let year = tail[0..4].parse().ok()?;
        let month = tail[5..7].parse().ok()?;
        Some(Self { year, month })
    }

    /// Returns true when the month is a valid return period (1 to 14)
    pub fn is_valid(&self) -> bool {
        (1..=14).contains(&self.month)
    }
}
