//! Default downstream importer
//!
//! [`CsvFileImporter`] records one [`DataImport`] per file and, for funding
//! summary reports, replaces the stored rows of the report's period.
//!
//! ## Lifecycle
//!
//! 1. Insert the import record in the `Processing` state. Periodic types get
//!    the academic year and period from a `... Report YYYY MM.csv` name.
//! 2. Process the content according to the import type.
//! 3. Mark the record `Complete` with the row count, or `Failed` with the
//!    error message, and save it.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use ilrsync_core::domain::{
    actual_year_month, month_column, DataImport, FundingSummaryRecord, ImportType,
    ImportTypeCode, MonthlyReportFile, Pence, SYSTEM_USER,
};
use ilrsync_core::ports::{IFileImporter, IImportRepository};

use crate::SyncError;

/// Last period that has its own month column in funding summary reports
const LAST_MONTH_COLUMN_PERIOD: u32 = 12;

/// Imports CSV files into the import repository
pub struct CsvFileImporter {
    imports: Arc<dyn IImportRepository>,
}

impl CsvFileImporter {
    pub fn new(imports: Arc<dyn IImportRepository>) -> Self {
        Self { imports }
    }

    async fn process(
        &self,
        import_type: &ImportType,
        report: Option<MonthlyReportFile>,
        content: &[u8],
    ) -> Result<u64> {
        match import_type.code {
            ImportTypeCode::FundingSummary => {
                let report = report.ok_or_else(|| {
                    SyncError::Import(
                        "Invalid file format: 'Funding Summary Report YYYY MM.csv'".to_string(),
                    )
                })?;
                let rows = parse_funding_summary(content, report.year, report.month)?;
                let stored = self
                    .imports
                    .replace_funding_summary(report.year, report.month, &rows)
                    .await?;
                Ok(stored)
            }
            ImportTypeCode::OccupancyReport => {
                if report.is_none() {
                    return Err(SyncError::Import(
                        "Invalid file format: 'Occupancy Report YYYY MM.csv'".to_string(),
                    )
                    .into());
                }
                Ok(count_rows(content)?)
            }
            _ => Ok(count_rows(content)?),
        }
    }
}

#[async_trait::async_trait]
impl IFileImporter for CsvFileImporter {
    #[tracing::instrument(skip(self, import_type, content), fields(import_type = %import_type.code, bytes = content.len()))]
    async fn import_file(
        &self,
        file_name: &str,
        import_type: &'static ImportType,
        content: Vec<u8>,
    ) -> Result<u64> {
        let report = MonthlyReportFile::parse(file_name).filter(MonthlyReportFile::is_valid);

        let mut import = DataImport::new(file_name, import_type.code, SYSTEM_USER);
        if let (Some(report), true) = (report, import_type.is_monthly_file) {
            import = import.with_period(report.year, report.month);
        }
        import.id = Some(self.imports.insert_import(&import).await?);

        match self.process(import_type, report, &content).await {
            Ok(rows) => {
                import.complete(rows);
                self.imports.update_import(&import).await?;
                info!(file = %file_name, rows, "Import complete");
                Ok(rows)
            }
            Err(e) => {
                import.fail(format!("{:#}", e));
                if let Err(save_err) = self.imports.update_import(&import).await {
                    warn!(file = %file_name, error = %save_err, "Failed to record import failure");
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// CSV parsing
// ============================================================================

fn strip_bom(content: &[u8]) -> &[u8] {
    content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content)
}

fn reader(content: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(strip_bom(content))
}

fn csv_error(e: csv::Error) -> SyncError {
    SyncError::Import(format!("Invalid CSV: {}", e))
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

/// Counts non-blank data rows
fn count_rows(content: &[u8]) -> Result<u64, SyncError> {
    let mut rows = 0;
    for record in reader(content).records() {
        if !is_blank(&record.map_err(csv_error)?) {
            rows += 1;
        }
    }
    Ok(rows)
}

/// Header positions keyed by trimmed, lower-cased name
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        Self { index }
    }

    fn require(&self, expected: &[String]) -> Result<(), SyncError> {
        let missing: Vec<&str> = expected
            .iter()
            .filter(|c| !self.index.contains_key(&c.to_lowercase()))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(SyncError::Import(format!(
            "column [{}] not found in the file. Acceptable column headings are [{}]",
            missing.join(", "),
            expected.join(", ")
        )))
    }

    fn cell<'r>(&self, record: &'r csv::StringRecord, column: &str) -> &'r str {
        self.index
            .get(&column.to_lowercase())
            .and_then(|i| record.get(*i))
            .map(str::trim)
            .unwrap_or("")
    }
}

/// Parses a funding summary report for `(academic_year, period)`
pub fn parse_funding_summary(
    content: &[u8],
    academic_year: i32,
    period: u32,
) -> Result<Vec<FundingSummaryRecord>, SyncError> {
    let (actual_year, actual_month) = actual_year_month(academic_year, period);
    let month = (period <= LAST_MONTH_COLUMN_PERIOD).then(|| month_column(actual_year, actual_month));

    let mut expected: Vec<String> = [
        "UKPRN",
        "Funding Line",
        "Source",
        "Category",
        "Year to date",
        "Previous collection year to date",
        "Total",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    if let Some(month) = &month {
        expected.push(month.clone());
    }

    let mut reader = reader(content);
    let columns = Columns::new(reader.headers().map_err(csv_error)?);
    columns.require(&expected)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        if is_blank(&record) {
            continue;
        }
        // Header is line 1
        let line = i + 2;
        let row_error = |message: String| SyncError::Import(format!("Row {}: {}", line, message));

        let ukprn_cell = columns.cell(&record, "UKPRN");
        let ukprn = ukprn_cell
            .parse::<i64>()
            .map_err(|_| row_error(format!("invalid UKPRN '{}'", ukprn_cell)))?;
        let amount = |column: &str| {
            Pence::parse_currency(columns.cell(&record, column)).map_err(|e| row_error(e.to_string()))
        };
        let month_total = match &month {
            Some(column) => amount(column)?,
            None => None,
        };

        rows.push(FundingSummaryRecord {
            academic_year,
            period,
            actual_year,
            actual_month,
            ukprn,
            funding_line: columns.cell(&record, "Funding Line").to_string(),
            source: columns.cell(&record, "Source").to_string(),
            category: columns.cell(&record, "Category").to_string(),
            month_total,
            total_payment: amount("Year to date")?,
        });
    }

    debug!(rows = rows.len(), academic_year, period, "parsed funding summary");
    Ok(rows)
}
