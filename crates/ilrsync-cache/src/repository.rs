//! SQLite implementation of IImportRepository
//!
//! ## Type Mapping
//!
//! | Domain Type     | SQL Type | Strategy                                   |
//! |-----------------|----------|--------------------------------------------|
//! | ImportTypeCode  | TEXT     | Code via `.as_str()` / `FromStr`           |
//! | ImportStatus    | TEXT     | Status via `.as_str()` / `FromStr`         |
//! | DateTime<Utc>   | TEXT     | ISO 8601 via `to_rfc3339()` / `parse_datetime` |
//! | Pence           | INTEGER  | Integer pence                              |

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use ilrsync_core::domain::{DataImport, FundingSummaryRecord, ImportStatus, ImportTypeCode, Pence};
use ilrsync_core::ports::IImportRepository;

use crate::CacheError;

/// SQLite-based implementation of the import repository port
pub struct SqliteImportRepository {
    pool: SqlitePool,
}

impl SqliteImportRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from an RFC 3339 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Try parsing without timezone (SQLite default format)
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::InvalidValue(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, CacheError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn row_to_import(row: &SqliteRow) -> Result<DataImport, CacheError> {
    let import_type: String = row.get("import_type");
    let status: String = row.get("status");
    let created_on: String = row.get("created_on");
    let period: Option<i64> = row.get("period");
    let rows_processed: i64 = row.get("rows_processed");

    Ok(DataImport {
        id: Some(row.get("id")),
        file_name: row.get("file_name"),
        import_type: import_type
            .parse::<ImportTypeCode>()
            .map_err(|e| CacheError::InvalidValue(e.to_string()))?,
        status: status
            .parse::<ImportStatus>()
            .map_err(|e| CacheError::InvalidValue(e.to_string()))?,
        created_on: parse_datetime(&created_on)?,
        created_by: row.get("created_by"),
        academic_year: row.get::<Option<i64>, _>("academic_year").map(|y| y as i32),
        period: period.map(|p| p as u32),
        rows_processed: rows_processed.max(0) as u64,
        last_export_date: parse_optional_datetime(row.get("last_export_date"))?,
        error_message: row.get("error_message"),
    })
}

fn row_to_funding(row: &SqliteRow) -> FundingSummaryRecord {
    FundingSummaryRecord {
        academic_year: row.get::<i64, _>("academic_year") as i32,
        period: row.get::<i64, _>("period") as u32,
        actual_year: row.get::<i64, _>("actual_year") as i32,
        actual_month: row.get::<i64, _>("actual_month") as u32,
        ukprn: row.get("ukprn"),
        funding_line: row.get("funding_line"),
        source: row.get("source"),
        category: row.get("category"),
        month_total: row.get::<Option<i64>, _>("month_total").map(Pence),
        total_payment: row.get::<Option<i64>, _>("total_payment").map(Pence),
    }
}

// ============================================================================
// IImportRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl IImportRepository for SqliteImportRepository {
    async fn insert_import(&self, import: &DataImport) -> anyhow::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO data_import \
             (file_name, import_type, status, created_on, created_by, \
              academic_year, period, rows_processed, last_export_date, error_message) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&import.file_name)
        .bind(import.import_type.as_str())
        .bind(import.status.as_str())
        .bind(import.created_on.to_rfc3339())
        .bind(&import.created_by)
        .bind(import.academic_year.map(i64::from))
        .bind(import.period.map(i64::from))
        .bind(import.rows_processed as i64)
        .bind(import.last_export_date.map(|d| d.to_rfc3339()))
        .bind(&import.error_message)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::trace!(import_id = id, file = %import.file_name, "Inserted data import");
        Ok(id)
    }

    async fn update_import(&self, import: &DataImport) -> anyhow::Result<()> {
        let id = import
            .id
            .ok_or_else(|| anyhow::anyhow!("Cannot update an import that was never saved"))?;

        let result = sqlx::query(
            "UPDATE data_import SET \
             file_name = ?, import_type = ?, status = ?, created_by = ?, \
             academic_year = ?, period = ?, rows_processed = ?, \
             last_export_date = ?, error_message = ? \
             WHERE id = ?",
        )
        .bind(&import.file_name)
        .bind(import.import_type.as_str())
        .bind(import.status.as_str())
        .bind(&import.created_by)
        .bind(import.academic_year.map(i64::from))
        .bind(import.period.map(i64::from))
        .bind(import.rows_processed as i64)
        .bind(import.last_export_date.map(|d| d.to_rfc3339()))
        .bind(&import.error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Import {} not found", id);
        }
        tracing::trace!(import_id = id, status = %import.status, "Updated data import");
        Ok(())
    }

    async fn get_import(&self, id: i64) -> anyhow::Result<Option<DataImport>> {
        let row = sqlx::query("SELECT * FROM data_import WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_import(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_imports(&self, limit: u32) -> anyhow::Result<Vec<DataImport>> {
        let rows = sqlx::query("SELECT * FROM data_import ORDER BY id DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let imports = rows
            .iter()
            .map(row_to_import)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(imports)
    }

    async fn latest_completed_import(
        &self,
        import_type: ImportTypeCode,
        academic_year: i32,
        period: u32,
    ) -> anyhow::Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM data_import \
             WHERE import_type = ? AND academic_year = ? AND period = ? AND status = ? \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(import_type.as_str())
        .bind(i64::from(academic_year))
        .bind(i64::from(period))
        .bind(ImportStatus::Complete.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn replace_funding_summary(
        &self,
        academic_year: i32,
        period: u32,
        rows: &[FundingSummaryRecord],
    ) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM funding_summary WHERE academic_year = ? AND period = ?")
            .bind(academic_year)
            .bind(i64::from(period))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for row in rows {
            sqlx::query(
                "INSERT INTO funding_summary \
                 (academic_year, period, actual_year, actual_month, ukprn, \
                  funding_line, source, category, month_total, total_payment) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(academic_year)
            .bind(i64::from(period))
            .bind(row.actual_year)
            .bind(i64::from(row.actual_month))
            .bind(row.ukprn)
            .bind(&row.funding_line)
            .bind(&row.source)
            .bind(&row.category)
            .bind(row.month_total.map(|p| p.0))
            .bind(row.total_payment.map(|p| p.0))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            academic_year,
            period,
            deleted,
            inserted = rows.len(),
            "Replaced funding summary rows"
        );
        Ok(rows.len() as u64)
    }

    async fn funding_summary_rows(
        &self,
        academic_year: i32,
        period: u32,
    ) -> anyhow::Result<Vec<FundingSummaryRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM funding_summary WHERE academic_year = ? AND period = ? ORDER BY id",
        )
        .bind(academic_year)
        .bind(i64::from(period))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_funding).collect())
    }
}
