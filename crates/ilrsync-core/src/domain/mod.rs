//! Domain entities and business logic
//!
//! This module contains the core domain types of the ingestion pipeline:
//! - The import type catalogue and the file classifier
//! - Remote endpoint descriptors, sync locks and sync cycle records
//! - Staged files, data import records and funding summary rows
//! - Feature flags and secret tags
//! - Domain-specific error types

pub mod classifier;
pub mod cycle;
pub mod data_import;
pub mod endpoint;
pub mod errors;
pub mod feature;
pub mod funding;
pub mod import_type;
pub mod lock;
pub mod secret;
pub mod staged;

// Re-export commonly used types
pub use classifier::{classify, has_required_extension, ImportTypeMatch};
pub use cycle::{CycleStats, SyncCycle, SyncPhase};
pub use data_import::{DataImport, ImportStatus, MonthlyReportFile, SYSTEM_USER};
pub use endpoint::RemoteEndpoint;
pub use errors::{ClassificationError, DomainError, PipelineError};
pub use feature::{Feature, FeatureState};
pub use funding::{
    actual_year_month, month_column, FundingRecord, FundingSummaryRecord, GrantType, Pence,
};
pub use import_type::{get_by_code, get_by_description, ImportType, ImportTypeCode};
pub use lock::{SyncLock, SYNC_LOCK_NAME};
pub use secret::SecretType;
pub use staged::StagedFile;
