//! Domain error types
//!
//! This module defines the error taxonomy of the ingestion pipeline:
//! - [`DomainError`] for invalid domain values
//! - [`ClassificationError`] for file names the classifier rejects
//! - [`PipelineError`] for the failure kinds a sync cycle or partner push
//!   reports to its caller

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown import type code
    #[error("Unknown import type: {0}")]
    UnknownImportType(String),

    /// Unknown import status
    #[error("Unknown import status: {0}")]
    UnknownImportStatus(String),

    /// Unknown feature flag name
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// Unknown secret type tag
    #[error("Unknown secret type: {0}")]
    UnknownSecretType(String),

    /// A currency cell could not be parsed
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors raised by the file classifier
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// The file does not carry the required `.csv` extension
    ///
    /// This indicates an operator mistake such as uploading a spreadsheet
    /// instead of its CSV export.
    #[error("File must be in CSV format, to do this save an excel file as a .CSV")]
    UnsupportedFormat(String),
}

impl ClassificationError {
    /// Returns the rejected file name
    pub fn file_name(&self) -> &str {
        match self {
            ClassificationError::UnsupportedFormat(name) => name,
        }
    }
}

/// Failure kinds surfaced by the ingestion pipeline
///
/// Adapters wrap their own errors into one of these variants so that the
/// synchronizer and operator tools can react by kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The remote host could not be reached or rejected authentication
    #[error("Connection error: {0}")]
    Connection(String),

    /// A remote directory does not exist or cannot be read
    #[error("Listing error: {0}")]
    Listing(String),

    /// An archive is corrupt or its password is wrong
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A file does not carry the required extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Another holder owns the sync lock (a normal skip outcome)
    #[error("Lock '{0}' is held by another holder")]
    LockContention(String),

    /// The partner API rejected a request; carries its description verbatim
    #[error("{0}")]
    PartnerApi(String),
}

impl From<ClassificationError> for PipelineError {
    fn from(e: ClassificationError) -> Self {
        PipelineError::UnsupportedFormat(e.file_name().to_string())
    }
}

impl PipelineError {
    /// Finds a `PipelineError` anywhere in an `anyhow` error chain
    pub fn find_in(err: &anyhow::Error) -> Option<&PipelineError> {
        err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>())
    }
}
