//! ilrsync Sync - Remote pull and ingestion pipeline
//!
//! Provides:
//! - The sync cycle state machine guarded by a distributed lock
//! - Archive extraction into the staging directory
//! - Classification and dispatch of staged files to the importer
//! - A CSV importer that records data imports and funding summary rows
//!
//! ## Modules
//!
//! - [`synchronizer`] - One sync cycle: feature check, lock, transfer, ingest
//! - [`extractor`] - Zip extraction with optional password
//! - [`dispatcher`] - Per-file classification and import with failure isolation
//! - [`importer`] - Default [`IFileImporter`](ilrsync_core::ports::IFileImporter)
//! - [`staging`] - Local staging directory helpers
//! - [`scheduler`] - Periodic and on-demand sync triggers

pub mod dispatcher;
pub mod extractor;
pub mod importer;
pub mod scheduler;
pub mod staging;
pub mod synchronizer;

#[cfg(test)]
pub(crate) mod testutil;

pub use dispatcher::{DispatchReport, FileOutcome, IngestionDispatcher};
pub use importer::CsvFileImporter;
pub use scheduler::{SyncScheduler, SyncTrigger, TriggerReason};
pub use staging::StagingArea;
pub use synchronizer::{list_remote_files, Synchronizer, SynchronizerSettings};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while staging, extracting or importing files
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An archive is corrupt, password protected without a password, or the
    /// password is wrong
    #[error("Cannot extract {archive}: {message}")]
    Extraction { archive: String, message: String },

    /// A file's content was rejected by the importer
    #[error("{0}")]
    Import(String),

    /// A file name would escape the staging directory
    #[error("Invalid staged file name: {0}")]
    InvalidFileName(String),

    /// The specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// A blocking task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),
}
