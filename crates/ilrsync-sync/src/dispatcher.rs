//! Ingestion dispatcher
//!
//! Hands each staged file produced by an extraction to the downstream
//! importer exactly once.
//!
//! ## Per-file flow
//!
//! 1. Classify the name. Wrong extensions are logged and skipped, as are
//!    CSV files that match no rule.
//! 2. Read the staged bytes and call [`IFileImporter::import_file`].
//! 3. On success, delete the local file when the delete-local policy is on.
//!
//! A failure at any step is recorded against that file only; the rest of
//! the batch is still processed.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use ilrsync_core::domain::{classify, ImportTypeMatch};
use ilrsync_core::ports::IFileImporter;

use crate::staging::StagingArea;

/// What happened to one dispatched file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FileOutcome {
    Ingested { rows: u64 },
    UnsupportedFormat,
    Unrecognized,
    Failed { error: String },
}

/// Per-file results of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub files: Vec<(String, FileOutcome)>,
}

impl DispatchReport {
    pub fn ingested(&self) -> u32 {
        self.count(|o| matches!(o, FileOutcome::Ingested { .. }))
    }

    /// Files skipped as unrecognized or of the wrong format
    pub fn skipped(&self) -> u32 {
        self.count(|o| matches!(o, FileOutcome::UnsupportedFormat | FileOutcome::Unrecognized))
    }

    pub fn failed(&self) -> u32 {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> u32 {
        self.files.iter().filter(|(_, o)| pred(o)).count() as u32
    }
}

/// Classifies staged files and feeds them to the importer
pub struct IngestionDispatcher {
    importer: Arc<dyn IFileImporter>,
    delete_local_files: bool,
}

impl IngestionDispatcher {
    /// # Arguments
    /// * `importer` - Downstream import operation
    /// * `delete_local_files` - Remove staged files after a successful import
    pub fn new(importer: Arc<dyn IFileImporter>, delete_local_files: bool) -> Self {
        Self {
            importer,
            delete_local_files,
        }
    }

    /// Dispatches `file_names`, all staged in `staging`
    ///
    /// Repeated names are dispatched once. Never fails; per-file errors are
    /// logged and reported in the returned [`DispatchReport`].
    #[tracing::instrument(skip(self, staging, file_names), fields(files = file_names.len()))]
    pub async fn dispatch(&self, staging: &StagingArea, file_names: &[String]) -> DispatchReport {
        let mut seen = HashSet::new();
        let mut report = DispatchReport::default();

        for name in file_names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let outcome = self.dispatch_one(staging, name).await;
            report.files.push((name.clone(), outcome));
        }

        info!(
            ingested = report.ingested(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Dispatch finished"
        );
        report
    }

    async fn dispatch_one(&self, staging: &StagingArea, name: &str) -> FileOutcome {
        let import_type = match classify(name) {
            Ok(ImportTypeMatch::Recognized(t)) => t,
            Ok(ImportTypeMatch::Unrecognized) => {
                debug!(file = %name, "No import type matches, skipping");
                return FileOutcome::Unrecognized;
            }
            Err(e) => {
                warn!(file = %name, error = %e, "Skipping file with unsupported format");
                return FileOutcome::UnsupportedFormat;
            }
        };

        let content = match staging.read(name).await {
            Ok(content) => content,
            Err(e) => {
                error!(file = %name, error = %e, "Cannot read staged file");
                return FileOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match self.importer.import_file(name, import_type, content).await {
            Ok(rows) => {
                info!(file = %name, import_type = %import_type.code, rows, "File ingested");
                if self.delete_local_files {
                    staging.discard(name).await;
                }
                FileOutcome::Ingested { rows }
            }
            Err(e) => {
                error!(file = %name, import_type = %import_type.code, error = %e, "File import failed");
                FileOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        }
    }
}
