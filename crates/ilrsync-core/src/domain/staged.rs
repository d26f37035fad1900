//! Files materialized in the local staging area

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extension of archives the extractor unpacks
pub const ARCHIVE_EXTENSION: &str = "zip";

/// A file present in the staging directory
///
/// Created by a transfer or an extraction, consumed by classification and
/// ingestion, and optionally deleted once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StagedFile {
    /// Bare file name, as listed remotely or stored in the archive
    pub name: String,
    /// Absolute path inside the staging directory
    pub path: PathBuf,
    /// Size in bytes when staged
    pub size: u64,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
        }
    }

    /// Returns true if the file is a `.zip` archive (case-insensitive)
    pub fn is_archive(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
    }
}
