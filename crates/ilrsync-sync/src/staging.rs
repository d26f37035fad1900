//! Local staging directory
//!
//! The staging area holds files between transfer, extraction and ingestion.
//! Only one sync cycle runs at a time, so a single writer touches it.
//!
//! File names handed to [`StagingArea`] are bare names as listed remotely or
//! stored in an archive; anything that would resolve outside the staging
//! root is rejected.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use ilrsync_core::domain::StagedFile;

use crate::SyncError;

/// Suffix of in-flight transfers, never reported as staged
const PARTIAL_SUFFIX: &str = ".part";

/// Handle on the local staging directory
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the staging directory if it does not exist
    pub async fn ensure(&self) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Resolves a bare file name inside the staging directory
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidFileName`] for empty names, `.`/`..` and
    /// names containing a path separator.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, SyncError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(SyncError::InvalidFileName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Returns true if a file with this name is staged
    pub async fn contains(&self, name: &str) -> bool {
        match self.path_for(name) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Lists staged files sorted by name
    ///
    /// A missing staging directory is treated as empty. Subdirectories and
    /// partial transfers are ignored.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn list(&self) -> Result<Vec<StagedFile>, SyncError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("staging directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            files.push(StagedFile::new(name, entry.path(), metadata.len()));
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = files.len(), "listed staged files");
        Ok(files)
    }

    /// Reads a staged file
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, SyncError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SyncError::PathNotFound(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a staged file
    pub async fn remove(&self, name: &str) -> Result<(), SyncError> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path).await?;
        debug!(file = %name, "removed staged file");
        Ok(())
    }

    /// Removes a staged file, logging a warning instead of failing
    pub async fn discard(&self, name: &str) {
        if let Err(e) = self.remove(name).await {
            warn!(file = %name, error = %e, "Failed to delete local file");
        }
    }
}
