//! Zip archive extraction
//!
//! Archives are unpacked flat into the staging directory: each file entry
//! is written under its own file name, directory entries are skipped, and a
//! later entry with the same name overwrites an earlier one.
//!
//! ## Passwords
//!
//! Entries are checked individually. Unencrypted entries never need a
//! password. Encrypted entries (ZipCrypto or AES) are decrypted with the
//! supplied password; a missing or wrong password fails the whole archive.
//!
//! ## Errors
//!
//! Every failure is reported as [`SyncError::Extraction`] naming the
//! archive. Callers log it and move on to the next archive.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::SyncError;

/// Extracts `archive` into `destination`
///
/// Runs on the blocking pool.
///
/// # Arguments
/// * `archive` - Path of the `.zip` file
/// * `password` - Decryption password for encrypted entries, if configured
/// * `destination` - Directory receiving the extracted files
///
/// # Returns
/// The names of the files written, in archive order without duplicates.
pub async fn extract(
    archive: &Path,
    password: Option<&str>,
    destination: &Path,
) -> Result<Vec<String>, SyncError> {
    let archive = archive.to_path_buf();
    let password = password.map(str::to_string);
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&archive, password.as_deref(), &destination))
        .await
        .map_err(|e| SyncError::Task(e.to_string()))?
}

/// Synchronous form of [`extract`]
#[tracing::instrument(skip(password), fields(archive = %archive.display()))]
pub fn extract_blocking(
    archive: &Path,
    password: Option<&str>,
    destination: &Path,
) -> Result<Vec<String>, SyncError> {
    let archive_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string());
    let fail = |message: String| SyncError::Extraction {
        archive: archive_name.clone(),
        message,
    };

    let file = File::open(archive).map_err(|e| fail(e.to_string()))?;
    let mut zip = ZipArchive::new(file).map_err(|e| fail(describe(&e)))?;
    std::fs::create_dir_all(destination).map_err(|e| fail(e.to_string()))?;

    let mut extracted: Vec<String> = Vec::new();
    for index in 0..zip.len() {
        let encrypted = zip
            .by_index_raw(index)
            .map_err(|e| fail(describe(&e)))?
            .encrypted();

        let mut entry = if encrypted {
            let password = password.ok_or_else(|| {
                fail("archive is password protected and no decryption password is set".into())
            })?;
            zip.by_index_decrypt(index, password.as_bytes())
                .map_err(|e| fail(describe(&e)))?
        } else {
            zip.by_index(index).map_err(|e| fail(describe(&e)))?
        };

        if entry.is_dir() {
            continue;
        }

        let Some(name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        else {
            warn!(entry = %entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };

        let target = destination.join(&name);
        write_entry(&mut entry, &target).map_err(|e| fail(format!("{}: {}", name, e)))?;
        debug!(file = %name, bytes = entry.size(), "extracted entry");

        if !extracted.contains(&name) {
            extracted.push(name);
        }
    }

    info!(files = extracted.len(), "Archive extracted");
    Ok(extracted)
}

fn write_entry(entry: &mut impl io::Read, target: &Path) -> io::Result<()> {
    let partial = {
        let mut p = target.as_os_str().to_owned();
        p.push(".part");
        PathBuf::from(p)
    };

    let written = (|| {
        let mut out = File::create(&partial)?;
        io::copy(entry, &mut out)?;
        out.sync_all()
    })();

    match written {
        Ok(()) => std::fs::rename(&partial, target),
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn describe(e: &ZipError) -> String {
    match e {
        ZipError::InvalidPassword => "wrong archive password".to_string(),
        other => other.to_string(),
    }
}
