//! Filesystem probes on provider working directories.
//!
//! Crawlers mutate the working directories while these functions run, so a
//! listing is never trusted on its own: callers re-check existence right
//! before acting on a file.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shared::paths::{conv_file, LOCK_FILE_SUFFIX};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{ConversionError, Result};

pub use shared::paths::id_of;

/// Regular files directly inside `dir` whose suffix is exactly `suffix`.
///
/// A missing directory yields an empty list. Entries vanishing during the
/// listing are skipped.
pub async fn list_raw_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Working directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ConversionError::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConversionError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension() != Some(OsStr::new(suffix)) {
            continue;
        }

        match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ConversionError::io(path, e)),
        }
    }

    files.sort();
    Ok(files)
}

/// Whether `path` currently exists.
pub async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| ConversionError::io(path, e))
}

/// Whether the raw file of `id` in `dir` has already been converted.
pub async fn has_marker(dir: &Path, id: &str) -> Result<bool> {
    exists(&conv_file(dir, id)).await
}

/// Create the empty conversion marker of `id` in `dir`.
///
/// Returns `false` if the marker already existed.
pub async fn create_marker(dir: &Path, id: &str) -> Result<bool> {
    let path = conv_file(dir, id);

    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "Marker was created concurrently");
            Ok(false)
        }
        Err(e) => Err(ConversionError::io(path, e)),
    }
}

/// Delete every lock file left in `dir` by an interrupted download.
///
/// Directories named `*.lock` are left alone. Returns the number of deleted
/// lock files.
pub async fn purge_stale_locks(dir: &Path) -> Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ConversionError::io(dir, e)),
    };

    let mut purged = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConversionError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension() != Some(OsStr::new(LOCK_FILE_SUFFIX)) {
            continue;
        }

        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(ConversionError::io(path, e)),
        };

        if file_type.is_dir() {
            debug!(path = %path.display(), "Skipping directory with lock suffix");
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "Deleted stale lock file");
                purged += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ConversionError::io(path, e)),
        }
    }

    Ok(purged)
}
