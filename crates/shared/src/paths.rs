//! File path utilities for organizing data files.
//!
//! This module provides a centralized way to manage the working directories of
//! all meta data providers and the names of the files inside them:
//!
//! ```text
//! <workingDir>/<id>.<rawSuffix>   raw document written by a crawler
//! <workingDir>/<id>.lock          exists while the crawler is downloading <id>
//! <workingDir>/<id>.conv          empty marker written after a successful conversion
//! ```

use std::path::{Path, PathBuf};

/// Suffix of lock files created by crawlers while a download is in progress
pub const LOCK_FILE_SUFFIX: &str = "lock";

/// Suffix of marker files created after a successful conversion
pub const CONVERTED_FILE_SUFFIX: &str = "conv";

/// File path manager for data files
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Create a new DataPaths with the given root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root data directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Working directories ==========

    /// Directory holding all provider working directories
    pub fn working_dirs_root(&self) -> PathBuf {
        self.root.join("workingdir")
    }

    /// Working directory of a single provider
    pub fn working_dir(&self, provider_name: &str) -> PathBuf {
        self.working_dirs_root().join(provider_name)
    }

    // ========== Logs ==========

    /// Get logs directory
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ========== Utility Methods ==========

    /// Create the working directories of the given providers
    pub fn create_dirs<'a>(
        &self,
        provider_names: impl IntoIterator<Item = &'a str>,
    ) -> std::io::Result<()> {
        std::fs::create_dir_all(self.working_dirs_root())?;
        std::fs::create_dir_all(self.logs_dir())?;

        for name in provider_names {
            std::fs::create_dir_all(self.working_dir(name))?;
        }

        Ok(())
    }
}

/// Path of the raw file of `id` inside `dir`
pub fn raw_file(dir: &Path, id: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}.{}", id, suffix))
}

/// Path of the conversion marker of `id` inside `dir`
pub fn conv_file(dir: &Path, id: &str) -> PathBuf {
    raw_file(dir, id, CONVERTED_FILE_SUFFIX)
}

/// Identifier of a file: its file name without the suffix
///
/// Only the last suffix is removed, so slugs containing dots stay intact.
pub fn id_of(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
