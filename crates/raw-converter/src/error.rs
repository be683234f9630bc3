//! Error types for raw file conversion.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while converting raw files or watching working directories.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Main and dependent configurations belong to different providers.
    #[error("All configs must be from the same meta data provider.")]
    ProviderMismatch,

    /// A dependent converter was built without any dependency.
    #[error("A dependent converter requires at least one dependent config.")]
    NoDependencies,

    /// The application config knows no working directory for a provider.
    #[error("no working directory configured for {hostname} ({suffix} files)")]
    UnknownWorkingDirectory {
        /// Hostname of the provider.
        hostname: String,
        /// Raw file suffix of the provider.
        suffix: String,
    },

    /// The file name does not contain an id.
    #[error("cannot derive an id from {path}")]
    InvalidFileName {
        /// The offending path.
        path: PathBuf,
    },

    /// File system error while probing or writing a working directory.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The injected converter failed for a raw file.
    #[error("failed to convert {path}: {source:#}")]
    Convert {
        /// The raw file that could not be converted.
        path: PathBuf,
        /// Error reported by the converter.
        #[source]
        source: anyhow::Error,
    },

    /// Converted records could not be persisted.
    #[error("failed to persist records of {id}: {source:#}")]
    Persist {
        /// Id of the converted entry.
        id: String,
        /// Error reported by the record sink.
        #[source]
        source: anyhow::Error,
    },

    /// The OS watch handle could not be created or registered.
    #[error("failed to watch working directory: {0}")]
    Watch(String),

    /// Raw files were still unconverted when the wait elapsed.
    #[error("raw files were not converted within {timeout:?}")]
    Timeout {
        /// The configured bound.
        timeout: Duration,
    },
}

impl ConversionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConversionError>;
