//! Shared library for the anime meta data conversion pipeline.
//!
//! This crate provides common functionality used by the conversion services:
//! - Configuration management
//! - Meta data provider configurations and their working directories
//! - The canonical anime record
//! - File path utilities
//! - Logging infrastructure

pub mod app_config;
pub mod config;
pub mod logging;
pub mod models;
pub mod paths;
pub mod provider;

// Re-export commonly used types
pub use app_config::{AppConfig, DirectoryLookup};
pub use config::Config;
pub use logging::LogConfig;
pub use models::*;
pub use paths::DataPaths;
pub use provider::{MetaDataProviderConfig, ProviderId};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
