//! Conversion of raw files into `.conv` marked, persisted records.
//!
//! A raw file `<id>.<suffix>` counts as converted once `<id>.conv` exists next
//! to it. The marker is only written after the converter and the record sink
//! both succeeded, and it is never removed, so a conversion happens at most
//! once per id and provider, across restarts.

mod dependent;
mod simple;

pub use dependent::DependentFileConverter;
pub use simple::SimpleFileConverter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shared::{AppConfig, MetaDataProviderConfig};
use tracing::{debug, info, warn};

use crate::converter::PathConverter;
use crate::error::{ConversionError, Result};
use crate::probe;
use crate::sink::RecordSink;

/// Result of a single conversion attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Records were persisted and the marker written
    Converted { records: usize },
    /// The marker already existed
    AlreadyConverted,
    /// The raw file or one of its dependencies is not there yet
    NotReady,
}

/// Summary of a backlog sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub converted: usize,
    pub already_converted: usize,
    pub not_ready: usize,
    pub failed: usize,
}

impl SweepStats {
    fn record(&mut self, outcome: &Result<ConversionOutcome>) {
        match outcome {
            Ok(ConversionOutcome::Converted { .. }) => self.converted += 1,
            Ok(ConversionOutcome::AlreadyConverted) => self.already_converted += 1,
            Ok(ConversionOutcome::NotReady) => self.not_ready += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// File converter as driven by the conversion watch service
#[async_trait]
pub trait FileConverter: Send + Sync {
    /// Directories whose lock removals may make a raw file convertible, main directory first
    fn watched_dirs(&self) -> Vec<PathBuf>;

    /// Raw file of `id` in the main working directory
    fn raw_file(&self, id: &str) -> PathBuf;

    /// Convert every raw file of the main working directory lacking a marker
    async fn convert_unconverted_files(&self) -> Result<SweepStats>;

    /// Convert a single raw file unless it is converted already or not ready
    async fn convert_file_to_conv_file(&self, path: &Path) -> Result<ConversionOutcome>;
}

/// State of a raw file right before conversion
pub(crate) enum Readiness {
    /// Unconverted raw file with this id
    Pending(String),
    /// Nothing to do for now
    Settled(ConversionOutcome),
}

/// Provider, working directory and collaborators of a converting provider
pub(crate) struct ConversionTarget {
    pub(crate) provider: MetaDataProviderConfig,
    pub(crate) working_dir: PathBuf,
    converter: Arc<dyn PathConverter>,
    sink: Arc<dyn RecordSink>,
}

impl ConversionTarget {
    pub(crate) fn new(
        app_config: &dyn AppConfig,
        provider: MetaDataProviderConfig,
        converter: Arc<dyn PathConverter>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        let working_dir = working_dir_of(app_config, &provider)?;
        Ok(Self {
            provider,
            working_dir,
            converter,
            sink,
        })
    }

    pub(crate) fn raw_file(&self, id: &str) -> PathBuf {
        shared::paths::raw_file(&self.working_dir, id, self.provider.file_suffix())
    }

    /// Id of `path`, unless the file is converted already or missing
    pub(crate) async fn check(&self, path: &Path) -> Result<Readiness> {
        let id = probe::id_of(path).ok_or_else(|| ConversionError::InvalidFileName {
            path: path.to_path_buf(),
        })?;

        if probe::has_marker(&self.working_dir, &id).await? {
            debug!(id = %id, hostname = self.provider.hostname(), "Already converted");
            return Ok(Readiness::Settled(ConversionOutcome::AlreadyConverted));
        }

        if !probe::exists(path).await? {
            debug!(path = %path.display(), "Raw file does not exist");
            return Ok(Readiness::Settled(ConversionOutcome::NotReady));
        }

        Ok(Readiness::Pending(id))
    }

    /// Run the converter, persist its records, then write the marker
    pub(crate) async fn convert_and_mark(&self, id: &str, path: &Path) -> Result<ConversionOutcome> {
        let records = self
            .converter
            .convert(path)
            .await
            .map_err(|source| ConversionError::Convert {
                path: path.to_path_buf(),
                source,
            })?;

        self.sink
            .persist(&self.provider, id, &records)
            .await
            .map_err(|source| ConversionError::Persist {
                id: id.to_string(),
                source,
            })?;

        if !probe::create_marker(&self.working_dir, id).await? {
            debug!(id = %id, hostname = self.provider.hostname(), "Converted concurrently by another trigger");
            return Ok(ConversionOutcome::AlreadyConverted);
        }

        info!(
            id = %id,
            hostname = self.provider.hostname(),
            records = records.len(),
            "Converted raw file"
        );

        Ok(ConversionOutcome::Converted {
            records: records.len(),
        })
    }

    /// Backlog sweep over the working directory with a per-file conversion
    pub(crate) async fn sweep<C: FileConverter + ?Sized>(&self, converter: &C) -> Result<SweepStats> {
        let files = probe::list_raw_files(&self.working_dir, self.provider.file_suffix()).await?;
        let mut stats = SweepStats::default();

        for path in files {
            let Some(id) = probe::id_of(&path) else {
                continue;
            };
            if probe::has_marker(&self.working_dir, &id).await? {
                stats.already_converted += 1;
                continue;
            }

            let outcome = converter.convert_file_to_conv_file(&path).await;
            if let Err(e) = &outcome {
                warn!(path = %path.display(), error = %e, "Conversion failed, will retry later");
            }
            stats.record(&outcome);
        }

        info!(
            hostname = self.provider.hostname(),
            dir = %self.working_dir.display(),
            converted = stats.converted,
            already_converted = stats.already_converted,
            not_ready = stats.not_ready,
            failed = stats.failed,
            "Backlog sweep finished"
        );

        Ok(stats)
    }
}

pub(crate) fn working_dir_of(
    app_config: &dyn AppConfig,
    provider: &MetaDataProviderConfig,
) -> Result<PathBuf> {
    app_config
        .working_dir(provider)
        .ok_or_else(|| ConversionError::UnknownWorkingDirectory {
            hostname: provider.hostname().to_string(),
            suffix: provider.file_suffix().to_string(),
        })
}
