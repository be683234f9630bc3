//! Converter for providers whose raw files are self-contained.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shared::{AppConfig, MetaDataProviderConfig};

use super::{ConversionOutcome, ConversionTarget, FileConverter, Readiness, SweepStats};
use crate::converter::PathConverter;
use crate::error::Result;
use crate::sink::RecordSink;

/// Converts every raw file of a single working directory on its own
pub struct SimpleFileConverter {
    target: ConversionTarget,
}

impl SimpleFileConverter {
    /// Fails if `app_config` knows no working directory for `provider`.
    pub fn new(
        app_config: &dyn AppConfig,
        provider: MetaDataProviderConfig,
        converter: Arc<dyn PathConverter>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        Ok(Self {
            target: ConversionTarget::new(app_config, provider, converter, sink)?,
        })
    }

    pub fn provider(&self) -> &MetaDataProviderConfig {
        &self.target.provider
    }

    pub fn working_dir(&self) -> &Path {
        &self.target.working_dir
    }
}

#[async_trait]
impl FileConverter for SimpleFileConverter {
    fn watched_dirs(&self) -> Vec<PathBuf> {
        vec![self.target.working_dir.clone()]
    }

    fn raw_file(&self, id: &str) -> PathBuf {
        self.target.raw_file(id)
    }

    async fn convert_unconverted_files(&self) -> Result<SweepStats> {
        self.target.sweep(self).await
    }

    async fn convert_file_to_conv_file(&self, path: &Path) -> Result<ConversionOutcome> {
        match self.target.check(path).await? {
            Readiness::Pending(id) => self.target.convert_and_mark(&id, path).await,
            Readiness::Settled(outcome) => Ok(outcome),
        }
    }
}
