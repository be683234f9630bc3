//! Conversion status across every configured provider.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use shared::AppConfig;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::convert::working_dir_of;
use crate::error::{ConversionError, Result};
use crate::probe;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Answers whether the conversion of all downloaded raw files is done
pub struct RawFileConversionService {
    app_config: Arc<dyn AppConfig>,
    poll_interval: Duration,
}

impl RawFileConversionService {
    pub fn new(app_config: Arc<dyn AppConfig>) -> Self {
        Self {
            app_config,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// `(hostname, path)` of every raw file still lacking a marker
    pub async fn unconverted_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut unconverted = Vec::new();

        for provider in self.app_config.meta_data_provider_configurations() {
            let dir = working_dir_of(self.app_config.as_ref(), &provider)?;

            for path in probe::list_raw_files(&dir, provider.file_suffix()).await? {
                let Some(id) = probe::id_of(&path) else {
                    continue;
                };
                if !probe::has_marker(&dir, &id).await? {
                    unconverted.push((provider.hostname().to_string(), path));
                }
            }
        }

        Ok(unconverted)
    }

    pub async fn unconverted_files_exist(&self) -> Result<bool> {
        Ok(!self.unconverted_files().await?.is_empty())
    }

    /// Poll until every raw file is converted.
    ///
    /// Fails with [`ConversionError::Timeout`] once `timeout` elapsed while
    /// unconverted files remain.
    pub async fn wait_for_all_raw_files_to_be_converted(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            let pending = self.unconverted_files().await?;
            if pending.is_empty() {
                info!("All raw files converted");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                for (hostname, path) in &pending {
                    warn!(hostname = %hostname, path = %path.display(), "Raw file not converted");
                }
                return Err(ConversionError::Timeout { timeout });
            }

            debug!(pending = pending.len(), "Waiting for raw files to be converted");
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
