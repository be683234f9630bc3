//! Watch service for a provider crawled into several working directories.

use std::sync::Arc;

use shared::{AppConfig, MetaDataProviderConfig};

use super::{ConversionWatchService, WatchSettings};
use crate::convert::DependentFileConverter;
use crate::converter::PathConverter;
use crate::error::Result;
use crate::sink::RecordSink;

/// Watches the main and all dependent working directories. A lock removal in
/// any of them re-checks whether the file set of that id is complete.
pub type DependentConversionWatchService = ConversionWatchService<DependentFileConverter>;

impl ConversionWatchService<DependentFileConverter> {
    /// Fails immediately if the configurations belong to different providers.
    pub fn new(
        app_config: &dyn AppConfig,
        main: MetaDataProviderConfig,
        dependents: Vec<MetaDataProviderConfig>,
        converter: Arc<dyn PathConverter>,
        sink: Arc<dyn RecordSink>,
        settings: WatchSettings,
    ) -> Result<Self> {
        let converter = DependentFileConverter::new(app_config, main, dependents, converter, sink)?;
        Ok(Self::from_converter(converter, settings))
    }
}
