//! Watch service for a single, self-contained provider.

use std::sync::Arc;

use shared::{AppConfig, MetaDataProviderConfig};

use super::{ConversionWatchService, WatchSettings};
use crate::convert::SimpleFileConverter;
use crate::converter::PathConverter;
use crate::error::Result;
use crate::sink::RecordSink;

/// Watches one working directory and converts every finished download
pub type SimpleConversionWatchService = ConversionWatchService<SimpleFileConverter>;

impl ConversionWatchService<SimpleFileConverter> {
    pub fn new(
        app_config: &dyn AppConfig,
        provider: MetaDataProviderConfig,
        converter: Arc<dyn PathConverter>,
        sink: Arc<dyn RecordSink>,
        settings: WatchSettings,
    ) -> Result<Self> {
        let converter = SimpleFileConverter::new(app_config, provider, converter, sink)?;
        Ok(Self::from_converter(converter, settings))
    }
}
