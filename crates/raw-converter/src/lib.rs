//! Raw file conversion for crawled anime meta data.
//!
//! Crawlers download one raw file per anime id into a provider's working
//! directory, guarded by a `<id>.lock` file while the download is running.
//! This library converts every finished raw file exactly once into canonical
//! records and marks it with a `<id>.conv` file, either as a one-off backlog
//! sweep or continuously through a watch service.

pub mod convert;
pub mod converter;
pub mod error;
pub mod probe;
pub mod sink;
pub mod status;
pub mod watch;

#[cfg(test)]
mod test_utils;

pub use convert::{
    ConversionOutcome, DependentFileConverter, FileConverter, SimpleFileConverter, SweepStats,
};
pub use converter::{CanonicalJsonConverter, PathConverter};
pub use error::{ConversionError, Result};
pub use sink::{DiscardSink, JsonFileSink, RecordSink};
pub use status::RawFileConversionService;
pub use watch::{
    DependentConversionWatchService, ServiceState, SimpleConversionWatchService, WatchSettings,
};
