//! Test helpers shared by the converter and watch service tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use shared::{AnimeRecord, MetaDataProviderConfig};

use crate::converter::PathConverter;
use crate::sink::RecordSink;

/// Converter recording every path it was asked to convert
#[derive(Debug, Default)]
pub struct CountingConverter {
    calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
    failing: AtomicBool,
}

impl CountingConverter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Converter failing every call until [`CountingConverter::set_failing`] turns it off
    pub fn failing() -> Arc<Self> {
        let converter = Self::default();
        converter.failing.store(true, Ordering::SeqCst);
        Arc::new(converter)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn converted_paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl PathConverter for CountingConverter {
    async fn convert(&self, path: &Path) -> Result<Vec<AnimeRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_path_buf());

        if self.failing.load(Ordering::SeqCst) {
            bail!("unparsable document: {}", path.display());
        }

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(vec![AnimeRecord::new(path.display().to_string(), title)])
    }
}

/// Sink remembering the ids it persisted
#[derive(Debug, Default)]
pub struct RecordingSink {
    ids: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn persist(&self, _: &MetaDataProviderConfig, id: &str, _: &[AnimeRecord]) -> Result<()> {
        self.ids.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// Create an empty file
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

/// Names of all `.conv` markers in `dir`, sorted
pub fn markers(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".conv"))
        .collect();
    names.sort();
    names
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
