//! Persistence of converted records.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{AnimeRecord, MetaDataProviderConfig};
use tracing::debug;

/// Stores the records converted from one raw file.
///
/// Must be idempotent: a record set may be persisted again if two triggers
/// race on the same id.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn persist(
        &self,
        provider: &MetaDataProviderConfig,
        id: &str,
        records: &[AnimeRecord],
    ) -> Result<()>;
}

/// Converted records of a single raw file as written by [`JsonFileSink`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedDocument {
    pub id: String,
    pub source: String,
    pub converted_at: DateTime<Utc>,
    pub data: Vec<AnimeRecord>,
}

/// Writes `<root>/<hostname>/<id>.json`
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    root: PathBuf,
}

impl JsonFileSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Location of the converted document of an entry
    pub fn document_path(&self, provider: &MetaDataProviderConfig, id: &str) -> PathBuf {
        self.root
            .join(provider.hostname())
            .join(format!("{}.json", id))
    }
}

#[async_trait]
impl RecordSink for JsonFileSink {
    async fn persist(
        &self,
        provider: &MetaDataProviderConfig,
        id: &str,
        records: &[AnimeRecord],
    ) -> Result<()> {
        let path = self.document_path(provider, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let document = ConvertedDocument {
            id: id.to_string(),
            source: provider.build_anime_link(id),
            converted_at: Utc::now(),
            data: records.to_vec(),
        };
        let content = serde_json::to_string_pretty(&document)
            .context("Failed to serialize converted records")?;

        // Readers never see a partially written document
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;

        debug!(path = %path.display(), records = records.len(), "Persisted converted records");
        Ok(())
    }
}

/// Drops all records
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

#[async_trait]
impl RecordSink for DiscardSink {
    async fn persist(&self, _: &MetaDataProviderConfig, _: &str, _: &[AnimeRecord]) -> Result<()> {
        Ok(())
    }
}
