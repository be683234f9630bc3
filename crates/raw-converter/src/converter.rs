//! Converters turning a raw provider document into canonical records.
//!
//! Every provider has its own parsing rules. They all plug into the file
//! converters through [`PathConverter`].

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use shared::paths::id_of;
use shared::{AnimeRecord, MetaDataProviderConfig};

/// Converts a raw file into zero or more canonical records.
///
/// Implementations read companion files themselves when they need them.
#[async_trait]
pub trait PathConverter: Send + Sync {
    async fn convert(&self, path: &Path) -> Result<Vec<AnimeRecord>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<AnimeRecord>),
    One(Box<AnimeRecord>),
}

/// Reads raw files that are already in canonical JSON shape.
///
/// Records without a source get the provider link of the file's id.
#[derive(Debug, Clone)]
pub struct CanonicalJsonConverter {
    provider: MetaDataProviderConfig,
}

impl CanonicalJsonConverter {
    pub fn new(provider: MetaDataProviderConfig) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PathConverter for CanonicalJsonConverter {
    async fn convert(&self, path: &Path) -> Result<Vec<AnimeRecord>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read raw file: {}", path.display()))?;

        let parsed: OneOrMany = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse raw file: {}", path.display()))?;

        let mut records = match parsed {
            OneOrMany::Many(records) => records,
            OneOrMany::One(record) => vec![*record],
        };

        if let Some(id) = id_of(path) {
            let link = self.provider.build_anime_link(&id);
            for record in records.iter_mut().filter(|r| r.sources.is_empty()) {
                record.sources.push(link.clone());
            }
        }

        Ok(records)
    }
}
