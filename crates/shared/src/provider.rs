//! Meta data provider configurations.
//!
//! A provider configuration describes one source of raw documents (a host and
//! the suffix its raw files are stored with). Several configurations can share
//! a hostname when a site is crawled through more than one endpoint, so
//! configurations are compared by the identity they receive at construction
//! rather than by their field values.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity token of a provider configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

impl ProviderId {
    fn next() -> Self {
        Self(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "provider#{}", self.0)
    }
}

/// Configuration of a single meta data provider
///
/// Cloning keeps the identity. Two configurations built separately are never
/// equal, even if every field matches.
#[derive(Debug, Clone)]
pub struct MetaDataProviderConfig {
    id: ProviderId,
    hostname: String,
    file_suffix: String,
    link_template: String,
}

impl MetaDataProviderConfig {
    /// Create a new provider configuration with a fresh identity
    pub fn new(hostname: impl Into<String>, file_suffix: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let link_template = format!("https://{}/anime/{{id}}", hostname);

        Self {
            id: ProviderId::next(),
            hostname,
            file_suffix: file_suffix.into().trim_start_matches('.').to_string(),
            link_template,
        }
    }

    /// Replace the template used to build entry links. `{id}` is substituted.
    pub fn with_link_template(mut self, template: impl Into<String>) -> Self {
        self.link_template = template.into();
        self
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Suffix of raw files, without the leading dot
    pub fn file_suffix(&self) -> &str {
        &self.file_suffix
    }

    /// Build the link of an entry on this provider
    pub fn build_anime_link(&self, anime_id: &str) -> String {
        self.link_template.replace("{id}", anime_id)
    }

    /// Whether both configurations describe the same logical provider
    pub fn is_same_provider(&self, other: &MetaDataProviderConfig) -> bool {
        self.hostname == other.hostname
    }
}

impl PartialEq for MetaDataProviderConfig {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MetaDataProviderConfig {}

impl Hash for MetaDataProviderConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
