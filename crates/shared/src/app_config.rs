//! Lookup of provider configurations and their working directories.

use crate::config::Config;
use crate::paths::DataPaths;
use crate::provider::MetaDataProviderConfig;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Application level view on the configured meta data providers
pub trait AppConfig: Send + Sync {
    /// Working directory of a provider configuration, keyed by its identity
    fn working_dir(&self, config: &MetaDataProviderConfig) -> Option<PathBuf>;

    /// Every configured provider
    fn meta_data_provider_configurations(&self) -> Vec<MetaDataProviderConfig>;
}

/// In-memory [`AppConfig`] keeping the registration order of providers
#[derive(Debug, Clone, Default)]
pub struct DirectoryLookup {
    providers: Vec<MetaDataProviderConfig>,
    dirs: HashMap<MetaDataProviderConfig, PathBuf>,
    names: HashMap<String, MetaDataProviderConfig>,
}

impl DirectoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider with its working directory
    pub fn with_provider(mut self, config: MetaDataProviderConfig, dir: impl Into<PathBuf>) -> Self {
        self.register(config, dir);
        self
    }

    /// Register a provider with its working directory
    pub fn register(&mut self, config: MetaDataProviderConfig, dir: impl Into<PathBuf>) {
        if self.dirs.insert(config.clone(), dir.into()).is_none() {
            self.providers.push(config);
        }
    }

    /// Register a provider that is only read as a dependency of another one
    ///
    /// Its working directory resolves, but it is not part of
    /// [`AppConfig::meta_data_provider_configurations`] since its files never
    /// get converted on their own.
    pub fn register_dependency(&mut self, config: MetaDataProviderConfig, dir: impl Into<PathBuf>) {
        self.dirs.insert(config, dir.into());
    }

    /// Build the lookup from the `[[providers]]` section of the configuration
    pub fn from_config(config: &Config) -> Self {
        let paths = DataPaths::new(config.data_dir());
        let mut lookup = Self::new();

        for entry in &config.providers {
            let mut provider = MetaDataProviderConfig::new(&entry.hostname, &entry.file_suffix);
            if let Some(template) = &entry.link_template {
                provider = provider.with_link_template(template);
            }

            let dir = paths.working_dir(&entry.name);
            if entry.convert {
                lookup.register(provider.clone(), dir);
            } else {
                lookup.register_dependency(provider.clone(), dir);
            }
            lookup.names.insert(entry.name.clone(), provider);
        }

        lookup
    }

    /// Provider registered under a configuration name
    pub fn by_name(&self, name: &str) -> Option<&MetaDataProviderConfig> {
        self.names.get(name)
    }

    /// Provider registered under a configuration name, failing if unknown
    pub fn require(&self, name: &str) -> Result<&MetaDataProviderConfig> {
        self.by_name(name)
            .with_context(|| format!("Unknown provider: {}", name))
    }
}

impl AppConfig for DirectoryLookup {
    fn working_dir(&self, config: &MetaDataProviderConfig) -> Option<PathBuf> {
        self.dirs.get(config).cloned()
    }

    fn meta_data_provider_configurations(&self) -> Vec<MetaDataProviderConfig> {
        self.providers.clone()
    }
}
