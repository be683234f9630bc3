//! Converter for providers whose records need companion files.
//!
//! Some sites are crawled through several endpoints (main page, relations,
//! tags, ...), each downloaded into its own working directory. A main raw
//! file is only converted once every dependent directory holds a file with
//! the same id.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shared::{AppConfig, MetaDataProviderConfig};
use tracing::debug;

use super::{
    working_dir_of, ConversionOutcome, ConversionTarget, FileConverter, Readiness, SweepStats,
};
use crate::converter::PathConverter;
use crate::error::{ConversionError, Result};
use crate::probe;
use crate::sink::RecordSink;

/// A dependency of the main provider and where its files live
#[derive(Debug, Clone)]
struct Dependency {
    provider: MetaDataProviderConfig,
    working_dir: PathBuf,
}

/// Converts main raw files once all their dependency files exist
pub struct DependentFileConverter {
    target: ConversionTarget,
    dependencies: Vec<Dependency>,
}

impl DependentFileConverter {
    /// Fails before touching the filesystem if the configurations do not all
    /// belong to the same provider.
    pub fn new(
        app_config: &dyn AppConfig,
        main: MetaDataProviderConfig,
        dependents: Vec<MetaDataProviderConfig>,
        converter: Arc<dyn PathConverter>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        validate_configs(&main, &dependents)?;

        let dependencies = dependents
            .into_iter()
            .map(|provider| {
                let working_dir = working_dir_of(app_config, &provider)?;
                Ok(Dependency {
                    provider,
                    working_dir,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            target: ConversionTarget::new(app_config, main, converter, sink)?,
            dependencies,
        })
    }

    pub fn provider(&self) -> &MetaDataProviderConfig {
        &self.target.provider
    }

    pub fn working_dir(&self) -> &Path {
        &self.target.working_dir
    }

    /// Whether every dependent directory holds a file for `id`
    async fn dependencies_present(&self, id: &str) -> Result<bool> {
        for dependency in &self.dependencies {
            let path = shared::paths::raw_file(
                &dependency.working_dir,
                id,
                dependency.provider.file_suffix(),
            );
            if !probe::exists(&path).await? {
                debug!(id = %id, missing = %path.display(), "Dependency not downloaded yet");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// All configurations must share the hostname of the main configuration.
pub(crate) fn validate_configs(
    main: &MetaDataProviderConfig,
    dependents: &[MetaDataProviderConfig],
) -> Result<()> {
    if dependents.is_empty() {
        return Err(ConversionError::NoDependencies);
    }
    if dependents.iter().any(|d| !d.is_same_provider(main)) {
        return Err(ConversionError::ProviderMismatch);
    }
    Ok(())
}

#[async_trait]
impl FileConverter for DependentFileConverter {
    fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.target.working_dir.clone()];
        for dependency in &self.dependencies {
            if !dirs.contains(&dependency.working_dir) {
                dirs.push(dependency.working_dir.clone());
            }
        }
        dirs
    }

    fn raw_file(&self, id: &str) -> PathBuf {
        self.target.raw_file(id)
    }

    async fn convert_unconverted_files(&self) -> Result<SweepStats> {
        self.target.sweep(self).await
    }

    async fn convert_file_to_conv_file(&self, path: &Path) -> Result<ConversionOutcome> {
        let id = match self.target.check(path).await? {
            Readiness::Pending(id) => id,
            Readiness::Settled(outcome) => return Ok(outcome),
        };

        if !self.dependencies_present(&id).await? {
            return Ok(ConversionOutcome::NotReady);
        }

        self.target.convert_and_mark(&id, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::DiscardSink;
    use crate::test_utils::{markers, touch, CountingConverter};
    use shared::DirectoryLookup;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        main_dir: PathBuf,
        dependent_dirs: Vec<PathBuf>,
        converter: Arc<CountingConverter>,
        file_converter: DependentFileConverter,
    }

    fn fixture(dependent_suffixes: &[&str]) -> Fixture {
        let root = TempDir::new().unwrap();
        let main = MetaDataProviderConfig::new("anidb.net", "html");
        let main_dir = root.path().join("main");
        std::fs::create_dir(&main_dir).unwrap();

        let mut lookup = DirectoryLookup::new().with_provider(main.clone(), &main_dir);
        let mut dependents = Vec::new();
        let mut dependent_dirs = Vec::new();
        for (index, suffix) in dependent_suffixes.iter().enumerate() {
            let config = MetaDataProviderConfig::new("anidb.net", *suffix);
            let dir = root.path().join(format!("dependent-{}", index));
            std::fs::create_dir(&dir).unwrap();
            lookup.register(config.clone(), &dir);
            dependents.push(config);
            dependent_dirs.push(dir);
        }

        let converter = CountingConverter::new();
        let file_converter = DependentFileConverter::new(
            &lookup,
            main,
            dependents,
            converter.clone(),
            Arc::new(DiscardSink),
        )
        .unwrap();

        Fixture {
            _root: root,
            main_dir,
            dependent_dirs,
            converter,
            file_converter,
        }
    }

    #[tokio::test]
    async fn test_waits_for_dependency_file() -> Result<()> {
        let f = fixture(&["json"]);
        let raw = touch(&f.main_dir, "1535.html");

        let outcome = f.file_converter.convert_file_to_conv_file(&raw).await?;
        assert_eq!(outcome, ConversionOutcome::NotReady);
        assert!(markers(&f.main_dir).is_empty());
        assert_eq!(f.converter.calls(), 0);

        touch(&f.dependent_dirs[0], "1535.json");
        let outcome = f.file_converter.convert_file_to_conv_file(&raw).await?;

        assert_eq!(outcome, ConversionOutcome::Converted { records: 1 });
        assert_eq!(markers(&f.main_dir), vec!["1535.conv"]);
        assert!(markers(&f.dependent_dirs[0]).is_empty());
        assert_eq!(f.converter.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_main_file_arriving_last() -> Result<()> {
        let f = fixture(&["json", "xml"]);
        touch(&f.dependent_dirs[0], "7.json");
        touch(&f.dependent_dirs[1], "7.xml");
        let raw = f.main_dir.join("7.html");

        let outcome = f.file_converter.convert_file_to_conv_file(&raw).await?;
        assert_eq!(outcome, ConversionOutcome::NotReady);

        touch(&f.main_dir, "7.html");
        let outcome = f.file_converter.convert_file_to_conv_file(&raw).await?;
        assert_eq!(outcome, ConversionOutcome::Converted { records: 1 });

        let outcome = f.file_converter.convert_file_to_conv_file(&raw).await?;
        assert_eq!(outcome, ConversionOutcome::AlreadyConverted);
        assert_eq!(f.converter.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_every_dependency_is_required() -> Result<()> {
        let f = fixture(&["json", "xml"]);
        let raw = touch(&f.main_dir, "99.html");
        touch(&f.dependent_dirs[0], "99.json");

        assert_eq!(
            f.file_converter.convert_file_to_conv_file(&raw).await?,
            ConversionOutcome::NotReady
        );

        touch(&f.dependent_dirs[1], "99.xml");
        assert_eq!(
            f.file_converter.convert_file_to_conv_file(&raw).await?,
            ConversionOutcome::Converted { records: 1 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_converts_complete_sets_only() -> Result<()> {
        let f = fixture(&["json"]);
        touch(&f.main_dir, "1.html");
        touch(&f.main_dir, "2.html");
        touch(&f.main_dir, "3.html");
        touch(&f.main_dir, "3.conv");
        touch(&f.dependent_dirs[0], "1.json");
        touch(&f.dependent_dirs[0], "3.json");

        let stats = f.file_converter.convert_unconverted_files().await?;

        assert_eq!(
            stats,
            SweepStats {
                converted: 1,
                already_converted: 1,
                not_ready: 1,
                failed: 0,
            }
        );
        assert_eq!(markers(&f.main_dir), vec!["1.conv", "3.conv"]);
        Ok(())
    }

    #[test]
    fn test_rejects_configs_of_different_providers() {
        let main = MetaDataProviderConfig::new("anidb.net", "html");
        let other = MetaDataProviderConfig::new("kitsu.app", "json");

        // The lookup is empty: validation has to fail before any directory is resolved
        let result = DependentFileConverter::new(
            &DirectoryLookup::new(),
            main,
            vec![other],
            CountingConverter::new(),
            Arc::new(DiscardSink),
        );

        match result {
            Err(e) => {
                assert!(matches!(e, ConversionError::ProviderMismatch));
                assert_eq!(e.to_string(), "All configs must be from the same meta data provider.");
            }
            Ok(_) => panic!("expected a provider mismatch"),
        }
    }

    #[test]
    fn test_requires_a_dependency() {
        let result = validate_configs(&MetaDataProviderConfig::new("anidb.net", "html"), &[]);
        assert!(matches!(result, Err(ConversionError::NoDependencies)));
    }

    #[test]
    fn test_watched_dirs_main_first() {
        let f = fixture(&["json", "xml"]);
        let dirs = f.file_converter.watched_dirs();

        assert_eq!(dirs.len(), 3);
        assert_eq!(dirs[0], f.main_dir);
        assert_eq!(&dirs[1..], &f.dependent_dirs[..]);
    }
}
