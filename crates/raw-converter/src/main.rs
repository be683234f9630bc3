//! Raw converter CLI application.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use raw_converter::{
    CanonicalJsonConverter, DependentConversionWatchService, JsonFileSink, RawFileConversionService,
    RecordSink, SimpleConversionWatchService, SweepStats, WatchSettings,
};
use shared::config::ProviderEntry;
use shared::{Config, DataPaths, DirectoryLookup};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert the backlog, then keep converting finished downloads until Ctrl-C
    Watch,
    /// Convert the backlog once and exit
    Sweep,
    /// Report whether unconverted raw files exist
    Status {
        /// Block until every raw file is converted or the configured timeout elapses
        #[arg(long)]
        wait: bool,
    },
}

/// One watch service per converting provider
enum Service {
    Simple(SimpleConversionWatchService),
    Dependent(DependentConversionWatchService),
}

impl Service {
    async fn start(&self) -> raw_converter::Result<bool> {
        match self {
            Service::Simple(service) => service.start().await,
            Service::Dependent(service) => service.start().await,
        }
    }

    async fn prepare(&self) -> raw_converter::Result<SweepStats> {
        match self {
            Service::Simple(service) => service.prepare().await,
            Service::Dependent(service) => service.prepare().await,
        }
    }

    async fn stop(&self) {
        match self {
            Service::Simple(service) => service.stop().await,
            Service::Dependent(service) => service.stop().await,
        }
    }
}

fn build_services(config: &Config, lookup: &DirectoryLookup) -> Result<Vec<(String, Service)>> {
    let sink: Arc<dyn RecordSink> = Arc::new(JsonFileSink::new(config.converted_dir()));
    let settings = WatchSettings::from(&config.conversion);

    config
        .providers
        .iter()
        .filter(|entry| entry.convert)
        .map(|entry| -> Result<(String, Service)> {
            let service = build_service(entry, lookup, Arc::clone(&sink), settings)
                .with_context(|| format!("Failed to set up provider {}", entry.name))?;
            Ok((entry.name.clone(), service))
        })
        .collect()
}

fn build_service(
    entry: &ProviderEntry,
    lookup: &DirectoryLookup,
    sink: Arc<dyn RecordSink>,
    settings: WatchSettings,
) -> Result<Service> {
    let provider = lookup.require(&entry.name)?.clone();
    let converter = Arc::new(CanonicalJsonConverter::new(provider.clone()));

    if entry.depends_on.is_empty() {
        let service = SimpleConversionWatchService::new(lookup, provider, converter, sink, settings)?;
        return Ok(Service::Simple(service));
    }

    let dependents = entry
        .depends_on
        .iter()
        .map(|name| lookup.require(name).cloned())
        .collect::<Result<Vec<_>>>()?;
    let service =
        DependentConversionWatchService::new(lookup, provider, dependents, converter, sink, settings)?;
    Ok(Service::Dependent(service))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let mut log_config =
        shared::LogConfig::from_settings(&config.logging, &config.log_dir(), "raw-converter");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("Raw converter starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize data paths
    let data_paths = DataPaths::new(config.data_dir());
    data_paths
        .create_dirs(config.providers.iter().map(|p| p.name.as_str()))
        .context("Failed to create data directories")?;
    info!(data_dir = %data_paths.root().display(), "Data directories ready");
    std::fs::create_dir_all(config.converted_dir())
        .context("Failed to create converted directory")?;

    let lookup = DirectoryLookup::from_config(&config);

    match args.command {
        Command::Watch => {
            let services = build_services(&config, &lookup)?;
            if services.is_empty() {
                warn!("No provider configured for conversion");
                return Ok(());
            }

            for (name, service) in &services {
                service
                    .start()
                    .await
                    .with_context(|| format!("Failed to start watching {}", name))?;
                info!(provider = %name, "Watch service started");
            }

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Shutdown requested");

            for (name, service) in &services {
                service.stop().await;
                info!(provider = %name, "Watch service stopped");
            }
        }
        Command::Sweep => {
            let mut total = SweepStats::default();
            for (name, service) in build_services(&config, &lookup)? {
                let stats = service
                    .prepare()
                    .await
                    .with_context(|| format!("Failed to convert backlog of {}", name))?;
                total.converted += stats.converted;
                total.already_converted += stats.already_converted;
                total.not_ready += stats.not_ready;
                total.failed += stats.failed;
            }

            info!("=== Sweep Complete ===");
            info!("Converted: {}", total.converted);
            info!("Already converted: {}", total.already_converted);
            info!("Not ready: {}", total.not_ready);
            info!("Failed: {}", total.failed);
        }
        Command::Status { wait } => {
            let status = RawFileConversionService::new(Arc::new(lookup))
                .with_poll_interval(config.conversion.status_poll_interval());

            if wait {
                status
                    .wait_for_all_raw_files_to_be_converted(config.conversion.wait_timeout())
                    .await?;
            }

            let pending = status.unconverted_files().await?;
            for (hostname, path) in &pending {
                info!(hostname = %hostname, path = %path.display(), "Unconverted raw file");
            }
            info!(unconverted = pending.len(), "Conversion status");
        }
    }

    info!("Raw converter finished successfully");

    Ok(())
}
