//! Long-running conversion services.
//!
//! A [`ConversionWatchService`] owns a [`FileConverter`] and keeps its working
//! directories converted:
//!
//! 1. The directory watcher is registered first, so no lock removal is lost
//!    while the backlog is processed.
//! 2. `prepare` deletes stale lock files of an earlier, interrupted run and
//!    converts the backlog.
//! 3. The watch loop polls for lock removals, backing off exponentially while
//!    idle, and converts the raw file of every id whose lock disappeared.
//!
//! Lifecycle: `Stopped -> Preparing -> Watching -> Stopped`.

mod dependent;
mod simple;
mod watcher;

pub use dependent::DependentConversionWatchService;
pub use simple::SimpleConversionWatchService;
pub use watcher::{DirectoryWatcher, LockRemoved, WatchPoll};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shared::config::ConversionConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::convert::{ConversionOutcome, FileConverter, SweepStats};
use crate::error::Result;
use crate::probe;

/// Lifecycle state of a watch service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Preparing,
    Watching,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "stopped"),
            ServiceState::Preparing => write!(f, "preparing"),
            ServiceState::Watching => write!(f, "watching"),
        }
    }
}

#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn get(&self) -> ServiceState {
        match self.0.load(Ordering::SeqCst) {
            1 => ServiceState::Preparing,
            2 => ServiceState::Watching,
            _ => ServiceState::Stopped,
        }
    }

    fn set(&self, state: ServiceState) {
        self.0.store(Self::encode(state), Ordering::SeqCst);
    }

    /// Move from `Stopped` to `Preparing`. Fails if a loop already owns the service.
    fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(
                Self::encode(ServiceState::Stopped),
                Self::encode(ServiceState::Preparing),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn encode(state: ServiceState) -> u8 {
        match state {
            ServiceState::Stopped => 0,
            ServiceState::Preparing => 1,
            ServiceState::Watching => 2,
        }
    }
}

/// Shortest pause of the watch loop, whatever the settings say
const MIN_BACKOFF_FLOOR: Duration = Duration::from_millis(1);

/// Poll backoff of the watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    /// Pause after the first empty poll, and after every event
    pub min_backoff: Duration,
    /// Upper bound of the pause between two polls
    pub max_backoff: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&ConversionConfig> for WatchSettings {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            min_backoff: config.min_poll_backoff(),
            max_backoff: config.max_poll_backoff(),
        }
    }
}

impl WatchSettings {
    fn initial_backoff(&self) -> Duration {
        self.min_backoff.max(MIN_BACKOFF_FLOOR)
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        current
            .max(MIN_BACKOFF_FLOOR)
            .saturating_mul(2)
            .min(self.max_backoff.max(MIN_BACKOFF_FLOOR))
    }
}

struct RunningWatch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps the working directories of a [`FileConverter`] converted
pub struct ConversionWatchService<F: FileConverter + 'static> {
    converter: Arc<F>,
    settings: WatchSettings,
    state: Arc<StateCell>,
    running: Mutex<Option<RunningWatch>>,
}

impl<F: FileConverter + 'static> ConversionWatchService<F> {
    pub fn from_converter(converter: F, settings: WatchSettings) -> Self {
        Self {
            converter: Arc::new(converter),
            settings,
            state: Arc::new(StateCell::default()),
            running: Mutex::new(None),
        }
    }

    pub fn converter(&self) -> &F {
        &self.converter
    }

    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    /// Delete stale lock files in every watched directory, then convert the backlog.
    pub async fn prepare(&self) -> Result<SweepStats> {
        prepare(self.converter.as_ref()).await
    }

    /// Prepare, then watch until `cancel` fires.
    ///
    /// Runs on the calling task. Use [`ConversionWatchService::start`] to run
    /// in the background instead. Returns `false` without watching if the
    /// service is already running.
    pub async fn watch(&self, cancel: CancellationToken) -> Result<bool> {
        if !self.state.try_claim() {
            debug!("Conversion watch service already running");
            return Ok(false);
        }

        let watcher = match DirectoryWatcher::new(&self.converter.watched_dirs()) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.state.set(ServiceState::Stopped);
                return Err(e);
            }
        };
        drive(
            Arc::clone(&self.converter),
            watcher,
            cancel,
            Arc::clone(&self.state),
            self.settings,
        )
        .await?;
        Ok(true)
    }

    /// Start preparing and watching in the background.
    ///
    /// Returns `false` if the service is already running. The directory
    /// watcher is registered before this returns.
    pub async fn start(&self) -> Result<bool> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("Conversion watch service already running");
            return Ok(false);
        }
        if running.take().is_some() {
            // The previous task ended without `stop`, e.g. by panicking
            self.state.set(ServiceState::Stopped);
        }
        if !self.state.try_claim() {
            debug!("Conversion watch service already running on another task");
            return Ok(false);
        }

        let watcher = match DirectoryWatcher::new(&self.converter.watched_dirs()) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.state.set(ServiceState::Stopped);
                return Err(e);
            }
        };
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let converter = Arc::clone(&self.converter);
            let state = Arc::clone(&self.state);
            let cancel = cancel.clone();
            let settings = self.settings;
            async move {
                let dirs = converter.watched_dirs();
                if let Err(e) = drive(converter, watcher, cancel, state, settings).await {
                    error!(dirs = ?dirs, error = %e, "Conversion watch service failed");
                }
            }
        });

        *running = Some(RunningWatch { cancel, handle });
        Ok(true)
    }

    /// Stop the background watch loop and release the watch handle. Idempotent.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Conversion watch task ended abnormally");
        }
        self.state.set(ServiceState::Stopped);
    }

    /// Whether a background watch loop is active
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

async fn prepare<F: FileConverter + ?Sized>(converter: &F) -> Result<SweepStats> {
    for dir in converter.watched_dirs() {
        let purged = probe::purge_stale_locks(&dir).await?;
        if purged > 0 {
            info!(dir = %dir.display(), purged, "Purged stale lock files");
        }
    }

    converter.convert_unconverted_files().await
}

async fn drive<F: FileConverter + 'static>(
    converter: Arc<F>,
    mut watcher: DirectoryWatcher,
    cancel: CancellationToken,
    state: Arc<StateCell>,
    settings: WatchSettings,
) -> Result<()> {
    state.set(ServiceState::Preparing);

    let result: Result<()> = async {
        // An interrupted sweep leaves no marker behind, the next start redoes it
        let stats = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            stats = prepare(converter.as_ref()) => stats?,
        };
        debug!(?stats, "Backlog converted");

        state.set(ServiceState::Watching);
        info!(dirs = ?converter.watched_dirs(), "Watching for finished downloads");
        watch_loop(converter.as_ref(), &mut watcher, &cancel, settings).await;
        Ok(())
    }
    .await;

    watcher.close();
    state.set(ServiceState::Stopped);
    info!(dirs = ?converter.watched_dirs(), "Conversion watch service stopped");
    result
}

async fn watch_loop<F: FileConverter + ?Sized>(
    converter: &F,
    watcher: &mut DirectoryWatcher,
    cancel: &CancellationToken,
    settings: WatchSettings,
) {
    let mut backoff = settings.initial_backoff();

    while !cancel.is_cancelled() {
        match watcher.poll() {
            WatchPoll::Event(event) => {
                backoff = settings.initial_backoff();
                handle_lock_removed(converter, &event).await;
            }
            WatchPoll::Empty => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = settings.next_backoff(backoff);
            }
            WatchPoll::Closed => {
                debug!("Watch handle closed");
                break;
            }
        }
    }
}

async fn handle_lock_removed<F: FileConverter + ?Sized>(converter: &F, event: &LockRemoved) {
    let path = converter.raw_file(&event.id);

    match converter.convert_file_to_conv_file(&path).await {
        Ok(ConversionOutcome::Converted { .. }) => {}
        Ok(outcome) => {
            debug!(id = %event.id, dir = %event.dir.display(), ?outcome, "Nothing converted");
        }
        Err(e) => {
            warn!(id = %event.id, error = %e, "Conversion failed, will retry on next trigger");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let settings = WatchSettings {
            min_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        };

        assert_eq!(settings.next_backoff(Duration::from_millis(10)), Duration::from_millis(20));
        assert_eq!(settings.next_backoff(Duration::from_millis(40)), Duration::from_millis(50));
        assert_eq!(settings.next_backoff(Duration::from_millis(50)), Duration::from_millis(50));
    }

    #[test]
    fn test_zero_backoff_still_grows() {
        let settings = WatchSettings {
            min_backoff: Duration::ZERO,
            max_backoff: Duration::from_millis(50),
        };

        let mut backoff = settings.initial_backoff();
        assert_eq!(backoff, Duration::from_millis(1));
        for _ in 0..10 {
            backoff = settings.next_backoff(backoff);
            assert!(backoff > Duration::ZERO);
        }
        assert_eq!(backoff, Duration::from_millis(50));

        let settings = WatchSettings {
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        };
        assert_eq!(settings.next_backoff(Duration::ZERO), Duration::from_millis(1));
    }

    #[test]
    fn test_settings_from_config() {
        let config = ConversionConfig {
            min_poll_backoff_ms: 5,
            max_poll_backoff_ms: 250,
            ..Default::default()
        };

        let settings = WatchSettings::from(&config);
        assert_eq!(settings.min_backoff, Duration::from_millis(5));
        assert_eq!(settings.max_backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_state_cell() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), ServiceState::Stopped);
        assert!(cell.try_claim());
        assert_eq!(cell.get(), ServiceState::Preparing);
        assert!(!cell.try_claim());
        cell.set(ServiceState::Watching);
        assert_eq!(cell.get(), ServiceState::Watching);
        assert_eq!(ServiceState::Preparing.to_string(), "preparing");
    }
}
