//! File system watcher reporting finished downloads.
//!
//! Uses the `notify` crate to watch working directories and forwards the
//! removal of `<id>.lock` files, the crawler's "download complete" signal,
//! through a channel the watch loop polls.
//!
//! # Design
//!
//! - **Lock removals only**: creation of raw or lock files is ignored, a raw
//!   file may still be written while its lock exists
//! - **Non-blocking**: [`DirectoryWatcher::poll`] never waits, the caller
//!   decides how long to back off
//! - **Closing**: after [`DirectoryWatcher::close`] the OS handle is released
//!   and polling reports [`WatchPoll::Closed`] once the channel is drained

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use notify::event::RemoveKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use shared::paths::{id_of, LOCK_FILE_SUFFIX};

use crate::error::{ConversionError, Result};

/// A lock file disappeared from a watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRemoved {
    /// Directory the lock file was in
    pub dir: PathBuf,
    /// Id of the entry whose download finished
    pub id: String,
}

/// Result of a single non-blocking poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPoll {
    Event(LockRemoved),
    /// Nothing happened since the last poll
    Empty,
    /// The watch handle was released, no more events will arrive
    Closed,
}

/// Handle to a running directory watcher.
pub struct DirectoryWatcher {
    watcher: Option<RecommendedWatcher>,
    events: Receiver<LockRemoved>,
}

impl DirectoryWatcher {
    /// Watch the given directories, non-recursively.
    pub fn new(dirs: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = unbounded();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            handle_event(result, &tx);
        })
        .map_err(|e| ConversionError::Watch(e.to_string()))?;

        for dir in dirs {
            tracing::debug!(dir = %dir.display(), "Watching directory");
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| ConversionError::Watch(format!("{}: {}", dir.display(), e)))?;
        }

        Ok(Self {
            watcher: Some(watcher),
            events: rx,
        })
    }

    /// Next pending event, without blocking.
    pub fn poll(&self) -> WatchPoll {
        match self.events.try_recv() {
            Ok(event) => WatchPoll::Event(event),
            Err(TryRecvError::Empty) if self.watcher.is_none() => WatchPoll::Closed,
            Err(TryRecvError::Empty) => WatchPoll::Empty,
            Err(TryRecvError::Disconnected) => WatchPoll::Closed,
        }
    }

    /// Release the OS watch handle. Idempotent.
    pub fn close(&mut self) {
        if self.watcher.take().is_some() {
            tracing::debug!("Directory watcher closed");
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

fn handle_event(result: notify::Result<Event>, tx: &Sender<LockRemoved>) {
    match result {
        Ok(event) => {
            for removal in lock_removals(&event) {
                tracing::trace!(dir = %removal.dir.display(), id = %removal.id, "Lock file removed");
                // The receiver is gone once the watcher was closed
                let _ = tx.send(removal);
            }
        }
        Err(error) => {
            tracing::warn!(error = %error, "Watch error");
        }
    }
}

/// Lock file removals contained in a notify event.
fn lock_removals(event: &Event) -> Vec<LockRemoved> {
    match event.kind {
        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter(|path| is_lock_file(path))
            .filter_map(|path| {
                Some(LockRemoved {
                    dir: path.parent()?.to_path_buf(),
                    id: id_of(path)?,
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_lock_file(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(LOCK_FILE_SUFFIX))
}
