//! Cascade Watcher - change-triggered reloads
//!
//! Watches a unit tree and turns every changed unit source into a reload of
//! that unit and its ancestors. Filesystem events are debounced, filtered by
//! extension, resolved to loaded units through the host registry, and handed
//! to a [`ReloadPolicy`] one at a time.

mod discover;

pub use discover::{discover_units, unit_name_for};

use cascade_core::UnitRegistry;
use cascade_reload::{CascadeConfig, ReloadError, ReloadOutcome, ReloadPolicy};
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEvent};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to watch files: {0}")]
    Notify(#[from] notify::Error),

    #[error("Failed to listen for Ctrl-C: {0}")]
    Signal(#[from] std::io::Error),
}

/// What to watch and how.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Root directory, watched recursively.
    pub root: PathBuf,
    /// Quiet period before a burst of events is handled.
    pub debounce: Duration,
    /// File extensions to react to.
    pub extensions: Vec<String>,
}

impl WatcherConfig {
    pub fn new(root: impl Into<PathBuf>, config: &CascadeConfig) -> Self {
        Self {
            root: root.into(),
            debounce: config.debounce(),
            extensions: config.extensions.clone(),
        }
    }
}

/// Counters for one watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub changes: usize,
    pub reloads: usize,
    pub failures: usize,
    pub ignored: usize,
}

/// Drives reloads from filesystem changes.
pub struct ReloadWatcher<R> {
    config: WatcherConfig,
    policy: ReloadPolicy,
    registry: R,
    stats: WatchStats,
}

impl<R: UnitRegistry> ReloadWatcher<R> {
    pub fn new(config: WatcherConfig, policy: ReloadPolicy, registry: R) -> Self {
        Self {
            config,
            policy,
            registry,
            stats: WatchStats::default(),
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn policy(&self) -> &ReloadPolicy {
        &self.policy
    }

    pub fn stats(&self) -> WatchStats {
        self.stats
    }

    /// Handles one changed file.
    ///
    /// Returns `None` when the path does not belong to any loaded unit.
    pub fn handle_path(&mut self, path: &Path) -> Option<Result<ReloadOutcome, ReloadError>> {
        self.stats.changes += 1;

        match self.policy.reload_by_location(&mut self.registry, path) {
            Err(ReloadError::UnknownLocation(_)) => {
                debug!("Ignoring change to {}", path.display());
                self.stats.ignored += 1;
                None
            }
            Ok(outcome) => {
                if !matches!(outcome, ReloadOutcome::Debounced { .. }) {
                    self.stats.reloads += 1;
                }
                Some(Ok(outcome))
            }
            Err(e) => {
                self.stats.failures += 1;
                Some(Err(e))
            }
        }
    }

    /// Watches until Ctrl-C, then hands the watcher back.
    pub async fn run(mut self) -> Result<Self, WatchError> {
        let (tx, mut rx) = mpsc::channel::<DebounceEventResult>(64);

        // The debouncer calls back from its own thread.
        let mut debouncer = new_debouncer(self.config.debounce, move |res: DebounceEventResult| {
            let _ = tx.blocking_send(res);
        })?;
        debouncer
            .watcher()
            .watch(&self.config.root, RecursiveMode::Recursive)?;

        info!("Watching {} for changes", self.config.root.display());

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("Stopping watcher");
                    break;
                }
                received = rx.recv() => match received {
                    Some(Ok(events)) => {
                        for path in changed_paths(&events, &self.config.extensions) {
                            self.handle_path(&path);
                        }
                    }
                    Some(Err(e)) => warn!("Watch error: {:?}", e),
                    None => break,
                },
            }
        }

        Ok(self)
    }
}

/// Unique paths in a debounced batch that should trigger a reload.
pub fn changed_paths(events: &[DebouncedEvent], extensions: &[String]) -> Vec<PathBuf> {
    events
        .iter()
        .map(|event| &event.path)
        .filter(|path| should_process_file(path, extensions))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Checks if a file should be processed based on extension.
pub fn should_process_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e == ext))
        .unwrap_or(false)
}
