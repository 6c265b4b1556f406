//! Directory watcher: owns the event queue and every watch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::WatcherConfig;

use super::error::Result;
use super::handler::{WatchId, WatchListener};
use super::multiplexer::{EventMultiplexer, system_multiplexer};
use super::pump::{PumpStats, TickSettings, run_tick};
use super::registrar::Registrar;
use super::registry::WatchRegistry;
use super::token::Token;
use super::watch::Watch;

/// Whether sub-directories should be watched too.
///
/// Only one level is ever watched. `Recursive` is accepted so callers can
/// state intent, and is logged as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecursiveMode {
    #[default]
    NonRecursive,
    Recursive,
}

/// Turns coarse per-descriptor kernel events into per-file notifications.
///
/// Single-threaded and poll-driven: nothing happens between calls to
/// [`pump`](Self::pump), and listeners only run inside calls on this value.
/// Dropping the watcher has the same effect as [`destroy`](Self::destroy).
pub struct DirectoryWatcher {
    registry: WatchRegistry,
    registrar: Registrar,
    tick: TickSettings,
}

impl DirectoryWatcher {
    /// Create a watcher on the system event queue with default settings.
    pub fn create() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the watcher.
    pub fn builder() -> DirectoryWatcherBuilder {
        DirectoryWatcherBuilder::new()
    }

    /// Watch the regular files directly inside `directory`.
    ///
    /// Files already present are tracked without notifications.
    pub fn add_watch(
        &mut self,
        directory: impl Into<PathBuf>,
        listener: Arc<dyn WatchListener>,
    ) -> Result<WatchId> {
        self.add_watch_with_mode(directory, listener, RecursiveMode::NonRecursive)
    }

    /// Like [`add_watch`](Self::add_watch), stating a recursion mode.
    pub fn add_watch_with_mode(
        &mut self,
        directory: impl Into<PathBuf>,
        listener: Arc<dyn WatchListener>,
        mode: RecursiveMode,
    ) -> Result<WatchId> {
        let directory = directory.into();
        if mode == RecursiveMode::Recursive {
            tracing::warn!(
                "[watcher] recursive watching is not supported, watching top level of {}",
                directory.display()
            );
        }

        let id = self.registry.next_id();
        let watch = Watch::open(id, directory, listener, &mut self.registrar)?;
        crate::log_event!(
            "watcher",
            "added watch",
            "{id} {} ({} files)",
            watch.directory().display(),
            watch.len()
        );
        self.registry.insert(watch);
        Ok(id)
    }

    /// Stop watching; notifies `Removed` for every tracked file.
    ///
    /// Unknown ids are ignored.
    pub fn remove_watch(&mut self, id: WatchId) {
        let Some(mut watch) = self.registry.remove(id) else {
            return;
        };
        watch.remove_all(&mut self.registrar);
        crate::log_event!("watcher", "removed watch", "{id} {}", watch.directory().display());
    }

    /// Remove the first watch on exactly `directory`, if any.
    pub fn remove_watch_path(&mut self, directory: &Path) {
        if let Some(id) = self.registry.find_by_directory(directory) {
            self.remove_watch(id);
        }
    }

    /// Process everything currently queued for every watch.
    ///
    /// Waits at most the configured poll timeout, and only when nothing is
    /// queued yet.
    pub fn pump(&mut self) -> PumpStats {
        let stats = run_tick(&mut self.registry, &mut self.registrar, &self.tick);
        if stats.events > 0 {
            crate::debug_event!("watcher", "tick", "{stats:?}");
        }
        stats
    }

    /// Remove every watch, notifying `Removed` for all tracked files, and
    /// close the event queue.
    pub fn destroy(self) {
        drop(self);
    }

    fn shutdown(&mut self) {
        for mut watch in self.registry.drain() {
            watch.remove_all(&mut self.registrar);
        }
    }

    pub fn watch_ids(&self) -> Vec<WatchId> {
        self.registry.ids()
    }

    pub fn watch_count(&self) -> usize {
        self.registry.len()
    }

    pub fn watch(&self, id: WatchId) -> Option<&Watch> {
        self.registry.get(id)
    }

    pub fn directory_of(&self, id: WatchId) -> Option<&Path> {
        self.registry.get(id).map(Watch::directory)
    }

    /// Tracked files of one watch, sorted; empty for unknown ids.
    pub fn tracked_files(&self, id: WatchId) -> Vec<PathBuf> {
        self.registry
            .get(id)
            .map(Watch::tracked_files)
            .unwrap_or_default()
    }

    /// Total tracked files across all watches.
    pub fn tracked_count(&self) -> usize {
        self.registry.iter().map(Watch::len).sum()
    }

    /// Descriptors currently open: one per tracked file plus one per watch.
    pub fn open_handles(&self) -> usize {
        debug_assert_eq!(self.registrar.open_handles(), self.registrar.live_tokens());
        self.registrar.open_handles()
    }

    pub fn directory_token(&self, id: WatchId) -> Option<Token> {
        self.registry.get(id).and_then(Watch::directory_token)
    }

    pub fn entry_token(&self, id: WatchId, path: &Path) -> Option<Token> {
        self.registry
            .get(id)
            .and_then(|watch| watch.entry(path))
            .map(|entry| entry.token())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for constructing a [`DirectoryWatcher`].
pub struct DirectoryWatcherBuilder {
    multiplexer: Option<Box<dyn EventMultiplexer>>,
    poll_timeout: Duration,
    event_batch: usize,
}

impl DirectoryWatcherBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default().settings(&WatcherConfig::default())
    }

    /// Apply the `[watcher]` section of the settings.
    pub fn settings(mut self, config: &WatcherConfig) -> Self {
        self.poll_timeout = config.poll_timeout();
        self.event_batch = config.event_batch;
        self
    }

    /// How long the first poll of a tick may wait for events.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Maximum raw events read per poll call.
    pub fn event_batch(mut self, batch: usize) -> Self {
        self.event_batch = batch;
        self
    }

    /// Use a specific event queue instead of the system one.
    pub fn multiplexer(mut self, multiplexer: impl EventMultiplexer + 'static) -> Self {
        self.multiplexer = Some(Box::new(multiplexer));
        self
    }

    /// Build the watcher.
    pub fn build(self) -> Result<DirectoryWatcher> {
        let multiplexer = match self.multiplexer {
            Some(multiplexer) => multiplexer,
            None => system_multiplexer()?,
        };

        Ok(DirectoryWatcher {
            registry: WatchRegistry::new(),
            registrar: Registrar::new(multiplexer),
            tick: TickSettings {
                timeout: self.poll_timeout,
                batch: self.event_batch.max(1),
            },
        })
    }
}

impl Default for DirectoryWatcherBuilder {
    fn default() -> Self {
        Self {
            multiplexer: None,
            poll_timeout: Duration::ZERO,
            event_batch: 32,
        }
    }
}
