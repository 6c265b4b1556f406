//! Per-file change notifications for watched directories, built on a
//! kernel event queue that only reports coarse per-descriptor changes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dirwatch::{ChannelListener, DirectoryWatcher};
//!
//! # fn main() -> dirwatch::Result<()> {
//! let mut watcher = DirectoryWatcher::create()?;
//! let (listener, rx) = ChannelListener::new();
//! watcher.add_watch("/tmp/w", Arc::new(listener))?;
//!
//! loop {
//!     watcher.pump();
//!     for n in rx.try_iter() {
//!         println!("{} {}", n.action, n.file.display());
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(250));
//! }
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod logging;
pub mod watcher;

pub use config::Settings;
pub use watcher::{
    Action, ChannelListener, DirectoryWatcher, DirectoryWatcherBuilder, EventMultiplexer,
    ManualMultiplexer, ManualQueueHandle, Notification, PumpStats, RecursiveMode, Result,
    VnodeFlags, WatchError, WatchId, WatchListener,
};
