//! Directory change notifications on top of a coarse kernel event queue.
//!
//! kqueue reports that a descriptor was written, extended, renamed,
//! deleted or had attributes changed. It never says which child of a
//! directory came or went. This module keeps one open descriptor per
//! regular file in each watched directory and turns those coarse flags
//! into per-file `Added` / `Removed` / `Modified` notifications.
//!
//! # Architecture
//!
//! ```text
//! DirectoryWatcher
//!   - WatchRegistry (WatchId -> Watch)
//!   - Registrar
//!       - EventMultiplexer (one queue for all watches)
//!       - TokenTable (token -> directory slot or entry)
//!         |
//!    +---------+---------+
//!    |         |         |
//!  Watch     Watch     Watch
//!  dir slot + one Entry per regular file
//! ```
//!
//! `pump` drains the queue, resolves each event's token back to its
//! watch and entry, rescans directories whose membership may have
//! changed, and re-stats files that were written.
//!
//! Only one directory level is watched.

mod engine;
mod error;
mod flags;
mod handler;
pub mod multiplexer;
mod pump;
mod reconcile;
mod registrar;
mod registry;
mod token;
mod watch;

pub use engine::{DirectoryWatcher, DirectoryWatcherBuilder, RecursiveMode};
pub use error::{Result, WatchError};
pub use flags::VnodeFlags;
pub use handler::{Action, ChannelListener, Notification, WatchId, WatchListener};
pub use multiplexer::{EventMultiplexer, ManualMultiplexer, ManualQueueHandle, RawEvent};
pub use pump::PumpStats;
pub use reconcile::RescanOutcome;
pub use registry::WatchRegistry;
pub use token::{Token, TokenTable};
pub use watch::{Entry, Watch};
