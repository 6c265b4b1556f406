//! Listener trait and action types for the directory watcher.

use std::fmt;
use std::path::{Path, PathBuf};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Identifier of one watched directory.
///
/// Assigned from a counter starting at 1 and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to a file inside a watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// A regular file appeared.
    Added,
    /// A tracked file disappeared, or its watch was removed.
    Removed,
    /// A tracked file's modification time changed.
    Modified,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Added => "added",
            Action::Removed => "removed",
            Action::Modified => "modified",
        };
        f.write_str(name)
    }
}

/// Receives per-file notifications.
///
/// Called synchronously from inside `add_watch`, `remove_watch`, `pump`
/// and teardown, on the thread driving the watcher. Implementations must
/// not block and must not call back into the same watcher; queue the
/// notification instead (see [`ChannelListener`]).
pub trait WatchListener: Send + Sync {
    fn on_change(&self, watch_id: WatchId, directory: &Path, file: &Path, action: Action);
}

impl<F> WatchListener for F
where
    F: Fn(WatchId, &Path, &Path, Action) + Send + Sync,
{
    fn on_change(&self, watch_id: WatchId, directory: &Path, file: &Path, action: Action) {
        self(watch_id, directory, file, action)
    }
}

/// Owned copy of one listener call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub watch_id: WatchId,
    pub directory: PathBuf,
    pub file: PathBuf,
    pub action: Action,
}

/// Listener that queues notifications on a channel.
///
/// Lets the consumer drain notifications outside the watcher's call stack,
/// or on another thread.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<Notification>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its queue.
    pub fn new() -> (Self, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl WatchListener for ChannelListener {
    fn on_change(&self, watch_id: WatchId, directory: &Path, file: &Path, action: Action) {
        let notification = Notification {
            watch_id,
            directory: directory.to_path_buf(),
            file: file.to_path_buf(),
            action,
        };
        if self.tx.send(notification).is_err() {
            tracing::warn!("[watcher] notification dropped, receiver closed");
        }
    }
}
