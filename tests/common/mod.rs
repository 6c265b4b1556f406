//! Shared fixtures for the watcher integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crossbeam_channel::Receiver;
use dirwatch::{
    Action, ChannelListener, DirectoryWatcher, ManualMultiplexer, ManualQueueHandle, Notification,
    WatchId,
};
use filetime::FileTime;
use tempfile::TempDir;

/// A watcher on a hand-driven queue plus everything needed to poke it.
pub struct Fixture {
    pub dir: TempDir,
    pub watcher: DirectoryWatcher,
    pub queue: ManualQueueHandle,
    pub listener: Arc<ChannelListener>,
    pub rx: Receiver<Notification>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mux = ManualMultiplexer::new();
        let queue = mux.handle();
        let watcher = DirectoryWatcher::builder().multiplexer(mux).build().unwrap();
        let (listener, rx) = ChannelListener::new();
        Self {
            dir,
            watcher,
            queue,
            listener: Arc::new(listener),
            rx,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn watch_root(&mut self) -> WatchId {
        let root = self.dir.path().to_path_buf();
        self.watcher.add_watch(root, self.listener.clone()).unwrap()
    }

    /// Signal a change on the watched directory itself.
    pub fn fire_dir(&self, id: WatchId, flags: dirwatch::VnodeFlags) -> bool {
        let token = self.watcher.directory_token(id).unwrap();
        self.queue.fire(token, flags)
    }

    /// Signal a change on a tracked file.
    pub fn fire_file(&self, id: WatchId, name: &str, flags: dirwatch::VnodeFlags) -> bool {
        let token = self.watcher.entry_token(id, &self.path(name)).unwrap();
        self.queue.fire(token, flags)
    }

    /// Drain notifications as `(action, file name)` pairs in delivery order.
    pub fn take(&self) -> Vec<(Action, String)> {
        self.rx.try_iter().map(|n| (n.action, file_name(&n.file))).collect()
    }

    /// Like [`take`](Self::take), sorted by file name then action.
    pub fn take_sorted(&self) -> Vec<(Action, String)> {
        let mut seen = self.take();
        seen.sort_by(|a, b| a.1.cmp(&b.1).then(action_rank(a.0).cmp(&action_rank(b.0))));
        seen
    }

    pub fn tracked_names(&self, id: WatchId) -> Vec<String> {
        self.watcher
            .tracked_files(id)
            .iter()
            .map(|p| file_name(p))
            .collect()
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

fn action_rank(action: Action) -> u8 {
    match action {
        Action::Added => 0,
        Action::Removed => 1,
        Action::Modified => 2,
    }
}

pub fn write(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

/// Give `path` an mtime `secs` seconds after a fixed base, so two calls
/// with different offsets always produce different timestamps.
pub fn set_mtime(path: &Path, secs: u64) {
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000 + secs);
    filetime::set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
}
