//! Directory rescan.
//!
//! The directory registration only says that membership changed, never
//! which child. A rescan lists the directory and diffs it against the
//! tracked entries: tracked paths missing from the listing are removed,
//! listed paths not yet tracked are added. Running it twice with no
//! change in between emits nothing the second time.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::WatchError;
use super::registrar::Registrar;
use super::watch::Watch;

/// Paths of the regular files directly inside `directory`.
///
/// Uses the listing's own file type, so symlinks are excluded along with
/// directories, devices, sockets and fifos.
pub(crate) fn list_regular_files(directory: &Path) -> io::Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in fs::read_dir(directory)? {
        let Ok(entry) = entry else {
            continue;
        };
        match entry.file_type() {
            Ok(file_type) if file_type.is_file() => {
                files.insert(directory.join(entry.file_name()));
            }
            _ => {}
        }
    }
    Ok(files)
}

/// What one rescan changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RescanOutcome {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Paths whose name now refers to a different file.
    pub replaced: Vec<PathBuf>,
}

impl RescanOutcome {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.replaced.is_empty()
    }

    /// Every path this rescan already settled.
    pub fn touched(&self) -> impl Iterator<Item = &PathBuf> {
        self.added
            .iter()
            .chain(self.removed.iter())
            .chain(self.replaced.iter())
    }
}

impl Watch {
    /// Bring the tracked entries in line with the directory listing.
    ///
    /// `suspects` are entries that reported a delete or rename; those that
    /// still list are checked for having been replaced under the same name.
    /// An unreadable directory counts as empty.
    pub(crate) fn rescan(
        &mut self,
        suspects: &BTreeSet<PathBuf>,
        registrar: &mut Registrar,
    ) -> RescanOutcome {
        let mut outcome = RescanOutcome::default();

        let live = match list_regular_files(self.directory()) {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(
                    "[watcher] cannot list {}, treating as empty: {e}",
                    self.directory().display()
                );
                BTreeSet::new()
            }
        };

        let gone: Vec<PathBuf> = self
            .entries()
            .keys()
            .filter(|path| !live.contains(*path))
            .cloned()
            .collect();
        for path in gone {
            match self.remove_file(&path, true, registrar) {
                Ok(()) => outcome.removed.push(path),
                Err(e) => tracing::warn!("[watcher] remove failed: {e}"),
            }
        }

        let fresh: Vec<PathBuf> = live
            .iter()
            .filter(|path| !self.entries().contains_key(*path))
            .cloned()
            .collect();
        for path in fresh {
            match self.add_file(&path, true, registrar) {
                Ok(()) => outcome.added.push(path),
                Err(e) => self.defer(&path, e),
            }
        }

        for path in suspects {
            if !live.contains(path) || outcome.added.contains(path) {
                continue;
            }
            match self.refresh_identity(path, registrar) {
                Ok(true) => outcome.replaced.push(path.clone()),
                Ok(false) => {}
                Err(e) => self.defer(path, e),
            }
        }

        outcome
    }

    /// Log a failed add; a vanished file gets another rescan next tick.
    fn defer(&mut self, path: &Path, err: WatchError) {
        if err.is_vanished() {
            crate::debug_event!("watcher", "vanished during rescan", "{}", path.display());
            self.schedule_rescan();
        } else {
            tracing::warn!("[watcher] cannot track {}: {err}", path.display());
        }
    }
}
