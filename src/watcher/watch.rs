//! Per-directory watch state: the directory registration and tracked files.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::error::{Result, WatchError};
use super::flags::VnodeFlags;
use super::handler::{Action, WatchId, WatchListener};
use super::reconcile::list_regular_files;
use super::registrar::{Handle, Registrar, Target};
use super::token::Token;

/// Device and inode pair naming the file behind a descriptor.
pub(crate) type FileIdentity = (u64, u64);

/// One tracked regular file.
#[derive(Debug)]
pub struct Entry {
    path: PathBuf,
    watch_id: WatchId,
    modified: SystemTime,
    identity: FileIdentity,
    handle: Handle,
}

impl Entry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Watch this entry belongs to.
    pub fn watch_id(&self) -> WatchId {
        self.watch_id
    }

    /// Last observed modification time.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Token carried by this entry's events.
    pub fn token(&self) -> Token {
        self.handle.token()
    }
}

/// One watched directory.
pub struct Watch {
    id: WatchId,
    directory: PathBuf,
    listener: Arc<dyn WatchListener>,
    directory_handle: Option<Handle>,
    entries: BTreeMap<PathBuf, Entry>,
    pending_rescan: bool,
}

impl Watch {
    /// Register the directory and track every regular file in it.
    ///
    /// The initial population emits no notifications.
    pub(crate) fn open(
        id: WatchId,
        directory: PathBuf,
        listener: Arc<dyn WatchListener>,
        registrar: &mut Registrar,
    ) -> Result<Self> {
        let mut watch = Self {
            id,
            directory,
            listener,
            directory_handle: None,
            entries: BTreeMap::new(),
            pending_rescan: false,
        };

        if let Err(e) = watch.add_all(registrar) {
            watch.release(registrar, false);
            return Err(e);
        }
        Ok(watch)
    }

    fn add_all(&mut self, registrar: &mut Registrar) -> Result<()> {
        let handle = registrar
            .open(
                &self.directory,
                Target::Directory(self.id),
                VnodeFlags::DIRECTORY_INTEREST,
            )
            .map_err(|e| open_error(&self.directory, e, true))?;
        self.directory_handle = Some(handle);

        let files = list_regular_files(&self.directory)
            .map_err(|e| WatchError::directory_not_found(&self.directory, e))?;

        for path in files {
            if let Err(e) = self.add_file(&path, false, registrar) {
                if matches!(e, WatchError::ResourceExhausted { .. }) {
                    return Err(e);
                }
                tracing::warn!("[watcher] skipping {}: {e}", path.display());
                if e.is_vanished() {
                    self.pending_rescan = true;
                }
            }
        }

        crate::debug_event!(
            "watcher",
            "watching",
            "{} ({} files)",
            self.directory.display(),
            self.entries.len()
        );
        Ok(())
    }

    /// Start tracking `path`, notifying `Added` when `emit` is set.
    pub(crate) fn add_file(
        &mut self,
        path: &Path,
        emit: bool,
        registrar: &mut Registrar,
    ) -> Result<()> {
        if self.entries.contains_key(path) {
            crate::debug_event!("watcher", "already tracked", "{}", path.display());
            return Ok(());
        }

        let target = Target::Entry {
            watch_id: self.id,
            path: path.to_path_buf(),
        };
        let handle = registrar
            .open(path, target, VnodeFlags::FILE_INTEREST)
            .map_err(|e| open_error(path, e, false))?;

        // Stat through the descriptor so the time belongs to the file we hold
        let metadata = match handle.file().metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                registrar.close(handle);
                return Err(WatchError::file_not_found(path, e));
            }
        };

        self.entries.insert(
            path.to_path_buf(),
            Entry {
                path: path.to_path_buf(),
                watch_id: self.id,
                modified: modified_time(&metadata),
                identity: (metadata.dev(), metadata.ino()),
                handle,
            },
        );

        if emit {
            self.notify(path, Action::Added);
        }
        Ok(())
    }

    /// Stop tracking `path`, notifying `Removed` when `emit` is set.
    pub(crate) fn remove_file(
        &mut self,
        path: &Path,
        emit: bool,
        registrar: &mut Registrar,
    ) -> Result<()> {
        let entry = self.entries.remove(path).ok_or_else(|| {
            WatchError::file_not_found(
                path,
                io::Error::new(io::ErrorKind::NotFound, "not tracked by this watch"),
            )
        })?;
        registrar.close(entry.handle);

        if emit {
            self.notify(path, Action::Removed);
        }
        Ok(())
    }

    /// Drop every entry and the directory registration.
    ///
    /// Notifies `Removed` for each tracked file.
    pub(crate) fn remove_all(&mut self, registrar: &mut Registrar) {
        self.release(registrar, true);
    }

    fn release(&mut self, registrar: &mut Registrar, emit: bool) {
        for (path, entry) in std::mem::take(&mut self.entries) {
            registrar.close(entry.handle);
            if emit {
                self.notify(&path, Action::Removed);
            }
        }
        if let Some(handle) = self.directory_handle.take() {
            registrar.close(handle);
        }
    }

    /// Re-stat a tracked file and notify `Modified` if its time moved.
    ///
    /// `Ok(false)` for untracked paths and unchanged times.
    pub(crate) fn check_modified(&mut self, path: &Path) -> Result<bool> {
        let Some(entry) = self.entries.get_mut(path) else {
            return Ok(false);
        };

        let metadata = fs::metadata(path).map_err(|e| WatchError::file_not_found(path, e))?;
        let modified = modified_time(&metadata);
        if modified == entry.modified {
            return Ok(false);
        }

        entry.modified = modified;
        self.notify(path, Action::Modified);
        Ok(true)
    }

    /// Swap in a fresh descriptor if `path` now names a different file.
    ///
    /// Returns true when the handle was replaced. `Modified` is notified
    /// if the replacement's time differs from the stored one.
    pub(crate) fn refresh_identity(
        &mut self,
        path: &Path,
        registrar: &mut Registrar,
    ) -> Result<bool> {
        let Some(entry) = self.entries.get(path) else {
            return Ok(false);
        };
        let on_disk =
            fs::symlink_metadata(path).map_err(|e| WatchError::file_not_found(path, e))?;
        if !on_disk.is_file() || (on_disk.dev(), on_disk.ino()) == entry.identity {
            return Ok(false);
        }

        let target = Target::Entry {
            watch_id: self.id,
            path: path.to_path_buf(),
        };
        let handle = registrar
            .open(path, target, VnodeFlags::FILE_INTEREST)
            .map_err(|e| open_error(path, e, false))?;
        let metadata = match handle.file().metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                registrar.close(handle);
                return Err(WatchError::file_not_found(path, e));
            }
        };

        let Some(entry) = self.entries.get_mut(path) else {
            registrar.close(handle);
            return Ok(false);
        };
        let old = std::mem::replace(&mut entry.handle, handle);
        registrar.close(old);
        entry.identity = (metadata.dev(), metadata.ino());

        let modified = modified_time(&metadata);
        if modified != entry.modified {
            entry.modified = modified;
            self.notify(path, Action::Modified);
        }
        Ok(true)
    }

    /// Renew the registration behind `token` if it still belongs to this watch.
    pub(crate) fn rearm(&self, token: Token, registrar: &mut Registrar) {
        let (handle, interest) = match registrar.resolve(token) {
            Some(Target::Directory(id)) if *id == self.id => {
                match self.directory_handle.as_ref() {
                    Some(handle) => (handle, VnodeFlags::DIRECTORY_INTEREST),
                    None => return,
                }
            }
            Some(Target::Entry { watch_id, path }) if *watch_id == self.id => {
                match self.entries.get(path) {
                    Some(entry) => (&entry.handle, VnodeFlags::FILE_INTEREST),
                    None => return,
                }
            }
            _ => return,
        };

        // A replaced handle has a new token and is registered already
        if handle.token() != token {
            return;
        }
        if let Err(e) = registrar.rearm(handle, interest) {
            tracing::warn!("[watcher] failed to renew registration {token}: {e}");
        }
    }

    pub(crate) fn notify(&self, path: &Path, action: Action) {
        crate::debug_event!("watcher", action, "{}", path.display());
        self.listener
            .on_change(self.id, &self.directory, path, action);
    }

    pub(crate) fn schedule_rescan(&mut self) {
        self.pending_rescan = true;
    }

    pub(crate) fn take_pending_rescan(&mut self) -> bool {
        std::mem::take(&mut self.pending_rescan)
    }

    pub(crate) fn entries(&self) -> &BTreeMap<PathBuf, Entry> {
        &self.entries
    }

    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn entry(&self, path: &Path) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Paths of all tracked files, sorted.
    pub fn tracked_files(&self) -> Vec<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    /// Token of the directory registration.
    pub fn directory_token(&self) -> Option<Token> {
        self.directory_handle.as_ref().map(Handle::token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn modified_time(metadata: &fs::Metadata) -> SystemTime {
    metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH)
}

fn open_error(path: &Path, err: io::Error, directory: bool) -> WatchError {
    if matches!(err.raw_os_error(), Some(libc::EMFILE | libc::ENFILE | libc::ENOMEM)) {
        return WatchError::ResourceExhausted {
            reason: format!("cannot open {}: {err}", path.display()),
        };
    }
    if directory {
        WatchError::directory_not_found(path, err)
    } else {
        WatchError::file_not_found(path, err)
    }
}
