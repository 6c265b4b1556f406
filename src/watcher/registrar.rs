//! Descriptor ownership and registration bookkeeping.
//!
//! Every descriptor the watcher opens goes through [`Registrar::open`] and
//! comes back through [`Registrar::close`], which is the only place a
//! [`Handle`] is consumed. The open/close counters are what
//! `DirectoryWatcher::open_handles` reports.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::flags::VnodeFlags;
use super::handler::WatchId;
use super::multiplexer::{EventMultiplexer, RawEvent, open_event_handle};
use super::token::{Token, TokenTable};

/// What a registration's token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// The watched directory itself (slot 0 of a watch).
    Directory(WatchId),
    /// A tracked regular file.
    Entry { watch_id: WatchId, path: PathBuf },
}

/// An open descriptor plus the token its events carry.
#[derive(Debug)]
pub(crate) struct Handle {
    file: File,
    token: Token,
}

impl Handle {
    pub(crate) fn token(&self) -> Token {
        self.token
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

pub(crate) struct Registrar {
    mux: Box<dyn EventMultiplexer>,
    tokens: TokenTable<Target>,
    opened: usize,
    closed: usize,
}

impl Registrar {
    pub(crate) fn new(mux: Box<dyn EventMultiplexer>) -> Self {
        Self {
            mux,
            tokens: TokenTable::new(),
            opened: 0,
            closed: 0,
        }
    }

    /// Open `path` for events and register it.
    ///
    /// Nothing is counted or left registered if either step fails.
    pub(crate) fn open(
        &mut self,
        path: &Path,
        target: Target,
        interest: VnodeFlags,
    ) -> io::Result<Handle> {
        let file = open_event_handle(path)?;
        let token = self.tokens.insert(target);
        if let Err(err) = self.mux.register(file.as_raw_fd(), token, interest) {
            self.tokens.remove(token);
            return Err(err);
        }
        self.opened += 1;
        Ok(Handle { file, token })
    }

    /// Renew a one-shot registration after it fired.
    pub(crate) fn rearm(&mut self, handle: &Handle, interest: VnodeFlags) -> io::Result<()> {
        self.mux.register(handle.fd(), handle.token, interest)
    }

    /// Deregister, invalidate the token and close the descriptor.
    pub(crate) fn close(&mut self, handle: Handle) {
        if let Err(err) = self.mux.deregister(handle.fd()) {
            crate::debug_event!("registrar", "deregister failed", "fd {}: {err}", handle.fd());
        }
        self.tokens.remove(handle.token);
        self.closed += 1;
        drop(handle.file);
    }

    pub(crate) fn resolve(&self, token: Token) -> Option<&Target> {
        self.tokens.get(token)
    }

    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<RawEvent>,
        max: usize,
        timeout: Duration,
    ) -> io::Result<usize> {
        self.mux.poll(events, max, timeout)
    }

    /// Descriptors opened and not yet closed.
    pub(crate) fn open_handles(&self) -> usize {
        self.opened - self.closed
    }

    /// Tokens that still resolve. Equal to `open_handles` at rest.
    pub(crate) fn live_tokens(&self) -> usize {
        self.tokens.len()
    }
}
