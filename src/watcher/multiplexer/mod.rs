//! Event queue abstraction.
//!
//! One [`EventMultiplexer`] per watcher carries every registration: the
//! directory slot of each watch plus one descriptor per tracked file.
//! Registrations are one-shot; the pump renews each one after it fires.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::RawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use super::flags::VnodeFlags;
use super::token::Token;

#[cfg(all(
    target_pointer_width = "64",
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    )
))]
mod kqueue;
mod manual;

#[cfg(all(
    target_pointer_width = "64",
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    )
))]
pub use kqueue::KqueueMultiplexer;
pub use manual::{ManualMultiplexer, ManualQueueHandle};

/// One raw event as delivered by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// Back-reference stored at registration time.
    pub token: Token,
    /// Changes reported for the descriptor.
    pub flags: VnodeFlags,
}

/// A kernel-style event queue keyed by open descriptors.
pub trait EventMultiplexer: Send {
    /// Add or renew a one-shot registration for `fd`.
    fn register(&mut self, fd: RawFd, token: Token, interest: VnodeFlags) -> io::Result<()>;

    /// Drop any registration for `fd`. Must be called before `fd` is closed.
    fn deregister(&mut self, fd: RawFd) -> io::Result<()>;

    /// Wait up to `timeout` and append at most `max` events to `events`.
    ///
    /// Returns the number of records the queue handed out, which can exceed
    /// the events appended when some records carry errors. Zero means the
    /// queue had nothing.
    fn poll(
        &mut self,
        events: &mut Vec<RawEvent>,
        max: usize,
        timeout: Duration,
    ) -> io::Result<usize>;
}

impl<M: EventMultiplexer + ?Sized> EventMultiplexer for Box<M> {
    fn register(&mut self, fd: RawFd, token: Token, interest: VnodeFlags) -> io::Result<()> {
        (**self).register(fd, token, interest)
    }

    fn deregister(&mut self, fd: RawFd) -> io::Result<()> {
        (**self).deregister(fd)
    }

    fn poll(
        &mut self,
        events: &mut Vec<RawEvent>,
        max: usize,
        timeout: Duration,
    ) -> io::Result<usize> {
        (**self).poll(events, max, timeout)
    }
}

/// Open a read-only, non-blocking descriptor used only to receive events.
pub(crate) fn open_event_handle(path: &Path) -> io::Result<File> {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    let flags = libc::O_NONBLOCK | libc::O_EVTONLY;
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    let flags = libc::O_NONBLOCK;

    OpenOptions::new().read(true).custom_flags(flags).open(path)
}

/// The kernel event queue for this target.
#[cfg(all(
    target_pointer_width = "64",
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    )
))]
pub fn system_multiplexer() -> super::Result<Box<dyn EventMultiplexer>> {
    Ok(Box::new(KqueueMultiplexer::new()?))
}

/// The kernel event queue for this target.
#[cfg(not(all(
    target_pointer_width = "64",
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd"
    )
)))]
pub fn system_multiplexer() -> super::Result<Box<dyn EventMultiplexer>> {
    Err(super::WatchError::Unsupported {
        reason: "kqueue is not available on this target (64-bit BSD or Apple only)".to_string(),
    })
}
