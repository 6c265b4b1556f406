//! kqueue backend: `EVFILT_VNODE` registrations on open descriptors.
//!
//! The full 64-bit [`Token`] travels in `udata`, so this backend is only
//! built where pointers are 64 bits wide.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::time::Duration;

use super::{EventMultiplexer, RawEvent};
use crate::watcher::error::{Result, WatchError};
use crate::watcher::flags::VnodeFlags;
use crate::watcher::token::Token;

/// Wraps one kqueue descriptor. Closed on drop.
#[derive(Debug)]
pub struct KqueueMultiplexer {
    queue: OwnedFd,
}

impl KqueueMultiplexer {
    /// Allocate a new kernel event queue.
    pub fn new() -> Result<Self> {
        // SAFETY: kqueue takes no arguments and returns a new descriptor or -1.
        let fd = unsafe { libc::kqueue() };
        if fd < 0 {
            let err = io::Error::last_os_error();
            return Err(WatchError::ResourceExhausted {
                reason: format!("kqueue: {err}"),
            });
        }
        // SAFETY: fd was just returned by kqueue and is owned by nobody else.
        let queue = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { queue })
    }

    fn submit(&self, fd: RawFd, flags: u16, fflags: u32, udata: u64) -> io::Result<()> {
        // SAFETY: kevent is plain data; zeroed is a valid starting value on every BSD layout.
        let mut change: libc::kevent = unsafe { std::mem::zeroed() };
        change.ident = fd as libc::uintptr_t;
        change.filter = libc::EVFILT_VNODE as _;
        change.flags = flags as _;
        change.fflags = fflags as _;
        change.udata = udata as usize as *mut libc::c_void;

        // SAFETY: one valid change record, no event list, no timeout.
        let rc = unsafe {
            libc::kevent(
                self.queue.as_raw_fd(),
                &change,
                1,
                ptr::null_mut(),
                0,
                ptr::null(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl EventMultiplexer for KqueueMultiplexer {
    fn register(&mut self, fd: RawFd, token: Token, interest: VnodeFlags) -> io::Result<()> {
        let flags = (libc::EV_ADD | libc::EV_ENABLE | libc::EV_ONESHOT) as u16;
        self.submit(fd, flags, interest.bits(), token.into_raw())
    }

    fn deregister(&mut self, fd: RawFd) -> io::Result<()> {
        match self.submit(fd, libc::EV_DELETE as u16, 0, 0) {
            // A one-shot registration that already fired is gone
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => Ok(()),
            other => other,
        }
    }

    fn poll(
        &mut self,
        events: &mut Vec<RawEvent>,
        max: usize,
        timeout: Duration,
    ) -> io::Result<usize> {
        let max = max.max(1);
        let mut received: Vec<libc::kevent> = Vec::with_capacity(max);
        let wait = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as _,
        };

        // SAFETY: the event list has capacity for `max` records and kevent
        // writes at most that many.
        let count = unsafe {
            libc::kevent(
                self.queue.as_raw_fd(),
                ptr::null(),
                0,
                received.as_mut_ptr(),
                max as libc::c_int,
                &wait,
            )
        };
        if count < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        // SAFETY: kevent initialized the first `count` records.
        unsafe { received.set_len(count as usize) };

        collect_events(&received, events);
        Ok(received.len())
    }
}

/// Convert kernel records into [`RawEvent`]s, skipping `EV_ERROR` records.
fn collect_events(received: &[libc::kevent], events: &mut Vec<RawEvent>) {
    for event in received {
        if event.flags as u16 & libc::EV_ERROR as u16 != 0 {
            tracing::debug!(
                "[kqueue] error event for fd {}: {}",
                event.ident,
                io::Error::from_raw_os_error(event.data as i32)
            );
            continue;
        }
        events.push(RawEvent {
            token: Token::from_raw(event.udata as usize as u64),
            flags: VnodeFlags::from_bits_truncate(event.fflags as u32),
        });
    }
}
