//! In-process event queue driven by hand.
//!
//! Behaves like a kqueue with one-shot vnode registrations: an event is
//! only queued for an armed registration, is filtered by the registered
//! interest, coalesces with an undelivered event for the same descriptor,
//! and disarms the registration once delivered. Nothing blocks; `poll`
//! returns whatever is queued.
//!
//! The queue is fed through a [`ManualQueueHandle`], which stays usable
//! after the multiplexer itself is moved into a watcher.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{EventMultiplexer, RawEvent};
use crate::watcher::flags::VnodeFlags;
use crate::watcher::token::Token;

#[derive(Debug)]
struct Registration {
    token: Token,
    interest: VnodeFlags,
    armed: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    registrations: HashMap<RawFd, Registration>,
    pending: VecDeque<(RawFd, RawEvent)>,
    injected: VecDeque<RawEvent>,
    poll_timeouts: Vec<Duration>,
    fail_polls: usize,
}

/// Event queue with no kernel behind it.
#[derive(Debug, Default)]
pub struct ManualMultiplexer {
    state: Arc<Mutex<QueueState>>,
}

/// Feeds and inspects a [`ManualMultiplexer`].
#[derive(Debug, Clone)]
pub struct ManualQueueHandle {
    state: Arc<Mutex<QueueState>>,
}

impl ManualMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for firing events into this queue.
    pub fn handle(&self) -> ManualQueueHandle {
        ManualQueueHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl ManualQueueHandle {
    /// Signal `flags` on the descriptor registered with `token`.
    ///
    /// Returns false when nothing was queued: the token is not registered,
    /// its registration already fired and was not renewed, or none of the
    /// flags are in its interest.
    pub fn fire(&self, token: Token, flags: VnodeFlags) -> bool {
        let mut state = self.state.lock();
        let Some((fd, interest)) = state
            .registrations
            .iter()
            .find(|(_, reg)| reg.token == token && reg.armed)
            .map(|(fd, reg)| (*fd, reg.interest))
        else {
            return false;
        };

        let flags = flags & interest;
        if flags.is_empty() {
            return false;
        }

        if let Some((_, queued)) = state.pending.iter_mut().find(|(queued_fd, _)| *queued_fd == fd) {
            queued.flags |= flags;
        } else {
            state.pending.push_back((fd, RawEvent { token, flags }));
        }
        true
    }

    /// Queue an event as-is, bypassing registrations.
    ///
    /// Used to deliver payloads the kernel could still hand out after a
    /// registration changed, such as a token whose entry is gone.
    pub fn inject(&self, event: RawEvent) {
        self.state.lock().injected.push_back(event);
    }

    /// Make the next `count` polls fail.
    pub fn fail_next_polls(&self, count: usize) {
        self.state.lock().fail_polls = count;
    }

    /// Number of descriptors with a registration, armed or not.
    pub fn registered(&self) -> usize {
        self.state.lock().registrations.len()
    }

    /// Number of registrations that can still fire.
    pub fn armed(&self) -> usize {
        self.state
            .lock()
            .registrations
            .values()
            .filter(|reg| reg.armed)
            .count()
    }

    /// True when `token` has an armed registration.
    pub fn is_armed(&self, token: Token) -> bool {
        self.state
            .lock()
            .registrations
            .values()
            .any(|reg| reg.token == token && reg.armed)
    }

    /// Events queued but not yet polled.
    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.pending.len() + state.injected.len()
    }

    /// Timeouts passed to every poll so far, in call order.
    pub fn poll_timeouts(&self) -> Vec<Duration> {
        self.state.lock().poll_timeouts.clone()
    }
}

impl EventMultiplexer for ManualMultiplexer {
    fn register(&mut self, fd: RawFd, token: Token, interest: VnodeFlags) -> io::Result<()> {
        let mut state = self.state.lock();
        state.registrations.insert(
            fd,
            Registration {
                token,
                interest,
                armed: true,
            },
        );
        Ok(())
    }

    fn deregister(&mut self, fd: RawFd) -> io::Result<()> {
        let mut state = self.state.lock();
        state.registrations.remove(&fd);
        state.pending.retain(|(queued_fd, _)| *queued_fd != fd);
        Ok(())
    }

    fn poll(
        &mut self,
        events: &mut Vec<RawEvent>,
        max: usize,
        timeout: Duration,
    ) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.poll_timeouts.push(timeout);

        if state.fail_polls > 0 {
            state.fail_polls -= 1;
            return Err(io::Error::other("injected poll failure"));
        }

        let max = max.max(1);
        let mut delivered = 0;
        while delivered < max {
            if let Some(event) = state.injected.pop_front() {
                events.push(event);
            } else if let Some((fd, event)) = state.pending.pop_front() {
                if let Some(reg) = state.registrations.get_mut(&fd) {
                    reg.armed = false;
                }
                events.push(event);
            } else {
                break;
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}
