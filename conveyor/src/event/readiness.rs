//! Binary-state readiness descriptor backed by a Linux eventfd.
//!
//! The eventfd counter is only ever 0 (not ready) or 1 (ready). The queue
//! writes 1 when its predicate becomes true and drains the counter when it
//! becomes false, always while holding the queue lock, so the descriptor
//! never disagrees with occupancy.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::Arc;

use mio::event::Source;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use rustix::event::{EventfdFlags, PollFd, PollFlags, eventfd, poll};
use rustix::io::Errno;
use rustix::time::Timespec;

use crate::trace::warn;

/// Pollable handle that is readable exactly while a queue predicate holds.
///
/// Obtained from [`Queue::read_readiness`](crate::Queue::read_readiness)
/// ("has items") or [`Queue::write_readiness`](crate::Queue::write_readiness)
/// ("has space"). Clones share the same descriptor.
///
/// Never read from the descriptor directly: consuming the counter would
/// desynchronize it from the queue. Wait for readability, then call the
/// non-blocking queue operation.
///
/// # Edge-triggered loops
///
/// [`mio`] registers descriptors edge-triggered. After a readable event,
/// keep calling `try_pull` (or `try_push`) until it reports a timeout,
/// otherwise a later event may never arrive.
#[derive(Clone)]
pub struct Readiness {
    fd: Arc<OwnedFd>,
}

impl Readiness {
    /// Creates a non-blocking eventfd whose initial state is `ready`.
    pub(crate) fn new(ready: bool) -> io::Result<Self> {
        let fd = eventfd(
            u32::from(ready),
            EventfdFlags::CLOEXEC | EventfdFlags::NONBLOCK,
        )?;
        Ok(Self { fd: Arc::new(fd) })
    }

    /// Moves the descriptor to the readable state.
    ///
    /// Must only be called on a not-ready descriptor.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub(crate) fn assert(&self) {
        if let Err(err) = rustix::io::write(&*self.fd, &1u64.to_ne_bytes()) {
            warn!(fd = self.fd.as_raw_fd(), %err, "failed to assert readiness");
        }
    }

    /// Drains the counter so the descriptor stops being readable.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub(crate) fn deassert(&self) {
        let mut buf = [0u8; 8];
        match rustix::io::read(&*self.fd, &mut buf[..]) {
            Ok(_) | Err(Errno::AGAIN) => {}
            Err(err) => {
                warn!(fd = self.fd.as_raw_fd(), %err, "failed to clear readiness");
            }
        }
    }

    /// Reports whether the descriptor is currently readable, without
    /// blocking and without consuming the signal.
    ///
    /// # Errors
    ///
    /// Returns an error if `poll(2)` fails.
    pub fn is_ready(&self) -> io::Result<bool> {
        let zero = Timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        loop {
            let mut fds = [PollFd::new(&*self.fd, PollFlags::IN)];
            match poll(&mut fds, Some(&zero)) {
                Ok(0) => return Ok(false),
                Ok(_) => return Ok(fds[0].revents().contains(PollFlags::IN)),
                Err(Errno::INTR) => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness")
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}

impl AsFd for Readiness {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for Readiness {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Source for Readiness {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        SourceFd(&self.fd.as_raw_fd()).register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        SourceFd(&self.fd.as_raw_fd()).reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        SourceFd(&self.fd.as_raw_fd()).deregister(registry)
    }
}
