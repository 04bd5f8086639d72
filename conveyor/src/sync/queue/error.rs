use std::fmt;

use thiserror::Error;

/// Error returned by [`Queue::pull`](super::Queue::pull).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PullError {
    /// No item arrived before the timeout. The queue is unchanged.
    #[error("timed out waiting for an item")]
    Timeout,
    /// The queue is closed and drained; no item will ever arrive.
    #[error("queue is closed and empty")]
    Closed,
}

/// Error returned by [`Queue::push`](super::Queue::push).
///
/// The rejected item is handed back to the caller.
#[derive(Clone, PartialEq, Eq, Error)]
pub enum PushError<T> {
    /// No space became available before the timeout.
    #[error("timed out waiting for free space")]
    Timeout(T),
    /// The queue is closed and accepts no new items.
    #[error("queue is closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recovers the item that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            Self::Timeout(item) | Self::Closed(item) => item,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

// Payloads are opaque; don't require `T: Debug` just to unwrap a push.
impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("Timeout(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}
