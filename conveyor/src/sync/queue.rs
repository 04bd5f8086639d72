//! Blocking MPMC queue with urgent priority, close/drain and readiness fds.
//!
//! A mutex-guarded store with two condition variables ("became non-empty",
//! "became non-full"), shared through cheap reference-counted handles.
//!
//! # Overview
//!
//! - [`Queue`] - Shared handle. `Clone` acquires a reference, `Drop` releases it
//! - [`QueueGuard`] - Scoped lock for running several operations atomically
//! - [`Timeout`] - How long push/pull may block
//! - [`Priority`] - Normal (FIFO, tail) or urgent (LIFO, head)
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use conveyor::sync::queue::{Priority, PullError, Queue, Timeout};
//!
//! let queue = Queue::new(16);
//! let consumer = queue.clone();
//!
//! let handle = std::thread::spawn(move || {
//!     let mut received = Vec::new();
//!     while let Ok(item) = consumer.pull(Timeout::Infinite) {
//!         received.push(item);
//!     }
//!     received
//! });
//!
//! queue.push(1, Priority::Normal, Duration::from_secs(1)).unwrap();
//! queue.push(2, Priority::Normal, Duration::from_secs(1)).unwrap();
//! queue.close();
//!
//! assert_eq!(handle.join().unwrap(), vec![1, 2]);
//! assert_eq!(queue.try_pull(), Err(PullError::Closed));
//! ```
//!
//! # Close and drain
//!
//! Closing is final. Pushes fail with `Closed` from then on, while pulls
//! keep returning buffered items until the queue is empty and only then
//! report `Closed`. Every blocked thread is woken by [`Queue::close`].
//!
//! # Teardown
//!
//! When the last handle is dropped, items still in the queue are handed to
//! the release hook given to [`Queue::with_release`] (or simply dropped),
//! and any readiness descriptor the queue still owns is closed. Teardown
//! does not close the queue first: by then nobody is left to observe it.

mod error;
pub(crate) mod store;

use std::fmt;
use std::io;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::event::Readiness;
use crate::trace::{debug, trace};

pub use error::{PullError, PushError};
use store::Store;

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration. Zero never blocks.
    Duration(Duration),
}

impl Timeout {
    /// Fail immediately instead of blocking.
    pub const IMMEDIATE: Self = Self::Duration(Duration::ZERO);

    /// Converts a signed millisecond count: negative waits forever, zero
    /// never blocks and positive values bound the wait.
    #[must_use]
    pub const fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            Self::Infinite
        } else {
            Self::Duration(Duration::from_millis(ms.unsigned_abs()))
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Where a pushed item lands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Appended at the tail; normal items are FIFO among themselves.
    #[default]
    Normal,
    /// Prepended at the head, so it is pulled before every item already
    /// queued. Urgent items are LIFO among themselves.
    Urgent,
}

impl Priority {
    /// Maps an integer level: anything above zero is urgent.
    #[must_use]
    pub const fn from_level(level: i32) -> Self {
        if level > 0 { Self::Urgent } else { Self::Normal }
    }
}

/// Configuration for a [`Queue`].
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    /// Maximum number of queued items. `0` means unbounded.
    pub capacity: usize,
    /// Name reported in `Debug` output and trace events.
    pub label: Option<String>,
}

impl From<usize> for QueueConfig {
    fn from(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

type ReleaseFn<T> = Box<dyn Fn(T) + Send + Sync>;

struct Shared<T> {
    store: Mutex<Store<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    release: Option<ReleaseFn<T>>,
    label: Option<String>,
}

/// Hands an item the queue still owns to the release hook, or drops it.
fn dispose<T>(release: Option<&ReleaseFn<T>>, item: T) {
    match release {
        Some(release) => release(item),
        None => drop(item),
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Last handle is gone: nobody can hold the lock any more.
        let store = self.store.get_mut();
        let mut purged = 0usize;
        while let Some(item) = store.remove() {
            dispose(self.release.as_ref(), item);
            purged += 1;
        }
        if purged > 0 {
            debug!(label = ?self.label, purged, "queue torn down with resident items");
        } else {
            trace!(label = ?self.label, "queue torn down");
        }
    }
}

/// Shared handle to a blocking queue.
///
/// Cloning a handle acquires a reference and is how a queue is handed to
/// another thread; dropping it releases the reference. The queue is torn
/// down exactly once, when the last handle goes away.
///
/// Every method locks the queue for the duration of the call. Use
/// [`Queue::lock`] to run several operations under one lock.
pub struct Queue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Queue<T> {
    /// Creates a queue holding at most `capacity` items (`0` = unbounded).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_config(QueueConfig::from(capacity))
    }

    /// Creates a queue without a capacity limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    #[must_use]
    pub fn with_config(config: QueueConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a queue that passes every item it still owns at purge or
    /// teardown time to `release`.
    ///
    /// The hook runs while the queue lock is held and must not call back
    /// into the same queue.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use conveyor::sync::queue::{Priority, Queue};
    ///
    /// let released = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&released);
    /// let queue = Queue::with_release(4, move |_: String| {
    ///     counter.fetch_add(1, Ordering::Relaxed);
    /// });
    ///
    /// queue.try_push("a".to_string(), Priority::Normal).unwrap();
    /// queue.try_push("b".to_string(), Priority::Normal).unwrap();
    /// drop(queue);
    ///
    /// assert_eq!(released.load(Ordering::Relaxed), 2);
    /// ```
    #[must_use]
    pub fn with_release<F>(capacity: usize, release: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::with_config_and_release(QueueConfig::from(capacity), release)
    }

    /// Like [`Queue::with_release`], taking a full [`QueueConfig`].
    #[must_use]
    pub fn with_config_and_release<F>(config: QueueConfig, release: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(config, Some(Box::new(release)))
    }

    fn build(config: QueueConfig, release: Option<ReleaseFn<T>>) -> Self {
        trace!(label = ?config.label, capacity = config.capacity, "queue created");
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(Store::new(config.capacity)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                release,
                label: config.label,
            }),
        }
    }

    /// Acquires the queue lock.
    ///
    /// The returned guard exposes the same operations as the handle, all
    /// running under this single acquisition. The lock is released when the
    /// guard is dropped.
    pub fn lock(&self) -> QueueGuard<'_, T> {
        QueueGuard {
            shared: &self.shared,
            store: self.shared.store.lock(),
        }
    }

    /// Pushes an item, waiting for free space according to `timeout`.
    ///
    /// # Errors
    ///
    /// - [`PushError::Closed`] if the queue is closed, or gets closed while waiting.
    /// - [`PushError::Timeout`] if the queue stayed full for the whole timeout.
    ///
    /// Either way the item is handed back.
    pub fn push(
        &self,
        item: T,
        priority: Priority,
        timeout: impl Into<Timeout>,
    ) -> Result<(), PushError<T>> {
        self.lock().push(item, priority, timeout)
    }

    /// Pushes an item only if there is space right now.
    ///
    /// # Errors
    ///
    /// See [`Queue::push`].
    pub fn try_push(&self, item: T, priority: Priority) -> Result<(), PushError<T>> {
        self.lock().try_push(item, priority)
    }

    /// Pulls the head item, waiting for one according to `timeout`.
    ///
    /// # Errors
    ///
    /// - [`PullError::Closed`] once the queue is closed and empty.
    /// - [`PullError::Timeout`] if no item arrived in time.
    pub fn pull(&self, timeout: impl Into<Timeout>) -> Result<T, PullError> {
        self.lock().pull(timeout)
    }

    /// Pulls the head item only if one is queued right now.
    ///
    /// # Errors
    ///
    /// See [`Queue::pull`].
    pub fn try_pull(&self) -> Result<T, PullError> {
        self.lock().try_pull()
    }

    /// Closes the queue and wakes every blocked thread. Idempotent.
    pub fn close(&self) {
        self.lock().close();
    }

    /// Removes every queued item, passing each to the release hook.
    /// Returns how many items were removed.
    pub fn purge(&self) -> usize {
        self.lock().purge()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Capacity limit, `None` for unbounded queues.
    #[must_use]
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.lock().capacity()
    }

    /// Number of live handles to this queue.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// Descriptor that is readable while the queue holds at least one item.
    ///
    /// Created on first call; later calls return the same descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the eventfd cannot be created.
    pub fn read_readiness(&self) -> io::Result<Readiness> {
        self.lock().read_readiness()
    }

    /// Descriptor that is readable while the queue has free space.
    ///
    /// Always readable for unbounded queues. Created on first call; later
    /// calls return the same descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the eventfd cannot be created.
    pub fn write_readiness(&self) -> io::Result<Readiness> {
        self.lock().write_readiness()
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Queue");
        d.field("label", &self.shared.label);
        // The formatting thread may itself hold a guard.
        match self.shared.store.try_lock() {
            Some(store) => d
                .field("capacity", &store.capacity())
                .field("len", &store.len())
                .field("closed", &store.is_closed()),
            None => d.field("store", &format_args!("<locked>")),
        };
        d.finish_non_exhaustive()
    }
}

/// Scoped lock over a [`Queue`].
///
/// Methods assume the lock is held, which the guard guarantees. Operations
/// that return without blocking are atomic with respect to each other:
///
/// ```
/// use conveyor::sync::queue::{Priority, Queue};
///
/// let queue = Queue::new(2);
/// {
///     let mut guard = queue.lock();
///     if !guard.is_full() {
///         guard.try_push("job", Priority::Normal).unwrap();
///     }
///     assert_eq!(guard.len(), 1);
/// }
/// assert_eq!(queue.try_pull(), Ok("job"));
/// ```
///
/// A push or pull that actually waits releases the lock while suspended,
/// exactly like a condition variable wait, so other threads may run in
/// between.
pub struct QueueGuard<'a, T> {
    shared: &'a Shared<T>,
    store: MutexGuard<'a, Store<T>>,
}

impl<T> QueueGuard<'_, T> {
    /// See [`Queue::push`].
    ///
    /// # Errors
    ///
    /// See [`Queue::push`].
    pub fn push(
        &mut self,
        item: T,
        priority: Priority,
        timeout: impl Into<Timeout>,
    ) -> Result<(), PushError<T>> {
        let mut deadline = Deadline::new(timeout.into());
        loop {
            if self.store.is_closed() {
                return Err(PushError::Closed(item));
            }
            if !self.store.is_full() {
                break;
            }
            if deadline.is_expired() {
                return Err(PushError::Timeout(item));
            }
            deadline.wait(&self.shared.not_full, &mut self.store);
        }

        self.store.insert(item, priority);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// See [`Queue::try_push`].
    ///
    /// # Errors
    ///
    /// See [`Queue::push`].
    pub fn try_push(&mut self, item: T, priority: Priority) -> Result<(), PushError<T>> {
        self.push(item, priority, Timeout::IMMEDIATE)
    }

    /// See [`Queue::pull`].
    ///
    /// # Errors
    ///
    /// See [`Queue::pull`].
    pub fn pull(&mut self, timeout: impl Into<Timeout>) -> Result<T, PullError> {
        let mut deadline = Deadline::new(timeout.into());
        loop {
            if let Some(item) = self.store.remove() {
                self.shared.not_full.notify_one();
                return Ok(item);
            }
            if self.store.is_closed() {
                return Err(PullError::Closed);
            }
            if deadline.is_expired() {
                return Err(PullError::Timeout);
            }
            deadline.wait(&self.shared.not_empty, &mut self.store);
        }
    }

    /// See [`Queue::try_pull`].
    ///
    /// # Errors
    ///
    /// See [`Queue::pull`].
    pub fn try_pull(&mut self) -> Result<T, PullError> {
        self.pull(Timeout::IMMEDIATE)
    }

    /// See [`Queue::close`].
    pub fn close(&mut self) {
        if self.store.close() {
            debug!(label = ?self.shared.label, len = self.store.len(), "queue closed");
            self.shared.not_empty.notify_all();
            self.shared.not_full.notify_all();
        }
    }

    /// See [`Queue::purge`].
    pub fn purge(&mut self) -> usize {
        let mut purged = 0;
        while let Ok(item) = self.try_pull() {
            dispose(self.shared.release.as_ref(), item);
            purged += 1;
        }
        if purged > 0 {
            debug!(label = ?self.shared.label, purged, "queue purged");
        }
        purged
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.store.is_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.store.capacity()
    }

    /// See [`Queue::read_readiness`].
    ///
    /// # Errors
    ///
    /// Returns an error if the eventfd cannot be created.
    pub fn read_readiness(&mut self) -> io::Result<Readiness> {
        self.store.read_readiness()
    }

    /// See [`Queue::write_readiness`].
    ///
    /// # Errors
    ///
    /// Returns an error if the eventfd cannot be created.
    pub fn write_readiness(&mut self) -> io::Result<Readiness> {
        self.store.write_readiness()
    }
}

/// Bounded-wait bookkeeping for a single push or pull call.
///
/// The absolute deadline is taken on the first wait and reused after every
/// wakeup, so spurious wakeups never extend the total wait.
struct Deadline {
    timeout: Timeout,
    at: Option<Instant>,
    expired: bool,
}

impl Deadline {
    fn new(timeout: Timeout) -> Self {
        Self {
            timeout,
            at: None,
            expired: timeout == Timeout::IMMEDIATE,
        }
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.expired
    }

    fn wait<S>(&mut self, cond: &Condvar, guard: &mut MutexGuard<'_, S>) {
        let at = match (self.timeout, self.at) {
            (Timeout::Infinite, _) => None,
            (_, Some(at)) => Some(at),
            (Timeout::Duration(d), None) => {
                self.at = Instant::now().checked_add(d);
                self.at
            }
        };
        match at {
            Some(at) => self.expired = cond.wait_until(guard, at).timed_out(),
            // Infinite, or a duration too large to represent as an instant.
            None => cond.wait(guard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn fifo_among_normal_priority() {
        let queue = Queue::new(0);
        queue.try_push("a", Priority::Normal).unwrap();
        queue.try_push("b", Priority::Normal).unwrap();

        assert_eq!(queue.try_pull(), Ok("a"));
        assert_eq!(queue.try_pull(), Ok("b"));
    }

    #[test]
    fn urgent_items_are_pulled_first() {
        let queue = Queue::new(0);
        queue.try_push("a", Priority::from_level(0)).unwrap();
        queue.try_push("b", Priority::from_level(1)).unwrap();
        queue.try_push("c", Priority::from_level(1)).unwrap();

        assert_eq!(queue.try_pull(), Ok("c"));
        assert_eq!(queue.try_pull(), Ok("b"));
        assert_eq!(queue.try_pull(), Ok("a"));
    }

    #[test]
    fn drain_then_closed() {
        let queue = Queue::new(4);
        queue.try_push('x', Priority::Normal).unwrap();
        queue.try_push('y', Priority::Normal).unwrap();
        queue.close();

        assert_eq!(queue.pull(Timeout::Infinite), Ok('x'));
        assert_eq!(queue.pull(Timeout::Infinite), Ok('y'));
        assert_eq!(queue.pull(Timeout::Infinite), Err(PullError::Closed));
    }

    #[test]
    fn push_after_close_returns_item() {
        let queue = Queue::new(0);
        queue.close();

        let err = queue
            .push(String::from("late"), Priority::Normal, Timeout::Infinite)
            .unwrap_err();
        assert!(err.is_closed());
        assert_eq!(err.into_inner(), "late");
        assert!(queue.is_empty());
    }

    #[test]
    fn close_is_idempotent() {
        let queue = Queue::new(2);
        queue.try_push(1, Priority::Normal).unwrap();

        queue.close();
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_pull(), Ok(1));
        assert_eq!(queue.try_pull(), Err(PullError::Closed));
    }

    #[test]
    fn non_blocking_probe_on_empty_queue() {
        let queue: Queue<u8> = Queue::new(1);
        let start = Instant::now();
        assert_eq!(queue.pull(Duration::ZERO), Err(PullError::Timeout));
        assert_eq!(queue.pull(Timeout::from_millis(0)), Err(PullError::Timeout));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn non_blocking_push_on_full_queue() {
        let queue = Queue::new(1);
        queue.try_push(1, Priority::Normal).unwrap();

        let err = queue.try_push(2, Priority::Urgent).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.into_inner(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn timed_pull_expires() {
        let queue: Queue<u8> = Queue::new(0);
        let start = Instant::now();
        assert_eq!(
            queue.pull(Duration::from_millis(50)),
            Err(PullError::Timeout)
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[test]
    fn timed_push_expires() {
        let queue = Queue::new(1);
        queue.try_push(0, Priority::Normal).unwrap();

        let start = Instant::now();
        let err = queue
            .push(1, Priority::Normal, Timeout::from_millis(30))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let queue = Queue::new(3);
        for i in 0..10 {
            let _ = queue.try_push(i, Priority::from_level(i % 2));
            assert!(queue.len() <= 3);
        }
        assert!(queue.is_full());
        assert_eq!(queue.capacity(), NonZeroUsize::new(3));
    }

    #[test]
    fn blocked_pull_is_woken_by_push() {
        let queue = Queue::new(1);
        let consumer = queue.clone();

        let handle = thread::spawn(move || consumer.pull(Timeout::Infinite));
        thread::sleep(Duration::from_millis(20));
        queue.try_push(42, Priority::Normal).unwrap();

        assert_eq!(handle.join().unwrap(), Ok(42));
    }

    #[test]
    fn close_wakes_blocked_pusher() {
        let queue = Queue::new(1);
        queue.try_push(0, Priority::Normal).unwrap();
        let producer = queue.clone();

        let handle = thread::spawn(move || producer.push(1, Priority::Normal, Timeout::Infinite));
        thread::sleep(Duration::from_millis(20));
        queue.close();

        let err = handle.join().unwrap().unwrap_err();
        assert!(err.is_closed());
        // Buffered item survives the close.
        assert_eq!(queue.try_pull(), Ok(0));
    }

    #[test]
    fn close_wakes_timed_puller() {
        let queue: Queue<u8> = Queue::new(1);
        let consumer = queue.clone();

        let handle = thread::spawn(move || consumer.pull(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        queue.close();

        assert_eq!(handle.join().unwrap(), Err(PullError::Closed));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn closed_is_monotonic_across_threads() {
        let queue: Queue<u8> = Queue::new(0);
        queue.close();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || (0..100).all(|_| queue.is_closed()))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn purge_invokes_release_hook() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let queue = Queue::with_release(0, move |n: usize| {
            counter.fetch_add(n, Ordering::Relaxed);
        });

        for n in [1, 2, 3] {
            queue.try_push(n, Priority::Normal).unwrap();
        }
        assert_eq!(queue.purge(), 3);
        assert_eq!(released.load(Ordering::Relaxed), 6);
        assert!(queue.is_empty());
        // Purge does not close.
        assert!(!queue.is_closed());
        assert_eq!(queue.purge(), 0);
    }

    #[test]
    fn purge_after_close_still_drains() {
        let queue = Queue::new(0);
        queue.try_push(1, Priority::Normal).unwrap();
        queue.close();
        assert_eq!(queue.purge(), 1);
        assert_eq!(queue.try_pull(), Err(PullError::Closed));
    }

    #[test]
    fn last_handle_releases_resident_items_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let first = Queue::with_release(8, move |_: Box<u32>| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let second = first.clone();
        assert_eq!(first.handle_count(), 2);

        first.try_push(Box::new(1), Priority::Normal).unwrap();
        first.try_push(Box::new(2), Priority::Normal).unwrap();
        drop(first);

        // Still usable through the remaining handle.
        assert_eq!(second.handle_count(), 1);
        assert_eq!(second.try_pull().map(|b| *b), Ok(1));
        second.try_push(Box::new(3), Priority::Normal).unwrap();
        assert_eq!(released.load(Ordering::Relaxed), 0);

        drop(second);
        assert_eq!(released.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn teardown_without_hook_drops_items() {
        let item = Arc::new(());
        let queue = Queue::new(0);
        queue.try_push(Arc::clone(&item), Priority::Normal).unwrap();
        assert_eq!(Arc::strong_count(&item), 2);

        drop(queue);
        assert_eq!(Arc::strong_count(&item), 1);
    }

    #[test]
    fn guard_batches_operations() {
        let queue = Queue::new(2);
        {
            let mut guard = queue.lock();
            guard.try_push(1, Priority::Normal).unwrap();
            guard.try_push(2, Priority::Normal).unwrap();
            assert!(guard.is_full());
            assert_eq!(guard.try_pull(), Ok(1));
            assert_eq!(guard.len(), 1);
            guard.close();
            assert!(guard.is_closed());
        }
        assert_eq!(queue.try_pull(), Ok(2));
        assert_eq!(queue.try_pull(), Err(PullError::Closed));
    }

    #[test]
    fn waiting_guard_lets_other_threads_in() {
        let queue = Queue::new(1);
        let producer = queue.clone();

        let mut guard = queue.lock();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            // Needs the lock the waiting guard gave up.
            producer.push(9u32, Priority::Normal, Timeout::Infinite)
        });

        assert_eq!(guard.pull(Timeout::Infinite), Ok(9));
        // Reacquired on wakeup: still holding the lock here.
        assert!(guard.is_empty());
        drop(guard);

        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn waiting_guard_push_lets_consumer_in() {
        let queue = Queue::new(1);
        queue.try_push(1u32, Priority::Normal).unwrap();
        let consumer = queue.clone();

        let mut guard = queue.lock();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            consumer.pull(Timeout::Infinite)
        });

        guard.push(2, Priority::Normal, Timeout::Infinite).unwrap();
        assert_eq!(guard.len(), 1);
        drop(guard);

        assert_eq!(handle.join().unwrap(), Ok(1));
        assert_eq!(queue.try_pull(), Ok(2));
    }

    #[test]
    fn guard_hides_intermediate_states() {
        let queue = Queue::new(0);
        let observer = queue.clone();
        let stop = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&stop);

        // Items always arrive and leave in pairs under one lock, so an
        // observer must never see an odd length.
        let handle = thread::spawn(move || {
            while done.load(Ordering::Relaxed) == 0 {
                assert_eq!(observer.len() % 2, 0);
            }
        });

        for i in 0..1_000 {
            let mut guard = queue.lock();
            guard.try_push(i, Priority::Normal).unwrap();
            guard.try_push(i, Priority::Urgent).unwrap();
            if i % 3 == 0 {
                guard.try_pull().unwrap();
                guard.try_pull().unwrap();
            }
        }
        stop.store(1, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn readiness_edges_for_capacity_one() {
        let queue = Queue::new(1);
        let read = queue.read_readiness().unwrap();
        let write = queue.write_readiness().unwrap();

        assert!(!read.is_ready().unwrap());
        assert!(write.is_ready().unwrap());

        queue.try_push((), Priority::Normal).unwrap();
        assert!(read.is_ready().unwrap());
        assert!(!write.is_ready().unwrap());

        queue.try_pull().unwrap();
        assert!(!read.is_ready().unwrap());
        assert!(write.is_ready().unwrap());
    }

    #[test]
    fn readiness_follows_purge() {
        let queue = Queue::new(2);
        queue.try_push(1, Priority::Normal).unwrap();
        queue.try_push(2, Priority::Normal).unwrap();
        let read = queue.read_readiness().unwrap();
        let write = queue.write_readiness().unwrap();
        assert!(read.is_ready().unwrap());
        assert!(!write.is_ready().unwrap());

        queue.purge();
        assert!(!read.is_ready().unwrap());
        assert!(write.is_ready().unwrap());
    }

    #[test]
    fn timeout_conversions() {
        assert_eq!(Timeout::from_millis(-1), Timeout::Infinite);
        assert_eq!(Timeout::from_millis(0), Timeout::IMMEDIATE);
        assert_eq!(
            Timeout::from_millis(250),
            Timeout::Duration(Duration::from_millis(250))
        );
        assert_eq!(
            Timeout::from(Duration::from_secs(1)),
            Timeout::Duration(Duration::from_secs(1))
        );
    }

    #[test]
    fn priority_levels() {
        assert_eq!(Priority::from_level(-3), Priority::Normal);
        assert_eq!(Priority::from_level(0), Priority::Normal);
        assert_eq!(Priority::from_level(1), Priority::Urgent);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn huge_timeout_does_not_overflow() {
        let queue = Queue::new(1);
        let consumer = queue.clone();
        let handle = thread::spawn(move || consumer.pull(Duration::MAX));
        thread::sleep(Duration::from_millis(20));
        queue.try_push(7, Priority::Normal).unwrap();
        assert_eq!(handle.join().unwrap(), Ok(7));
    }

    #[test]
    fn debug_shows_label_and_occupancy() {
        let queue = Queue::with_config(QueueConfig {
            capacity: 4,
            label: Some("jobs".into()),
        });
        queue.try_push(1u8, Priority::Normal).unwrap();

        let rendered = format!("{queue:?}");
        assert!(rendered.contains("jobs"), "{rendered}");
        assert!(rendered.contains("len: 1"), "{rendered}");
    }
}
