//! Ordered item store with occupancy tracking.
//!
//! The store knows nothing about locking or waiting; [`super::QueueGuard`]
//! owns the only path to it. Every mutation goes through [`Store::insert`]
//! or [`Store::remove`], which keep the readiness descriptors on the exact
//! edges of the occupancy predicates:
//!
//! ```text
//! read  descriptor: ready iff len > 0          (toggles at 0 <-> 1)
//! write descriptor: ready iff len < capacity   (toggles at capacity <-> capacity - 1)
//! ```

use std::collections::VecDeque;
use std::io;
use std::num::NonZeroUsize;

use super::Priority;
use crate::event::Readiness;
use crate::trace::debug;

pub(crate) struct Store<T> {
    items: VecDeque<T>,
    /// `None` means unbounded.
    capacity: Option<NonZeroUsize>,
    closed: bool,
    read: Option<Readiness>,
    write: Option<Readiness>,
}

impl<T> Store<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity);
        Self {
            // Bounded stores never grow past their capacity; small ones can
            // allocate it up front.
            items: match capacity {
                Some(cap) if cap.get() <= 1024 => VecDeque::with_capacity(cap.get()),
                _ => VecDeque::new(),
            },
            capacity,
            closed: false,
            read: None,
            write: None,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|cap| self.items.len() >= cap.get())
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the store closed. Returns `true` only on the first call.
    pub(crate) fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    /// Inserts an item. The caller has already checked that the store is
    /// neither full nor closed.
    pub(crate) fn insert(&mut self, item: T, priority: Priority) {
        debug_assert!(!self.is_full(), "insert into a full store");

        match priority {
            Priority::Urgent => self.items.push_front(item),
            Priority::Normal => self.items.push_back(item),
        }

        let len = self.items.len();
        if len == 1
            && let Some(read) = &self.read
        {
            read.assert();
        }
        if let (Some(cap), Some(write)) = (self.capacity, &self.write)
            && len == cap.get()
        {
            write.deassert();
        }
        self.check_invariant();
    }

    /// Removes the head item, if any.
    pub(crate) fn remove(&mut self) -> Option<T> {
        let item = self.items.pop_front()?;

        let len = self.items.len();
        if len == 0
            && let Some(read) = &self.read
        {
            read.deassert();
        }
        if let (Some(cap), Some(write)) = (self.capacity, &self.write)
            && len == cap.get() - 1
        {
            write.assert();
        }
        self.check_invariant();
        Some(item)
    }

    /// Returns the "has items" descriptor, creating it on first use.
    pub(crate) fn read_readiness(&mut self) -> io::Result<Readiness> {
        if let Some(read) = &self.read {
            return Ok(read.clone());
        }
        let read = Readiness::new(!self.is_empty())?;
        debug!(fd = ?read, len = self.len(), "created read readiness descriptor");
        self.read = Some(read.clone());
        Ok(read)
    }

    /// Returns the "has space" descriptor, creating it on first use.
    pub(crate) fn write_readiness(&mut self) -> io::Result<Readiness> {
        if let Some(write) = &self.write {
            return Ok(write.clone());
        }
        let write = Readiness::new(!self.is_full())?;
        debug!(fd = ?write, len = self.len(), "created write readiness descriptor");
        self.write = Some(write.clone());
        Ok(write)
    }

    #[inline]
    fn check_invariant(&self) {
        debug_assert!(
            self.capacity
                .is_none_or(|cap| self.items.len() <= cap.get()),
            "store holds {} items with capacity {:?}",
            self.items.len(),
            self.capacity
        );
    }
}
