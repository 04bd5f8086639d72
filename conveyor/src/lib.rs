//! Blocking producer/consumer queue for threads, with urgent priority,
//! close/drain semantics and pollable readiness descriptors.
//!
//! Threads can use the queue directly (blocking [`Queue::push`] and
//! [`Queue::pull`] with timeouts) or from an event loop, by polling the
//! descriptors returned by [`Queue::read_readiness`] and
//! [`Queue::write_readiness`] and then calling the non-blocking variants.
//! Both styles can be mixed on the same queue.

pub mod event;
pub mod sync;

mod trace;

pub use trace::init_tracing;

#[doc(inline)]
pub use event::Readiness;

#[doc(inline)]
pub use sync::queue::{
    Priority, PullError, PushError, Queue, QueueConfig, QueueGuard, Timeout,
};
