//! Readiness descriptors for event-loop integration.
//!
//! Currently eventfd-based; a [`Readiness`] can be registered with
//! [`mio::Poll`] or handed to any `poll(2)`/`epoll(7)` loop as a raw fd.

pub mod readiness;

pub use readiness::Readiness;
