//! Synchronization primitives for in-process communication.
//!
//! This module provides the blocking handoff queue shared between producer
//! and consumer threads of the same process.

pub mod queue;
