//! Optional tracing for queue lifecycle events.
//!
//! Build with `--features tracing` to route close, purge, descriptor and
//! teardown events through the `tracing` crate. Without the feature every
//! macro below expands to an empty block, so the hot push/pull paths carry no
//! logging cost.

/// Installs a `tracing` subscriber that prints queue events with thread ids.
///
/// The filter comes from `RUST_LOG` and falls back to `conveyor=trace`.
/// Does nothing unless the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conveyor=trace"));

    // Tests call this from several threads; a second install is not an error.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! discard {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use discard as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as warn;
