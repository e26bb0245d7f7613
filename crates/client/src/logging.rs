//! Logging setup.
//!
//! Library code logs through `tracing` macros. Binaries and tests that want
//! to see those events call [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "fnchat_client=debug";

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`].
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .try_init();
}
