//! crates/logging/src/tracing_bridge.rs
//! Installs the process-wide `tracing` subscriber.
//!
//! Events are formatted by `tracing_subscriber::fmt` and written to stderr,
//! filtered by an [`EnvFilter`] derived from the selected [`Verbosity`]. A
//! non-empty `BOAT_LOG` replaces that filter with its own directives, e.g.
//! `BOAT_LOG=daemon=trace,repository=debug`.

use std::error::Error;
use std::fmt;

use tracing_subscriber::EnvFilter;

use super::verbosity::Verbosity;

/// Environment variable holding `EnvFilter` directives.
pub const LOG_ENV: &str = "BOAT_LOG";

/// A global subscriber was already installed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AlreadyInitialized;

impl fmt::Display for AlreadyInitialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a global tracing subscriber is already installed")
    }
}

impl Error for AlreadyInitialized {}

/// Builds the filter for `verbosity`, honouring `directives` when they parse.
///
/// Invalid directives fall back to the verbosity default.
#[must_use]
pub fn build_filter(verbosity: Verbosity, directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.directive()))
}

/// Installs the stderr subscriber for `verbosity`.
///
/// Only the first call in a process installs anything; later calls return
/// [`AlreadyInitialized`] and leave the existing subscriber in place.
///
/// # Example
///
/// ```
/// use logging::{Verbosity, init_tracing};
///
/// let _ = init_tracing(Verbosity::Verbose);
/// tracing::info!("visible at -v");
/// assert!(init_tracing(Verbosity::Debug).is_err());
/// ```
pub fn init_tracing(verbosity: Verbosity) -> Result<(), AlreadyInitialized> {
    let directives = std::env::var(LOG_ENV).ok();
    let filter = build_filter(verbosity, directives.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= Verbosity::Debug)
        .try_init()
        .map_err(|_| AlreadyInitialized)
}
