#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` turns the `-q`/`-v` flags of the Boat binaries into a
//! [`Verbosity`] and installs a `tracing` subscriber that prints to stderr.
//! Library crates only emit events through the `tracing` macros; this crate
//! is the one place that decides where they go.
//!
//! # Examples
//!
//! ```
//! use logging::Verbosity;
//!
//! let verbosity = Verbosity::from_verbose_level(2);
//! assert_eq!(verbosity, Verbosity::Debug);
//! assert_eq!(verbosity.directive(), "debug");
//! ```

mod tracing_bridge;
mod verbosity;

pub use tracing_bridge::{AlreadyInitialized, LOG_ENV, build_filter, init_tracing};
pub use verbosity::Verbosity;
