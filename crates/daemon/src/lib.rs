#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `daemon` is the server side of the Boat upload protocol. It accepts TCP
//! connections, authenticates users with an HMAC challenge, negotiates each
//! upload, receives the payload and publishes it into the user's repository
//! through the [`repository`] crate.
//!
//! # Design
//!
//! - [`ServerConfig`] is parsed from an INI-style `boat.conf` with global
//!   listener settings and one `[username]` section per user.
//!   [`ConfigHandle`] shares the active configuration between connections and
//!   swaps it atomically on reload; users already logged in keep the record
//!   they authenticated with. The line syntax itself ([`scan_ini`]) is shared
//!   with the client's `.boat.conf`.
//! - [`ConnectionHandler`] is the seam between transport and protocol. The
//!   driver ([`drive`]) owns framing and timeouts and feeds the handler lines
//!   and payload chunks; the handler answers with a [`Response`] naming the
//!   replies and what to read next.
//! - [`Session`] implements the handler for one connection: `USER`/`PASS`,
//!   then `PUT`, `DATA`, the payload, and `CONFIRM` when the client deferred
//!   the hash. Command guards return [`Dispatch`], whose `Err` arm is the
//!   finished rejection for the current line.
//! - [`BoatListener`] accepts connections, hands out connection ids from an
//!   atomic counter it owns, caps concurrency with a semaphore and spawns one
//!   task per session. [`run`] wires it to configuration loading, `SIGHUP`
//!   reloads and shutdown signals.
//!
//! # Invariants
//!
//! - Every temporary file a session creates is removed when the connection
//!   ends, whether by `QUIT`, error, timeout or the peer disappearing.
//! - Signatures are checked in constant time and a mismatch always rejects.
//! - A storage failure mid-connection answers `599` and closes the
//!   connection; protocol errors answer `4xx`/`500` and keep it open.
//!
//! # Examples
//!
//! Serve one connection over an in-memory pipe:
//!
//! ```
//! use daemon::{ConfigHandle, ServerConfig, Session, UserRecord, drive};
//! use std::time::Duration;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let root = tempfile::tempdir().unwrap();
//! let config = ConfigHandle::new(
//!     ServerConfig::new(root.path()).with_user(UserRecord::new("alice", "k", "alice")),
//! );
//! let (server, mut client) = tokio::io::duplex(1024);
//! let mut session = Session::new(1, config);
//!
//! let (served, transcript) = tokio::join!(
//!     drive(server, &mut session, Duration::from_secs(5)),
//!     async move {
//!         client.write_all(b"quit\n").await.unwrap();
//!         let mut transcript = String::new();
//!         client.read_to_string(&mut transcript).await.unwrap();
//!         transcript
//!     },
//! );
//! served.unwrap();
//! assert!(transcript.ends_with("221 bye\n"));
//! # }
//! ```

mod config;
mod connection;
mod error;
mod handler;
mod ini;
mod listener;
mod reload;
mod runtime;
mod session;
mod systemd;

pub use config::{
    Access, ConfigError, DEFAULT_ADDRESS, DEFAULT_CONFIG_PATH, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_PORT, DEFAULT_STORAGE_PATH, DEFAULT_TIMEOUT_SECS, SecretKey, ServerConfig, UserRecord,
};
pub use connection::drive;
pub use error::DaemonError;
pub use handler::{ConnectionHandler, Dispatch, NextRead, Response};
pub use ini::{IniLine, IniLines, IniSyntax, scan_ini};
pub use listener::{BoatListener, ListenerConfig};
pub use reload::ConfigHandle;
pub use runtime::{DaemonOptions, run, run_blocking};
pub use session::Session;
