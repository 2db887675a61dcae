#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `client` is the initiating side of the Boat upload protocol. An
//! [`UploadSession`] connects, answers the server's HMAC login challenge and
//! then uploads any number of files before `QUIT`.
//!
//! # Design
//!
//! Uploads declare their SHA-256 digest up front when it is cheap to compute
//! ([`HashMode::Declared`]), which lets the server skip the transfer when it
//! already holds identical content. Streams of unknown content use
//! [`HashMode::Deferred`]: the digest is computed while streaming and sent in
//! a signed `CONFIRM`.
//!
//! # Invariants
//!
//! An upload is only reported as successful after the server's
//! `255 accepted <signature>` verifies against the client's own key and salt.
//! A mismatch is [`ClientError::ForgedAcceptance`], never a success.
//!
//! # Examples
//!
//! ```no_run
//! use client::{Credentials, HashMode, UploadSession, hash_reader};
//!
//! # async fn example() -> Result<(), client::ClientError> {
//! let credentials = Credentials::new("alice", "secret");
//! let mut session = UploadSession::connect("localhost:19184", credentials).await?;
//!
//! let (hash, size) = hash_reader(tokio::fs::File::open("report.txt").await?).await?;
//! let file = tokio::fs::File::open("report.txt").await?;
//! let receipt = session
//!     .upload("report.txt", file, size, HashMode::Declared(hash))
//!     .await?;
//! println!("{:?} {}", receipt.outcome, receipt.hash);
//! session.quit().await
//! # }
//! ```

mod credentials;
mod error;
mod session;

pub use credentials::{Credentials, KEY_ENV};
pub use error::{ClientError, Step};
pub use session::{CHUNK_SIZE, HashMode, Receipt, UploadOutcome, UploadSession, hash_reader};
