#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! Wire vocabulary of the Boat upload protocol.
//!
//! A Boat connection is a sequence of newline-terminated text lines with one
//! interruption: after the server answers `253 send N bytes now`, exactly `N`
//! raw payload bytes follow before line mode resumes. This crate holds
//! everything both roles need to agree on that exchange:
//!
//! - [`StatusCode`] and [`Reply`] for server responses, including parsing on
//!   the client side.
//! - [`Keyword`] and [`split_command`] for the case-insensitive command
//!   keyword dispatch on the server side.
//! - Token grammars for usernames and wire filenames ([`is_valid_username`],
//!   [`is_valid_filename`]) and typed `DATA`/`CONFIRM` arguments
//!   ([`DataArguments`], [`ConfirmArguments`]).
//! - The signed transcripts ([`login_signature`], [`transfer_signature`],
//!   [`acceptance_signature`]) so the client and server compose exactly the
//!   same byte strings.
//! - [`BoatCodec`], a `tokio-util` codec that switches between line framing
//!   and "exactly N raw bytes" on request.
//!
//! # Examples
//!
//! Parse a `DATA` line's arguments and render the replies a server sends:
//!
//! ```
//! use protocol::{DataArguments, DeclaredHash, Reply, StatusCode};
//!
//! let data = DataArguments::parse("12 - c2FsdA== 00").unwrap_err();
//! assert_eq!(data.to_string(), "invalid signature");
//!
//! let reply = Reply::new(StatusCode::SEND_PAYLOAD, "send 12 bytes now");
//! assert_eq!(reply.to_string(), "253 send 12 bytes now");
//! assert!(matches!(DeclaredHash::parse("-"), Some(DeclaredHash::Deferred)));
//! ```

mod arguments;
mod codec;
mod command;
mod filename;
mod greeting;
mod grammar;
mod status;
mod transcript;

pub use arguments::{
    ArgumentError, ConfirmArguments, DEFERRED_HASH, DataArguments, DeclaredHash, MAX_PAYLOAD_SIZE,
};
pub use codec::{BoatCodec, Frame, MAX_LINE_LENGTH, Outbound};
pub use command::{Keyword, split_command};
pub use filename::{InvalidFilename, decode_filename, encode_filename};
pub use greeting::{GREETING_PREFIX, PROTOCOL_VERSION, format_greeting, is_greeting};
pub use grammar::{MAX_FILENAME_LENGTH, is_valid_filename, is_valid_username};
pub use status::{MalformedReply, Reply, StatusCode};
pub use transcript::{
    acceptance_signature, login_signature, transfer_signature, verify_acceptance, verify_login,
    verify_transfer,
};
