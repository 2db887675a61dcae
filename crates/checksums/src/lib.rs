#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` hosts the cryptographic primitives every Boat exchange is built
//! on: keyed signatures that bind a message to a user's shared secret, SHA-256
//! content digests of uploaded payloads, and single-use salts that keep
//! captured exchanges from being replayed.
//!
//! # Design
//!
//! - [`sign`] and [`verify`] compute HMAC-SHA256 and render it as lowercase
//!   hex. Verification decodes the candidate and hands it to the MAC's
//!   constant-time comparison, so a caller never compares signature strings
//!   byte by byte.
//! - [`Sha256`] is a streaming hasher for payloads that arrive in chunks;
//!   [`sha256_hex`] covers the one-shot case. Both produce a [`Sha256Hex`], a
//!   validated 64-character lowercase hex value.
//! - [`random_salt`] draws 64 bytes from the operating system CSPRNG, hashes
//!   them with SHA-256 and encodes the hash as padded base64.
//!
//! # Invariants
//!
//! - Signatures and digests are always lowercase hex. A [`Sha256Hex`] can only
//!   be built from exactly 64 lowercase hex characters.
//! - [`verify`] returns `false` for malformed input instead of erroring, so a
//!   bad signature and a garbled one are indistinguishable to the peer.
//!
//! # Errors
//!
//! Only salt generation is fallible: [`ChecksumError::Entropy`] is returned
//! when the operating system cannot provide random bytes.
//!
//! # Examples
//!
//! ```
//! use checksums::{sign, verify};
//!
//! let signature = sign(b"Jefe", b"what do ya want for nothing?");
//! assert_eq!(
//!     signature,
//!     "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
//! );
//! assert!(verify(b"Jefe", b"what do ya want for nothing?", &signature));
//! assert!(!verify(b"Jefe", b"what do ya want for something?", &signature));
//! ```

mod error;
mod signature;
mod salt;
mod sha256;

pub use error::ChecksumError;
pub use signature::{SIGNATURE_HEX_LEN, sign, sign_parts, verify, verify_parts};
pub use salt::{SALT_ENTROPY_LEN, random_salt};
pub use sha256::{InvalidDigest, Sha256, Sha256Hex, sha256_hex};
