//! crates/protocol/src/arguments.rs
//!
//! Typed arguments of the `DATA` and `CONFIRM` commands.
//!
//! Parsing only checks shape (token count, decimal size bound, hex alphabet,
//! salt alphabet); signatures are verified by the session once it knows the
//! user's key and the transaction's server salt.

use checksums::{SIGNATURE_HEX_LEN, Sha256Hex};
use thiserror::Error;

/// Payload sizes must stay below 2^31 bytes.
pub const MAX_PAYLOAD_SIZE: u64 = 1 << 31;

/// Hash field value announcing that the hash will follow in `CONFIRM`.
pub const DEFERRED_HASH: &str = "-";

const MAX_SALT_LENGTH: usize = 128;

/// Reason a `DATA` or `CONFIRM` argument list was refused.
///
/// The `Display` text is sent verbatim after `500`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum ArgumentError {
    /// Wrong number of tokens.
    #[error("{0}")]
    Usage(&'static str),
    /// Size is not a decimal number.
    #[error("invalid size")]
    InvalidSize,
    /// Size is at or above [`MAX_PAYLOAD_SIZE`].
    #[error("size too large")]
    SizeTooLarge,
    /// Hash is neither 64 lowercase hex characters nor the deferred marker.
    #[error("invalid hash")]
    InvalidHash,
    /// Client salt contains characters outside the base64 alphabet.
    #[error("invalid salt")]
    InvalidSalt,
    /// Signature is not 64 lowercase hex characters.
    #[error("invalid signature")]
    InvalidSignature,
}

/// Content hash declared in `DATA`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeclaredHash {
    /// The client already knows the payload's SHA-256.
    Known(Sha256Hex),
    /// The client will send the hash in `CONFIRM` after the payload.
    Deferred,
}

impl DeclaredHash {
    /// Parses the hash field of a `DATA` line.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        if token == DEFERRED_HASH {
            Some(Self::Deferred)
        } else {
            Sha256Hex::parse(token).map(Self::Known)
        }
    }

    /// Wire spelling, which is also the spelling that gets signed.
    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Known(hash) => hash.as_str(),
            Self::Deferred => DEFERRED_HASH,
        }
    }

    /// The concrete hash, if one was declared.
    #[must_use]
    pub const fn known(&self) -> Option<&Sha256Hex> {
        match self {
            Self::Known(hash) => Some(hash),
            Self::Deferred => None,
        }
    }
}

/// `DATA <size> <hash|-> <client_salt> <signature>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataArguments {
    /// Number of payload bytes that will follow.
    pub size: u64,
    /// Declared content hash.
    pub hash: DeclaredHash,
    /// Client-chosen salt, echoed into the acceptance signature.
    pub client_salt: String,
    /// `sign(key, server_salt ++ filename ++ size ++ hash ++ client_salt)`.
    pub signature: String,
}

impl DataArguments {
    /// Parses the argument text following the `DATA` keyword.
    pub fn parse(args: &str) -> Result<Self, ArgumentError> {
        let tokens: Vec<&str> = args.split_ascii_whitespace().collect();
        let [size, hash, client_salt, signature] = tokens.as_slice() else {
            return Err(ArgumentError::Usage(
                "DATA expects <size> <hash|-> <client_salt> <signature>",
            ));
        };

        Ok(Self {
            size: parse_size(size)?,
            hash: DeclaredHash::parse(hash).ok_or(ArgumentError::InvalidHash)?,
            client_salt: parse_salt(client_salt)?,
            signature: parse_signature(signature)?,
        })
    }

    /// Renders the argument text, as the client sends it.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!(
            "{} {} {} {}",
            self.size,
            self.hash.as_wire(),
            self.client_salt,
            self.signature
        )
    }
}

/// `CONFIRM <hash> <signature>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfirmArguments {
    /// Hash of the payload as computed by the client.
    pub hash: Sha256Hex,
    /// Transfer signature recomputed with the concrete hash.
    pub signature: String,
}

impl ConfirmArguments {
    /// Parses the argument text following the `CONFIRM` keyword.
    pub fn parse(args: &str) -> Result<Self, ArgumentError> {
        let tokens: Vec<&str> = args.split_ascii_whitespace().collect();
        let [hash, signature] = tokens.as_slice() else {
            return Err(ArgumentError::Usage("CONFIRM expects <hash> <signature>"));
        };

        Ok(Self {
            hash: Sha256Hex::parse(hash).ok_or(ArgumentError::InvalidHash)?,
            signature: parse_signature(signature)?,
        })
    }
}

fn parse_size(token: &str) -> Result<u64, ArgumentError> {
    if token.is_empty() || !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ArgumentError::InvalidSize);
    }
    match token.parse::<u64>() {
        Ok(size) if size < MAX_PAYLOAD_SIZE => Ok(size),
        _ => Err(ArgumentError::SizeTooLarge),
    }
}

fn parse_salt(token: &str) -> Result<String, ArgumentError> {
    let base64_alphabet = |byte: u8| byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'/' | b'=');
    if token.len() > MAX_SALT_LENGTH || !token.bytes().all(base64_alphabet) {
        return Err(ArgumentError::InvalidSalt);
    }
    Ok(token.to_owned())
}

fn parse_signature(token: &str) -> Result<String, ArgumentError> {
    // Same shape as a digest: 64 lowercase hex characters.
    if token.len() == SIGNATURE_HEX_LEN && Sha256Hex::parse(token).is_some() {
        Ok(token.to_owned())
    } else {
        Err(ArgumentError::InvalidSignature)
    }
}
