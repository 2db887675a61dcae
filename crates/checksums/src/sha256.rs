use std::fmt;
use std::str::FromStr;

use digest::Digest;

use crate::signature::is_lower_hex;

/// A SHA-256 digest rendered as 64 lowercase hex characters.
///
/// This is the form content hashes take on the wire and in the repository's
/// current-version records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Hex(String);

impl Sha256Hex {
    /// Number of hex characters in a SHA-256 digest.
    pub const LEN: usize = 64;

    /// Validates `text` as a lowercase hex SHA-256 digest.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        (text.len() == Self::LEN && is_lower_hex(text)).then(|| Self(text.to_owned()))
    }

    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the digest and returns the owned hex string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Sha256Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Sha256Hex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Sha256Hex {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(InvalidDigest)
    }
}

/// Returned when text is not a 64-character lowercase hex digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDigest;

impl fmt::Display for InvalidDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected 64 lowercase hex characters")
    }
}

impl std::error::Error for InvalidDigest {}

/// Streaming SHA-256 hasher for payloads received in chunks.
#[derive(Clone, Default)]
pub struct Sha256 {
    inner: sha2::Sha256,
    bytes: u64,
}

impl fmt::Debug for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256").field("bytes", &self.bytes).finish()
    }
}

impl Sha256 {
    /// Creates a hasher with an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds another chunk into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes folded into the digest so far.
    #[must_use]
    pub const fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finalises the digest.
    #[must_use]
    pub fn finalize(self) -> Sha256Hex {
        Sha256Hex(hex::encode(self.inner.finalize()))
    }
}

/// One-shot SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> Sha256Hex {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize()
}
