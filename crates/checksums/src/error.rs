use thiserror::Error;

/// Errors reported by the checksum primitives.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// The operating system random source failed.
    #[error("failed to gather random bytes for salt: {0}")]
    Entropy(getrandom::Error),
}
