use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use digest::Digest;

use crate::ChecksumError;

/// Number of random bytes hashed into every salt.
pub const SALT_ENTROPY_LEN: usize = 64;

/// Generates a single-use salt.
///
/// Draws [`SALT_ENTROPY_LEN`] bytes from the OS CSPRNG, hashes them with
/// SHA-256 and returns the hash as padded base64 (44 characters). The result
/// contains no whitespace, so it travels as one protocol token.
pub fn random_salt() -> Result<String, ChecksumError> {
    let mut entropy = [0u8; SALT_ENTROPY_LEN];
    getrandom::fill(&mut entropy).map_err(ChecksumError::Entropy)?;
    let hash = sha2::Sha256::digest(entropy);
    Ok(STANDARD.encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn salt_is_base64_of_a_sha256_hash() {
        let salt = random_salt().unwrap();
        assert_eq!(salt.len(), 44);
        assert!(salt.ends_with('='));
        assert_eq!(STANDARD.decode(&salt).unwrap().len(), 32);
        assert!(!salt.contains(char::is_whitespace));
    }

    #[test]
    fn salts_do_not_repeat() {
        let salts: HashSet<String> = (0..256).map(|_| random_salt().unwrap()).collect();
        assert_eq!(salts.len(), 256);
    }
}
