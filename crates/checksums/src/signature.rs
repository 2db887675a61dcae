//! crates/checksums/src/signature.rs
//!
//! HMAC-SHA256 signing and constant-time verification.
//!
//! Boat signs the concatenation of several protocol fields (salts, filename,
//! size, hash). [`sign_parts`] and [`verify_parts`] feed each part into the MAC
//! in order, which is equivalent to signing the concatenated string without
//! allocating it.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded HMAC-SHA256 signature.
pub const SIGNATURE_HEX_LEN: usize = 64;

fn keyed(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length; the fallible constructor only exists
    // for MACs with fixed key sizes.
    match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    }
}

/// Signs `message` with `key` and returns the lowercase hex MAC.
#[must_use]
pub fn sign(key: &[u8], message: &[u8]) -> String {
    sign_parts(key, &[message])
}

/// Signs the concatenation of `parts` with `key`.
#[must_use]
pub fn sign_parts(key: &[u8], parts: &[&[u8]]) -> String {
    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    hex::encode(mac.finalize().into_bytes())
}

/// Returns `true` when `candidate` is the hex MAC of `message` under `key`.
///
/// The comparison runs in constant time. Candidates that are not 64 lowercase
/// hex characters never verify.
#[must_use]
pub fn verify(key: &[u8], message: &[u8], candidate: &str) -> bool {
    verify_parts(key, &[message], candidate)
}

/// Constant-time verification of a signature over the concatenation of `parts`.
#[must_use]
pub fn verify_parts(key: &[u8], parts: &[&[u8]], candidate: &str) -> bool {
    if candidate.len() != SIGNATURE_HEX_LEN || !is_lower_hex(candidate) {
        return false;
    }
    let Ok(tag) = hex::decode(candidate) else {
        return false;
    };

    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    mac.verify_slice(&tag).is_ok()
}

pub(crate) fn is_lower_hex(text: &str) -> bool {
    text.bytes()
        .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
}
