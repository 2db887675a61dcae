//! Byte strings each side signs with the user's shared key.
//!
//! | Exchange | Signed message |
//! |---|---|
//! | `PASS` | `login_salt` |
//! | `DATA` / `CONFIRM` | `server_salt ++ filename ++ size ++ hash ++ client_salt` |
//! | `255 accepted` | `client_salt ++ hash` |
//!
//! `filename` is the wire (percent-encoded) spelling, `size` is decimal and
//! `hash` is either 64 hex characters or `-` when a `DATA` line defers it.

use checksums::{sign, sign_parts, verify, verify_parts};

/// Response to the login challenge: `sign(key, login_salt)`.
#[must_use]
pub fn login_signature(key: &[u8], login_salt: &str) -> String {
    sign(key, login_salt.as_bytes())
}

/// Constant-time check of a `PASS` response.
#[must_use]
pub fn verify_login(key: &[u8], login_salt: &str, candidate: &str) -> bool {
    verify(key, login_salt.as_bytes(), candidate)
}

/// Signature binding a transfer to its transaction.
#[must_use]
pub fn transfer_signature(
    key: &[u8],
    server_salt: &str,
    filename: &str,
    size: u64,
    hash: &str,
    client_salt: &str,
) -> String {
    let size = size.to_string();
    sign_parts(
        key,
        &[
            server_salt.as_bytes(),
            filename.as_bytes(),
            size.as_bytes(),
            hash.as_bytes(),
            client_salt.as_bytes(),
        ],
    )
}

/// Constant-time check of a `DATA` or `CONFIRM` signature.
#[must_use]
pub fn verify_transfer(
    key: &[u8],
    server_salt: &str,
    filename: &str,
    size: u64,
    hash: &str,
    client_salt: &str,
    candidate: &str,
) -> bool {
    let size = size.to_string();
    verify_parts(
        key,
        &[
            server_salt.as_bytes(),
            filename.as_bytes(),
            size.as_bytes(),
            hash.as_bytes(),
            client_salt.as_bytes(),
        ],
        candidate,
    )
}

/// Signature the server returns in `255 accepted <signature>`.
#[must_use]
pub fn acceptance_signature(key: &[u8], client_salt: &str, hash: &str) -> String {
    sign_parts(key, &[client_salt.as_bytes(), hash.as_bytes()])
}

/// Constant-time check of a server acceptance.
#[must_use]
pub fn verify_acceptance(key: &[u8], client_salt: &str, hash: &str, candidate: &str) -> bool {
    verify_parts(key, &[client_salt.as_bytes(), hash.as_bytes()], candidate)
}
