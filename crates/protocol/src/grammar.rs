/// Longest wire filename accepted by `PUT`.
///
/// Version files are named `<txn-id>.<filename>`, so the limit leaves room for
/// the transaction prefix within a 255-byte path component.
pub const MAX_FILENAME_LENGTH: usize = 200;

/// Username grammar: `[A-Za-z0-9_.]+`.
#[must_use]
pub fn is_valid_username(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.'))
}

/// Wire filename grammar: `[A-Za-z0-9_.%+-]+`.
///
/// This is the percent-encoded form; it never contains a path separator.
/// Repository names from the configuration share the same grammar.
#[must_use]
pub fn is_valid_filename(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|byte| {
            byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'%' | b'+' | b'-')
        })
}
