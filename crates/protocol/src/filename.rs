use std::borrow::Cow;

use thiserror::Error;

use crate::grammar::is_valid_filename;

/// A local filename that cannot be expressed on the wire.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("invalid filename: {0:?}")]
pub struct InvalidFilename(pub String);

/// Percent-encodes a filename for `PUT`.
///
/// Spaces become `+`, as HTML form encoding does, and every byte outside
/// `[A-Za-z0-9_.-]` becomes `%XX`. The result always satisfies
/// [`is_valid_filename`] unless the input is empty.
pub fn encode_filename(name: &str) -> Result<String, InvalidFilename> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(InvalidFilename(name.to_owned()));
    }

    let encoded = urlencoding::encode(name)
        .replace("%20", "+")
        .replace('~', "%7E");
    debug_assert!(is_valid_filename(&encoded));
    Ok(encoded)
}

/// Decodes a wire filename back to its display form.
///
/// Used for log output only; storage keeps the wire spelling.
#[must_use]
pub fn decode_filename(wire: &str) -> Cow<'_, str> {
    if !wire.contains(['%', '+']) {
        return Cow::Borrowed(wire);
    }
    let spaced = wire.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Borrowed(wire),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(encode_filename("report.txt").unwrap(), "report.txt");
        assert_eq!(encode_filename("a_b-c.d").unwrap(), "a_b-c.d");
    }

    #[test]
    fn spaces_and_specials_are_encoded() {
        assert_eq!(encode_filename("my report.txt").unwrap(), "my+report.txt");
        assert_eq!(encode_filename("a+b").unwrap(), "a%2Bb");
        assert_eq!(encode_filename("~notes").unwrap(), "%7Enotes");
        assert!(is_valid_filename(&encode_filename("résumé (v2).pdf").unwrap()));
    }

    #[test]
    fn path_separators_are_refused() {
        assert!(encode_filename("dir/file").is_err());
        assert!(encode_filename("dir\\file").is_err());
        assert!(encode_filename("").is_err());
    }

    #[test]
    fn decode_reverses_encode() {
        for name in ["my report.txt", "a+b", "~notes", "résumé (v2).pdf"] {
            let wire = encode_filename(name).unwrap();
            assert_eq!(decode_filename(&wire), name);
        }
    }
}
