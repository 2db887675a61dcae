//! Line scanner shared by `boat.conf` and the client's `.boat.conf`.
//!
//! Blank lines and lines starting with `#` or `;` are skipped. What remains
//! is either a `[section]` header (optionally followed by a comment) or a
//! `key = value` pair. Keys are lower-cased and both sides are trimmed; what
//! a key means is left to the caller.
//!
//! ```
//! use daemon::{IniLine, scan_ini};
//!
//! let lines: Vec<_> = scan_ini("# users\n[alice]\nKey = k\n")
//!     .map(|(number, line)| (number, line.unwrap()))
//!     .collect();
//! assert_eq!(lines[0], (2, IniLine::Section("alice")));
//! assert_eq!(lines[1], (3, IniLine::Entry { key: "key".to_owned(), value: "k" }));
//! ```

use std::str::Lines;

use thiserror::Error;

/// One meaningful line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IniLine<'a> {
    /// `[name]`, with the name trimmed.
    Section(&'a str),
    /// `key = value`.
    Entry {
        /// Lower-cased key.
        key: String,
        /// Trimmed value; may be empty.
        value: &'a str,
    },
}

/// A line that is neither a section header nor a `key = value` pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum IniSyntax {
    /// `[` without a closing `]`.
    #[error("unterminated section header")]
    UnterminatedSection,
    /// Something other than a comment after `]`.
    #[error("unexpected content after section header")]
    TrailingContent,
    /// No `=` on a non-header line.
    #[error("expected 'key = value' format")]
    MissingEquals,
}

/// Iterator returned by [`scan_ini`].
#[derive(Debug)]
pub struct IniLines<'a> {
    lines: Lines<'a>,
    number: usize,
}

/// Scans `input`, yielding each meaningful line with its 1-based number.
pub fn scan_ini(input: &str) -> IniLines<'_> {
    IniLines {
        lines: input.lines(),
        number: 0,
    }
}

impl<'a> Iterator for IniLines<'a> {
    type Item = (usize, Result<IniLine<'a>, IniSyntax>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || is_comment(trimmed) {
                continue;
            }
            return Some((self.number, classify(trimmed)));
        }
    }
}

fn is_comment(text: &str) -> bool {
    text.starts_with('#') || text.starts_with(';')
}

fn classify(trimmed: &str) -> Result<IniLine<'_>, IniSyntax> {
    if let Some(header) = trimmed.strip_prefix('[') {
        let (name, trailing) = header.split_once(']').ok_or(IniSyntax::UnterminatedSection)?;
        let trailing = trailing.trim();
        if !trailing.is_empty() && !is_comment(trailing) {
            return Err(IniSyntax::TrailingContent);
        }
        return Ok(IniLine::Section(name.trim()));
    }

    let (key, value) = trimmed.split_once('=').ok_or(IniSyntax::MissingEquals)?;
    Ok(IniLine::Entry {
        key: key.trim().to_ascii_lowercase(),
        value: value.trim(),
    })
}
