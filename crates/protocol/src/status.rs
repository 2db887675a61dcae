use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Three-digit status code that prefixes every server line.
///
/// The code space follows the SMTP convention: `2xx` means the step
/// succeeded, `4xx` is an authentication or authorization refusal and `5xx`
/// a rejected command.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct StatusCode(u16);

impl StatusCode {
    /// `220 Boat Server <version>`.
    pub const GREETING: Self = Self(220);
    /// `221 bye`, sent in answer to `QUIT`.
    pub const BYE: Self = Self(221);
    /// `250`, generic success (`250 OK` after `PASS`, `250 <salt>` after `PUT`).
    pub const OK: Self = Self(250);
    /// `251 HMAC-SHA256 <salt>`, the login challenge.
    pub const CHALLENGE: Self = Self(251);
    /// `253 send N bytes now`.
    pub const SEND_PAYLOAD: Self = Self(253);
    /// `254 send hash confirmation`.
    pub const SEND_CONFIRMATION: Self = Self(254);
    /// `255 accepted <signature>`.
    pub const ACCEPTED: Self = Self(255);
    /// `400`, the user lacks write access.
    pub const FORBIDDEN: Self = Self(400);
    /// `401`, authentication failed.
    pub const UNAUTHORIZED: Self = Self(401);
    /// `500`, the command was rejected.
    pub const REJECTED: Self = Self(500);
    /// `599`, the server hit an internal error and is closing the connection.
    pub const SYSTEM_ERROR: Self = Self(599);

    /// Builds a code from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Option<Self> {
        if code >= 100 && code <= 999 {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Numeric value of the code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns `true` for `2xx` codes.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// One server response line: a status code and its human-readable text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    code: StatusCode,
    text: Cow<'static, str>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    pub fn new(code: StatusCode, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// `500 <reason>`.
    #[must_use]
    pub fn rejected(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::REJECTED, reason)
    }

    /// Status code of the reply.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        self.code
    }

    /// Text following the status code.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parses a received line such as `251 HMAC-SHA256 abc=`.
    ///
    /// Trailing `\r`/`\n` are ignored. The text may be empty (`"221"`).
    pub fn parse(line: &str) -> Result<Self, MalformedReply> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let (digits, text) = match trimmed.split_once(' ') {
            Some((digits, text)) => (digits, text),
            None => (trimmed, ""),
        };

        if digits.len() != 3 || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(MalformedReply(trimmed.to_owned()));
        }
        let code = digits
            .parse::<u16>()
            .ok()
            .and_then(StatusCode::from_u16)
            .ok_or_else(|| MalformedReply(trimmed.to_owned()))?;

        Ok(Self::new(code, text.to_owned()))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.text)
        }
    }
}

/// A received line that does not start with a three-digit status code.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("malformed server reply: {0:?}")]
pub struct MalformedReply(pub String);
