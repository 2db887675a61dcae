use std::fmt;
use std::io;

use checksums::{ChecksumError, Sha256Hex};
use protocol::InvalidFilename;
use thiserror::Error;

/// Point in the conversation a failure refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// Waiting for `220`.
    Greeting,
    /// `USER`, expecting `251`.
    User,
    /// `PASS`, expecting `250`.
    Pass,
    /// `PUT`, expecting `250`.
    Put,
    /// `DATA`, expecting `253` or `255`.
    Data,
    /// Payload sent, expecting `254` or `255`.
    Payload,
    /// `CONFIRM`, expecting `255`.
    Confirm,
    /// `QUIT`, expecting `221`.
    Quit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greeting => "greeting",
            Self::User => "USER",
            Self::Pass => "PASS",
            Self::Put => "PUT",
            Self::Data => "DATA",
            Self::Payload => "payload",
            Self::Confirm => "CONFIRM",
            Self::Quit => "QUIT",
        })
    }
}

/// Errors raised by an [`UploadSession`](crate::UploadSession).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket or local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The server closed the connection while a reply was expected.
    #[error("server closed the connection during {step}")]
    ConnectionClosed {
        /// What the client was waiting for.
        step: Step,
    },
    /// The server answered with an unexpected status.
    #[error("{step} rejected: {reply}")]
    Rejected {
        /// Command that was refused.
        step: Step,
        /// The server's line, verbatim.
        reply: String,
    },
    /// The server's line could not be understood.
    #[error("malformed reply to {step}: {reply:?}")]
    Malformed {
        /// Command being answered.
        step: Step,
        /// The server's line, verbatim.
        reply: String,
    },
    /// The acceptance signature does not match the client's own computation.
    ///
    /// The server either does not hold this user's key or the reply was
    /// altered in transit; the upload must not be considered stored.
    #[error("server acceptance signature mismatch (expected {expected}, received {received})")]
    ForgedAcceptance {
        /// Signature the client computed.
        expected: String,
        /// Signature the server sent.
        received: String,
    },
    /// The local source changed between hashing and streaming.
    #[error("source changed while uploading (hashed {declared}, streamed {streamed})")]
    HashMismatch {
        /// Hash declared in `DATA`.
        declared: Sha256Hex,
        /// Hash of the bytes actually sent.
        streamed: Sha256Hex,
    },
    /// The filename cannot be sent.
    #[error(transparent)]
    InvalidFilename(#[from] InvalidFilename),
    /// No random salt could be generated.
    #[error(transparent)]
    Entropy(#[from] ChecksumError),
}

impl ClientError {
    /// The server's literal reply, for rejections and malformed replies.
    #[must_use]
    pub fn server_reply(&self) -> Option<&str> {
        match self {
            Self::Rejected { reply, .. } | Self::Malformed { reply, .. } => Some(reply),
            _ => None,
        }
    }
}
