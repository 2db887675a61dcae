//! The interface between the connection driver and the protocol logic.
//!
//! A [`ConnectionHandler`] is built once per accepted connection and fed
//! inbound events by [`drive`](crate::drive). Every event returns a
//! [`Response`]: the reply lines to send and what the driver should read next.

use protocol::Reply;

/// What the driver reads after sending a response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NextRead {
    /// Another command line.
    Line,
    /// Exactly this many raw payload bytes.
    Payload(u64),
    /// Nothing; flush and close the connection.
    Close,
}

/// Reply lines plus the next transport action.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    /// Lines to send, in order.
    pub replies: Vec<Reply>,
    /// Transport action after the replies are flushed.
    pub next: NextRead,
}

impl Response {
    /// One reply, then keep reading lines.
    #[must_use]
    pub fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            next: NextRead::Line,
        }
    }

    /// One reply, then read `len` payload bytes.
    #[must_use]
    pub fn expect_payload(reply: Reply, len: u64) -> Self {
        Self {
            replies: vec![reply],
            next: NextRead::Payload(len),
        }
    }

    /// One reply, then close.
    #[must_use]
    pub fn close(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            next: NextRead::Close,
        }
    }

    /// The single reply, if exactly one was queued.
    #[must_use]
    pub fn single(&self) -> Option<&Reply> {
        match self.replies.as_slice() {
            [reply] => Some(reply),
            _ => None,
        }
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        Self::reply(reply)
    }
}

/// Result type for command guards.
///
/// `Err` carries a finished [`Response`]: the line has been handled and
/// nothing after the guard may run.
pub type Dispatch<T> = Result<T, Response>;

/// Protocol behaviour attached to one connection.
pub trait ConnectionHandler {
    /// Sent as soon as the connection is accepted.
    fn greeting(&mut self) -> Response;

    /// A complete command line, terminator stripped.
    fn on_line(&mut self, line: &str) -> Response;

    /// A chunk of the payload requested with [`NextRead::Payload`].
    ///
    /// Returning `Some` abandons the payload; the response is sent and its
    /// `next` action followed. It should be [`NextRead::Close`] since the peer
    /// is still sending bytes.
    fn on_payload(&mut self, chunk: &[u8]) -> Option<Response>;

    /// Called once the requested number of payload bytes has arrived.
    fn on_payload_end(&mut self) -> Response;

    /// The connection ended for any reason. May be called more than once.
    fn on_disconnect(&mut self);
}
