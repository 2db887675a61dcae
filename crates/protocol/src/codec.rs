//! crates/protocol/src/codec.rs
//!
//! Framing codec for Boat connections using tokio-util.
//!
//! [`BoatCodec`] decodes newline-terminated text lines until the owner calls
//! [`BoatCodec::expect_payload`]; it then yields the next `N` bytes verbatim as
//! [`Frame::Payload`] chunks (however the transport happens to split them) and
//! drops back to line mode after the last byte. The codec never enters payload
//! mode on its own.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::status::Reply;

/// Longest accepted command or reply line, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Unit produced by [`BoatCodec`]'s decoder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Frame {
    /// A text line with its `\n` (and any `\r` before it) removed.
    Line(String),
    /// A chunk of raw payload bytes.
    Payload(Bytes),
}

/// Unit accepted by [`BoatCodec`]'s encoder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outbound {
    /// A text line; the codec appends `\n`.
    Line(String),
    /// Raw payload bytes written as-is.
    Payload(Bytes),
}

impl From<Reply> for Outbound {
    fn from(reply: Reply) -> Self {
        Self::Line(reply.to_string())
    }
}

impl From<&Reply> for Outbound {
    fn from(reply: &Reply) -> Self {
        Self::Line(reply.to_string())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    Lines,
    Payload { remaining: u64 },
}

/// Line/raw-byte codec shared by the daemon and the client.
///
/// # Example
///
/// ```ignore
/// use futures::{SinkExt, StreamExt};
/// use protocol::{BoatCodec, Frame, Outbound};
/// use tokio_util::codec::Framed;
///
/// let mut framed = Framed::new(stream, BoatCodec::new());
/// framed.send(Outbound::Line("user alice".into())).await?;
/// if let Some(Frame::Line(line)) = framed.next().await.transpose()? {
///     println!("{line}");
/// }
/// ```
#[derive(Clone, Debug)]
pub struct BoatCodec {
    mode: Mode,
    max_line_length: usize,
    /// Bytes of the buffer already scanned for a newline.
    scanned: usize,
}

impl Default for BoatCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl BoatCodec {
    /// Creates a codec in line mode with [`MAX_LINE_LENGTH`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    /// Creates a codec with a custom line length limit.
    #[must_use]
    pub const fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            mode: Mode::Lines,
            max_line_length,
            scanned: 0,
        }
    }

    /// Switches to payload mode for the next `len` bytes.
    ///
    /// A zero length leaves the codec in line mode.
    pub fn expect_payload(&mut self, len: u64) {
        self.scanned = 0;
        self.mode = if len == 0 {
            Mode::Lines
        } else {
            Mode::Payload { remaining: len }
        };
    }

    /// Returns `true` while payload bytes are still outstanding.
    #[must_use]
    pub const fn is_reading_payload(&self) -> bool {
        matches!(self.mode, Mode::Payload { .. })
    }

    /// Payload bytes still expected.
    #[must_use]
    pub const fn remaining_payload(&self) -> u64 {
        match self.mode {
            Mode::Payload { remaining } => remaining,
            Mode::Lines => 0,
        }
    }

    fn decode_payload(&mut self, src: &mut BytesMut, remaining: u64) -> Option<Frame> {
        if src.is_empty() {
            return None;
        }
        let take = usize::try_from(remaining).map_or(src.len(), |rest| rest.min(src.len()));
        let chunk = src.split_to(take).freeze();
        let left = remaining - take as u64;
        self.mode = if left == 0 {
            Mode::Lines
        } else {
            Mode::Payload { remaining: left }
        };
        Some(Frame::Payload(chunk))
    }

    fn decode_line(&mut self, src: &mut BytesMut) -> io::Result<Option<Frame>> {
        let Some(offset) = memchr::memchr(b'\n', &src[self.scanned..]) else {
            if src.len() > self.max_line_length {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line exceeds {} bytes", self.max_line_length),
                ));
            }
            self.scanned = src.len();
            return Ok(None);
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_line_length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {} bytes", self.max_line_length),
            ));
        }

        let line = src.split_to(end + 1);
        Ok(Some(Frame::Line(line_text(&line[..end]))))
    }
}

fn line_text(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    // Lines outside UTF-8 cannot satisfy any grammar; keep them decodable so
    // the session can reject them instead of dropping the connection.
    String::from_utf8_lossy(raw).into_owned()
}

impl Decoder for BoatCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.mode {
            Mode::Payload { remaining } => Ok(self.decode_payload(src, remaining)),
            Mode::Lines => self.decode_line(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() || self.is_reading_payload() {
            return Ok(None);
        }
        // A final line without terminator still counts.
        self.scanned = 0;
        let line = src.split_to(src.len());
        Ok(Some(Frame::Line(line_text(&line))))
    }
}

impl Encoder<Outbound> for BoatCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Line(line) => {
                if line.contains('\n') {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "protocol lines cannot contain a newline",
                    ));
                }
                dst.reserve(line.len() + 1);
                dst.put_slice(line.as_bytes());
                dst.put_u8(b'\n');
            }
            Outbound::Payload(bytes) => {
                dst.reserve(bytes.len());
                dst.put_slice(&bytes);
            }
        }
        Ok(())
    }
}
