//! Drives one [`ConnectionHandler`] over a framed byte stream.

use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use protocol::{BoatCodec, Frame, Outbound, Reply};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::error::DaemonError;
use crate::handler::{ConnectionHandler, NextRead, Response};

type Transport<S> = Framed<S, BoatCodec>;

/// Serves `handler` on `stream` until either side ends the conversation.
///
/// The handler's [`on_disconnect`](ConnectionHandler::on_disconnect) runs on
/// every exit path, including read timeouts and I/O errors. A clean close by
/// the peer or a handler-requested close returns `Ok(())`.
///
/// # Errors
///
/// Returns [`DaemonError::Timeout`] when no frame arrives within
/// `read_timeout`, and [`DaemonError::Io`] for transport failures, including
/// command lines longer than [`protocol::MAX_LINE_LENGTH`].
pub async fn drive<S, H>(stream: S, handler: &mut H, read_timeout: Duration) -> Result<(), DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: ConnectionHandler,
{
    let mut transport = Framed::new(stream, BoatCodec::new());
    let result = converse(&mut transport, handler, read_timeout).await;
    handler.on_disconnect();
    result
}

async fn converse<S, H>(
    transport: &mut Transport<S>,
    handler: &mut H,
    read_timeout: Duration,
) -> Result<(), DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: ConnectionHandler,
{
    let greeting = handler.greeting();
    if !deliver(transport, handler, greeting).await? {
        return Ok(());
    }

    loop {
        let frame = match timeout(read_timeout, transport.next()).await {
            Err(_) => return Err(DaemonError::Timeout(read_timeout)),
            Ok(None) => {
                tracing::debug!("peer closed the connection");
                return Ok(());
            }
            Ok(Some(Err(error))) if error.kind() == io::ErrorKind::InvalidData => {
                // Best effort: the peer may already be gone.
                let _ = transport
                    .send(Outbound::from(Reply::rejected("line too long")))
                    .await;
                return Err(error.into());
            }
            Ok(Some(Err(error))) => return Err(error.into()),
            Ok(Some(Ok(frame))) => frame,
        };

        let response = match frame {
            Frame::Line(line) => {
                tracing::trace!(
                    command = line.split_ascii_whitespace().next().unwrap_or_default(),
                    "command received"
                );
                Some(handler.on_line(&line))
            }
            Frame::Payload(chunk) => match handler.on_payload(&chunk) {
                Some(abort) => Some(abort),
                None if !transport.codec().is_reading_payload() => Some(handler.on_payload_end()),
                None => None,
            },
        };

        if let Some(response) = response {
            if !deliver(transport, handler, response).await? {
                return Ok(());
            }
        }
    }
}

/// Sends `response` and arms the next read. Returns `false` once the
/// connection should close.
async fn deliver<S, H>(
    transport: &mut Transport<S>,
    handler: &mut H,
    mut response: Response,
) -> Result<bool, DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: ConnectionHandler,
{
    loop {
        for reply in &response.replies {
            transport.feed(Outbound::from(reply)).await?;
        }
        transport.flush().await?;

        match response.next {
            NextRead::Line => return Ok(true),
            NextRead::Close => return Ok(false),
            // Nothing to read; the payload is already complete.
            NextRead::Payload(0) => response = handler.on_payload_end(),
            NextRead::Payload(len) => {
                transport.codec_mut().expect_payload(len);
                return Ok(true);
            }
        }
    }
}
