//! crates/client/src/session.rs
//!
//! One authenticated connection to a Boat server.

use std::io;

use bytes::Bytes;
use checksums::{Sha256, Sha256Hex, random_salt};
use futures::{SinkExt, StreamExt};
use protocol::{
    BoatCodec, DeclaredHash, Frame, Outbound, Reply, StatusCode, acceptance_signature,
    encode_filename, is_greeting, login_signature, transfer_signature, verify_acceptance,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::credentials::Credentials;
use crate::error::{ClientError, Step};

/// Payload bytes sent per write.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// How the content hash is announced in `DATA`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HashMode {
    /// The hash is known before streaming; enables the server's dedup shortcut.
    Declared(Sha256Hex),
    /// The hash is computed while streaming and sent in `CONFIRM`.
    Deferred,
}

/// How the server acknowledged an upload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UploadOutcome {
    /// The payload was transferred and committed.
    Stored,
    /// The server already held identical content; no payload was sent.
    Deduplicated,
}

/// A verified acknowledgement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Receipt {
    /// Stored or deduplicated.
    pub outcome: UploadOutcome,
    /// Content hash the server signed.
    pub hash: Sha256Hex,
    /// Payload bytes written to the socket.
    pub bytes_sent: u64,
}

/// An authenticated connection that can upload files.
///
/// Every acknowledgement is checked against the client's own recomputation
/// of `sign(key, client_salt ++ hash)` before it is reported as a success.
pub struct UploadSession<S> {
    framed: Framed<S, BoatCodec>,
    credentials: Credentials,
}

impl UploadSession<TcpStream> {
    /// Connects to `address` and logs in.
    ///
    /// # Errors
    ///
    /// Fails if the connection cannot be established or the server refuses
    /// the login.
    pub async fn connect(
        address: impl ToSocketAddrs,
        credentials: Credentials,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        Self::handshake(stream, credentials).await
    }
}

impl<S> UploadSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the greeting and performs `USER`/`PASS` over an open stream.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rejected`] carries the server's reply when the greeting
    /// is not `220` or the login is refused.
    pub async fn handshake(stream: S, credentials: Credentials) -> Result<Self, ClientError> {
        let mut session = Self {
            framed: Framed::new(stream, BoatCodec::new()),
            credentials,
        };

        let greeting = session.receive(Step::Greeting).await?;
        if !is_greeting(&greeting) {
            return Err(ClientError::Rejected {
                step: Step::Greeting,
                reply: greeting.to_string(),
            });
        }
        tracing::debug!(greeting = greeting.text(), "connected");

        let username = session.credentials.username().to_owned();
        let challenge = session
            .command(Step::User, format!("user {username}"), StatusCode::CHALLENGE)
            .await?;
        let login_salt = challenge
            .text()
            .strip_prefix("HMAC-SHA256 ")
            .filter(|salt| !salt.is_empty())
            .ok_or_else(|| malformed(Step::User, &challenge))?
            .to_owned();

        let response = login_signature(session.credentials.key(), &login_salt);
        session
            .command(Step::Pass, format!("pass {response}"), StatusCode::OK)
            .await?;
        tracing::debug!(user = %username, "authenticated");
        Ok(session)
    }

    /// Uploads `size` bytes read from `source` as `filename`.
    ///
    /// With [`HashMode::Declared`] the server may answer from its existing
    /// copy without any payload being sent. With [`HashMode::Deferred`] the
    /// digest is computed while streaming and confirmed afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Rejected`] for any refusal,
    /// [`ClientError::ForgedAcceptance`] when the acknowledgement does not
    /// verify, and [`ClientError::HashMismatch`] when the streamed bytes do
    /// not hash to the declared value.
    pub async fn upload<R>(
        &mut self,
        filename: &str,
        source: R,
        size: u64,
        hash: HashMode,
    ) -> Result<Receipt, ClientError>
    where
        R: AsyncRead + Unpin,
    {
        let wire_name = encode_filename(filename)?;
        let reply = self
            .command(Step::Put, format!("put {wire_name}"), StatusCode::OK)
            .await?;
        let server_salt = reply.text().to_owned();
        if server_salt.is_empty() || server_salt.contains(' ') {
            return Err(malformed(Step::Put, &reply));
        }

        let declared = match hash {
            HashMode::Declared(hash) => DeclaredHash::Known(hash),
            HashMode::Deferred => DeclaredHash::Deferred,
        };
        let client_salt = random_salt()?;
        let signature = transfer_signature(
            self.credentials.key(),
            &server_salt,
            &wire_name,
            size,
            declared.as_wire(),
            &client_salt,
        );
        self.send_line(format!(
            "data {size} {} {client_salt} {signature}",
            declared.as_wire()
        ))
        .await?;

        let reply = self.receive(Step::Data).await?;
        match reply.code() {
            StatusCode::ACCEPTED => {
                let Some(hash) = declared.known().cloned() else {
                    return Err(malformed(Step::Data, &reply));
                };
                self.verify_accepted(Step::Data, &reply, &client_salt, &hash)?;
                tracing::info!(filename, hash = %hash, "server already holds this content");
                return Ok(Receipt {
                    outcome: UploadOutcome::Deduplicated,
                    hash,
                    bytes_sent: 0,
                });
            }
            StatusCode::SEND_PAYLOAD => {}
            _ => return Err(rejected(Step::Data, &reply)),
        }

        let streamed = self.stream_payload(source, size).await?;

        let hash = match declared {
            DeclaredHash::Known(declared) => {
                let reply = self.receive(Step::Payload).await?;
                if declared != streamed {
                    return Err(ClientError::HashMismatch { declared, streamed });
                }
                if reply.code() != StatusCode::ACCEPTED {
                    return Err(rejected(Step::Payload, &reply));
                }
                self.verify_accepted(Step::Payload, &reply, &client_salt, &declared)?;
                declared
            }
            DeclaredHash::Deferred => {
                self.expect(Step::Payload, StatusCode::SEND_CONFIRMATION)
                    .await?;
                let signature = transfer_signature(
                    self.credentials.key(),
                    &server_salt,
                    &wire_name,
                    size,
                    streamed.as_str(),
                    &client_salt,
                );
                let reply = self
                    .command(
                        Step::Confirm,
                        format!("confirm {streamed} {signature}"),
                        StatusCode::ACCEPTED,
                    )
                    .await?;
                self.verify_accepted(Step::Confirm, &reply, &client_salt, &streamed)?;
                streamed
            }
        };

        tracing::info!(filename, hash = %hash, bytes = size, "upload stored");
        Ok(Receipt {
            outcome: UploadOutcome::Stored,
            hash,
            bytes_sent: size,
        })
    }

    /// Sends `QUIT` and waits for `221`.
    ///
    /// # Errors
    ///
    /// Fails if the server does not acknowledge.
    pub async fn quit(mut self) -> Result<(), ClientError> {
        self.command(Step::Quit, "quit".to_owned(), StatusCode::BYE)
            .await?;
        Ok(())
    }

    async fn stream_payload<R>(&mut self, mut source: R, size: u64) -> Result<Sha256Hex, ClientError>
    where
        R: AsyncRead + Unpin,
    {
        let mut digest = Sha256::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut sent = 0u64;

        while sent < size {
            let want = usize::try_from(size - sent).map_or(CHUNK_SIZE, |left| left.min(CHUNK_SIZE));
            let read = source.read(&mut buffer[..want]).await?;
            if read == 0 {
                return Err(ClientError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended after {sent} of {size} bytes"),
                )));
            }
            digest.update(&buffer[..read]);
            self.framed
                .send(Outbound::Payload(Bytes::copy_from_slice(&buffer[..read])))
                .await?;
            sent += read as u64;
            tracing::debug!(sent, size, "payload progress");
        }

        Ok(digest.finalize())
    }

    fn verify_accepted(
        &self,
        step: Step,
        reply: &Reply,
        client_salt: &str,
        hash: &Sha256Hex,
    ) -> Result<(), ClientError> {
        let received = reply
            .text()
            .strip_prefix("accepted ")
            .ok_or_else(|| malformed(step, reply))?;
        if verify_acceptance(self.credentials.key(), client_salt, hash.as_str(), received) {
            return Ok(());
        }
        tracing::error!(%step, "acceptance signature does not verify");
        Err(ClientError::ForgedAcceptance {
            expected: acceptance_signature(self.credentials.key(), client_salt, hash.as_str()),
            received: received.to_owned(),
        })
    }

    async fn command(
        &mut self,
        step: Step,
        line: String,
        expected: StatusCode,
    ) -> Result<Reply, ClientError> {
        self.send_line(line).await?;
        self.expect(step, expected).await
    }

    async fn expect(&mut self, step: Step, expected: StatusCode) -> Result<Reply, ClientError> {
        let reply = self.receive(step).await?;
        if reply.code() == expected {
            Ok(reply)
        } else {
            Err(rejected(step, &reply))
        }
    }

    async fn send_line(&mut self, line: String) -> Result<(), ClientError> {
        self.framed.send(Outbound::Line(line)).await?;
        Ok(())
    }

    async fn receive(&mut self, step: Step) -> Result<Reply, ClientError> {
        match self.framed.next().await {
            Some(Ok(Frame::Line(line))) => {
                tracing::trace!(%step, reply = %line, "received");
                Reply::parse(&line).map_err(|error| ClientError::Malformed {
                    step,
                    reply: error.0,
                })
            }
            Some(Ok(Frame::Payload(_))) => Err(ClientError::Malformed {
                step,
                reply: String::from("<binary data>"),
            }),
            Some(Err(error)) => Err(ClientError::Io(error)),
            None => Err(ClientError::ConnectionClosed { step }),
        }
    }
}

impl<S> std::fmt::Debug for UploadSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn rejected(step: Step, reply: &Reply) -> ClientError {
    ClientError::Rejected {
        step,
        reply: reply.to_string(),
    }
}

fn malformed(step: Step, reply: &Reply) -> ClientError {
    ClientError::Malformed {
        step,
        reply: reply.to_string(),
    }
}

/// Hashes everything `reader` yields, returning the digest and byte count.
///
/// # Errors
///
/// Propagates read failures.
pub async fn hash_reader<R>(mut reader: R) -> io::Result<(Sha256Hex, u64)>
where
    R: AsyncRead + Unpin,
{
    let mut digest = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        digest.update(&buffer[..read]);
    }
    let total = digest.bytes_hashed();
    Ok((digest.finalize(), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use checksums::sha256_hex;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    /// Plays the server side from a fixed script of replies.
    struct ScriptedServer {
        reader: BufReader<DuplexStream>,
    }

    impl ScriptedServer {
        async fn say(&mut self, line: &str) {
            let stream = self.reader.get_mut();
            stream.write_all(line.as_bytes()).await.unwrap();
            stream.write_all(b"\n").await.unwrap();
        }

        async fn hear(&mut self) -> String {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            line.trim_end().to_owned()
        }
    }

    fn pair() -> (DuplexStream, ScriptedServer) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        (
            client,
            ScriptedServer {
                reader: BufReader::new(server),
            },
        )
    }

    async fn login(server: &mut ScriptedServer) {
        server.say("220 Boat Server test").await;
        assert_eq!(server.hear().await, "user alice");
        server.say("251 HMAC-SHA256 S1").await;
        assert_eq!(
            server.hear().await,
            format!("pass {}", login_signature(b"k", "S1"))
        );
        server.say("250 OK").await;
    }

    #[tokio::test]
    async fn handshake_signs_the_login_salt() {
        let (client, mut server) = pair();
        let script = tokio::spawn(async move { login(&mut server).await });

        UploadSession::handshake(client, Credentials::new("alice", "k"))
            .await
            .unwrap();
        script.await.unwrap();
    }

    #[tokio::test]
    async fn refused_login_carries_the_server_line() {
        let (client, mut server) = pair();
        let script = tokio::spawn(async move {
            server.say("220 Boat Server test").await;
            server.hear().await;
            server.say("251 HMAC-SHA256 S1").await;
            server.hear().await;
            server.say("401 invalid username or password").await;
        });

        let error = UploadSession::handshake(client, Credentials::new("alice", "wrong"))
            .await
            .unwrap_err();
        script.await.unwrap();
        assert_eq!(
            error.server_reply(),
            Some("401 invalid username or password")
        );
        assert!(matches!(error, ClientError::Rejected { step: Step::Pass, .. }));
    }

    #[tokio::test]
    async fn non_greeting_banner_is_rejected() {
        let (client, mut server) = pair();
        let script = tokio::spawn(async move { server.say("599 go away").await });

        let error = UploadSession::handshake(client, Credentials::new("alice", "k"))
            .await
            .unwrap_err();
        script.await.unwrap();
        assert!(matches!(
            error,
            ClientError::Rejected { step: Step::Greeting, ref reply } if reply == "599 go away"
        ));
    }

    #[tokio::test]
    async fn forged_dedup_acceptance_is_detected() {
        let (client, mut server) = pair();
        let script = tokio::spawn(async move {
            login(&mut server).await;
            assert_eq!(server.hear().await, "put a.txt");
            server.say("250 srv").await;
            let data = server.hear().await;
            assert!(data.starts_with("data 3 "));
            server.say(&format!("255 accepted {}", "0".repeat(64))).await;
        });

        let mut session = UploadSession::handshake(client, Credentials::new("alice", "k"))
            .await
            .unwrap();
        let hash = sha256_hex(b"abc");
        let error = session
            .upload("a.txt", &b"abc"[..], 3, HashMode::Declared(hash))
            .await
            .unwrap_err();
        script.await.unwrap();
        assert!(matches!(error, ClientError::ForgedAcceptance { ref received, .. } if received == &"0".repeat(64)));
    }

    #[tokio::test]
    async fn deferred_upload_confirms_the_streamed_hash() {
        let (client, mut server) = pair();
        let script = tokio::spawn(async move {
            login(&mut server).await;
            assert_eq!(server.hear().await, "put notes+v1.txt");
            server.say("250 srv").await;

            let data = server.hear().await;
            let fields: Vec<&str> = data.split(' ').collect();
            assert_eq!(&fields[..3], ["data", "5", "-"]);
            let client_salt = fields[3].to_owned();
            assert_eq!(
                fields[4],
                transfer_signature(b"k", "srv", "notes+v1.txt", 5, "-", &client_salt)
            );
            server.say("253 send 5 bytes now").await;

            let mut payload = [0u8; 5];
            server.reader.read_exact(&mut payload).await.unwrap();
            assert_eq!(&payload, b"hello");
            server.say("254 send hash confirmation").await;

            let hash = sha256_hex(b"hello");
            let confirm = server.hear().await;
            assert_eq!(
                confirm,
                format!(
                    "confirm {hash} {}",
                    transfer_signature(b"k", "srv", "notes+v1.txt", 5, hash.as_str(), &client_salt)
                )
            );
            let signature = acceptance_signature(b"k", &client_salt, hash.as_str());
            server.say(&format!("255 accepted {signature}")).await;
        });

        let mut session = UploadSession::handshake(client, Credentials::new("alice", "k"))
            .await
            .unwrap();
        let receipt = session
            .upload("notes v1.txt", &b"hello"[..], 5, HashMode::Deferred)
            .await
            .unwrap();
        script.await.unwrap();
        assert_eq!(receipt.outcome, UploadOutcome::Stored);
        assert_eq!(receipt.hash, sha256_hex(b"hello"));
        assert_eq!(receipt.bytes_sent, 5);
    }

    #[tokio::test]
    async fn short_source_fails_the_upload() {
        let (client, mut server) = pair();
        let script = tokio::spawn(async move {
            login(&mut server).await;
            server.hear().await;
            server.say("250 srv").await;
            server.hear().await;
            server.say("253 send 10 bytes now").await;
        });

        let mut session = UploadSession::handshake(client, Credentials::new("alice", "k"))
            .await
            .unwrap();
        let error = session
            .upload("a.txt", &b"abc"[..], 10, HashMode::Deferred)
            .await
            .unwrap_err();
        script.await.unwrap();
        assert!(
            matches!(error, ClientError::Io(ref io) if io.kind() == io::ErrorKind::UnexpectedEof)
        );
    }

    #[tokio::test]
    async fn hash_reader_counts_bytes() {
        let (hash, size) = hash_reader(&b"hello"[..]).await.unwrap();
        assert_eq!(hash, sha256_hex(b"hello"));
        assert_eq!(size, 5);
    }
}
