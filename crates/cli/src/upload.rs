//! `boat SOURCE [DESTINATION]`: resolve the request and run one upload.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use client::{ClientError, Credentials, HashMode, Receipt, UploadSession, hash_reader};
use thiserror::Error;
use tokio::io::AsyncSeekExt;

use crate::client_config::ClientConfigError;

/// Everything that can stop `boat` from completing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Loading or validating the client configuration failed.
    #[error(transparent)]
    Config(#[from] ClientConfigError),
    /// The protocol exchange failed.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// `-` was given without a destination name.
    #[error("you must specify a destination filename when uploading from stdin")]
    StdinNeedsDestination,
    /// The source file does not exist.
    #[error("{} doesn't exist", path.display())]
    MissingSource {
        /// Path given on the command line.
        path: PathBuf,
    },
    /// The destination name is not valid UTF-8.
    #[error("destination filename {0:?} is not valid UTF-8")]
    InvalidDestination(OsString),
    /// A local file operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying failure.
        source: io::Error,
    },
}

impl UploadError {
    fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}

/// Where the payload comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Source {
    /// Standard input, spooled to learn its size; the hash is deferred.
    Stdin,
    /// A file hashed before upload so the server can deduplicate.
    File(PathBuf),
}

/// A fully resolved `boat` invocation.
#[derive(Debug)]
pub(crate) struct UploadRequest {
    pub(crate) source: Source,
    pub(crate) destination: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) credentials: Credentials,
}

/// Interprets `SOURCE [DESTINATION]`.
pub(crate) fn resolve_operands(
    source: &OsStr,
    destination: Option<&OsStr>,
) -> Result<(Source, String), UploadError> {
    let destination = destination.filter(|name| !name.is_empty());

    if source == "-" {
        let destination = destination.ok_or(UploadError::StdinNeedsDestination)?;
        return Ok((Source::Stdin, utf8_destination(destination)?));
    }

    let path = PathBuf::from(source);
    if !path.exists() {
        return Err(UploadError::MissingSource { path });
    }
    let destination = match destination {
        Some(name) => name,
        None => path
            .file_name()
            .ok_or_else(|| UploadError::InvalidDestination(source.to_os_string()))?,
    };
    let destination = utf8_destination(destination)?;
    Ok((Source::File(path), destination))
}

fn utf8_destination(name: &OsStr) -> Result<String, UploadError> {
    name.to_str()
        .map(str::to_owned)
        .ok_or_else(|| UploadError::InvalidDestination(name.to_os_string()))
}

/// Copies `input` into an anonymous temporary file and rewinds it.
pub(crate) fn spool<R: Read>(mut input: R) -> Result<(std::fs::File, u64), UploadError> {
    let mut spooled = tempfile::tempfile().map_err(UploadError::io("failed to create spool file"))?;
    let size = io::copy(&mut input, &mut spooled).map_err(UploadError::io("failed to read stdin"))?;
    spooled
        .rewind()
        .map_err(UploadError::io("failed to rewind spool file"))?;
    Ok((spooled, size))
}

/// Source ready to send.
enum Payload {
    Spooled(std::fs::File, u64),
    File(PathBuf),
}

/// Connects, uploads and quits.
///
/// `stdin` is only read for [`Source::Stdin`].
pub(crate) fn execute<R: Read>(request: UploadRequest, stdin: R) -> Result<Receipt, UploadError> {
    let UploadRequest {
        source,
        destination,
        host,
        port,
        credentials,
    } = request;
    let payload = match source {
        Source::Stdin => {
            let (file, size) = spool(stdin)?;
            Payload::Spooled(file, size)
        }
        Source::File(path) => Payload::File(path),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(UploadError::io("failed to start the async runtime"))?;
    runtime.block_on(async move {
        tracing::debug!(host = %host, port, destination = %destination, "connecting");
        let mut session = UploadSession::connect((host.as_str(), port), credentials).await?;

        let receipt = match payload {
            Payload::File(path) => upload_file(&mut session, &path, &destination).await?,
            Payload::Spooled(file, size) => {
                let file = tokio::fs::File::from_std(file);
                session
                    .upload(&destination, file, size, HashMode::Deferred)
                    .await?
            }
        };

        session.quit().await?;
        Ok::<_, UploadError>(receipt)
    })
}

async fn upload_file(
    session: &mut UploadSession<tokio::net::TcpStream>,
    path: &Path,
    destination: &str,
) -> Result<Receipt, UploadError> {
    let context = || format!("failed to read '{}'", path.display());
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(UploadError::io(context()))?;
    let (hash, size) = hash_reader(&mut file)
        .await
        .map_err(UploadError::io(context()))?;
    file.rewind().await.map_err(UploadError::io(context()))?;

    tracing::debug!(path = %path.display(), size, hash = %hash, "hashed source");
    let receipt = session
        .upload(destination, file, size, HashMode::Declared(hash))
        .await?;
    Ok(receipt)
}
