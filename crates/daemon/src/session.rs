//! The per-connection protocol state machine.
//!
//! A [`Session`] tracks authentication and at most one open upload
//! transaction:
//!
//! ```text
//! auth:         Anonymous -> UserSubmitted -> Authenticated
//! transaction:  None -> AwaitingData -> ReceivingPayload
//!                    -> AwaitingHashConfirm (hash deferred) -> committed
//! ```
//!
//! Each command handler returns a [`Dispatch`]; the first guard that fails
//! produces the rejection and nothing else runs for that line.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use checksums::{Sha256, Sha256Hex, random_salt};
use protocol::{
    ArgumentError, ConfirmArguments, DataArguments, DeclaredHash, Keyword, MAX_FILENAME_LENGTH,
    PROTOCOL_VERSION, Reply, StatusCode, acceptance_signature, decode_filename, format_greeting,
    is_valid_filename, is_valid_username, split_command, verify_login, verify_transfer,
};
use repository::{Repository, Storage, StorageError, TempUpload, TransactionId};

use crate::config::UserRecord;
use crate::handler::{ConnectionHandler, Dispatch, Response};
use crate::reload::ConfigHandle;


const SYSTEM_ERROR_TEXT: &str = "system error occurred, disconnecting";

enum AuthState {
    Anonymous,
    UserSubmitted { username: String, login_salt: String },
    Authenticated(Arc<UserRecord>),
}

struct Transaction {
    id: TransactionId,
    user: Arc<UserRecord>,
    filename: String,
    storage: Storage,
    repository: Repository,
    server_salt: String,
    stage: Stage,
}

enum Stage {
    AwaitingData,
    ReceivingPayload {
        size: u64,
        hash: DeclaredHash,
        client_salt: String,
        upload: TempUpload,
        digest: Sha256,
    },
    AwaitingHashConfirm {
        size: u64,
        client_salt: String,
        upload: TempUpload,
        computed: Sha256Hex,
    },
}

/// State for one accepted connection.
pub struct Session {
    connection_id: u64,
    config: ConfigHandle,
    auth: AuthState,
    transaction: Option<Transaction>,
    uploads_started: u64,
    temporary_files: BTreeSet<PathBuf>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = match &self.auth {
            AuthState::Anonymous => "anonymous",
            AuthState::UserSubmitted { .. } => "user-submitted",
            AuthState::Authenticated(_) => "authenticated",
        };
        f.debug_struct("Session")
            .field("connection_id", &self.connection_id)
            .field("auth", &auth)
            .field("transaction", &self.transaction.as_ref().map(|txn| txn.id.to_string()))
            .field("uploads_started", &self.uploads_started)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates the session for connection `connection_id`.
    #[must_use]
    pub fn new(connection_id: u64, config: ConfigHandle) -> Self {
        Self {
            connection_id,
            config,
            auth: AuthState::Anonymous,
            transaction: None,
            uploads_started: 0,
            temporary_files: BTreeSet::new(),
        }
    }

    /// Connection id assigned by the listener.
    #[must_use]
    pub const fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Name of the authenticated user, if any.
    #[must_use]
    pub fn authenticated_user(&self) -> Option<&str> {
        match &self.auth {
            AuthState::Authenticated(user) => Some(user.name()),
            _ => None,
        }
    }

    /// Returns `true` while an upload transaction is open.
    #[must_use]
    pub const fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn user(&mut self, args: Option<&str>) -> Dispatch<Response> {
        if matches!(self.auth, AuthState::Authenticated(_)) {
            return Err(rejected("already authenticated"));
        }
        let username = args.unwrap_or_default();
        if !is_valid_username(username) {
            return Err(rejected("invalid username"));
        }

        let login_salt = random_salt().map_err(|error| system_error(&error))?;
        let reply = Reply::new(StatusCode::CHALLENGE, format!("HMAC-SHA256 {login_salt}"));
        self.auth = AuthState::UserSubmitted {
            username: username.to_owned(),
            login_salt,
        };
        Ok(Response::reply(reply))
    }

    fn pass(&mut self, args: Option<&str>) -> Dispatch<Response> {
        let (username, login_salt) = match std::mem::replace(&mut self.auth, AuthState::Anonymous) {
            AuthState::UserSubmitted {
                username,
                login_salt,
            } => (username, login_salt),
            AuthState::Anonymous => return Err(rejected("USER first")),
            authenticated @ AuthState::Authenticated(_) => {
                self.auth = authenticated;
                return Err(rejected("already authenticated"));
            }
        };

        let candidate = args.unwrap_or_default();
        let config = self.config.snapshot();
        let user = config.user(&username);
        let accepted = match &user {
            Some(user) => verify_login(user.key().expose(), &login_salt, candidate),
            None => {
                // Same work for unknown users.
                let _ = verify_login(&[], &login_salt, candidate);
                false
            }
        };

        match user {
            Some(user) if accepted => {
                tracing::info!(user = %username, "login succeeded");
                self.auth = AuthState::Authenticated(user);
                Ok(Response::reply(Reply::new(StatusCode::OK, "OK")))
            }
            _ => {
                tracing::warn!(user = %username, "login failed");
                Err(Response::reply(Reply::new(
                    StatusCode::UNAUTHORIZED,
                    "invalid username or password",
                )))
            }
        }
    }

    fn put(&mut self, args: Option<&str>) -> Dispatch<Response> {
        let user = self.require_user()?;
        if !user.access().can_write() {
            return Err(Response::reply(Reply::new(
                StatusCode::FORBIDDEN,
                "no write access",
            )));
        }
        if self.transaction.is_some() {
            return Err(rejected("PUT already sent"));
        }
        let filename = args.unwrap_or_default();
        if !is_valid_filename(filename) {
            return Err(rejected("invalid filename"));
        }
        if filename.len() > MAX_FILENAME_LENGTH {
            return Err(rejected("filename is too long"));
        }

        let server_salt = random_salt().map_err(|error| system_error(&error))?;
        let storage = self.config.snapshot().storage();
        let repository = storage.repository(user.repository(), user.versioning());
        let id = TransactionId::new(self.connection_id, self.uploads_started);
        self.uploads_started += 1;

        tracing::debug!(
            txn = %id,
            filename = %decode_filename(filename),
            repository = user.repository(),
            "upload transaction opened"
        );
        let reply = Reply::new(StatusCode::OK, server_salt.clone());
        self.transaction = Some(Transaction {
            id,
            user,
            filename: filename.to_owned(),
            storage,
            repository,
            server_salt,
            stage: Stage::AwaitingData,
        });
        Ok(Response::reply(reply))
    }

    fn data(&mut self, args: Option<&str>) -> Dispatch<Response> {
        let Some(transaction) = self.transaction.as_ref() else {
            return Err(rejected("PUT first"));
        };
        if !matches!(transaction.stage, Stage::AwaitingData) {
            return Err(rejected("DATA already sent"));
        }

        let data = parse_arguments(DataArguments::parse, args)?;
        if !verify_transfer(
            transaction.user.key().expose(),
            &transaction.server_salt,
            &transaction.filename,
            data.size,
            data.hash.as_wire(),
            &data.client_salt,
            &data.signature,
        ) {
            tracing::warn!(txn = %transaction.id, "DATA signature mismatch");
            return Err(rejected("invalid signature"));
        }

        let Some(mut transaction) = self.transaction.take() else {
            return Err(rejected("PUT first"));
        };
        let current = match transaction.repository.current(&transaction.filename) {
            Ok(current) => current,
            Err(error) => return Err(self.fail(&error)),
        };

        if let (Some(current), Some(declared)) = (&current, data.hash.known()) {
            if current.digest() == declared {
                let signature = acceptance_signature(
                    transaction.user.key().expose(),
                    &data.client_salt,
                    declared.as_str(),
                );
                tracing::info!(
                    txn = %transaction.id,
                    filename = %decode_filename(&transaction.filename),
                    version = %current.version_path().display(),
                    "upload deduplicated"
                );
                return Ok(accepted(&signature));
            }
        }

        if current.is_some() && !transaction.repository.versioning() {
            tracing::info!(
                txn = %transaction.id,
                filename = %decode_filename(&transaction.filename),
                "refusing to overwrite non-versioned file"
            );
            return Err(rejected("file already exists"));
        }

        let upload = match transaction.storage.create_upload(&transaction.id) {
            Ok(upload) => upload,
            Err(error) => return Err(self.fail(&error)),
        };
        self.temporary_files.insert(upload.path().to_path_buf());

        let size = data.size;
        transaction.stage = Stage::ReceivingPayload {
            size,
            hash: data.hash,
            client_salt: data.client_salt,
            upload,
            digest: Sha256::new(),
        };
        self.transaction = Some(transaction);
        Ok(Response::expect_payload(
            Reply::new(StatusCode::SEND_PAYLOAD, format!("send {size} bytes now")),
            size,
        ))
    }

    fn confirm(&mut self, args: Option<&str>) -> Dispatch<Response> {
        let awaiting = self
            .transaction
            .as_ref()
            .is_some_and(|txn| matches!(txn.stage, Stage::AwaitingHashConfirm { .. }));
        if !awaiting {
            return Err(rejected("no need to send CONFIRM"));
        }
        let confirm = parse_arguments(ConfirmArguments::parse, args)?;

        let Some(transaction) = self.transaction.take() else {
            return Err(rejected("no need to send CONFIRM"));
        };
        let Stage::AwaitingHashConfirm {
            size,
            client_salt,
            upload,
            computed,
        } = transaction.stage
        else {
            return Err(rejected("no need to send CONFIRM"));
        };

        if !verify_transfer(
            transaction.user.key().expose(),
            &transaction.server_salt,
            &transaction.filename,
            size,
            confirm.hash.as_str(),
            &client_salt,
            &confirm.signature,
        ) {
            tracing::warn!(txn = %transaction.id, "CONFIRM signature mismatch");
            self.forget_upload(upload);
            return Err(rejected("invalid signature"));
        }

        let finished = Finished {
            id: transaction.id,
            user: transaction.user,
            filename: transaction.filename,
            repository: transaction.repository,
            client_salt,
            upload,
            declared: confirm.hash,
            computed,
        };
        self.commit(finished)
    }

    fn get(&mut self) -> Dispatch<Response> {
        self.require_user()?;
        Err(rejected("not implemented"))
    }

    fn require_user(&self) -> Dispatch<Arc<UserRecord>> {
        match &self.auth {
            AuthState::Authenticated(user) => Ok(Arc::clone(user)),
            _ => Err(rejected("not authenticated")),
        }
    }

    /// Checks the received digest and publishes the version.
    fn commit(&mut self, finished: Finished) -> Dispatch<Response> {
        let Finished {
            id,
            user,
            filename,
            repository,
            client_salt,
            upload,
            declared,
            computed,
        } = finished;
        let temporary = upload.path().to_path_buf();

        if declared != computed {
            tracing::warn!(
                txn = %id,
                declared = %declared,
                computed = %computed,
                "payload digest mismatch"
            );
            self.forget_upload(upload);
            return Err(rejected("file hash does not match hash supplied by client"));
        }

        let outcome = repository.commit(upload, &id, &filename, &computed);
        self.temporary_files.remove(&temporary);
        match outcome {
            Ok(version) => {
                tracing::info!(
                    txn = %id,
                    user = user.name(),
                    filename = %decode_filename(&filename),
                    version = %version.display(),
                    "upload committed"
                );
                let signature =
                    acceptance_signature(user.key().expose(), &client_salt, declared.as_str());
                Ok(accepted(&signature))
            }
            Err(StorageError::SlotTaken { .. }) => {
                tracing::info!(txn = %id, "non-versioned slot filled by a concurrent upload");
                Err(rejected(
                    "file with same filename was uploaded before this upload completed",
                ))
            }
            Err(error) => Err(self.fail(&error)),
        }
    }

    /// Drops `upload`, deleting its temporary file.
    fn forget_upload(&mut self, upload: TempUpload) {
        let path = upload.path().to_path_buf();
        drop(upload);
        self.temporary_files.remove(&path);
    }

    /// Abandons the transaction and answers `599`.
    fn fail(&mut self, error: &StorageError) -> Response {
        self.cleanup();
        system_error(error)
    }

    fn cleanup(&mut self) {
        self.transaction = None;
        for path in std::mem::take(&mut self.temporary_files) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed temporary file");
                }
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to remove temporary file");
                }
            }
        }
    }
}

/// A transaction whose payload has fully arrived.
struct Finished {
    id: TransactionId,
    user: Arc<UserRecord>,
    filename: String,
    repository: Repository,
    client_salt: String,
    upload: TempUpload,
    declared: Sha256Hex,
    computed: Sha256Hex,
}

impl ConnectionHandler for Session {
    fn greeting(&mut self) -> Response {
        Response::reply(format_greeting(PROTOCOL_VERSION))
    }

    fn on_line(&mut self, line: &str) -> Response {
        let (keyword, args) = split_command(line);
        let outcome = match keyword {
            Keyword::User => self.user(args),
            Keyword::Pass => self.pass(args),
            Keyword::Put => self.put(args),
            Keyword::Data => self.data(args),
            Keyword::Confirm => self.confirm(args),
            Keyword::Get => self.get(),
            Keyword::Quit => Ok(Response::close(Reply::new(StatusCode::BYE, "bye"))),
            Keyword::Unknown => Err(rejected("unknown command")),
        };
        outcome.unwrap_or_else(|handled| handled)
    }

    fn on_payload(&mut self, chunk: &[u8]) -> Option<Response> {
        let Some(Transaction {
            stage: Stage::ReceivingPayload { upload, digest, .. },
            ..
        }) = self.transaction.as_mut()
        else {
            tracing::error!("payload received without a transaction");
            self.cleanup();
            return Some(Response::close(Reply::new(
                StatusCode::SYSTEM_ERROR,
                SYSTEM_ERROR_TEXT,
            )));
        };

        digest.update(chunk);
        let written = upload.write_chunk(chunk);
        match written {
            Ok(()) => None,
            Err(error) => Some(self.fail(&error)),
        }
    }

    fn on_payload_end(&mut self) -> Response {
        let Some(transaction) = self.transaction.take() else {
            return rejected("PUT first");
        };
        let Transaction {
            id,
            user,
            filename,
            storage,
            repository,
            server_salt,
            stage,
        } = transaction;

        let Stage::ReceivingPayload {
            size,
            hash,
            client_salt,
            upload,
            digest,
        } = stage
        else {
            tracing::error!(txn = %id, "payload ended outside of a transfer");
            self.cleanup();
            return Response::close(Reply::new(StatusCode::SYSTEM_ERROR, SYSTEM_ERROR_TEXT));
        };
        let computed = digest.finalize();
        tracing::debug!(txn = %id, bytes = upload.written(), "payload received");

        match hash {
            DeclaredHash::Known(declared) => self
                .commit(Finished {
                    id,
                    user,
                    filename,
                    repository,
                    client_salt,
                    upload,
                    declared,
                    computed,
                })
                .unwrap_or_else(|handled| handled),
            DeclaredHash::Deferred => {
                self.transaction = Some(Transaction {
                    id,
                    user,
                    filename,
                    storage,
                    repository,
                    server_salt,
                    stage: Stage::AwaitingHashConfirm {
                        size,
                        client_salt,
                        upload,
                        computed,
                    },
                });
                Response::reply(Reply::new(
                    StatusCode::SEND_CONFIRMATION,
                    "send hash confirmation",
                ))
            }
        }
    }

    fn on_disconnect(&mut self) {
        if self.transaction.is_some() {
            tracing::debug!("connection closed with an open transaction");
        }
        self.cleanup();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn rejected(reason: &'static str) -> Response {
    Response::reply(Reply::rejected(reason))
}

fn accepted(signature: &str) -> Response {
    Response::reply(Reply::new(
        StatusCode::ACCEPTED,
        format!("accepted {signature}"),
    ))
}

fn parse_arguments<T>(
    parse: fn(&str) -> Result<T, ArgumentError>,
    args: Option<&str>,
) -> Dispatch<T> {
    parse(args.unwrap_or_default())
        .map_err(|error| Response::reply(Reply::rejected(error.to_string())))
}

/// `599`, then close the connection.
pub(crate) fn system_error(error: &dyn std::error::Error) -> Response {
    tracing::error!(%error, "storage failure; closing connection");
    Response::close(Reply::new(StatusCode::SYSTEM_ERROR, SYSTEM_ERROR_TEXT))
}
