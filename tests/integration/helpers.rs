//! A live daemon on `127.0.0.1:0` plus a line-level client for it.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use checksums::sha256_hex;
use daemon::{BoatListener, ConfigHandle, ListenerConfig, ServerConfig, UserRecord};
use protocol::{login_signature, transfer_signature};
use repository::{CurrentVersion, Storage};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;

/// Shared key of every test user.
pub const KEY: &[u8] = b"k";

/// Client salt used by hand-written `DATA` lines.
pub const CLIENT_SALT: &str = "Y2xpZW50LXNhbHQ=";

/// Users: `alice` (versioned) and `bob` (non-versioned), both with [`KEY`].
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig::new(root)
        .with_user(UserRecord::new("alice", KEY, "alice"))
        .with_user(UserRecord::new("bob", KEY, "bob").with_versioning(false))
}

/// A running daemon with its own storage root.
pub struct TestServer {
    addr: SocketAddr,
    root: TempDir,
    shutdown: broadcast::Sender<()>,
    runtime: Option<Runtime>,
}

impl TestServer {
    /// Starts the daemon on the current tokio runtime.
    pub async fn spawn() -> Self {
        let root = tempfile::tempdir().unwrap();
        let listener = bind(root.path()).await;
        let addr = listener.local_addr().unwrap();
        let shutdown = listener.shutdown_signal();
        tokio::spawn(listener.serve());
        Self {
            addr,
            root,
            shutdown,
            runtime: None,
        }
    }

    /// Starts the daemon on a private runtime, for synchronous tests.
    pub fn background() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let root = tempfile::tempdir().unwrap();
        let listener = runtime.block_on(bind(root.path()));
        let addr = listener.local_addr().unwrap();
        let shutdown = listener.shutdown_signal();
        runtime.spawn(listener.serve());
        Self {
            addr,
            root,
            shutdown,
            runtime: Some(runtime),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn storage(&self) -> Storage {
        Storage::new(self.root.path())
    }

    /// Live version of `filename` in `repository`.
    pub fn current(&self, repository: &str, filename: &str) -> Option<CurrentVersion> {
        self.storage()
            .repository(repository, true)
            .current(filename)
            .unwrap()
    }

    /// Number of files under `tmp/`.
    pub fn pending(&self) -> usize {
        self.storage().pending_uploads().unwrap().len()
    }

    /// Waits up to five seconds for `tmp/` to empty.
    pub async fn wait_for_no_pending(&self) {
        for _ in 0..500 {
            if self.pending() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("temporary files left behind: {}", self.pending());
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_secs(1));
        }
    }
}

async fn bind(root: &Path) -> BoatListener {
    let config = test_config(root);
    config.storage().prepare(["alice", "bob"]).unwrap();
    BoatListener::bind(
        ListenerConfig::new("127.0.0.1:0".parse().unwrap()),
        ConfigHandle::new(config),
    )
    .await
    .unwrap()
}

/// Speaks the protocol one line at a time.
pub struct RawClient {
    reader: BufReader<TcpStream>,
}

impl RawClient {
    /// Connects and consumes the greeting.
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self {
            reader: BufReader::new(TcpStream::connect(addr).await.unwrap()),
        };
        let greeting = client.recv().await;
        assert!(greeting.starts_with("220 Boat Server "), "{greeting}");
        client
    }

    pub async fn send(&mut self, line: &str) {
        let stream = self.reader.get_mut();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
    }

    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.reader.get_mut().write_all(bytes).await.unwrap();
    }

    /// Next reply without its line ending; empty once the server closed.
    pub async fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_owned()
    }

    pub async fn call(&mut self, line: &str) -> String {
        self.send(line).await;
        self.recv().await
    }

    /// `USER` and returns the login salt.
    pub async fn challenge(&mut self, user: &str) -> String {
        let reply = self.call(&format!("user {user}")).await;
        reply
            .strip_prefix("251 HMAC-SHA256 ")
            .unwrap_or_else(|| panic!("unexpected challenge: {reply}"))
            .to_owned()
    }

    pub async fn login(&mut self, user: &str) {
        let salt = self.challenge(user).await;
        let reply = self
            .call(&format!("pass {}", login_signature(KEY, &salt)))
            .await;
        assert_eq!(reply, "250 OK");
    }

    /// `PUT` and returns the server salt.
    pub async fn put(&mut self, filename: &str) -> String {
        let reply = self.call(&format!("put {filename}")).await;
        reply
            .strip_prefix("250 ")
            .unwrap_or_else(|| panic!("unexpected PUT reply: {reply}"))
            .to_owned()
    }

    pub async fn shutdown(&mut self) {
        self.reader.get_mut().shutdown().await.unwrap();
    }
}

/// A signed `DATA` line declaring `sha256(payload)`.
pub fn data_line(server_salt: &str, filename: &str, payload: &[u8]) -> String {
    let hash = sha256_hex(payload);
    let size = payload.len() as u64;
    let signature = transfer_signature(KEY, server_salt, filename, size, hash.as_str(), CLIENT_SALT);
    format!("data {size} {hash} {CLIENT_SALT} {signature}")
}

/// A signed `DATA` line deferring the hash.
pub fn deferred_data_line(server_salt: &str, filename: &str, size: u64) -> String {
    let signature = transfer_signature(KEY, server_salt, filename, size, "-", CLIENT_SALT);
    format!("data {size} - {CLIENT_SALT} {signature}")
}

/// A signed `CONFIRM` line for `payload`.
pub fn confirm_line(server_salt: &str, filename: &str, payload: &[u8]) -> String {
    let hash = sha256_hex(payload);
    let signature = transfer_signature(
        KEY,
        server_salt,
        filename,
        payload.len() as u64,
        hash.as_str(),
        CLIENT_SALT,
    );
    format!("confirm {hash} {signature}")
}

/// Replaces the hex character at `index` with a different one.
pub fn flip_hex_char(signature: &str, index: usize) -> String {
    let mut chars: Vec<char> = signature.chars().collect();
    chars[index] = if chars[index] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}

/// Swaps the last whitespace-separated token of `line` for `replacement`.
pub fn replace_signature(line: &str, replacement: &str) -> String {
    let (head, _) = line.rsplit_once(' ').unwrap();
    format!("{head} {replacement}")
}

/// Last whitespace-separated token of `line`.
pub fn signature_of(line: &str) -> &str {
    line.rsplit_once(' ').map_or(line, |(_, tail)| tail)
}
