//! `boatd` process lifecycle: load, prepare storage, listen, reload, stop.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::config::{DEFAULT_CONFIG_PATH, ServerConfig, UserRecord};
use crate::error::DaemonError;
use crate::listener::{BoatListener, ListenerConfig};
use crate::reload::ConfigHandle;
use crate::systemd::ServiceNotifier;

/// Options accepted by [`run`].
#[derive(Clone, Debug)]
pub struct DaemonOptions {
    /// Configuration file to load and reload.
    pub config_path: PathBuf,
    /// Listen address overriding the file's `address`.
    pub address: Option<String>,
    /// Listen port overriding the file's `port`.
    pub port: Option<u16>,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            address: None,
            port: None,
        }
    }
}

/// Runs the daemon on a fresh multi-threaded runtime until shutdown.
///
/// # Errors
///
/// See [`run`].
pub fn run_blocking(options: DaemonOptions) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("boatd")
        .build()?;
    runtime.block_on(run(options))
}

/// Loads the configuration, binds the listener and serves until Ctrl-C or
/// `SIGTERM`. `SIGHUP` reloads the configuration file.
///
/// # Errors
///
/// Fails if the configuration cannot be loaded, storage cannot be prepared or
/// the listen address cannot be resolved or bound.
pub async fn run(options: DaemonOptions) -> Result<(), DaemonError> {
    let config = ConfigHandle::load(&options.config_path)?;
    let snapshot = config.snapshot();
    prepare_storage(&snapshot)?;
    let discarded = snapshot.storage().discard_pending()?;
    if discarded > 0 {
        tracing::info!(count = discarded, "removed leftover temporary uploads");
    }

    let address = options.address.as_deref().unwrap_or(snapshot.address());
    let port = options.port.unwrap_or(snapshot.port());
    let bind_address = resolve(address, port).await?;

    let settings = ListenerConfig::new(bind_address).max_connections(snapshot.max_connections());
    let listener = BoatListener::bind(settings, config.clone()).await?;
    let local = listener.local_addr()?;
    tracing::info!(
        address = %local,
        storage = %snapshot.storage_path().display(),
        users = snapshot.users().count(),
        "listening"
    );

    let notifier = ServiceNotifier::new();
    report(notifier.ready(&format!("listening on {local}")));
    let signals = tokio::spawn(watch_signals(config, listener.shutdown_signal(), notifier));

    let served = listener.serve().await;
    signals.abort();
    report(notifier.stopping());
    served
}

/// Creates `tmp/` and every configured repository directory.
fn prepare_storage(config: &ServerConfig) -> Result<(), DaemonError> {
    config
        .storage()
        .prepare(config.users().map(UserRecord::repository))?;
    Ok(())
}

async fn resolve(address: &str, port: u16) -> Result<SocketAddr, DaemonError> {
    let bind_error = |source| DaemonError::Bind {
        address: format!("{address}:{port}"),
        source,
    };
    let mut candidates = tokio::net::lookup_host((address, port))
        .await
        .map_err(bind_error)?;
    candidates.next().ok_or_else(|| {
        bind_error(io::Error::new(
            io::ErrorKind::NotFound,
            "address resolved to nothing",
        ))
    })
}

fn reload(config: &ConfigHandle, notifier: ServiceNotifier) {
    report(notifier.reloading());
    // Failures are logged by the handle; the previous configuration stays.
    if let Ok(true) = config.reload() {
        if let Err(error) = prepare_storage(&config.snapshot()) {
            tracing::warn!(%error, "failed to prepare storage after reload");
        }
    }
    report(notifier.ready("configuration reloaded"));
}

#[cfg(unix)]
async fn watch_signals(
    config: ConfigHandle,
    shutdown: broadcast::Sender<()>,
    notifier: ServiceNotifier,
) {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut hangup, mut terminate) =
        match (signal(SignalKind::hangup()), signal(SignalKind::terminate())) {
            (Ok(hangup), Ok(terminate)) => (hangup, terminate),
            (Err(error), _) | (_, Err(error)) => {
                tracing::warn!(%error, "failed to install signal handlers; only Ctrl-C stops the daemon");
                let _ = tokio::signal::ctrl_c().await;
                let _ = shutdown.send(());
                return;
            }
        };

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received; reloading configuration");
                reload(&config, notifier);
            }
            _ = terminate.recv() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    let _ = shutdown.send(());
}

#[cfg(not(unix))]
async fn watch_signals(
    config: ConfigHandle,
    shutdown: broadcast::Sender<()>,
    notifier: ServiceNotifier,
) {
    let _ = (config, notifier);
    let _ = tokio::signal::ctrl_c().await;
    let _ = shutdown.send(());
}

fn report(result: io::Result<()>) {
    if let Err(error) = result {
        tracing::debug!(%error, "service manager notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn resolves_numeric_addresses() {
        let address = resolve("127.0.0.1", 19184).await.unwrap();
        assert_eq!(address, "127.0.0.1:19184".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn missing_configuration_fails_before_binding() {
        let options = DaemonOptions {
            config_path: PathBuf::from("/nonexistent/boat.conf"),
            ..DaemonOptions::default()
        };
        let error = run(options).await.unwrap_err();
        assert!(matches!(error, DaemonError::Config(_)));
    }

    #[test]
    fn prepare_storage_creates_repositories() {
        let root = tempdir().unwrap();
        let config = ServerConfig::new(root.path())
            .with_user(UserRecord::new("alice", "k", "alice"))
            .with_user(UserRecord::new("bob", "k", "shared"));
        prepare_storage(&config).unwrap();

        assert!(root.path().join("tmp").is_dir());
        assert!(root.path().join("repositories/alice").is_dir());
        assert!(root.path().join("repositories/shared").is_dir());
    }

    #[test]
    fn reload_prepares_new_repositories() {
        let root = tempdir().unwrap();
        let file = root.path().join("boat.conf");
        let storage = root.path().join("store");
        fs::write(
            &file,
            format!("storage path = {}\n[alice]\nkey = k\nrepository = a\n", storage.display()),
        )
        .unwrap();
        let config = ConfigHandle::load(&file).unwrap();

        fs::write(
            &file,
            format!(
                "storage path = {}\n[alice]\nkey = k\nrepository = a\n[bob]\nkey = k\nrepository = b\n",
                storage.display()
            ),
        )
        .unwrap();
        reload(&config, ServiceNotifier::new());

        assert!(config.snapshot().user("bob").is_some());
        assert!(storage.join("repositories/b").is_dir());
    }
}
