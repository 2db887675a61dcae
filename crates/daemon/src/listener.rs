//! crates/daemon/src/listener.rs
//!
//! TCP listener that runs one [`Session`] task per accepted connection.
//!
//! # Example
//!
//! ```no_run
//! use daemon::{BoatListener, ConfigHandle, ListenerConfig, ServerConfig};
//!
//! # async fn example() -> Result<(), daemon::DaemonError> {
//! let config = ConfigHandle::new(ServerConfig::new("/var/lib/boat"));
//! let settings = ListenerConfig::new("0.0.0.0:19184".parse().unwrap()).max_connections(100);
//!
//! let listener = BoatListener::bind(settings, config).await?;
//! listener.serve().await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tracing::Instrument;

use crate::config::DEFAULT_MAX_CONNECTIONS;
use crate::connection::drive;
use crate::error::DaemonError;
use crate::reload::ConfigHandle;
use crate::session::Session;

/// Socket-level settings for [`BoatListener`].
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Maximum number of concurrent connections.
    pub max_connections: usize,
}

impl ListenerConfig {
    /// Settings for `bind_address` with the default connection limit.
    #[must_use]
    pub const fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Sets the maximum number of concurrent connections.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max.max(1);
        self
    }
}

/// Accepts Boat connections until shutdown is requested.
pub struct BoatListener {
    listener: TcpListener,
    settings: ListenerConfig,
    config: ConfigHandle,
    connection_semaphore: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    next_connection_id: AtomicU64,
}

impl BoatListener {
    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Bind`] if the address cannot be bound.
    pub async fn bind(settings: ListenerConfig, config: ConfigHandle) -> Result<Self, DaemonError> {
        let listener = TcpListener::bind(settings.bind_address)
            .await
            .map_err(|source| DaemonError::Bind {
                address: settings.bind_address.to_string(),
                source,
            })?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Ok(Self {
            listener,
            connection_semaphore: Arc::new(Semaphore::new(settings.max_connections)),
            settings,
            config,
            shutdown_tx,
            shutdown_rx,
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Returns the local address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be determined.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a sender that stops [`serve`](Self::serve) when signalled.
    #[must_use]
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// The configuration new sessions read from.
    #[must_use]
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Serves connections until shutdown is requested.
    ///
    /// Each connection runs in its own task. Connections beyond
    /// `max_connections` are closed immediately. Sessions still running at
    /// shutdown are dropped with the runtime, which removes their temporary
    /// files.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are logged and retried.
    pub async fn serve(mut self) -> Result<(), DaemonError> {
        tracing::debug!(
            max_connections = self.settings.max_connections,
            "accepting connections"
        );

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(error) => {
                            tracing::warn!(%error, "accept failed");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&self.connection_semaphore).try_acquire_owned() else {
                        tracing::warn!(
                            peer = %peer_addr,
                            max = self.settings.max_connections,
                            "connection limit reached; closing"
                        );
                        drop(stream);
                        continue;
                    };

                    let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                    let config = self.config.clone();
                    let read_timeout = config.snapshot().timeout();
                    let span = tracing::info_span!("connection", id, peer = %peer_addr);

                    tokio::spawn(
                        async move {
                            tracing::info!("connection accepted");
                            let mut session = Session::new(id, config);
                            match drive(stream, &mut session, read_timeout).await {
                                Ok(()) => tracing::info!("connection closed"),
                                Err(DaemonError::Timeout(idle)) => {
                                    tracing::info!(?idle, "connection timed out");
                                }
                                Err(error) => tracing::warn!(%error, "connection failed"),
                            }
                            drop(permit);
                        }
                        .instrument(span),
                    );
                }

                _ = self.shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }
}
