//! Daemon error reporting.
//!
//! Failures inside a connection are answered on the wire and never reach this
//! type; [`DaemonError`] covers what stops a connection or the whole daemon.

use std::io;
use std::time::Duration;

use repository::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

/// Error returned when serving fails.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer sent nothing within the read timeout.
    #[error("connection idle for {0:?}")]
    Timeout(Duration),
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Storage could not be prepared.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The listen address could not be resolved or bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// `host:port` as configured.
        address: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl DaemonError {
    /// Exit status for the `boatd` binary.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Bind { .. } => 3,
            Self::Io(_) | Self::Timeout(_) | Self::Storage(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn bind_errors_name_the_address() {
        let error = DaemonError::Bind {
            address: "example.invalid:19184".to_owned(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such host"),
        };
        assert_eq!(
            error.to_string(),
            "failed to bind example.invalid:19184: no such host"
        );
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn config_errors_render_transparently() {
        let config = crate::ServerConfig::parse("", Path::new("boat.conf")).unwrap_err();
        let error = DaemonError::from(config);
        assert_eq!(
            error.to_string(),
            "boat.conf: configuration file does not define any users"
        );
        assert_eq!(error.exit_code(), 2);
    }
}
