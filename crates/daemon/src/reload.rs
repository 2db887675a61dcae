use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{ConfigError, ServerConfig};

/// Shared, reloadable handle on the active [`ServerConfig`].
///
/// Readers take an `Arc` snapshot and keep using it for as long as they like;
/// a reload swaps the `Arc` under a write lock, so nobody ever observes a
/// half-updated user table. A failed reload leaves the previous value active.
#[derive(Clone, Debug)]
pub struct ConfigHandle {
    source: Option<PathBuf>,
    active: Arc<RwLock<Arc<ServerConfig>>>,
}

impl ConfigHandle {
    /// Wraps an already-resolved configuration with no backing file.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            source: None,
            active: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Loads the configuration at `path` and remembers it for [`reload`](Self::reload).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = ServerConfig::from_file(path)?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            active: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    /// The file this handle reloads from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The configuration currently in effect.
    pub fn snapshot(&self) -> Arc<ServerConfig> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes `config` the active configuration.
    pub fn replace(&self, config: ServerConfig) {
        let next = Arc::new(config);
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Re-reads the backing file and swaps it in.
    ///
    /// A handle created with [`new`](Self::new) has nothing to reload and
    /// returns `Ok(false)`. On a parse error the previous configuration stays
    /// active and the error is returned.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let Some(path) = &self.source else {
            return Ok(false);
        };
        match ServerConfig::from_file(path) {
            Ok(config) => {
                self.replace(config);
                tracing::info!(path = %path.display(), "configuration reloaded");
                Ok(true)
            }
            Err(error) => {
                tracing::warn!(%error, "configuration reload failed; keeping previous configuration");
                Err(error)
            }
        }
    }
}
