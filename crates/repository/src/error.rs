use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by repository storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        /// What was being attempted, e.g. `"create directory"`.
        action: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A non-versioned slot already holds a live version.
    #[error("file with same filename was uploaded before this upload completed: {filename}")]
    SlotTaken {
        /// Wire filename of the slot.
        filename: String,
    },
}

impl StorageError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
