use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use checksums::Sha256Hex;

use crate::pointer::{self, CurrentVersion, Install, Installed};
use crate::storage::create_private_dir;
use crate::temp_upload::TempFileGuard;
use crate::{StorageError, TempUpload, TransactionId};

const POINTER_PREFIX: &str = "current.";

/// One user repository directory.
#[derive(Clone, Debug)]
pub struct Repository {
    dir: PathBuf,
    versioning: bool,
}

impl Repository {
    pub(crate) const fn new(dir: PathBuf, versioning: bool) -> Self {
        Self { dir, versioning }
    }

    /// Directory holding versions and pointers.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Whether every upload is kept as a new version.
    ///
    /// When `false` a filename can be filled once; later uploads of the same
    /// filename are refused unless they deduplicate against the stored copy.
    #[must_use]
    pub const fn versioning(&self) -> bool {
        self.versioning
    }

    /// Path of the `current.<filename>` pointer.
    #[must_use]
    pub fn pointer_path(&self, filename: &str) -> PathBuf {
        self.dir.join(format!("{POINTER_PREFIX}{filename}"))
    }

    /// Path a transaction's version file will take.
    #[must_use]
    pub fn version_path(&self, txn: &TransactionId, filename: &str) -> PathBuf {
        self.dir.join(version_name(txn, filename))
    }

    /// The live version of `filename`, if any.
    pub fn current(&self, filename: &str) -> Result<Option<CurrentVersion>, StorageError> {
        pointer::read(&self.pointer_path(filename))
    }

    /// Returns `true` when `filename` has a live version.
    pub fn is_occupied(&self, filename: &str) -> Result<bool, StorageError> {
        Ok(self.current(filename)?.is_some())
    }

    /// All stored versions of `filename`, oldest transaction first.
    pub fn versions(&self, filename: &str) -> Result<Vec<PathBuf>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(StorageError::io("list", &self.dir, error)),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| StorageError::io("list", &self.dir, error))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if is_version_of(name, filename) {
                versions.push(entry.path());
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Publishes a finished upload as the newest version of `filename`.
    ///
    /// The temporary file is renamed to `<txn>.<filename>` and the pointer is
    /// then swapped in one step. For non-versioned repositories the slot is
    /// re-checked here and claimed atomically; losing the claim returns
    /// [`StorageError::SlotTaken`] and leaves no trace of this upload.
    ///
    /// `upload` is consumed: on every error path its temporary file is
    /// removed.
    pub fn commit(
        &self,
        upload: TempUpload,
        txn: &TransactionId,
        filename: &str,
        digest: &Sha256Hex,
    ) -> Result<PathBuf, StorageError> {
        create_private_dir(&self.dir)?;

        if !self.versioning && self.is_occupied(filename)? {
            return Err(StorageError::SlotTaken {
                filename: filename.to_owned(),
            });
        }

        let name = version_name(txn, filename);
        let version_path = self.dir.join(&name);
        upload.persist(&version_path)?;
        // Removed again unless the pointer ends up naming it.
        let mut version = TempFileGuard::new(version_path);

        let mode = if self.versioning {
            Install::Replace
        } else {
            Install::Claim
        };
        let staging = self.dir.join(format!(".{POINTER_PREFIX}{filename}.{txn}"));
        match pointer::install(&self.pointer_path(filename), staging, &name, digest, mode)? {
            Installed::Yes => {
                version.keep();
                tracing::debug!(
                    version = %version.path().display(),
                    %digest,
                    "published version"
                );
                Ok(version.path().to_path_buf())
            }
            Installed::SlotTaken => Err(StorageError::SlotTaken {
                filename: filename.to_owned(),
            }),
        }
    }
}

fn version_name(txn: &TransactionId, filename: &str) -> String {
    format!("{txn}.{filename}")
}

/// `<secs>.<pid>.<conn>.<seq>.<filename>`
fn is_version_of(name: &str, filename: &str) -> bool {
    let Some(prefix) = name
        .strip_suffix(filename)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    let fields: Vec<&str> = prefix.split('.').collect();
    fields.len() == 4
        && fields
            .iter()
            .all(|field| !field.is_empty() && field.bytes().all(|byte| byte.is_ascii_digit()))
}
