use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Repository, StorageError, TempUpload, TransactionId};

const TMP_DIR: &str = "tmp";
const REPOSITORIES_DIR: &str = "repositories";

/// The storage root shared by all repositories.
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Storage rooted at `root`. Nothing is created until needed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory for in-flight uploads.
    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    /// Directory for the repository called `name`.
    #[must_use]
    pub fn repository_dir(&self, name: &str) -> PathBuf {
        self.root.join(REPOSITORIES_DIR).join(name)
    }

    /// Handle on the repository called `name`.
    #[must_use]
    pub fn repository(&self, name: &str, versioning: bool) -> Repository {
        Repository::new(self.repository_dir(name), versioning)
    }

    /// Creates `tmp/` and the given repository directories.
    pub fn prepare<'a, I>(&self, repositories: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        create_private_dir(&self.tmp_dir())?;
        for name in repositories {
            create_private_dir(&self.repository_dir(name))?;
        }
        Ok(())
    }

    /// Creates the temporary file for `txn` at `tmp/<txn>`.
    pub fn create_upload(&self, txn: &TransactionId) -> Result<TempUpload, StorageError> {
        let tmp = self.tmp_dir();
        create_private_dir(&tmp)?;
        TempUpload::create(tmp.join(txn.to_string()))
    }

    /// Files currently present in `tmp/`.
    pub fn pending_uploads(&self) -> Result<Vec<PathBuf>, StorageError> {
        let tmp = self.tmp_dir();
        let entries = match fs::read_dir(&tmp) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(StorageError::io("list", tmp, error)),
        };
        let mut pending = entries
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|error| StorageError::io("list", &tmp, error))?;
        pending.sort();
        Ok(pending)
    }

    /// Removes every file left in `tmp/`, returning how many were removed.
    ///
    /// Only safe while no upload is in flight, i.e. before the daemon starts
    /// accepting connections.
    pub fn discard_pending(&self) -> Result<usize, StorageError> {
        let pending = self.pending_uploads()?;
        for path in &pending {
            fs::remove_file(path).map_err(|error| StorageError::io("remove", path, error))?;
        }
        Ok(pending.len())
    }
}

/// `mkdir -p` with mode `0770` for newly created directories on Unix.
pub(crate) fn create_private_dir(path: &Path) -> Result<(), StorageError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o770);
    }
    builder
        .create(path)
        .map_err(|error| StorageError::io("create directory", path, error))
}
