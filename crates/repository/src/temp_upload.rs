//! crates/repository/src/temp_upload.rs
//!
//! Scoped temporary files for in-flight uploads.
//!
//! [`TempUpload`] pairs the open file with a [`TempFileGuard`]. Dropping the
//! upload at any point removes the file; only [`TempUpload::persist`] moves it
//! somewhere permanent and disarms the guard.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::StorageError;

const WRITE_BUFFER: usize = 64 * 1024;

/// Deletes a file on drop unless [`keep`](TempFileGuard::keep) was called.
#[derive(Debug)]
pub(crate) struct TempFileGuard {
    path: PathBuf,
    keep_on_drop: bool,
}

impl TempFileGuard {
    pub(crate) const fn new(path: PathBuf) -> Self {
        Self {
            path,
            keep_on_drop: false,
        }
    }

    pub(crate) const fn keep(&mut self) {
        self.keep_on_drop = true;
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.keep_on_drop {
            // Already renamed away or never created; nothing to report from drop.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// A temporary upload file below `tmp/`.
#[derive(Debug)]
pub struct TempUpload {
    writer: Option<BufWriter<File>>,
    guard: TempFileGuard,
    written: u64,
}

impl TempUpload {
    /// Creates `path` exclusively. Fails if the file already exists.
    pub fn create(path: PathBuf) -> Result<Self, StorageError> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let file = options
            .open(&path)
            .map_err(|error| StorageError::io("create temporary file", &path, error))?;
        Ok(Self {
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER, file)),
            guard: TempFileGuard::new(path),
            written: 0,
        })
    }

    /// Location of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.guard.path()
    }

    /// Bytes appended so far.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Appends a chunk of payload.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            StorageError::io(
                "write",
                self.guard.path(),
                io::Error::other("temporary file already finished"),
            )
        })?;
        writer
            .write_all(data)
            .map_err(|error| StorageError::io("write", self.guard.path(), error))?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Flushes and closes the file. Idempotent.
    pub fn finish(&mut self) -> Result<(), StorageError> {
        if let Some(writer) = self.writer.take() {
            let file = writer
                .into_inner()
                .map_err(|error| StorageError::io("flush", self.guard.path(), error.into_error()))?;
            file.sync_all()
                .map_err(|error| StorageError::io("sync", self.guard.path(), error))?;
        }
        Ok(())
    }

    /// Finishes the file and renames it to `destination`.
    ///
    /// On failure the temporary file is still removed when `self` drops.
    pub fn persist(mut self, destination: &Path) -> Result<(), StorageError> {
        self.finish()?;
        fs::rename(self.guard.path(), destination)
            .map_err(|error| StorageError::io("rename temporary file to", destination, error))?;
        self.guard.keep();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn temp_file_deleted_on_drop() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("upload");

        {
            let mut upload = TempUpload::create(path.clone()).unwrap();
            upload.write_chunk(b"partial").unwrap();
            assert!(path.exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn temp_file_deleted_on_panic() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("upload");

        let result = std::panic::catch_unwind(|| {
            let _upload = TempUpload::create(path.clone()).unwrap();
            panic!("simulated panic");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn temp_file_deleted_on_error_return() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("upload");

        fn reject(upload: TempUpload) -> Result<(), &'static str> {
            let _upload = upload;
            Err("file hash does not match hash supplied by client")
        }

        let upload = TempUpload::create(path.clone()).unwrap();
        assert!(reject(upload).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn persist_moves_contents_and_keeps_destination() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("upload");
        let destination = dir.path().join("final");

        let mut upload = TempUpload::create(path.clone()).unwrap();
        upload.write_chunk(b"hello ").unwrap();
        upload.write_chunk(b"world").unwrap();
        assert_eq!(upload.written(), 11);
        upload.persist(&destination).unwrap();

        assert!(!path.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"hello world");
    }

    #[test]
    fn failed_persist_still_cleans_up() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("upload");
        let destination = dir.path().join("missing-dir").join("final");

        let upload = TempUpload::create(path.clone()).unwrap();
        assert!(upload.persist(&destination).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn create_refuses_existing_path() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("upload");
        fs::write(&path, b"someone else's").unwrap();

        assert!(TempUpload::create(path.clone()).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"someone else's");
    }

    #[test]
    fn write_after_finish_is_an_error() {
        let dir = tempdir().expect("create temp dir");
        let mut upload = TempUpload::create(dir.path().join("upload")).unwrap();
        upload.finish().unwrap();
        upload.finish().unwrap();
        assert!(upload.write_chunk(b"late").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn temp_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("create temp dir");
        let upload = TempUpload::create(dir.path().join("upload")).unwrap();
        let mode = fs::metadata(upload.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn guard_handles_nonexistent_file() {
        let dir = tempdir().expect("create temp dir");
        let _guard = TempFileGuard::new(dir.path().join("never-created"));
    }
}
