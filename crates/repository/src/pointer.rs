//! The `current.<filename>` pointer record.
//!
//! The record is one line: `<version file name> <sha256>\n`. It names a file
//! in the same directory, so a repository directory can be moved as a unit.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use checksums::{Sha256Hex, sha256_hex};

use crate::StorageError;
use crate::temp_upload::TempFileGuard;

/// The version a `current.<filename>` pointer refers to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CurrentVersion {
    version_path: PathBuf,
    digest: Sha256Hex,
}

impl CurrentVersion {
    /// Path of the version file.
    #[must_use]
    pub fn version_path(&self) -> &Path {
        &self.version_path
    }

    /// SHA-256 recorded when the version was committed.
    ///
    /// The dedup fast path trusts this value instead of rehashing the file.
    #[must_use]
    pub const fn digest(&self) -> &Sha256Hex {
        &self.digest
    }
}

/// Reads the pointer at `pointer`.
///
/// Returns `None` when the pointer is absent, unreadable as a record, or
/// names a version file that no longer exists.
pub(crate) fn read(pointer: &Path) -> Result<Option<CurrentVersion>, StorageError> {
    let contents = match fs::read_to_string(pointer) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(StorageError::io("read pointer", pointer, error)),
    };

    let Some((name, digest)) = contents.trim_end().split_once(' ') else {
        tracing::warn!(pointer = %pointer.display(), "ignoring malformed current pointer");
        return Ok(None);
    };
    let (Some(digest), Some(dir)) = (Sha256Hex::parse(digest), pointer.parent()) else {
        tracing::warn!(pointer = %pointer.display(), "ignoring malformed current pointer");
        return Ok(None);
    };
    if name.contains(['/', '\\']) {
        tracing::warn!(pointer = %pointer.display(), "ignoring pointer outside its repository");
        return Ok(None);
    }

    let version_path = dir.join(name);
    if !version_path.is_file() {
        return Ok(None);
    }
    Ok(Some(CurrentVersion {
        version_path,
        digest,
    }))
}

/// How a prepared pointer record is installed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Install {
    /// Replace whatever pointer exists.
    Replace,
    /// Install only if no live pointer exists.
    Claim,
}

/// Outcome of [`install`].
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Installed {
    Yes,
    SlotTaken,
}

/// Atomically points `pointer` at `version_name`.
///
/// The record is written to `staging` first and then renamed (or, for
/// [`Install::Claim`], hard-linked) onto the pointer name, so readers see
/// either the old record or the new one.
pub(crate) fn install(
    pointer: &Path,
    staging: PathBuf,
    version_name: &str,
    digest: &Sha256Hex,
    mode: Install,
) -> Result<Installed, StorageError> {
    let staging = TempFileGuard::new(staging);
    write_record(staging.path(), version_name, digest)?;

    match mode {
        Install::Replace => replace(staging, pointer),
        Install::Claim => match link(staging.path(), pointer)? {
            Installed::Yes => Ok(Installed::Yes),
            Installed::SlotTaken if read(pointer)?.is_some() => Ok(Installed::SlotTaken),
            // Stale pointer whose version file was removed.
            Installed::SlotTaken => reclaim(&staging, pointer),
        },
    }
}

/// Hard-links `record` onto `pointer` unless a pointer already exists.
fn link(record: &Path, pointer: &Path) -> Result<Installed, StorageError> {
    match fs::hard_link(record, pointer) {
        Ok(()) => Ok(Installed::Yes),
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => Ok(Installed::SlotTaken),
        Err(error) => Err(StorageError::io("link pointer", pointer, error)),
    }
}

/// Claims a slot whose pointer is stale.
///
/// Contenders that saw the same stale record race to create a marker named
/// after it; only the marker holder may remove that record, so a live record
/// installed by the winner is never deleted by a slower contender.
fn reclaim(staging: &TempFileGuard, pointer: &Path) -> Result<Installed, StorageError> {
    let stale = match fs::read_to_string(pointer) {
        Ok(stale) => stale,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return link(staging.path(), pointer),
        Err(error) => return Err(StorageError::io("read pointer", pointer, error)),
    };
    if read(pointer)?.is_some() {
        return Ok(Installed::SlotTaken);
    }

    let marker = reclaim_marker(pointer, &stale);
    if let Err(error) = OpenOptions::new().write(true).create_new(true).open(&marker) {
        return if error.kind() == io::ErrorKind::AlreadyExists {
            Ok(Installed::SlotTaken)
        } else {
            Err(StorageError::io("create reclaim marker", &marker, error))
        };
    }
    let _marker = TempFileGuard::new(marker);

    match fs::read_to_string(pointer) {
        Ok(current) if current == stale => match fs::remove_file(pointer) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(StorageError::io("remove stale pointer", pointer, error)),
        },
        Ok(_) => return Ok(Installed::SlotTaken),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(StorageError::io("read pointer", pointer, error)),
    }
    link(staging.path(), pointer)
}

fn reclaim_marker(pointer: &Path, record: &str) -> PathBuf {
    let name = pointer
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    pointer.with_file_name(format!(".{name}.reclaim.{}", sha256_hex(record.as_bytes())))
}

fn replace(mut staging: TempFileGuard, pointer: &Path) -> Result<Installed, StorageError> {
    fs::rename(staging.path(), pointer)
        .map_err(|error| StorageError::io("replace pointer", pointer, error))?;
    staging.keep();
    Ok(Installed::Yes)
}

fn write_record(path: &Path, version_name: &str, digest: &Sha256Hex) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|error| StorageError::io("create pointer record", path, error))?;
    writeln!(file, "{version_name} {digest}")
        .and_then(|()| file.sync_all())
        .map_err(|error| StorageError::io("write pointer record", path, error))
}
