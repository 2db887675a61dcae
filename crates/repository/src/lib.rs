#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `repository` is the on-disk side of a Boat upload. It owns the storage
//! root layout, the scoped temporary file a payload streams into, and the
//! commit step that turns a finished upload into an immutable version plus an
//! atomically updated `current.<filename>` pointer.
//!
//! ```text
//! <storage root>/
//!   tmp/<txn-id>                          in-flight uploads
//!   repositories/<repo>/<txn-id>.<name>   immutable versions
//!   repositories/<repo>/current.<name>    pointer to the newest version
//! ```
//!
//! # Design
//!
//! - [`Storage`] resolves paths below the root and creates [`TempUpload`]s.
//! - [`TempUpload`] wraps the open temporary file together with a guard that
//!   deletes it on drop unless the file was moved into the repository. Every
//!   exit path of a transaction (rejection, digest mismatch, disconnect,
//!   panic) therefore removes the temporary file exactly once.
//! - [`Repository::commit`] renames the temporary file to its version path and
//!   then repoints `current.<name>`. The pointer is a small record naming the
//!   version file and its SHA-256; it is rewritten by renaming a sibling
//!   record over it, which replaces the pointer in one filesystem operation.
//! - Non-versioned repositories claim the pointer with create-if-absent (a
//!   hard link of the prepared record), so of two concurrent first uploads
//!   the first to commit wins and the other receives
//!   [`StorageError::SlotTaken`].
//!
//! # Invariants
//!
//! - `tmp/` and `repositories/` live under the same root so renames between
//!   them stay on one filesystem.
//! - A pointer is only written after its version file exists. Readers that
//!   find a pointer naming a missing file treat the slot as empty.
//! - Version files are never modified after commit.
//!
//! # Errors
//!
//! [`StorageError`] carries the failing path and action for I/O errors and a
//! dedicated variant for a lost non-versioned slot.
//!
//! # Examples
//!
//! ```
//! use checksums::sha256_hex;
//! use repository::{Storage, TransactionId};
//!
//! let root = tempfile::tempdir().unwrap();
//! let storage = Storage::new(root.path());
//! let repo = storage.repository("alice", true);
//!
//! let txn = TransactionId::new(1, 0);
//! let mut upload = storage.create_upload(&txn).unwrap();
//! upload.write_chunk(b"hello").unwrap();
//!
//! let digest = sha256_hex(b"hello");
//! repo.commit(upload, &txn, "greeting.txt", &digest).unwrap();
//!
//! let current = repo.current("greeting.txt").unwrap().unwrap();
//! assert_eq!(current.digest(), &digest);
//! assert_eq!(std::fs::read(current.version_path()).unwrap(), b"hello");
//! ```

mod error;
mod pointer;
mod repository;
mod storage;
mod temp_upload;
mod transaction_id;

pub use error::StorageError;
pub use pointer::CurrentVersion;
pub use repository::Repository;
pub use storage::Storage;
pub use temp_upload::TempUpload;
pub use transaction_id::TransactionId;
