//! # Store — TideCask Coordinator
//!
//! The central orchestrator that ties the [`record`] codec, [`segment`]
//! files, and the [`keydir`] index into a complete append-only
//! log-structured key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌─────────────────────────────────────────────────┐
//! │                    STORE                        │
//! │                                                 │
//! │ write.rs → encode record → append to active     │
//! │              |         segment                  │
//! │              |  (capacity full?)                │
//! │              |        yes                       │
//! │              v                                  │
//! │        allocate segment_file_<n+1>, retry once  │
//! │              |                                  │
//! │              v                                  │
//! │        keydir.set(key, descriptor)              │
//! │                                                 │
//! │ read.rs → keydir.get → segment.get(offset)      │
//! │                                                 │
//! │ persist.rs → index_file snapshot + msync        │
//! │ recovery.rs → load: map segments, decode        │
//! │               snapshot, scan tails              │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `lib.rs`       | `Store` struct, constructor, accessors, `Debug`, `Drop` |
//! | [`write`]      | `put()`, `delete()`, segment rollover              |
//! | [`read`]       | `get()`, `list_keys()`, `fold()`                   |
//! | [`persist`]    | `sync()`, `close()`, index snapshot file           |
//! | [`recovery`]   | `load()`, write-offset reconstruction, tail scan   |
//!
//! ## Durability
//!
//! Every `put` lands in the active segment's mapping before the key enters
//! the directory. `sync`/`close` rewrite `index_file` in full
//! (create-or-truncate, write, fsync, close) and msync every segment.
//! `load` rehydrates the directory from the snapshot and then scans each
//! segment's unsnapshotted tail, so records written after the last `sync`
//! survive a crash.
//!
//! ## Locking
//!
//! One store-wide reader-writer lock: `get`/`list_keys`/`fold` take it
//! shared, `put`/`delete`/`sync`/`close` exclusive. The directory and each
//! segment carry their own finer locks; acquisition order is always
//! store → directory → segment.

mod persist;
mod read;
mod recovery;
mod write;

use keydir::{KeyDir, KeyDirError};
use segment::{Segment, SegmentError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

pub use keydir::Descriptor;
pub use segment::SEGMENT_CAPACITY;

/// Name of the index snapshot file within the store directory.
pub const INDEX_FILE_NAME: &str = "index_file";

/// Errors surfaced by the public store operations.
///
/// This set is closed: internal conditions (segment capacity, invalid
/// offsets, short decodes, snapshot framing) are mapped into [`Io`] or
/// [`Corrupt`] at this boundary.
///
/// [`Io`]: StoreError::Io
/// [`Corrupt`]: StoreError::Corrupt
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is not in the directory.
    #[error("key not found")]
    NotFound,

    /// The encoded record would exceed the segment capacity.
    #[error("entry too large: {size} bytes exceeds segment capacity {capacity}")]
    EntryTooLarge { size: u64, capacity: u64 },

    /// A filesystem, mapping, or flush error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// On-disk or in-memory state failed a consistency check.
    #[error("corrupt store state: {0}")]
    Corrupt(String),
}

impl From<SegmentError> for StoreError {
    fn from(e: SegmentError) -> Self {
        match e {
            SegmentError::Io(io_err) => StoreError::Io(io_err),
            SegmentError::ShortBuffer(err) => StoreError::Corrupt(err.to_string()),
            corrupt @ SegmentError::Corrupt { .. } => StoreError::Corrupt(corrupt.to_string()),
            // CapacityFull is handled by rollover before it can reach the
            // public surface; a repeat failure means a record the size
            // check should have caught, which is an internal fault.
            other => StoreError::Io(io::Error::other(other.to_string())),
        }
    }
}

impl From<KeyDirError> for StoreError {
    fn from(e: KeyDirError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// State behind the store-wide lock.
pub(crate) struct Inner {
    /// Monotonic, dense list of segments; the last one is active.
    pub(crate) segments: Vec<Segment>,
    pub(crate) keydir: KeyDir,
    pub(crate) closed: bool,
}

impl Inner {
    pub(crate) fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Io(io::Error::other("store is closed")))
        } else {
            Ok(())
        }
    }

    pub(crate) fn segment(&self, file_id: u64) -> Result<&Segment, StoreError> {
        self.segments.get(file_id as usize).ok_or_else(|| {
            StoreError::Corrupt(format!("descriptor references unknown segment {}", file_id))
        })
    }
}

/// An embedded append-only key-value store.
///
/// All operations take `&self`; the store is safe to share across threads
/// behind an `Arc`.
pub struct Store {
    db_dir: PathBuf,
    name: String,
    inner: RwLock<Inner>,
}

impl Store {
    /// Creates a fresh store at `<root>/<name>/` with one empty segment
    /// and an empty key directory. Use [`load`](Store::load) to reopen an
    /// existing store.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on directory creation or segment allocation
    /// failure.
    pub fn new<P: AsRef<Path>>(root: P, name: &str) -> Result<Self, StoreError> {
        let db_dir = root.as_ref().join(name);
        fs::create_dir_all(&db_dir)?;

        let seg = Segment::create(&db_dir, 0)?;
        Ok(Self {
            db_dir,
            name: name.to_string(),
            inner: RwLock::new(Inner {
                segments: vec![seg],
                keydir: KeyDir::new(),
                closed: false,
            }),
        })
    }

    pub(crate) fn read_inner(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Corrupt("store lock poisoned".to_string()))
    }

    pub(crate) fn write_inner(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Corrupt("store lock poisoned".to_string()))
    }

    /// Poison-tolerant read used by passive accessors and `Debug`.
    fn peek_inner(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(e) => e.into_inner(),
        }
    }

    /// Store directory (`<root>/<name>`).
    #[must_use]
    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of segment files.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.peek_inner().segments.len()
    }

    /// Number of live keys in the directory.
    #[must_use]
    pub fn key_count(&self) -> u64 {
        self.peek_inner().keydir.count()
    }

    /// Identifier of the segment currently accepting appends.
    #[must_use]
    pub fn active_segment_id(&self) -> u64 {
        self.peek_inner().segments.len().saturating_sub(1) as u64
    }

    /// Reserved: merge/compaction of tombstoned and shadowed records.
    ///
    /// Kept on the public surface so embedders can call it unconditionally;
    /// currently a no-op.
    pub fn merge(&self) -> Result<(), StoreError> {
        self.read_inner()?.check_open()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.peek_inner();
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("db_dir", &self.db_dir)
            .field("segment_count", &inner.segments.len())
            .field("key_count", &inner.keydir.count())
            .field("closed", &inner.closed)
            .finish()
    }
}

/// Best-effort close on drop.
///
/// Persists the index snapshot and releases every mapping unless the store
/// was already closed. Errors cannot propagate out of `Drop`; the data is
/// still recoverable from the segments via [`Store::load`].
impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests;
