//! Persistence: `sync()`, `close()`, and the index snapshot file.
//!
//! The snapshot is the recovery anchor: `index_file` is rewritten in full
//! on every `sync`/`close` with a create-or-truncate, write-all, fsync,
//! close sequence, then every segment mapping is flushed. `close`
//! additionally unmaps and releases every segment and is idempotent.

use keydir::KeyDir;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::{Store, StoreError, INDEX_FILE_NAME};

/// Rewrites `<db_dir>/index_file` with a full directory snapshot.
///
/// The file is replaced in full or the call fails; a partial write
/// surfaces as an error and the previous snapshot semantics are gone, so
/// callers treat any failure here as fatal to the sync/close attempt.
fn persist_index(db_dir: &Path, keydir: &KeyDir) -> Result<(), StoreError> {
    let bytes = keydir.encode()?;
    let path = db_dir.join(INDEX_FILE_NAME);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    debug!(
        path = %path.display(),
        bytes = bytes.len(),
        "index snapshot written"
    );
    Ok(())
}

impl Store {
    /// Persists the index snapshot and asks the operating system to flush
    /// every segment mapping.
    ///
    /// A failed `sync` leaves the in-memory state consistent; retrying is
    /// legal.
    pub fn sync(&self) -> Result<(), StoreError> {
        let inner = self.write_inner()?;
        inner.check_open()?;

        persist_index(&self.db_dir, &inner.keydir)?;
        for seg in &inner.segments {
            seg.flush()?;
        }
        Ok(())
    }

    /// Persists the index snapshot, then flushes, unmaps, and releases
    /// every segment.
    ///
    /// Every segment is released even when an earlier step fails; errors
    /// are accumulated and the first one is surfaced. Idempotent: calling
    /// `close` again returns `Ok(())`. All other operations fail once the
    /// store is closed.
    pub fn close(&self) -> Result<(), StoreError> {
        let mut inner = self.write_inner()?;
        if inner.closed {
            return Ok(());
        }

        let mut first_err = persist_index(&self.db_dir, &inner.keydir).err();
        for seg in &inner.segments {
            if let Err(e) = seg.close() {
                if first_err.is_none() {
                    first_err = Some(e.into());
                }
            }
        }
        inner.closed = true;
        debug!(db_dir = %self.db_dir.display(), "store closed");

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
