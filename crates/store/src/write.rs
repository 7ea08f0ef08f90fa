//! Write path: `put()`, `delete()`, and segment rollover.
//!
//! Both mutations run under the store's exclusive lock. A `put` appends a
//! freshly timestamped record to the active segment and then points the
//! directory at it; a `delete` zeroes the timestamp of the key's record in
//! place and drops the key from the directory.

use keydir::Descriptor;
use record::{Record, HEADER_SIZE};
use segment::{Segment, SegmentError, SEGMENT_CAPACITY};
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::{Inner, Store, StoreError};

/// Wall-clock seconds since the Unix epoch.
///
/// Record timestamps are assumed positive; `0` is reserved for tombstones.
fn now_seconds() -> Result<i64, StoreError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| StoreError::Io(io::Error::other(e)))?;
    Ok(elapsed.as_secs() as i64)
}

impl Store {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// The record is appended to the active segment; if the segment
    /// reports *capacity full*, a new segment is allocated and the append
    /// retried once. Only after the bytes are in place does the directory
    /// point at the new location, so a failed `put` never dangles.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntryTooLarge`] if the encoded record
    /// (`24 + key + value` bytes) exceeds the segment capacity — checked
    /// before any segment is touched. [`StoreError::Io`] on append
    /// failure.
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.write_inner()?;
        inner.check_open()?;

        let size = (HEADER_SIZE + key.len() + value.len()) as u64;
        if size > SEGMENT_CAPACITY {
            return Err(StoreError::EntryTooLarge {
                size,
                capacity: SEGMENT_CAPACITY,
            });
        }

        let timestamp = now_seconds()?;
        let rec = Record::new(timestamp, key.as_bytes().to_vec(), value.as_bytes().to_vec());

        let (file_id, offset) = inner.append(&self.db_dir, &rec)?;
        inner.keydir.set(
            key,
            Descriptor {
                file_id,
                offset,
                value_size: value.len() as u64,
                timestamp,
            },
        );
        Ok(())
    }

    /// Removes `key` from the store.
    ///
    /// The owning segment overwrites the record's timestamp with zero (a
    /// tombstone, same on-disk length) and the key leaves the directory.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the key is absent.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let inner = self.write_inner()?;
        inner.check_open()?;

        let desc = inner.keydir.get(key).ok_or(StoreError::NotFound)?;
        inner.segment(desc.file_id)?.tombstone(desc.offset)?;
        inner.keydir.delete(key);
        Ok(())
    }
}

impl Inner {
    /// Appends `rec` to the active segment, rolling over to a fresh
    /// segment and retrying once on *capacity full*. Returns the
    /// `(file_id, offset)` the record landed at — the offset is the
    /// segment's `write_offset` immediately before the append.
    pub(crate) fn append(&mut self, db_dir: &Path, rec: &Record) -> Result<(u64, u64), StoreError> {
        let attempt = {
            let active = self.segments.last().ok_or_else(|| {
                StoreError::Corrupt("store has no segments".to_string())
            })?;
            active.write(rec).map(|offset| (active.file_id(), offset))
        };

        match attempt {
            Ok(placed) => Ok(placed),
            Err(SegmentError::CapacityFull { .. }) => {
                let next_id = self.segments.len() as u64;
                info!(segment = next_id, "active segment full, rolling over");
                let seg = Segment::create(db_dir, next_id)?;
                // A second capacity failure surfaces: the size check
                // already guaranteed the record fits an empty segment.
                let offset = seg.write(rec)?;
                self.segments.push(seg);
                Ok((next_id, offset))
            }
            Err(e) => Err(e.into()),
        }
    }
}
