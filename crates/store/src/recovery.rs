//! Cold-start path: `load()` reopens an existing store directory.
//!
//! Recovery maps every `segment_file_<n>` in ascending order, rehydrates
//! the directory from the `index_file` snapshot, and then reconstructs
//! each segment's `write_offset`: the snapshot gives the last known end of
//! every segment (`max(offset + record length)` over its descriptors), and
//! a forward scan from there replays whatever was appended after the last
//! `sync` — live records re-enter the directory, tombstones drop their
//! key. The reserved space past the data reads as zeros (segment files are
//! truncated to capacity at creation), so an all-zero header terminates
//! the scan reliably.
//!
//! A tombstone overwrite that landed *before* the snapshot's end offset is
//! not replayed; the stale directory entry it leaves behind is caught by
//! the read path's zero-timestamp check.

use keydir::{Descriptor, KeyDir};
use record::{Record, HEADER_SIZE};
use segment::{Segment, SEGMENT_CAPACITY, SEGMENT_FILE_PREFIX};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

use crate::{Inner, Store, StoreError, INDEX_FILE_NAME};

/// Numeric suffixes of the `segment_file_<n>` entries in `db_dir`,
/// ascending. Files that do not match the pattern are ignored.
fn segment_ids(db_dir: &Path) -> Result<Vec<u64>, StoreError> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(db_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(suffix) = name.strip_prefix(SEGMENT_FILE_PREFIX) {
            if let Ok(id) = suffix.parse::<u64>() {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

impl Store {
    /// Reopens the store at `<root>/<name>/`.
    ///
    /// A directory with no segment files degenerates to
    /// [`new`](Store::new). Segment ids must be dense starting at 0 and
    /// every segment file exactly capacity-sized; the snapshot, when
    /// present, must decode cleanly — anything else is
    /// [`StoreError::Corrupt`].
    pub fn load<P: AsRef<Path>>(root: P, name: &str) -> Result<Self, StoreError> {
        let db_dir = root.as_ref().join(name);
        fs::create_dir_all(&db_dir)?;

        let ids = segment_ids(&db_dir)?;
        if ids.is_empty() {
            info!(db_dir = %db_dir.display(), "no segment files found, starting fresh");
            return Self::new(root, name);
        }
        for (expected, id) in ids.iter().enumerate() {
            if *id != expected as u64 {
                return Err(StoreError::Corrupt(format!(
                    "segment numbering has a gap: expected {}, found {}",
                    expected, id
                )));
            }
        }

        let segments = ids
            .iter()
            .map(|id| Segment::open(&db_dir, *id))
            .collect::<Result<Vec<_>, _>>()?;

        let keydir = KeyDir::new();
        let index_path = db_dir.join(INDEX_FILE_NAME);
        let snapshot_found = index_path.exists();
        if snapshot_found {
            keydir.decode(&fs::read(&index_path)?)?;
        }

        // Last known end of each segment, from the snapshot's descriptors.
        let mut scan_starts = vec![0u64; segments.len()];
        for (key, desc) in keydir.iterate() {
            let file_id = desc.file_id as usize;
            if file_id >= segments.len() {
                return Err(StoreError::Corrupt(format!(
                    "snapshot references unknown segment {}",
                    desc.file_id
                )));
            }
            let end = desc
                .offset
                .saturating_add(HEADER_SIZE as u64)
                .saturating_add(key.len() as u64)
                .saturating_add(desc.value_size);
            if end > SEGMENT_CAPACITY {
                return Err(StoreError::Corrupt(format!(
                    "snapshot descriptor for segment {} ends past capacity",
                    desc.file_id
                )));
            }
            scan_starts[file_id] = scan_starts[file_id].max(end);
        }

        // Replay each segment's unsnapshotted tail. Records are collected
        // first and applied after the scan returns, so the directory lock
        // is never taken while the segment lock is held.
        let mut recovered = 0usize;
        for seg in &segments {
            let file_id = seg.file_id();
            let mut tail: Vec<(u64, Record)> = Vec::new();
            let end = seg.scan_from(scan_starts[file_id as usize], |offset, rec| {
                tail.push((offset, rec.to_record()));
            })?;
            seg.set_write_offset(end);

            for (offset, rec) in tail {
                let key = String::from_utf8(rec.key).map_err(|_| {
                    StoreError::Corrupt(format!(
                        "record key is not valid utf-8 in segment {} at offset {}",
                        file_id, offset
                    ))
                })?;
                if rec.timestamp == 0 {
                    keydir.delete(&key);
                } else {
                    keydir.set(
                        &key,
                        Descriptor {
                            file_id,
                            offset,
                            value_size: rec.value.len() as u64,
                            timestamp: rec.timestamp,
                        },
                    );
                    recovered += 1;
                }
            }
        }

        info!(
            db_dir = %db_dir.display(),
            segments = segments.len(),
            keys = keydir.count(),
            recovered,
            snapshot = snapshot_found,
            "store loaded"
        );

        Ok(Self {
            db_dir,
            name: name.to_string(),
            inner: RwLock::new(Inner {
                segments,
                keydir,
                closed: false,
            }),
        })
    }
}
