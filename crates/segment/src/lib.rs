//! # Segment — Bounded Memory-Mapped Append Log
//!
//! A segment is a fixed-capacity file mapped read/write into the process
//! address space. Records are appended at `write_offset`; once written, a
//! record never moves, so `(file_id, offset)` permanently identifies it.
//! Deletion overwrites the record's timestamp in place with zero (a
//! tombstone) — the record's on-disk length never changes.
//!
//! The file is truncated to full capacity when the segment is created, so
//! the mapping has a stable size and growing never requires a remap. A
//! side effect the recovery path relies on: the reserved space past
//! `write_offset` reads as zeros, so an all-zero record header terminates
//! a forward scan.
//!
//! ## Concurrency
//!
//! Every segment owns a reader-writer lock. [`get`](Segment::get) and
//! [`current_offset`](Segment::current_offset) take it shared; `write`,
//! `write_at`, `tombstone`, `flush`, and `close` take it exclusive. An
//! append either fully commits its bytes and advances `write_offset`, or
//! leaves both untouched; readers never observe a partial record because
//! they never read past `write_offset`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use record::Record;
//! use segment::Segment;
//!
//! let seg = Segment::create(std::path::Path::new("/tmp/db"), 0).unwrap();
//! let rec = Record::new(1_700_000_000, b"k".to_vec(), b"v".to_vec());
//! let offset = seg.write(&rec).unwrap();
//! assert_eq!(seg.get(offset).unwrap(), rec);
//! ```

use memmap2::MmapMut;
use record::{decode_header, decode_record_ref, Record, RecordRef, HEADER_SIZE};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

/// Filename prefix for segment files within a store directory.
pub const SEGMENT_FILE_PREFIX: &str = "segment_file_";

/// Fixed capacity of every segment file: 4 MiB.
pub const SEGMENT_CAPACITY: u64 = 4 * 1024 * 1024;

/// Errors surfaced by segment operations.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// The record does not fit in the remaining capacity. The segment is
    /// left unmodified; the coordinator reacts by rolling over to a fresh
    /// segment and retrying.
    #[error("segment capacity full: {needed} bytes do not fit at offset {offset} (capacity {capacity})")]
    CapacityFull {
        offset: u64,
        needed: u64,
        capacity: u64,
    },

    /// An overwrite offset lies outside the mapping.
    #[error("invalid offset {offset}: out of bounds for segment capacity {capacity}")]
    InvalidOffset { offset: u64, capacity: u64 },

    /// The encoded byte count disagreed with the computed record length.
    #[error("incomplete write: encoded {written} bytes, expected {expected}")]
    IncompleteWrite { written: u64, expected: u64 },

    /// A decode ran past the end of the mapping.
    #[error(transparent)]
    ShortBuffer(#[from] record::RecordError),

    /// The segment file is missing or is not exactly capacity-sized.
    #[error("corrupt segment file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// An underlying filesystem, mapping, or flush error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Mapping state behind the segment's lock. `map`/`file` become `None`
/// after [`close`](Segment::close).
struct MapState {
    file: Option<File>,
    map: Option<MmapMut>,
    write_offset: u64,
}

impl MapState {
    fn map_ref(&self) -> Result<&MmapMut, SegmentError> {
        self.map
            .as_ref()
            .ok_or_else(|| SegmentError::Io(io::Error::other("segment is closed")))
    }

    fn map_mut(&mut self) -> Result<&mut MmapMut, SegmentError> {
        self.map
            .as_mut()
            .ok_or_else(|| SegmentError::Io(io::Error::other("segment is closed")))
    }
}

/// A bounded, memory-mapped append-only segment file.
pub struct Segment {
    path: PathBuf,
    file_id: u64,
    state: RwLock<MapState>,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("file_id", &self.file_id)
            .field("path", &self.path)
            .field("write_offset", &self.current_offset())
            .finish()
    }
}

fn poisoned(_: impl std::fmt::Debug) -> SegmentError {
    SegmentError::Io(io::Error::other("segment lock poisoned"))
}

/// Path of the segment file for `file_id` inside `dir`.
#[must_use]
pub fn segment_path(dir: &Path, file_id: u64) -> PathBuf {
    dir.join(format!("{}{}", SEGMENT_FILE_PREFIX, file_id))
}

impl Segment {
    /// Creates (or truncates) the segment file at
    /// `dir/segment_file_<file_id>`, sizes it to exactly
    /// [`SEGMENT_CAPACITY`], and maps it read/write with `write_offset = 0`.
    ///
    /// # Errors
    ///
    /// [`SegmentError::Io`] on filesystem or mapping failure.
    pub fn create(dir: &Path, file_id: u64) -> Result<Self, SegmentError> {
        let path = segment_path(dir, file_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(SEGMENT_CAPACITY)?;
        let map = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            path,
            file_id,
            state: RwLock::new(MapState {
                file: Some(file),
                map: Some(map),
                write_offset: 0,
            }),
        })
    }

    /// Opens an existing segment file for recovery, without truncating.
    ///
    /// `write_offset` starts at 0; the caller reconstructs it (from the
    /// index snapshot plus a tail scan) and installs it with
    /// [`set_write_offset`](Segment::set_write_offset).
    ///
    /// # Errors
    ///
    /// [`SegmentError::Corrupt`] if the file is missing or its size is not
    /// exactly [`SEGMENT_CAPACITY`]; [`SegmentError::Io`] on mapping
    /// failure.
    pub fn open(dir: &Path, file_id: u64) -> Result<Self, SegmentError> {
        let path = segment_path(dir, file_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    SegmentError::Corrupt {
                        path: path.clone(),
                        reason: "segment file missing".to_string(),
                    }
                } else {
                    SegmentError::Io(e)
                }
            })?;

        let len = file.metadata()?.len();
        if len != SEGMENT_CAPACITY {
            return Err(SegmentError::Corrupt {
                path,
                reason: format!("size {} != segment capacity {}", len, SEGMENT_CAPACITY),
            });
        }

        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            path,
            file_id,
            state: RwLock::new(MapState {
                file: Some(file),
                map: Some(map),
                write_offset: 0,
            }),
        })
    }

    /// Identifier assigned at allocation; segment ids are dense within a
    /// store directory.
    #[must_use]
    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    /// Filesystem path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next free byte within the mapping.
    #[must_use]
    pub fn current_offset(&self) -> u64 {
        match self.state.read() {
            Ok(state) => state.write_offset,
            Err(e) => e.into_inner().write_offset,
        }
    }

    /// Appends `rec` at `write_offset`.
    ///
    /// Returns the offset at which the record was placed — the value of
    /// `write_offset` immediately before the append — which is what the
    /// coordinator stores in the record's location descriptor.
    ///
    /// On [`SegmentError::CapacityFull`] neither the mapping bytes nor
    /// `write_offset` are modified.
    pub fn write(&self, rec: &Record) -> Result<u64, SegmentError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let offset = state.write_offset;
        let needed = rec.encoded_len();

        if offset + needed > SEGMENT_CAPACITY {
            return Err(SegmentError::CapacityFull {
                offset,
                needed,
                capacity: SEGMENT_CAPACITY,
            });
        }

        copy_record(state.map_mut()?, rec, offset, needed)?;
        state.write_offset = offset + needed;
        Ok(offset)
    }

    /// Overwrites the bytes at a caller-supplied `offset` without moving
    /// `write_offset`. Used only for tombstoning, where the new encoding
    /// has the same length as the original record by construction.
    ///
    /// # Errors
    ///
    /// [`SegmentError::InvalidOffset`] if `offset` lies beyond the
    /// mapping; [`SegmentError::CapacityFull`] if `offset + len` exceeds
    /// capacity.
    pub fn write_at(&self, rec: &Record, offset: u64) -> Result<(), SegmentError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let needed = rec.encoded_len();

        if offset >= SEGMENT_CAPACITY {
            return Err(SegmentError::InvalidOffset {
                offset,
                capacity: SEGMENT_CAPACITY,
            });
        }
        if offset + needed > SEGMENT_CAPACITY {
            return Err(SegmentError::CapacityFull {
                offset,
                needed,
                capacity: SEGMENT_CAPACITY,
            });
        }

        copy_record(state.map_mut()?, rec, offset, needed)
    }

    /// Decodes the record starting at `offset` directly from the mapping.
    ///
    /// Callers must supply an offset previously returned by a successful
    /// [`write`](Segment::write); behaviour on arbitrary offsets is
    /// undefined beyond the codec's short-buffer check.
    pub fn get(&self, offset: u64) -> Result<Record, SegmentError> {
        let state = self.state.read().map_err(poisoned)?;
        let map = state.map_ref()?;
        let rec = decode_record_ref(map, offset as usize)?;
        Ok(rec.to_record())
    }

    /// Tombstones the record at `offset`: decodes it, zeroes the
    /// timestamp, and writes the re-encoded bytes back over the original.
    /// Key and value are re-emitted verbatim, so the on-disk length is
    /// unchanged.
    pub fn tombstone(&self, offset: u64) -> Result<(), SegmentError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let map = state.map_mut()?;

        let mut rec = decode_record_ref(map, offset as usize)?.to_record();
        rec.timestamp = 0;
        let needed = rec.encoded_len();
        copy_record(map, &rec, offset, needed)
    }

    /// Walks records forward from `offset`, invoking `visit` for each one,
    /// until an all-zero header or a record that would cross capacity is
    /// reached. Returns the offset one past the last record — the
    /// reconstructed `write_offset` when scanning from the last known end
    /// of the segment.
    ///
    /// Tombstoned records (zero timestamp, non-zero key size) are visited
    /// like any other; distinguishing them is the caller's business.
    pub fn scan_from<F>(&self, offset: u64, mut visit: F) -> Result<u64, SegmentError>
    where
        F: FnMut(u64, RecordRef<'_>),
    {
        let state = self.state.read().map_err(poisoned)?;
        let map = state.map_ref()?;

        let mut off = offset;
        while off + (HEADER_SIZE as u64) <= SEGMENT_CAPACITY {
            let header = decode_header(map, off as usize)?;
            if header.is_zero() {
                break;
            }
            if off.saturating_add(header.record_len()) > SEGMENT_CAPACITY {
                // Cannot be a whole record; treat as end of data.
                break;
            }
            let rec = decode_record_ref(map, off as usize)?;
            visit(off, rec);
            off += header.record_len();
        }
        Ok(off)
    }

    /// Installs a reconstructed `write_offset` after recovery.
    ///
    /// Clamped to capacity; appending resumes from this position.
    pub fn set_write_offset(&self, offset: u64) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(e) => e.into_inner(),
        };
        state.write_offset = offset.min(SEGMENT_CAPACITY);
    }

    /// Asks the operating system to persist the mapping (msync).
    pub fn flush(&self) -> Result<(), SegmentError> {
        let state = self.state.write().map_err(poisoned)?;
        match state.map.as_ref() {
            Some(map) => Ok(map.flush()?),
            // Already closed; close() flushed on the way out.
            None => Ok(()),
        }
    }

    /// Flushes, unmaps, and closes the file descriptor. Idempotent: a
    /// second call is a no-op.
    pub fn close(&self) -> Result<(), SegmentError> {
        let mut state = self.state.write().map_err(poisoned)?;
        if let Some(map) = state.map.take() {
            let flushed = map.flush();
            drop(map);
            state.file.take();
            flushed?;
        }
        Ok(())
    }
}

/// Encodes `rec` and copies it into `map[offset..offset + needed]`.
///
/// Bounds were checked by the caller; the length re-check guards the
/// encoder's output against the computed record length.
fn copy_record(map: &mut MmapMut, rec: &Record, offset: u64, needed: u64) -> Result<(), SegmentError> {
    let bytes = rec.encode();
    if bytes.len() as u64 != needed {
        return Err(SegmentError::IncompleteWrite {
            written: bytes.len() as u64,
            expected: needed,
        });
    }
    let start = offset as usize;
    map[start..start + bytes.len()].copy_from_slice(&bytes);
    Ok(())
}
