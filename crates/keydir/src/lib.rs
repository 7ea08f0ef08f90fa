//! # KeyDir — In-Memory Key Directory
//!
//! The authoritative key-to-location index of the TideCask storage engine.
//! Every key maps to a [`Descriptor`] naming the segment, byte offset,
//! value size, and timestamp of its newest on-disk record. Reads resolve a
//! key here first and then random-read the referenced segment; recovery
//! rehydrates the directory from a snapshot file.
//!
//! ## Snapshot Format
//!
//! ```text
//! [magic: u32 LE][crc32: u32 LE][body: MessagePack map key -> descriptor]
//! ```
//!
//! The body is self-describing MessagePack (struct fields serialised by
//! name), so the snapshot does not depend on machine byte order. The CRC
//! covers the body; a mismatch on [`decode`](KeyDir::decode) means the
//! snapshot file is corrupt and recovery must not trust it.
//!
//! ## Concurrency
//!
//! All operations serialise under one directory-wide reader-writer lock:
//! lookups, counting, iteration, and encoding take it shared; mutation and
//! decoding take it exclusive. [`iterate`](KeyDir::iterate) materialises a
//! snapshot under the read lock and hands back an owning iterator, so the
//! lock is never held across caller code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;

/// Magic prefix of a keydir snapshot ("TCKD").
pub const SNAPSHOT_MAGIC: u32 = 0x5443_4B44;

/// Byte length of the snapshot frame header (magic + crc32).
const FRAME_BYTES: usize = 8;

/// Errors produced by snapshot encoding and decoding.
#[derive(Debug, Error)]
pub enum KeyDirError {
    /// The snapshot is shorter than its frame header.
    #[error("corrupt snapshot: {0} bytes is too short for the frame header")]
    TruncatedSnapshot(usize),

    /// The snapshot does not start with [`SNAPSHOT_MAGIC`].
    #[error("corrupt snapshot: bad magic {0:#010x}")]
    BadMagic(u32),

    /// The body does not hash to the stored CRC.
    #[error("corrupt snapshot: crc mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// MessagePack serialisation failed.
    #[error("snapshot encode failed: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    /// MessagePack deserialisation failed.
    #[error("snapshot decode failed: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),
}

/// Location of a record on disk, as remembered by the directory.
///
/// `(file_id, offset)` permanently identifies the record; `value_size` is
/// cached so a read can size itself without decoding the header first, and
/// `timestamp` mirrors the timestamp written into the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub file_id: u64,
    pub offset: u64,
    pub value_size: u64,
    pub timestamp: i64,
}

/// Ordered key → [`Descriptor`] map behind a directory-wide lock.
#[derive(Debug, Default)]
pub struct KeyDir {
    map: RwLock<BTreeMap<String, Descriptor>>,
}

impl KeyDir {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Descriptor>> {
        match self.map.read() {
            Ok(guard) => guard,
            Err(e) => e.into_inner(),
        }
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Descriptor>> {
        match self.map.write() {
            Ok(guard) => guard,
            Err(e) => e.into_inner(),
        }
    }

    /// Looks up the descriptor for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Descriptor> {
        self.read_map().get(key).copied()
    }

    /// Inserts or replaces the descriptor for `key`.
    pub fn set(&self, key: &str, desc: Descriptor) {
        self.write_map().insert(key.to_string(), desc);
    }

    /// Removes `key`. Absent keys are not an error.
    pub fn delete(&self, key: &str) {
        self.write_map().remove(key);
    }

    /// `true` if `key` is present.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.read_map().contains_key(key)
    }

    /// Number of keys in the directory.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.read_map().len() as u64
    }

    /// `true` if the directory holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    /// Iterates all `(key, descriptor)` pairs in ascending key order.
    ///
    /// The pairs are snapshotted under the read lock; the returned
    /// iterator owns its data, so mutations racing the traversal see or
    /// miss entries atomically rather than corrupting it.
    pub fn iterate(&self) -> impl Iterator<Item = (String, Descriptor)> {
        let snapshot: Vec<(String, Descriptor)> = self
            .read_map()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        snapshot.into_iter()
    }

    /// Removes every key.
    pub fn clear(&self) {
        self.write_map().clear();
    }

    /// Serialises the full directory into a framed snapshot.
    pub fn encode(&self) -> Result<Vec<u8>, KeyDirError> {
        let map = self.read_map();
        let body = rmp_serde::to_vec_named(&*map)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let mut out = Vec::with_capacity(FRAME_BYTES + body.len());
        out.extend_from_slice(&SNAPSHOT_MAGIC.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Replaces the directory's contents with a decoded snapshot.
    ///
    /// The existing contents are only discarded once the snapshot has
    /// passed the magic, CRC, and MessagePack checks.
    pub fn decode(&self, bytes: &[u8]) -> Result<(), KeyDirError> {
        if bytes.len() < FRAME_BYTES {
            return Err(KeyDirError::TruncatedSnapshot(bytes.len()));
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != SNAPSHOT_MAGIC {
            return Err(KeyDirError::BadMagic(magic));
        }
        let stored = u32::from_le_bytes(bytes[4..8].try_into().unwrap());

        let body = &bytes[FRAME_BYTES..];
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(body);
        let computed = hasher.finalize();
        if computed != stored {
            return Err(KeyDirError::ChecksumMismatch { stored, computed });
        }

        let decoded: BTreeMap<String, Descriptor> = rmp_serde::from_slice(body)?;
        *self.write_map() = decoded;
        Ok(())
    }
}
