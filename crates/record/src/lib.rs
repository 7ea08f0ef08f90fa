//! # Record — On-Disk Record Codec
//!
//! Encodes and decodes the single append unit of the TideCask storage
//! engine. A record is a key-value pair stamped with the wall-clock second
//! at which it was written.
//!
//! ## Binary Record Format
//!
//! ```text
//! [timestamp: i64 BE][key_size: u64 BE][value_size: u64 BE][key][value]
//! ```
//!
//! The fixed header is 24 bytes; the total encoded length is
//! `24 + key_size + value_size`. A `timestamp` of `0` marks the record as
//! **tombstoned** (deleted in place); live records always carry a positive
//! wall-clock timestamp.
//!
//! The codec makes no assumption about the buffer's backing — a heap
//! buffer and a memory-mapped region decode identically. [`decode_record_ref`]
//! borrows key and value straight out of the buffer for callers that can
//! hold the backing region alive; [`decode_record`] copies them out.
//!
//! ## Example
//!
//! ```rust
//! use record::{decode_record, Record};
//!
//! let rec = Record::new(1_700_000_000, b"hello".to_vec(), b"world".to_vec());
//! let bytes = rec.encode();
//! assert_eq!(decode_record(&bytes, 0).unwrap(), rec);
//! ```

use byteorder::{BigEndian, WriteBytesExt};

use thiserror::Error;

/// Fixed byte length of the record header (timestamp + key_size + value_size).
pub const HEADER_SIZE: usize = 24;

/// Errors that can occur while decoding a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The buffer ends before the decoded bounds of the record.
    #[error("short buffer: need {needed} bytes at offset {offset}, have {available}")]
    ShortBuffer {
        /// Byte offset the decode started at.
        offset: usize,
        /// Bytes required to finish decoding.
        needed: u64,
        /// Bytes actually available from `offset` to the end of the buffer.
        available: u64,
    },
}

/// A fully decoded (owning) record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Seconds since the Unix epoch; `0` marks a tombstone.
    pub timestamp: i64,
    /// Raw key bytes.
    pub key: Vec<u8>,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

/// A record whose key and value borrow from the decode buffer.
///
/// This is the zero-copy view used when reading straight out of a mapped
/// segment; the borrow must not outlive the caller's hold on the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef<'a> {
    /// Seconds since the Unix epoch; `0` marks a tombstone.
    pub timestamp: i64,
    /// Raw key bytes, borrowed from the buffer.
    pub key: &'a [u8],
    /// Raw value bytes, borrowed from the buffer.
    pub value: &'a [u8],
}

/// The decoded fixed header of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub timestamp: i64,
    pub key_size: u64,
    pub value_size: u64,
}

impl Header {
    /// Total encoded length of the record this header describes.
    ///
    /// Saturating: garbage sizes decoded from a corrupt buffer must not
    /// wrap back into a small, plausible length.
    #[must_use]
    pub fn record_len(&self) -> u64 {
        (HEADER_SIZE as u64)
            .saturating_add(self.key_size)
            .saturating_add(self.value_size)
    }

    /// `true` when every header field is zero.
    ///
    /// Unwritten segment space reads as zeros (files are truncated to full
    /// capacity at creation), so an all-zero header terminates a forward
    /// scan. A tombstoned record has `timestamp == 0` but a non-zero
    /// `key_size`, and is not a terminator.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.timestamp == 0 && self.key_size == 0 && self.value_size == 0
    }
}

impl Record {
    /// Builds a record from its parts.
    pub fn new(timestamp: i64, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            timestamp,
            key,
            value,
        }
    }

    /// Encoded byte length: `24 + key_size + value_size`.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.key.len() as u64 + self.value.len() as u64
    }

    /// Serialises the record into a fresh buffer.
    ///
    /// Layout: `timestamp ‖ key_size ‖ value_size ‖ key ‖ value`, every
    /// integer 8 bytes big-endian. The output length always equals
    /// [`encoded_len`](Record::encoded_len).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        // Writes into a Vec cannot fail.
        buf.write_i64::<BigEndian>(self.timestamp).unwrap();
        buf.write_u64::<BigEndian>(self.key.len() as u64).unwrap();
        buf.write_u64::<BigEndian>(self.value.len() as u64).unwrap();
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        buf
    }
}

impl RecordRef<'_> {
    /// Copies the borrowed key and value into an owning [`Record`].
    #[must_use]
    pub fn to_record(&self) -> Record {
        Record {
            timestamp: self.timestamp,
            key: self.key.to_vec(),
            value: self.value.to_vec(),
        }
    }
}

fn read_i64_at(buf: &[u8], offset: usize) -> i64 {
    i64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap())
}

fn read_u64_at(buf: &[u8], offset: usize) -> u64 {
    u64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap())
}

/// Decodes the 24-byte fixed header starting at `offset`.
///
/// # Errors
///
/// [`RecordError::ShortBuffer`] if fewer than 24 bytes remain at `offset`.
pub fn decode_header(buf: &[u8], offset: usize) -> Result<Header, RecordError> {
    let available = buf.len().saturating_sub(offset) as u64;
    if available < HEADER_SIZE as u64 {
        return Err(RecordError::ShortBuffer {
            offset,
            needed: HEADER_SIZE as u64,
            available,
        });
    }
    Ok(Header {
        timestamp: read_i64_at(buf, offset),
        key_size: read_u64_at(buf, offset + 8),
        value_size: read_u64_at(buf, offset + 16),
    })
}

/// Decodes a full record starting at `offset`, borrowing key and value
/// from `buf`.
///
/// All arithmetic is done in `u64` so that hostile sizes in a corrupt
/// buffer cannot wrap the bounds check on 32-bit targets.
///
/// # Errors
///
/// [`RecordError::ShortBuffer`] if the record's computed end exceeds the
/// buffer length.
pub fn decode_record_ref(buf: &[u8], offset: usize) -> Result<RecordRef<'_>, RecordError> {
    let header = decode_header(buf, offset)?;
    let available = (buf.len() - offset) as u64;
    let needed = header.record_len();
    if needed > available {
        return Err(RecordError::ShortBuffer {
            offset,
            needed,
            available,
        });
    }

    let key_start = offset + HEADER_SIZE;
    let key_end = key_start + header.key_size as usize;
    let value_end = key_end + header.value_size as usize;
    Ok(RecordRef {
        timestamp: header.timestamp,
        key: &buf[key_start..key_end],
        value: &buf[key_end..value_end],
    })
}

/// Decodes a full record starting at `offset`, copying key and value out
/// of the buffer.
///
/// # Errors
///
/// [`RecordError::ShortBuffer`] if the record's computed end exceeds the
/// buffer length.
pub fn decode_record(buf: &[u8], offset: usize) -> Result<Record, RecordError> {
    Ok(decode_record_ref(buf, offset)?.to_record())
}

#[cfg(test)]
mod tests;
