//! Read path: `get()`, `list_keys()`, and `fold()`.
//!
//! Reads take the store lock shared, resolve the key through the
//! directory, and random-read the referenced segment. Multiple readers
//! proceed concurrently; a writer excludes them for the duration of its
//! commit.

use keydir::Descriptor;
use record::Record;

use crate::{Inner, Store, StoreError};

impl Inner {
    /// Reads and validates the record behind `desc`.
    ///
    /// Returns `Ok(None)` when the record turns out to be tombstoned — a
    /// directory entry gone stale across a crash — so callers can report
    /// the key as absent instead of resurrecting a deleted value.
    fn fetch(&self, key: &str, desc: &Descriptor) -> Result<Option<Record>, StoreError> {
        let rec = self.segment(desc.file_id)?.get(desc.offset)?;
        if rec.timestamp == 0 {
            return Ok(None);
        }
        if rec.key != key.as_bytes() {
            return Err(StoreError::Corrupt(format!(
                "directory pointed at mismatching key in segment {} at offset {}",
                desc.file_id, desc.offset
            )));
        }
        Ok(Some(rec))
    }
}

fn value_string(rec: Record) -> Result<String, StoreError> {
    String::from_utf8(rec.value)
        .map_err(|_| StoreError::Corrupt("record value is not valid utf-8".to_string()))
}

impl Store {
    /// Returns the current value of `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the key is absent (or its record is
    /// tombstoned on disk); [`StoreError::Corrupt`] if the stored record
    /// fails validation.
    pub fn get(&self, key: &str) -> Result<String, StoreError> {
        let inner = self.read_inner()?;
        inner.check_open()?;

        let desc = inner.keydir.get(key).ok_or(StoreError::NotFound)?;
        match inner.fetch(key, &desc)? {
            Some(rec) => value_string(rec),
            None => Err(StoreError::NotFound),
        }
    }

    /// All keys currently in the store, in ascending order.
    pub fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.read_inner()?;
        inner.check_open()?;
        Ok(inner.keydir.iterate().map(|(key, _)| key).collect())
    }

    /// Applies `f` to every live `(key, value)` pair, threading an
    /// accumulator through the calls, and returns the final accumulator.
    ///
    /// Keys are visited in ascending order. Entries whose record is
    /// tombstoned on disk are skipped.
    pub fn fold<B, F>(&self, mut f: F, init: B) -> Result<B, StoreError>
    where
        F: FnMut(&str, &str, B) -> B,
    {
        let inner = self.read_inner()?;
        inner.check_open()?;

        let mut acc = init;
        for (key, desc) in inner.keydir.iterate() {
            if let Some(rec) = inner.fetch(&key, &desc)? {
                let value = value_string(rec)?;
                acc = f(&key, &value, acc);
            }
        }
        Ok(acc)
    }
}
