// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory Record Store (no persistence across restarts).

use std::sync::RwLock;

use buzz_proto::{BuzzRecord, RecordId};

use super::{NewRecord, RecordStore};
use crate::error::StorageError;
use crate::projection::now_millis;

struct Inner {
    records: Vec<BuzzRecord>,
    next_id: u64,
}

/// Record Store backed by a `Vec` behind a reader/writer lock.
///
/// Reads share the lock; `create` and `clear` take it exclusively.
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
}

impl MemoryRecordStore {
    /// Create an empty store. The first record gets id 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, new: NewRecord) -> Result<BuzzRecord, StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::Poisoned)?;
        let id = RecordId(inner.next_id);
        inner.next_id += 1;
        let record = new.into_record(id, now_millis());
        inner.records.push(record.clone());
        Ok(record)
    }

    fn all(&self) -> Result<Vec<BuzzRecord>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        Ok(inner.records.clone())
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::Poisoned)?;
        let removed = inner.records.len();
        inner.records.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        Ok(inner.records.len())
    }
}
