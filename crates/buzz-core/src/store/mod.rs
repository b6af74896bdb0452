// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record Store port and its two tiers.
//!
//! # Ownership
//!
//! The store is the sole owner of record identity: it allocates [`RecordId`]s
//! and stamps `created_at` inside its write lock, so ids are strictly
//! monotonic in write-completion order. Ids are never reused, not even after
//! [`clear`](RecordStore::clear).
//!
//! # Atomicity
//!
//! Every `create` is a single atomic append. `clear` takes the same lock
//! exclusively and removes everything in one step; there is no per-record
//! delete.
//!
//! # Order
//!
//! [`all`](RecordStore::all) returns insertion order. Ranking is applied by
//! the engine at read time.

mod log;
mod memory;

pub use self::log::{LogRecordStore, LogStoreConfig};
pub use self::memory::MemoryRecordStore;

use buzz_proto::{BuzzRecord, RecordId};

use crate::error::StorageError;

/// Fields of a record before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Trimmed team name.
    pub team_name: String,
    /// Client press time (ms since epoch).
    pub timestamp: i64,
    /// Precomputed time projection.
    pub time: String,
    /// Precomputed date projection.
    pub date: String,
}

impl NewRecord {
    pub(crate) fn into_record(self, id: RecordId, created_at: i64) -> BuzzRecord {
        BuzzRecord {
            id,
            team_name: self.team_name,
            timestamp: self.timestamp,
            time: self.time,
            date: self.date,
            created_at,
        }
    }
}

/// Durable, append-only collection of buzz records.
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return it with its assigned id.
    fn create(&self, new: NewRecord) -> Result<BuzzRecord, StorageError>;

    /// All records in insertion order.
    fn all(&self) -> Result<Vec<BuzzRecord>, StorageError>;

    /// Remove every record atomically. Returns the number removed.
    fn clear(&self) -> Result<usize, StorageError>;

    /// Number of stored records.
    fn count(&self) -> Result<usize, StorageError>;
}
