// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordering Engine: validate, project, persist, then broadcast.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use buzz_proto::{BuzzRecord, ClearedPayload, HubEvent};
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::gate::AdminGrant;
use crate::hub::BroadcastHub;
use crate::projection::project;
use crate::ranking::rank;
use crate::store::{MemoryRecordStore, NewRecord, RecordStore};
use crate::submission::Submission;

/// Entry point for every buzz operation.
///
/// Cloning is cheap; clones share the store, hub and write sequencer.
/// Validation and projection run concurrently; the store write and the
/// matching publish happen together under one sequencer lock, so observers
/// see events in store-write order and never a `new-buzz` after the
/// `buzz-cleared` that removed it. Broadcast never fails the operation.
#[derive(Clone)]
pub struct OrderingEngine {
    store: Arc<dyn RecordStore>,
    hub: BroadcastHub,
    sequencer: Arc<Mutex<()>>,
}

impl OrderingEngine {
    /// Engine over `store`, publishing through `hub`.
    pub fn new(store: Arc<dyn RecordStore>, hub: BroadcastHub) -> Self {
        Self {
            store,
            hub,
            sequencer: Arc::new(Mutex::new(())),
        }
    }

    fn sequenced(&self) -> MutexGuard<'_, ()> {
        // guards no data, so a poisoned lock is still usable
        self.sequencer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Engine over a fresh [`MemoryRecordStore`] and default hub.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRecordStore::new()), BroadcastHub::default())
    }

    /// The hub observers subscribe to.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Validate and record a buzz from raw fields.
    pub fn submit(&self, team_name: &str, timestamp: i64) -> Result<BuzzRecord> {
        let submission = Submission::new(team_name, timestamp)?;
        self.accept(submission)
    }

    /// Record an already validated submission.
    #[instrument(
        skip(self, submission),
        fields(team = %submission.team_name, timestamp = submission.timestamp)
    )]
    pub fn accept(&self, submission: Submission) -> Result<BuzzRecord> {
        let projection = project(submission.timestamp)?;
        let new = NewRecord {
            team_name: submission.team_name,
            timestamp: submission.timestamp,
            time: projection.time,
            date: projection.date,
        };

        let (record, report) = {
            let _seq = self.sequenced();
            let record = self.store.create(new)?;
            let report = self.hub.publish(&HubEvent::NewBuzz(record.clone()));
            (record, report)
        };
        info!(
            id = %record.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "buzz accepted"
        );
        Ok(record)
    }

    /// All records in canonical ranking order (index 0 pressed first).
    pub fn list(&self) -> Result<Vec<BuzzRecord>> {
        Ok(rank(self.store.all()?))
    }

    /// Current ranking wrapped as a `snapshot` event.
    pub fn snapshot(&self) -> Result<HubEvent> {
        Ok(HubEvent::Snapshot(self.list()?))
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize> {
        Ok(self.store.count()?)
    }

    /// Remove every record in one atomic step and tell observers.
    #[instrument(skip(self, _grant))]
    pub fn clear_all(&self, _grant: AdminGrant) -> Result<usize> {
        let (cleared, report) = {
            let _seq = self.sequenced();
            let cleared = self.store.clear()?;
            let report = self
                .hub
                .publish(&HubEvent::Cleared(ClearedPayload { cleared }));
            (cleared, report)
        };
        warn!(cleared, delivered = report.delivered, "all buzz records cleared");
        Ok(cleared)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{BuzzError, StorageError, ValidationError};
    use crate::gate::AdminGate;

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn create(&self, _new: NewRecord) -> Result<BuzzRecord, StorageError> {
            Err(StorageError::Poisoned)
        }
        fn all(&self) -> Result<Vec<BuzzRecord>, StorageError> {
            Err(StorageError::Poisoned)
        }
        fn clear(&self) -> Result<usize, StorageError> {
            Err(StorageError::Poisoned)
        }
        fn count(&self) -> Result<usize, StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn accepted_record_carries_projection() {
        let engine = OrderingEngine::in_memory();
        let record = engine.submit(" Alpha ", 1_704_459_849_007).unwrap();
        assert_eq!(record.team_name, "Alpha");
        assert_eq!(record.time, "13:04:09.007");
        assert_eq!(record.date, "Jan 05, 2024");
    }

    #[test]
    fn storage_failure_is_reported_and_not_broadcast() {
        let engine = OrderingEngine::new(Arc::new(BrokenStore), BroadcastHub::default());
        let mut sub = engine.hub().subscribe();
        let err = engine.submit("Alpha", 1).unwrap_err();
        assert!(matches!(err, BuzzError::Storage(StorageError::Poisoned)));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn out_of_range_timestamp_is_rejected_before_storage() {
        let engine = OrderingEngine::in_memory();
        let err = engine.submit("Alpha", i64::MIN).unwrap_err();
        assert!(matches!(
            err,
            BuzzError::Validation(ValidationError::TimestampOutOfRange(_))
        ));
        assert_eq!(engine.count().unwrap(), 0);
    }

    #[test]
    fn clear_publishes_count() {
        let engine = OrderingEngine::in_memory();
        engine.submit("a", 1).unwrap();
        engine.submit("b", 2).unwrap();
        let mut sub = engine.hub().subscribe();
        let grant = AdminGate::new("t").authorize(Some("Bearer t")).unwrap();
        assert_eq!(engine.clear_all(grant).unwrap(), 2);
        assert_eq!(
            sub.try_recv(),
            Some(HubEvent::Cleared(ClearedPayload { cleared: 2 }))
        );
    }
}
