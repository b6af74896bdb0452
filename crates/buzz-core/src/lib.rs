// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ingestion, ordering and broadcast engine for BUZZ IT.
//!
//! Control flow for a buzz:
//!
//! 1. [`OrderingEngine::submit`] validates the team name and timestamp and
//!    renders the `time`/`date` projection.
//! 2. The [`RecordStore`] assigns a [`RecordId`](buzz_proto::RecordId) and
//!    persists the record.
//! 3. The [`BroadcastHub`] pushes a `new-buzz` event to every live observer.
//!
//! # Ranking Invariant
//!
//! There is no stored rank. [`OrderingEngine::list`] sorts by
//! `(timestamp, id)` on every read, so the ranking is always consistent with
//! the stored set and needs no renumbering on insert or clear.
//!
//! # Delivery
//!
//! Events reach each observer in store-write order: the engine publishes
//! while still holding the lock that sequenced the write.
//!
//! Push is best-effort. Observers snapshot via `list` when they connect and
//! whenever they receive `resync`; push events are hints to merge by
//! timestamp, not an authoritative ranked stream.

pub mod engine;
pub mod error;
pub mod gate;
pub mod hub;
pub mod projection;
pub mod ranking;
pub mod store;
pub mod submission;

pub use engine::OrderingEngine;
pub use error::{AuthorizationError, BuzzError, StorageError, ValidationError};
pub use gate::{AdminGate, AdminGrant};
pub use hub::{BroadcastHub, PublishReport, SubscriberId, Subscription};
pub use store::{LogRecordStore, LogStoreConfig, MemoryRecordStore, NewRecord, RecordStore};
pub use submission::Submission;
