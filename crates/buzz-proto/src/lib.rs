// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the BUZZ IT service.
//!
//! [`BuzzRecord`] is the JSON shape returned by the HTTP surface and carried by
//! `new-buzz` events. Real-time frames are JSON text envelopes
//! (`{"event": ..., "data": ...}`) produced and parsed by [`wire`].

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod wire;

/// Store-assigned record identifier.
///
/// Strictly monotonic per store and never reused, so it doubles as the
/// insertion-order tie-break for records sharing a `timestamp`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Raw sequence value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single accepted buzz-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuzzRecord {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Trimmed display name of the team (1..=50 characters).
    pub team_name: String,
    /// Client-supplied press time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// `HH:MM:SS.mmm` (UTC, 24-hour) rendering of `timestamp`.
    pub time: String,
    /// `Mon DD, YYYY` (UTC) rendering of `timestamp`.
    pub date: String,
    /// Server-side creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Payload of a `buzz-cleared` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedPayload {
    /// Number of records removed by the clear.
    pub cleared: usize,
}

/// Events pushed from the hub to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A record was accepted (event = "new-buzz").
    NewBuzz(BuzzRecord),
    /// All records were removed (event = "buzz-cleared").
    Cleared(ClearedPayload),
    /// Full ranked listing, sent on request (event = "snapshot").
    Snapshot(Vec<BuzzRecord>),
    /// The observer missed events and should re-snapshot (event = "resync").
    Resync,
}

impl HubEvent {
    /// Canonical event name for this variant.
    pub fn event_name(&self) -> &'static str {
        match self {
            HubEvent::NewBuzz(_) => "new-buzz",
            HubEvent::Cleared(_) => "buzz-cleared",
            HubEvent::Snapshot(_) => "snapshot",
            HubEvent::Resync => "resync",
        }
    }
}

/// Requests an observer may send over the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// Ask for a `snapshot` event with the current ranking (event = "snapshot").
    Snapshot,
}

/// `{message}` body used for success notes and client errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Short human-readable message.
    pub message: String,
}

/// `{message, error}` body used for storage failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short description of the failed operation.
    pub message: String,
    /// Underlying error rendered as text.
    pub error: String,
}

/// Body returned by a successful clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedBody {
    /// Confirmation message.
    pub message: String,
    /// Number of records removed.
    pub cleared: usize,
}

/// Health check body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    /// Always `"ok"` when the service answers.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Number of stored records.
    pub records: usize,
    /// Number of connected real-time observers.
    pub subscribers: usize,
}
