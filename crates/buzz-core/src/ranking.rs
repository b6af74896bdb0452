// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical ranking: the only ordering rule in the system.
//!
//! Records sort by ascending `timestamp`, then by ascending store-assigned
//! [`RecordId`](buzz_proto::RecordId). Rank is a position in that order and is
//! never stored.

use buzz_proto::BuzzRecord;
use std::cmp::Ordering;

/// Compare two records by their ranking key.
pub fn rank_cmp(a: &BuzzRecord, b: &BuzzRecord) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort `records` into canonical ranking order. Position 0 is the winner.
pub fn rank(mut records: Vec<BuzzRecord>) -> Vec<BuzzRecord> {
    records.sort_unstable_by(rank_cmp);
    records
}
