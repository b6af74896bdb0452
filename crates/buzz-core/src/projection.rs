// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Human-readable `time`/`date` projection of a press timestamp.
//!
//! Always rendered in UTC with fixed English month names so the stored strings
//! do not depend on the host locale or timezone.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// `time`/`date` strings stored alongside the raw timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// `HH:MM:SS.mmm`, 24-hour.
    pub time: String,
    /// `Mon DD, YYYY`.
    pub date: String,
}

/// Render `timestamp` (milliseconds since the epoch).
pub fn project(timestamp: i64) -> Result<Projection, ValidationError> {
    let at: DateTime<Utc> = DateTime::from_timestamp_millis(timestamp)
        .ok_or(ValidationError::TimestampOutOfRange(timestamp))?;
    Ok(Projection {
        time: at.format("%H:%M:%S%.3f").to_string(),
        date: at.format("%b %d, %Y").to_string(),
    })
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
