// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Input normalisation for buzz submissions.

use serde_json::Value;

use crate::error::ValidationError;

/// Maximum `teamName` length, in characters, after trimming.
pub const MAX_TEAM_NAME_CHARS: usize = 50;

/// A validated submission, ready for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Trimmed team name.
    pub team_name: String,
    /// Client press time in milliseconds since the epoch.
    pub timestamp: i64,
}

impl Submission {
    /// Validate raw fields.
    pub fn new(team_name: &str, timestamp: i64) -> Result<Self, ValidationError> {
        Ok(Self {
            team_name: normalize_team_name(team_name)?,
            timestamp,
        })
    }

    /// Validate a JSON request body `{teamName, timestamp}`.
    ///
    /// `teamName` must be a string; `timestamp` must be a number with an
    /// integral value that fits in `i64` (`1000.0` is accepted, `1000.5` and
    /// `"1000"` are not). Unknown fields are ignored.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let team_name = body
            .get("teamName")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingTeamName)?;
        let team_name = normalize_team_name(team_name)?;
        let timestamp = body
            .get("timestamp")
            .and_then(integral_millis)
            .ok_or(ValidationError::InvalidTimestamp)?;
        Ok(Self {
            team_name,
            timestamp,
        })
    }
}

/// Trim and bound-check a team name. Over-long names are rejected, never truncated.
pub fn normalize_team_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingTeamName);
    }
    let len = trimmed.chars().count();
    if len > MAX_TEAM_NAME_CHARS {
        return Err(ValidationError::TeamNameTooLong {
            len,
            max: MAX_TEAM_NAME_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn integral_millis(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if n.is_u64() {
        // positive and above i64::MAX
        return None;
    }
    let f = n.as_f64()?;
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
