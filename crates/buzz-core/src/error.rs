// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for engine operations.

use thiserror::Error;

/// Submission rejected before anything was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `teamName` missing, not a string, or blank after trimming.
    #[error("teamName is required")]
    MissingTeamName,
    /// `teamName` longer than the allowed number of characters.
    #[error("teamName must be at most {max} characters (got {len})")]
    TeamNameTooLong {
        /// Character count after trimming.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// `timestamp` missing, not a number, fractional, or outside `i64`.
    #[error("timestamp must be a number")]
    InvalidTimestamp,
    /// `timestamp` cannot be rendered as a calendar date.
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}

/// Record Store failure. Nothing is committed when one of these is returned.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while reading/writing the log.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A log line other than the final one failed to parse.
    #[error("corrupt log entry at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },
    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Administrative credential missing or wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// No `Authorization` header was supplied.
    #[error("missing credential")]
    Missing,
    /// A credential was supplied but did not match.
    #[error("invalid credential")]
    Invalid,
}

/// Failure of an engine operation.
#[derive(Debug, Error)]
pub enum BuzzError {
    /// Input rejected; the client must correct and resubmit.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Record Store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result alias for engine operations.
pub type Result<T, E = BuzzError> = std::result::Result<T, E>;
