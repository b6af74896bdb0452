// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Append-only JSON-lines Record Store.
//!
//! Each line is one entry:
//!
//! ``{"op":"create","record":{...}}``  or  ``{"op":"reset","next_id":N}``
//!
//! `clear` writes a fresh file holding a single `reset` entry and renames it
//! over the log, so the old contents disappear in one step and the id sequence
//! survives restarts. A torn final line (crash mid-append) is dropped on open;
//! a bad line anywhere else is reported as corruption.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use buzz_proto::{BuzzRecord, RecordId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{NewRecord, RecordStore};
use crate::error::StorageError;
use crate::projection::now_millis;

/// Configuration for [`LogRecordStore`].
#[derive(Debug, Clone)]
pub struct LogStoreConfig {
    /// Log file location. Parent directories are created on open.
    pub path: PathBuf,
    /// `fsync` after every append (slower, survives power loss).
    pub sync_writes: bool,
}

impl LogStoreConfig {
    /// Config for `path` with buffered (non-fsync) appends.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogEntry {
    Create { record: BuzzRecord },
    Reset { next_id: u64 },
}

struct Inner {
    records: Vec<BuzzRecord>,
    next_id: u64,
    file: File,
    /// Bytes of the log known to hold complete entries.
    committed: u64,
}

/// File-backed Record Store with an in-memory index of the live records.
///
/// A single mutex covers the index and the file handle: appends, clears and
/// reads never observe each other half-done. The index is updated only after
/// the log write succeeds; a failed append is truncated away so it cannot
/// resurface on the next open.
pub struct LogRecordStore {
    config: LogStoreConfig,
    inner: Mutex<Inner>,
}

impl LogRecordStore {
    /// Open (or create) the log at `config.path` and replay it.
    pub fn open(config: LogStoreConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let (records, next_id) = match fs::read_to_string(&config.path) {
            Ok(text) => {
                let replayed = replay(&text)?;
                if replayed.valid_len < text.len() {
                    warn!(
                        path = %config.path.display(),
                        dropped_bytes = text.len() - replayed.valid_len,
                        "dropping torn tail of buzz log"
                    );
                    let file = OpenOptions::new().write(true).open(&config.path)?;
                    file.set_len(replayed.valid_len as u64)?;
                } else if !text.is_empty() && !text.ends_with('\n') {
                    // complete entry without its newline; terminate it before appending
                    let mut file = OpenOptions::new().append(true).open(&config.path)?;
                    file.write_all(b"\n")?;
                }
                (replayed.records, replayed.next_id)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => (Vec::new(), 1),
            Err(err) => return Err(StorageError::Io(err)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;
        let committed = file.metadata()?.len();
        debug!(
            path = %config.path.display(),
            records = records.len(),
            next_id,
            "buzz log opened"
        );

        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                records,
                next_id,
                file,
                committed,
            }),
        })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os: OsString = self.config.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

fn encode_line(entry: &LogEntry) -> Result<Vec<u8>, StorageError> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    Ok(line)
}

#[derive(Debug)]
struct Replayed {
    records: Vec<BuzzRecord>,
    next_id: u64,
    valid_len: usize,
}

fn replay(text: &str) -> Result<Replayed, StorageError> {
    let mut records = Vec::new();
    let mut next_id = 1u64;
    // Only bytes up to the last newline are known to be complete entries.
    let complete_len = text.rfind('\n').map_or(0, |i| i + 1);
    let mut valid_len = text.len();

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let body = line.trim();
        if body.is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(body) {
            Ok(LogEntry::Create { record }) => {
                next_id = next_id.max(record.id.get().saturating_add(1));
                records.push(record);
            }
            Ok(LogEntry::Reset { next_id: reset_to }) => {
                records.clear();
                next_id = next_id.max(reset_to);
            }
            Err(_) if !line.ends_with('\n') => {
                valid_len = complete_len;
                break;
            }
            Err(err) => {
                return Err(StorageError::Corrupt {
                    line: idx + 1,
                    reason: err.to_string(),
                })
            }
        }
    }

    Ok(Replayed {
        records,
        next_id,
        valid_len,
    })
}

/// Destination of log appends that can be cut back after a failed write.
trait LogSink: Write {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl LogSink for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Append `line` whole or not at all. On failure the sink is truncated back
/// to `committed` so a partial entry never precedes the next append.
fn append_line<S: LogSink>(sink: &mut S, committed: &mut u64, line: &[u8]) -> io::Result<()> {
    match sink.write_all(line).and_then(|()| sink.flush()) {
        Ok(()) => {
            *committed += line.len() as u64;
            Ok(())
        }
        Err(err) => {
            if let Err(rollback) = sink.truncate_to(*committed) {
                warn!(?rollback, "failed to roll back partial log append");
            }
            Err(err)
        }
    }
}

impl RecordStore for LogRecordStore {
    fn create(&self, new: NewRecord) -> Result<BuzzRecord, StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        let record = new.into_record(RecordId(inner.next_id), now_millis());
        let line = encode_line(&LogEntry::Create {
            record: record.clone(),
        })?;
        let Inner {
            file, committed, ..
        } = &mut *inner;
        append_line(file, committed, &line)?;
        if self.config.sync_writes {
            inner.file.sync_data()?;
        }
        inner.next_id += 1;
        inner.records.push(record.clone());
        Ok(record)
    }

    fn all(&self) -> Result<Vec<BuzzRecord>, StorageError> {
        let inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(inner.records.clone())
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        let tmp = self.tmp_path();
        let line = encode_line(&LogEntry::Reset {
            next_id: inner.next_id,
        })?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&line)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.config.path)?;
        let file = OpenOptions::new().append(true).open(&self.config.path)?;

        let removed = inner.records.len();
        inner.records.clear();
        inner.file = file;
        inner.committed = line.len() as u64;
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(inner.records.len())
    }
}
