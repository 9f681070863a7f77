// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! One JSON object per line: `{"seq": N, "op": {...}}`. Appends are synced
//! before they return, so an operation that was acknowledged survives a
//! crash. A crash mid-append can leave a torn final line; replay skips it.
//! An append that fails while the process keeps running is rolled back, so
//! a fragment never ends up in the middle of the log.

use chatty_core::Operation;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt WAL entry at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Write-ahead log for durable operation storage
pub struct Wal {
    path: PathBuf,
    file: File,
    sequence: u64,
    /// Length of the log up to the last acknowledged entry
    len: u64,
    /// A rollback failed; truncate to `len` before the next append
    needs_repair: bool,
}

impl Wal {
    /// Open or create a WAL at the given path
    ///
    /// The sequence continues from the last entry already in the file.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let log = Self::read_log(path)?;
        let sequence = log.entries.last().map(|entry| entry.seq).unwrap_or(0);

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if log.valid_len < log.total_len {
            // drop the torn tail so the next append starts on a fresh line
            file.set_len(log.valid_len)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sequence,
            len: log.valid_len,
            needs_repair: false,
        })
    }

    /// Append an operation to the log, returning its sequence number
    ///
    /// On failure nothing is kept: the log is cut back to its previous length
    /// and the sequence number is reused by the next append.
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        let seq = self.sequence + 1;
        let mut line = serde_json::to_string(&WalEntryRef { seq, op })?;
        line.push('\n');

        if self.needs_repair {
            self.file.set_len(self.len)?;
            self.needs_repair = false;
        }
        if let Err(e) = self.write_synced(line.as_bytes()) {
            tracing::warn!(seq, error = %e, "wal append failed, rolling back");
            self.rollback();
            return Err(e.into());
        }

        self.len += line.len() as u64;
        self.sequence = seq;
        tracing::trace!(seq, op = op.kind(), "wal append");
        Ok(seq)
    }

    fn write_synced(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.sync_all()
    }

    /// Cut the file back to the last acknowledged entry
    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            tracing::error!(path = %self.path.display(), error = %e, "wal rollback failed");
            self.needs_repair = true;
        }
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay all operations from the log
    pub fn replay(path: &Path) -> Result<Vec<Operation>, WalError> {
        Ok(Self::read_log(path)?
            .entries
            .into_iter()
            .map(|entry| entry.op)
            .collect())
    }

    fn read_log(path: &Path) -> Result<ReadLog, WalError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ReadLog::default()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let mut log = ReadLog {
            total_len: content.len() as u64,
            ..ReadLog::default()
        };

        for (index, line) in lines.iter().enumerate() {
            let is_last = index + 1 == lines.len();
            if line.trim().is_empty() {
                log.valid_len += line.len() as u64;
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) if line.ends_with('\n') => {
                    log.entries.push(entry);
                    log.valid_len += line.len() as u64;
                }
                Ok(_) => {
                    tracing::warn!(path = %path.display(), line = index + 1, "ignoring unterminated WAL tail");
                }
                Err(e) if is_last => {
                    tracing::warn!(path = %path.display(), line = index + 1, error = %e, "ignoring torn WAL tail");
                }
                Err(source) => {
                    return Err(WalError::Corrupt {
                        line: index + 1,
                        source,
                    })
                }
            }
        }

        Ok(log)
    }
}

#[derive(Default)]
struct ReadLog {
    entries: Vec<WalEntry>,
    /// Bytes up to the end of the last complete entry
    valid_len: u64,
    total_len: u64,
}

#[derive(Debug, Deserialize)]
struct WalEntry {
    seq: u64,
    op: Operation,
}

#[derive(Serialize)]
struct WalEntryRef<'a> {
    seq: u64,
    op: &'a Operation,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
