//! Append-only batch journal backing the vector store.
//!
//! Each line is one JSON object `{ "batch_id", "records" }` holding every record of a single
//! `add` call. A batch is visible only once its full line, newline included, is on disk, so a
//! crash mid-write leaves at most one torn trailing line which is dropped on the next open.

use super::types::{StoreError, StoredRecord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Serialize, Deserialize)]
struct BatchEntry {
    batch_id: String,
    records: Vec<StoredRecord>,
}

/// Open handle on the journal file.
pub(crate) struct BatchJournal {
    path: PathBuf,
    file: File,
    len: u64,
    next_seq: u64,
}

impl BatchJournal {
    /// Open (or create) the journal and replay every complete batch.
    pub(crate) async fn open(path: &Path) -> Result<(Self, Vec<StoredRecord>), StoreError> {
        let io_error = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(io_error(error)),
        };

        let (records, valid_len) = replay(&bytes)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(io_error)?;

        if valid_len < bytes.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                discarded_bytes = bytes.len() as u64 - valid_len,
                "Discarding torn trailing journal entry"
            );
            file.set_len(valid_len).await.map_err(io_error)?;
            file.sync_data().await.map_err(io_error)?;
        }

        let next_seq = records.last().map(|record| record.seq + 1).unwrap_or(0);
        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                len: valid_len,
                next_seq,
            },
            records,
        ))
    }

    /// Sequence number the next appended record must carry.
    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Durably append one batch. On failure the file is truncated back to its previous length.
    pub(crate) async fn append(
        &mut self,
        batch_id: &str,
        records: &[StoredRecord],
    ) -> Result<(), StoreError> {
        let entry = BatchEntry {
            batch_id: batch_id.to_string(),
            records: records.to_vec(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let written = async {
            self.file.write_all(&line).await?;
            self.file.flush().await?;
            self.file.sync_data().await
        }
        .await;

        if let Err(source) = written {
            if let Err(rollback) = self.file.set_len(self.len).await {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "Failed to roll back partial journal write"
                );
            }
            return Err(StoreError::Io {
                path: self.path.clone(),
                source,
            });
        }

        self.len += line.len() as u64;
        if let Some(last) = records.last() {
            self.next_seq = last.seq + 1;
        }
        Ok(())
    }
}

/// Decode complete lines; returns the records and the byte length of the valid prefix.
fn replay(bytes: &[u8]) -> Result<(Vec<StoredRecord>, u64), StoreError> {
    let mut records = Vec::new();
    let mut valid_len = 0usize;
    let mut line_no = 0usize;

    while valid_len < bytes.len() {
        line_no += 1;
        let rest = &bytes[valid_len..];
        let Some(newline) = rest.iter().position(|byte| *byte == b'\n') else {
            // Unterminated line: the write never completed.
            break;
        };
        let line = &rest[..newline];
        let end = valid_len + newline + 1;

        if !line.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice::<BatchEntry>(line) {
                Ok(entry) => records.extend(entry.records),
                Err(error) if end == bytes.len() => {
                    tracing::warn!(line = line_no, error = %error, "Ignoring undecodable final journal line");
                    break;
                }
                Err(error) => {
                    return Err(StoreError::Corrupt {
                        line: line_no,
                        reason: error.to_string(),
                    });
                }
            }
        }
        valid_len = end;
    }

    Ok((records, valid_len as u64))
}
