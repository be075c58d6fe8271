//! Durable JSON Lines records of failed chunks and rejected cards
//!
//! The pipeline only appends; the files exist for post-mortem inspection.
//! Write errors are logged and swallowed so a full disk never fails a run.

use cardwright_domain::{Card, Chunk};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// File name of the failed-chunk log
pub const FAILED_CHUNKS_FILE: &str = "failed_chunks_log.jsonl";

/// File name of the rejected-card log
pub const REJECTED_CARDS_FILE: &str = "rejected_cards_log.jsonl";

/// Characters of chunk text kept in a failure entry
pub const CHUNK_PREVIEW_CHARS: usize = 200;

/// One failed chunk
#[derive(Debug, Serialize)]
struct FailedChunkEntry<'a> {
    run_id: Uuid,
    timestamp: DateTime<Utc>,
    chunk_index: usize,
    error: &'a str,
    chunk_preview: String,
}

/// One rejected card
#[derive(Debug, Serialize)]
struct RejectedCardEntry<'a> {
    run_id: Uuid,
    timestamp: DateTime<Utc>,
    card: &'a Card,
    reason: &'a str,
}

/// An append-only log file with its own lock
#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LogFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn append<T: Serialize>(&self, entry: &T) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not serialize log entry for {}: {}", self.path.display(), e);
                return;
            }
        };

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{}", line));

        if let Err(e) = result {
            warn!("Could not write to {}: {}", self.path.display(), e);
        }
    }
}

/// Writes failure and rejection entries for one run
#[derive(Debug)]
pub struct FailureLogger {
    run_id: Uuid,
    failed_chunks: LogFile,
    rejected_cards: LogFile,
}

impl FailureLogger {
    /// Log into `dir` under a fresh run id
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_run_id(dir, Uuid::now_v7())
    }

    /// Log into `dir` under the given run id
    pub fn with_run_id(dir: impl AsRef<Path>, run_id: Uuid) -> Self {
        let dir = dir.as_ref();
        Self {
            run_id,
            failed_chunks: LogFile::new(dir.join(FAILED_CHUNKS_FILE)),
            rejected_cards: LogFile::new(dir.join(REJECTED_CARDS_FILE)),
        }
    }

    /// Identifier stamped on every entry
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Path of the failed-chunk log
    pub fn failed_chunks_path(&self) -> &Path {
        &self.failed_chunks.path
    }

    /// Path of the rejected-card log
    pub fn rejected_cards_path(&self) -> &Path {
        &self.rejected_cards.path
    }

    /// Record a chunk that contributed nothing because of `error`
    pub fn log_failed_chunk(&self, chunk: &Chunk, error: &str) {
        self.failed_chunks.append(&FailedChunkEntry {
            run_id: self.run_id,
            timestamp: Utc::now(),
            chunk_index: chunk.ordinal(),
            error,
            chunk_preview: chunk.preview(CHUNK_PREVIEW_CHARS),
        });
    }

    /// Record a card the validator turned down
    pub fn log_rejected_card(&self, card: &Card, reason: &str) {
        self.rejected_cards.append(&RejectedCardEntry {
            run_id: self.run_id,
            timestamp: Utc::now(),
            card,
            reason,
        });
    }
}
