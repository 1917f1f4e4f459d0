//! Submission ledger: the persistence seam the core calls into.
//!
//! The core never owns a schema; callers hand it a `SubmissionLedger`
//! and decide how records are stored. A JSONL file implementation backs
//! the CLI, an in-memory one backs tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::score::GradingResult;

/// One graded submission, ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Unique submission identifier.
    pub id: Uuid,
    /// Language the submission was graded as.
    pub language: String,
    /// The submitted source text.
    pub source: String,
    /// Final score in `[0, 100]`.
    pub score: u8,
    /// Feedback text shown to the submitter.
    pub feedback: String,
    /// When the grading completed.
    pub graded_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// Builds a record from a request's inputs and its grading result.
    pub fn new(language: impl Into<String>, source: impl Into<String>, result: &GradingResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            language: language.into(),
            source: source.into(),
            score: result.score,
            feedback: result.feedback.clone(),
            graded_at: Utc::now(),
        }
    }
}

/// Persistence boundary for graded submissions.
#[async_trait]
pub trait SubmissionLedger: Send + Sync {
    /// Persists one record.
    async fn record(&self, record: SubmissionRecord) -> Result<()>;
}

/// Appends one JSON line per record to a file.
pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    /// Creates a ledger appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SubmissionLedger for JsonlLedger {
    async fn record(&self, record: SubmissionRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record).context("Failed to serialize record")?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open ledger file: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to write ledger file: {}", self.path.display()))?;

        Ok(())
    }
}

/// Keeps records in memory; for tests and callers without storage.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<SubmissionRecord>>,
}

impl MemoryLedger {
    /// Creates an empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.records.lock().expect("ledger poisoned").clone()
    }
}

#[async_trait]
impl SubmissionLedger for MemoryLedger {
    async fn record(&self, record: SubmissionRecord) -> Result<()> {
        self.records.lock().expect("ledger poisoned").push(record);
        Ok(())
    }
}
