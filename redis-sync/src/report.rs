//! Outcome of a sync run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{errors::SyncError, record::display_key};

/// What happened to a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Written to the destination (or would have been, in a dry run).
    Copied,
    /// Already present in the destination and left alone.
    Skipped,
    /// Gone from the source before it could be read, or expired before it
    /// could be written.
    Vanished,
}

/// A key that could not be copied.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyFailure {
    pub key: String,
    pub reason: String,
}

impl KeyFailure {
    pub fn new(key: &[u8], error: &SyncError) -> Self {
        Self {
            key: display_key(key),
            reason: error.to_string(),
        }
    }
}

/// Counters and failures collected over one run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub dry_run: bool,
    /// Distinct keys returned by the scan.
    pub scanned: u64,
    pub copied: u64,
    pub skipped: u64,
    pub vanished: u64,
    pub failed: Vec<KeyFailure>,
}

impl SyncReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            elapsed_ms: 0,
            dry_run,
            scanned: 0,
            copied: 0,
            skipped: 0,
            vanished: 0,
            failed: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Copied => self.copied += 1,
            CopyOutcome::Skipped => self.skipped += 1,
            CopyOutcome::Vanished => self.vanished += 1,
        }
    }

    pub fn record_failure(&mut self, failure: KeyFailure) {
        self.failed.push(failure);
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.len() as u64
    }

    /// True when every scanned key was copied, skipped or had vanished.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let mut report = SyncReport::new(false);
        report.record(CopyOutcome::Copied);
        report.record(CopyOutcome::Copied);
        report.record(CopyOutcome::Skipped);
        report.record(CopyOutcome::Vanished);

        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.vanished, 1);
        assert!(report.is_success());
    }

    #[test]
    fn test_failure_marks_report_unsuccessful() {
        let mut report = SyncReport::new(false);
        let error = SyncError::UnsupportedType {
            key: "doc:1".to_string(),
            type_name: "ReJSON-RL".to_string(),
        };
        report.record_failure(KeyFailure::new(b"doc:1", &error));

        assert!(!report.is_success());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failed[0].key, "doc:1");
    }

    #[test]
    fn test_report_serialization() {
        let report = SyncReport::new(true);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["copied"], 0);
        assert!(json["failed"].as_array().unwrap().is_empty());
    }
}
