//! Stored analysis records
//!
//! A record is the accumulated result for one book together with the chapter
//! ranges (and modes) that produced it. New runs are folded in with the
//! mode-aware merge.

use crate::analysis::{AnalysisMode, AnalysisOutcome, AnalysisRange, AnalysisResult, MergeService, ModedResult};
use crate::storage::{read_json, sanitize_key_segment, write_json, StorageResult, TextStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub result: AnalysisResult,
    /// Mode of the most recently merged run
    pub mode: AnalysisMode,
    #[serde(default)]
    pub ranges: Vec<AnalysisRange>,
    pub updated_at: DateTime<Utc>,
}

impl From<ModedResult> for AnalysisRecord {
    fn from(moded: ModedResult) -> Self {
        Self {
            result: moded.result,
            mode: moded.mode,
            ranges: moded.ranges,
            updated_at: Utc::now(),
        }
    }
}

impl From<AnalysisRecord> for ModedResult {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            result: record.result,
            mode: record.mode,
            ranges: record.ranges,
        }
    }
}

/// Records keyed by book title under `results/`
#[derive(Clone)]
pub struct RecordStore {
    store: Arc<dyn TextStore>,
}

impl RecordStore {
    pub fn new(store: Arc<dyn TextStore>) -> Self {
        Self { store }
    }

    pub fn key_for(book_title: &str) -> String {
        format!("results/{}.json", sanitize_key_segment(book_title))
    }

    pub fn load(&self, book_title: &str) -> StorageResult<Option<AnalysisRecord>> {
        read_json(self.store.as_ref(), &Self::key_for(book_title))
    }

    pub fn save(&self, book_title: &str, record: &AnalysisRecord) -> StorageResult<()> {
        write_json(self.store.as_ref(), &Self::key_for(book_title), record)
    }

    /// Merge a finished run into the stored record (creating it if absent)
    pub fn merge_into_record(
        &self,
        book_title: &str,
        outcome: &AnalysisOutcome,
        merger: &MergeService,
    ) -> StorageResult<AnalysisRecord> {
        let incoming = outcome.to_moded();
        let merged = match self.load(book_title)? {
            Some(existing) => merger.merge_with_modes(&existing.into(), &incoming),
            None => incoming,
        };
        let record = AnalysisRecord::from(merged);
        self.save(book_title, &record)?;
        info!(title = %book_title, ranges = record.ranges.len(), "analysis record updated");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BookInfo, ChapterRange, Stage};
    use crate::storage::MemoryStore;

    fn outcome(synopsis: &str, range: ChapterRange, mode: AnalysisMode) -> AnalysisOutcome {
        AnalysisOutcome {
            result: AnalysisResult {
                synopsis: synopsis.into(),
                ..AnalysisResult::new(BookInfo {
                    title: "T".into(),
                    ..Default::default()
                })
            },
            range: AnalysisRange::new(range, mode),
            completed_stages: vec![Stage::Synopsis],
            failed_stages: vec![],
        }
    }

    #[test]
    fn first_run_creates_record() {
        let records = RecordStore::new(Arc::new(MemoryStore::new()));
        assert!(records.load("T").unwrap().is_none());

        let record = records
            .merge_into_record(
                "T",
                &outcome("first", ChapterRange::new(0, 4), AnalysisMode::Quick),
                &MergeService::new(),
            )
            .unwrap();
        assert_eq!(record.ranges.len(), 1);
        assert_eq!(records.load("T").unwrap(), Some(record));
    }

    #[test]
    fn later_runs_accumulate_ranges() {
        let records = RecordStore::new(Arc::new(MemoryStore::new()));
        let merger = MergeService::new();
        records
            .merge_into_record("T", &outcome("first", ChapterRange::new(0, 4), AnalysisMode::Quick), &merger)
            .unwrap();
        let record = records
            .merge_into_record("T", &outcome("second", ChapterRange::new(5, 9), AnalysisMode::Deep), &merger)
            .unwrap();

        assert_eq!(record.ranges.len(), 2);
        assert_eq!(record.mode, AnalysisMode::Deep);
        assert!(record.result.synopsis.contains("first"));
        assert!(record.result.synopsis.contains("second"));
    }
}
