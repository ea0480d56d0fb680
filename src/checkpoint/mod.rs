//! Best-effort persistence of in-progress analyses
//!
//! One checkpoint per book title, stored as JSON under
//! `checkpoints/<sanitized title>.json`. Every failure here is logged and
//! treated as "no checkpoint": checkpointing must never fail a run.

use crate::analysis::{AnalysisConfig, ChapterRange, PartialResult, Stage};
use crate::storage::{read_json, sanitize_key_segment, write_json, TextStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Stage completion and partial output of one interrupted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCheckpoint {
    pub book_path: String,
    pub book_title: String,
    pub config: AnalysisConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_range: Option<ChapterRange>,
    /// Stage in flight when last written, for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
    #[serde(default)]
    pub completed_stages: Vec<Stage>,
    #[serde(default)]
    pub partial_results: PartialResult,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisCheckpoint {
    pub fn new(
        book_path: impl Into<String>,
        book_title: impl Into<String>,
        config: AnalysisConfig,
        chapter_range: Option<ChapterRange>,
    ) -> Self {
        let now = Utc::now();
        Self {
            book_path: book_path.into(),
            book_title: book_title.into(),
            config,
            chapter_range,
            current_stage: None,
            completed_stages: Vec::new(),
            partial_results: PartialResult::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Record `stage` as done and fold its output into the partial results
    pub fn record(&mut self, stage: Stage, partial: PartialResult) {
        if !self.is_completed(stage) {
            self.completed_stages.push(stage);
        }
        self.partial_results.merge_shallow(partial);
        self.updated_at = Utc::now();
    }
}

/// Checkpoint persistence over a `TextStore`
#[derive(Clone)]
pub struct CheckpointStore {
    store: Arc<dyn TextStore>,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn TextStore>) -> Self {
        Self { store }
    }

    /// Storage key for a title
    pub fn key_for(book_title: &str) -> String {
        format!("checkpoints/{}.json", sanitize_key_segment(book_title))
    }

    fn save(&self, checkpoint: &AnalysisCheckpoint) -> bool {
        let key = Self::key_for(&checkpoint.book_title);
        match write_json(self.store.as_ref(), &key, checkpoint) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to write checkpoint");
                false
            }
        }
    }

    /// Start a fresh checkpoint, replacing any existing one for the title
    pub fn create(
        &self,
        book_path: &str,
        book_title: &str,
        config: &AnalysisConfig,
        chapter_range: Option<ChapterRange>,
    ) -> AnalysisCheckpoint {
        let checkpoint =
            AnalysisCheckpoint::new(book_path, book_title, config.clone(), chapter_range);
        self.save(&checkpoint);
        debug!(title = %book_title, "checkpoint created");
        checkpoint
    }

    /// Mark `stage` completed with its output. `None` when no checkpoint
    /// exists for the title.
    pub fn update(
        &self,
        book_title: &str,
        stage: Stage,
        partial: PartialResult,
    ) -> Option<AnalysisCheckpoint> {
        let mut checkpoint = self.get(book_title)?;
        checkpoint.record(stage, partial);
        self.save(&checkpoint);
        Some(checkpoint)
    }

    pub fn set_current_stage(&self, book_title: &str, stage: Stage) {
        if let Some(mut checkpoint) = self.get(book_title) {
            checkpoint.current_stage = Some(stage);
            checkpoint.updated_at = Utc::now();
            self.save(&checkpoint);
        }
    }

    /// The stored checkpoint, or `None` when missing or unreadable
    pub fn get(&self, book_title: &str) -> Option<AnalysisCheckpoint> {
        let key = Self::key_for(book_title);
        match read_json::<AnalysisCheckpoint>(self.store.as_ref(), &key) {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unreadable checkpoint");
                None
            }
        }
    }

    /// Remove the checkpoint; returns whether one was removed
    pub fn delete(&self, book_title: &str) -> bool {
        let key = Self::key_for(book_title);
        match self.store.delete(&key) {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to delete checkpoint");
                false
            }
        }
    }
}
