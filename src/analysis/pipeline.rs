//! Analysis pipeline: runs the stages of a mode over a book
//!
//! Stages run strictly in sequence, and so do the units within a stage. The
//! controller gate is checked before every stage; a stage that fails is
//! logged, reported, and skipped while the run continues.

use super::chunker::{chunk_chapters, render_chapters, representative_positions, ChunkLimits};
use super::controller::AnalysisController;
use super::events::{AnalysisEvent, AnalysisObserver, NoopObserver, StageStatus};
use super::executor::StageExecutor;
use super::merger::{MergeService, ModedResult};
use super::notes::NoteWriter;
use super::sampler::{global_sample_positions, key_chapter_positions, sample_share};
use super::stage::{Stage, StageOutput, UnitStrategy};
use super::types::{
    AnalysisConfig, AnalysisError, AnalysisRange, AnalysisResult, BookInfo, ChapterRange,
};
use crate::book::{Chapter, ParsedBook};
use crate::checkpoint::{AnalysisCheckpoint, CheckpointStore};
use crate::llm::CompletionClient;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to analyze
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub config: AnalysisConfig,
    /// Where the book was loaded from, recorded in the checkpoint
    pub book_path: String,
    /// Inclusive chapter range; the whole book when `None`
    pub range: Option<ChapterRange>,
    /// Continue an interrupted run instead of starting fresh
    pub resume_from: Option<AnalysisCheckpoint>,
}

impl AnalysisRequest {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_book_path(mut self, path: impl Into<String>) -> Self {
        self.book_path = path.into();
        self
    }

    pub fn with_range(mut self, range: ChapterRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Resume from `checkpoint`, taking its config and range
    pub fn resuming(checkpoint: AnalysisCheckpoint) -> Self {
        Self {
            config: checkpoint.config.clone(),
            book_path: checkpoint.book_path.clone(),
            range: checkpoint.chapter_range,
            resume_from: Some(checkpoint),
        }
    }
}

/// Result of a run that was not cancelled
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// Chapters and mode this run covered
    pub range: AnalysisRange,
    /// Stages whose output is present in `result`
    pub completed_stages: Vec<Stage>,
    /// Stages that failed and are absent from `result`
    pub failed_stages: Vec<Stage>,
}

impl AnalysisOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_stages.is_empty()
    }

    /// The result annotated for mode-aware merging
    pub fn to_moded(&self) -> ModedResult {
        ModedResult::new(self.result.clone(), self.range.clone())
    }
}

/// One request's worth of book text
struct Unit<'a> {
    heading: String,
    content: String,
    /// Set for single-chapter units
    chapter: Option<&'a Chapter>,
}

/// Drives analysis runs
pub struct AnalysisService {
    executor: StageExecutor,
    limits: ChunkLimits,
    checkpoints: Option<CheckpointStore>,
    notes: Option<NoteWriter>,
    observer: Arc<dyn AnalysisObserver>,
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

impl AnalysisService {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            executor: StageExecutor::new(client, model),
            limits: ChunkLimits::default(),
            checkpoints: None,
            notes: None,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_limits(mut self, limits: ChunkLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: CheckpointStore) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_notes(mut self, notes: NoteWriter) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AnalysisObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn checkpoints(&self) -> Option<&CheckpointStore> {
        self.checkpoints.as_ref()
    }

    fn emit(&self, event: AnalysisEvent) {
        self.observer.on_event(&event);
    }

    fn emit_status(&self, stage: Stage, status: StageStatus, message: String, output: Option<StageOutput>) {
        self.emit(AnalysisEvent::StageResult {
            stage,
            status,
            message,
            output,
        });
    }

    /// Resume the stored checkpoint for `book`.
    ///
    /// Fails with a configuration error when there is nothing to resume.
    pub async fn resume(
        &self,
        book: &ParsedBook,
        controller: &AnalysisController,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let checkpoint = self
            .checkpoints
            .as_ref()
            .and_then(|store| store.get(book.title()))
            .ok_or_else(|| {
                AnalysisError::Config(format!("no checkpoint to resume for '{}'", book.title()))
            })?;
        self.analyze(book, AnalysisRequest::resuming(checkpoint), controller)
            .await
    }

    /// Run every stage of the requested mode over the requested chapters.
    ///
    /// Returns `AnalysisError::Cancelled` when the controller is stopped;
    /// the checkpoint is left in place so the run can be resumed.
    pub async fn analyze(
        &self,
        book: &ParsedBook,
        request: AnalysisRequest,
        controller: &AnalysisController,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let range = validate(book, request.range)?;
        let chapters = &book.chapters[range.start..=range.end];
        let config = &request.config;
        let title = book.title();
        let stages = Stage::for_mode(config.mode);

        let book_info = BookInfo {
            title: title.to_string(),
            author: book.metadata.author.clone(),
            novel_type: config.novel_type.clone(),
            chapter_count: book.chapter_count(),
            word_count: book.total_word_count,
        };

        let (mut result, done) = match &request.resume_from {
            Some(cp) => {
                info!(title = %title, completed = cp.completed_stages.len(), "resuming analysis");
                (
                    AnalysisResult::new(book_info).with_partial(&cp.partial_results),
                    cp.completed_stages.clone(),
                )
            }
            None => {
                if let Some(store) = &self.checkpoints {
                    store.create(&request.book_path, title, config, request.range);
                }
                (AnalysisResult::new(book_info), Vec::new())
            }
        };

        info!(
            title = %title,
            mode = %config.mode,
            chapters = chapters.len(),
            stages = stages.len(),
            "analysis started"
        );
        for stage in &stages {
            if !done.contains(stage) {
                self.emit_status(*stage, StageStatus::Pending, stage.label().to_string(), None);
            }
        }

        let total = stages.len();
        let mut completed = Vec::new();
        let mut failed = Vec::new();

        for (i, &stage) in stages.iter().enumerate() {
            if done.contains(&stage) {
                debug!(stage = %stage, "stage restored from checkpoint");
                completed.push(stage);
                continue;
            }

            controller.checkpoint().await?;

            if let Some(store) = &self.checkpoints {
                store.set_current_stage(title, stage);
            }
            self.emit_status(stage, StageStatus::Running, stage.label().to_string(), None);

            match self.run_stage(stage, i, total, title, chapters, config).await {
                Ok(output) => {
                    let items = output.item_count();
                    let partial = output.clone().into_partial();
                    result = result.with_partial(&partial);
                    if let Some(store) = &self.checkpoints {
                        store.update(title, stage, partial);
                    }
                    if let Some(notes) = &self.notes {
                        if let Err(e) = notes.write(title, &output) {
                            warn!(stage = %stage, error = %e, "failed to write note");
                        }
                    }
                    info!(stage = %stage, items, "stage completed");
                    self.emit_status(
                        stage,
                        StageStatus::Completed,
                        format!("{} completed", stage.label()),
                        Some(output),
                    );
                    completed.push(stage);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(stage = %stage, error = %e, "stage failed, continuing");
                    self.emit_status(stage, StageStatus::Error, e.to_string(), None);
                    failed.push(stage);
                }
            }
        }

        if failed.is_empty() {
            if let Some(store) = &self.checkpoints {
                store.delete(title);
            }
        }
        info!(
            title = %title,
            completed = completed.len(),
            failed = failed.len(),
            "analysis finished"
        );

        Ok(AnalysisOutcome {
            result,
            range: AnalysisRange::new(range, config.mode),
            completed_stages: completed,
            failed_stages: failed,
        })
    }

    async fn run_stage(
        &self,
        stage: Stage,
        position: usize,
        total: usize,
        title: &str,
        chapters: &[Chapter],
        config: &AnalysisConfig,
    ) -> Result<StageOutput, AnalysisError> {
        let units = self.units(stage, title, chapters);
        let count = units.len();
        let merger = MergeService::for_chunks();
        let percent = |done: usize| {
            let fraction = if count == 0 { 1.0 } else { done as f32 / count as f32 };
            (position as f32 + fraction) / total as f32 * 100.0
        };

        let mut acc = StageOutput::empty(stage);
        for (j, unit) in units.into_iter().enumerate() {
            self.emit(AnalysisEvent::Progress {
                stage,
                percent: percent(j),
                message: format!("{}: unit {}/{}", stage.label(), j + 1, count),
            });

            let mut output = self
                .executor
                .execute(stage, config, &unit.heading, &unit.content)
                .await?;
            if let (Some(chapter), StageOutput::ChapterDetails(details)) = (unit.chapter, &mut output) {
                for d in details.iter_mut() {
                    d.index = chapter.index;
                    d.title = chapter.title.clone();
                }
            }
            debug!(stage = %stage, unit = j + 1, items = output.item_count(), "unit completed");
            acc = merger.merge_output(acc, output);

            self.emit(AnalysisEvent::Progress {
                stage,
                percent: percent(j + 1),
                message: format!("{}: finished unit {}/{}", stage.label(), j + 1, count),
            });
        }
        Ok(acc)
    }

    /// Split the chapters into request units according to the stage strategy
    fn units<'a>(&self, stage: Stage, title: &str, chapters: &'a [Chapter]) -> Vec<Unit<'a>> {
        let n = chapters.len();
        match stage.strategy() {
            UnitStrategy::AllChunks | UnitStrategy::RepresentativeChunks => {
                let chunks = chunk_chapters(chapters, self.limits);
                let picked: Vec<usize> = match stage.strategy() {
                    UnitStrategy::RepresentativeChunks => representative_positions(chunks.len()),
                    _ => (0..chunks.len()).collect(),
                };
                picked
                    .into_iter()
                    .map(|p| {
                        let chunk = &chunks[p];
                        Unit {
                            heading: format!(
                                "Book: {}\nChapters {} to {} (part {} of {})",
                                title,
                                chunk.start_index,
                                chunk.end_index,
                                p + 1,
                                chunks.len()
                            ),
                            content: chunk.render(),
                            chapter: None,
                        }
                    })
                    .collect()
            }
            UnitStrategy::GlobalSample => {
                let positions = global_sample_positions(n);
                if positions.is_empty() {
                    return Vec::new();
                }
                let per_chapter = sample_share(self.limits.max_chars, positions.len());
                let sampled: Vec<Chapter> = positions
                    .iter()
                    .map(|&p| {
                        let ch = &chapters[p];
                        Chapter {
                            content: truncate_chars(&ch.content, per_chapter).to_string(),
                            ..ch.clone()
                        }
                    })
                    .collect();
                vec![Unit {
                    heading: format!(
                        "Book: {}\nSampled {} of {} chapters",
                        title,
                        positions.len(),
                        n
                    ),
                    content: render_chapters(sampled.iter()),
                    chapter: None,
                }]
            }
            UnitStrategy::KeyChapters => key_chapter_positions(n)
                .into_iter()
                .map(|p| {
                    let ch = &chapters[p];
                    Unit {
                        heading: format!("Book: {}\nChapter {}: {}", title, ch.index, ch.title),
                        content: truncate_chars(&ch.content, self.limits.max_chars).to_string(),
                        chapter: Some(ch),
                    }
                })
                .collect(),
        }
    }
}

/// Check the book and range before any stage runs
fn validate(book: &ParsedBook, range: Option<ChapterRange>) -> Result<ChapterRange, AnalysisError> {
    if book.chapters.is_empty() {
        return Err(AnalysisError::Config("book has no chapters".to_string()));
    }
    if !book.has_contiguous_indices() {
        return Err(AnalysisError::Config(
            "chapter indices must be contiguous from 0".to_string(),
        ));
    }
    let n = book.chapter_count();
    let range = range.unwrap_or_else(|| ChapterRange::full(n));
    if range.is_empty() || range.end >= n {
        return Err(AnalysisError::Config(format!(
            "chapter range {}..={} is invalid for a book of {} chapters",
            range.start, range.end, n
        )));
    }
    Ok(range)
}
