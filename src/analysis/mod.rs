//! Novel analysis pipeline
//!
//! # Architecture
//!
//! - **Chunker / sampler**: select the book text each request sees
//! - **StageExecutor**: one prompt → completion → tolerant parse
//! - **AnalysisController**: pause / resume / stop between stages
//! - **AnalysisService**: runs the stages of a mode in order, merging unit
//!   outputs, checkpointing and reporting progress
//! - **MergeService**: entity merge and mode-aware merge of results
//!
//! # Modes
//!
//! - **quick**: synopsis, characters, techniques, takeaways
//! - **standard**: + emotion curve, chapter structure, foreshadowing
//! - **deep**: + per-chapter details and a writing review
//!
//! # Example
//!
//! ```ignore
//! use novel_analyzer::analysis::{AnalysisConfig, AnalysisController, AnalysisMode, AnalysisRequest, AnalysisService};
//!
//! let service = AnalysisService::new(client, "gpt-4o-mini");
//! let request = AnalysisRequest::new(AnalysisConfig::new(AnalysisMode::Quick, "mystery"));
//! let outcome = service.analyze(&book, request, &AnalysisController::new()).await?;
//! println!("{}", outcome.result.synopsis);
//! ```

mod chunker;
mod controller;
mod events;
mod executor;
mod merger;
mod notes;
mod parse;
mod pipeline;
mod prompts;
mod sampler;
mod stage;
mod types;

pub use chunker::{
    chunk_chapters, render_chapters, representative_positions, BookChunk, ChunkLimits,
    DEFAULT_MAX_CHAPTERS, DEFAULT_MAX_CHARS,
};
pub use controller::{AnalysisController, ControlState};
pub use events::{
    AnalysisEvent, AnalysisObserver, LogObserver, NoopObserver, RecordingObserver, StageStatus,
};
pub use executor::StageExecutor;
pub use merger::{
    MergeOptions, MergeService, ModedResult, MAX_TECHNIQUE_EXAMPLES, TEXT_MERGE_SEPARATOR,
};
pub use notes::{render as render_note, NoteWriter};
pub use parse::{extract_json, parse_stage_output};
pub use pipeline::{AnalysisOutcome, AnalysisRequest, AnalysisService};
pub use prompts::{build_messages, default_instructions};
pub use sampler::{
    global_sample_positions, key_chapter_positions, sample_share, SAMPLE_CHUNK_BUDGETS,
};
pub use stage::{OutputKind, Stage, StageOutput, StageDescriptor, UnitStrategy, STAGE_TABLE};
pub use types::{
    AnalysisConfig, AnalysisError, AnalysisMode, AnalysisRange, AnalysisResult, BookInfo,
    ChapterDetail, ChapterRange, ChapterSummary, CharacterAnalysis, CharacterRole, EmotionPoint,
    ForeshadowStatus, Foreshadowing, PartialResult, TechniqueAnalysis, DEFAULT_INTENSITY,
};
