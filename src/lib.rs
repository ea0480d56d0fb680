//! Novel Analyzer: staged literary analysis of long-form fiction
//!
//! Splits a novel into model-sized units, runs an ordered set of analysis
//! stages against a text-completion service, and merges the partial answers
//! into one structured result.
//!
//! # Core Concepts
//!
//! - **Stages**: synopsis, characters, techniques, ... each with its own prompt
//! - **Modes**: quick / standard / deep, each a superset of the one before
//! - **Checkpoints**: interrupted runs resume from their completed stages
//! - **Merging**: results from different runs, ranges and depths combine
//!
//! # Example
//!
//! ```
//! use novel_analyzer::analysis::{AnalysisMode, Stage};
//!
//! let stages = Stage::for_mode(AnalysisMode::Quick);
//! assert_eq!(stages.len(), 4);
//! ```

pub mod analysis;
pub mod book;
pub mod checkpoint;
pub mod config;
pub mod llm;
pub mod record;
pub mod storage;

pub use analysis::{
    AnalysisConfig, AnalysisController, AnalysisError, AnalysisMode, AnalysisOutcome,
    AnalysisRequest, AnalysisResult, AnalysisService, MergeService, Stage,
};
pub use book::{load_book, BookError, Chapter, ParsedBook};
pub use checkpoint::{AnalysisCheckpoint, CheckpointStore};
pub use config::{ConfigError, Settings};
pub use llm::{CompletionClient, CompletionError, HttpCompletionClient, MockClient};
pub use record::{AnalysisRecord, RecordStore};
pub use storage::{FileStore, MemoryStore, StorageError, StorageResult, TextStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
