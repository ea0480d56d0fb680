//! Storage backends
//!
//! Everything the analyzer persists (checkpoints, merged results, stage
//! notes) goes through the `TextStore` trait: path-like keys mapped to text.
//! `FileStore` is the on-disk implementation; `MemoryStore` backs tests.

mod fs;
mod memory;
mod traits;

pub use fs::FileStore;
pub use memory::MemoryStore;
pub use traits::{
    read_json, sanitize_key_segment, write_json, StorageError, StorageResult, TextStore,
};
