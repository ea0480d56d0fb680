//! Storage trait definitions

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-to-text persistence addressed by path-like keys (`checkpoints/x.json`).
///
/// Implementations must be thread-safe (Send + Sync); the pipeline holds the
/// store behind an `Arc` and may hand it to note and checkpoint writers.
pub trait TextStore: Send + Sync {
    /// Read the text stored under `key`, `None` when absent
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Create or overwrite the text under `key`
    fn write(&self, key: &str, text: &str) -> StorageResult<()>;

    /// Delete `key`, returning whether anything was removed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check whether `key` holds a value
    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.read(key)?.is_some())
    }
}

/// Serialize `value` as pretty JSON and store it under `key`
pub fn write_json<T: serde::Serialize>(
    store: &dyn TextStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    store.write(key, &text)
}

/// Read `key` and deserialize it as JSON
pub fn read_json<T: serde::de::DeserializeOwned>(
    store: &dyn TextStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.read(key)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Turn an arbitrary title into a single safe path segment.
///
/// Path separators, reserved filename characters and whitespace runs become
/// `_`; leading dots are stripped so a title can never address a parent
/// directory. An empty result maps to `untitled`.
pub fn sanitize_key_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.trim().chars() {
        let mapped = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        };
        if mapped == '_' {
            if !last_underscore {
                out.push('_');
            }
            last_underscore = true;
        } else {
            out.push(mapped);
            last_underscore = false;
        }
    }
    let trimmed = out
        .trim_start_matches(|c: char| c == '.' || c == '_')
        .trim_end_matches('_')
        .to_string();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}
