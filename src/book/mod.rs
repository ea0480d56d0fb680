//! Parsed book model
//!
//! A `ParsedBook` is the immutable input to the analysis pipeline: metadata
//! plus an ordered list of chapters with contiguous, zero-based indices.
//! Producing one from EPUB/DOCX is the job of an external parser; this module
//! ships loaders for serialized JSON books and plain text.

mod text;

pub use text::{count_words, parse_plain_text};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while turning raw bytes into a `ParsedBook`
#[derive(Debug, Error)]
pub enum BookError {
    #[error("book is empty")]
    Empty,

    #[error("unreadable book: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("invalid {format} book: {message}")]
    Format { format: &'static str, message: String },
}

/// Bibliographic metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

/// One chapter of plain text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub word_count: usize,
}

impl Chapter {
    pub fn new(index: usize, title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = count_words(&content);
        Self {
            index,
            title: title.into(),
            content,
            word_count,
        }
    }

    /// Length in characters, the unit the chunker budgets in
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A book split into chapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedBook {
    pub metadata: BookMetadata,
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub total_word_count: usize,
}

impl ParsedBook {
    /// Build a book, renumbering chapters so indices are contiguous from 0
    pub fn new(metadata: BookMetadata, chapters: Vec<Chapter>) -> Self {
        let chapters: Vec<Chapter> = chapters
            .into_iter()
            .enumerate()
            .map(|(i, mut ch)| {
                ch.index = i;
                ch
            })
            .collect();
        let total_word_count = chapters.iter().map(|c| c.word_count).sum();
        Self {
            metadata,
            chapters,
            total_word_count,
        }
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Check the contiguous-index invariant
    pub fn has_contiguous_indices(&self) -> bool {
        self.chapters.iter().enumerate().all(|(i, c)| c.index == i)
    }

    /// Parse a serialized book, filling in word counts the producer left out
    pub fn from_json(text: &str) -> Result<Self, BookError> {
        if text.trim().is_empty() {
            return Err(BookError::Empty);
        }
        let mut book: ParsedBook = serde_json::from_str(text).map_err(|e| BookError::Format {
            format: "json",
            message: e.to_string(),
        })?;
        if book.chapters.is_empty() {
            return Err(BookError::Empty);
        }
        for ch in &mut book.chapters {
            if ch.word_count == 0 {
                ch.word_count = count_words(&ch.content);
            }
        }
        if book.total_word_count == 0 {
            book.total_word_count = book.chapters.iter().map(|c| c.word_count).sum();
        }
        if !book.has_contiguous_indices() {
            return Err(BookError::Format {
                format: "json",
                message: "chapter indices must be contiguous from 0".to_string(),
            });
        }
        Ok(book)
    }
}

/// Parse raw bytes into a book, choosing the format from the file name
pub fn parse(bytes: &[u8], filename: Option<&str>) -> Result<ParsedBook, BookError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(BookError::Empty);
    }
    let text = std::str::from_utf8(bytes).map_err(|e| BookError::Format {
        format: "text",
        message: format!("not valid UTF-8: {}", e),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let is_json = filename
        .map(|f| f.to_ascii_lowercase().ends_with(".json"))
        .unwrap_or(false);
    if is_json {
        return ParsedBook::from_json(text);
    }

    let title = filename
        .map(|f| {
            Path::new(f)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| f.to_string())
        })
        .unwrap_or_else(|| "Untitled".to_string());
    parse_plain_text(&title, text)
}

/// Read and parse a book from disk
pub fn load_book(path: &Path) -> Result<ParsedBook, BookError> {
    let bytes = std::fs::read(path)?;
    let filename = path.file_name().map(|f| f.to_string_lossy().to_string());
    parse(&bytes, filename.as_deref())
}
