//! Synthetic books

use novel_analyzer::book::{BookMetadata, Chapter, ParsedBook};

/// Builds a book of generated chapters
pub struct BookBuilder {
    title: String,
    author: String,
    chapters: usize,
    chapter_chars: usize,
}

impl BookBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: "Test Author".to_string(),
            chapters: 12,
            chapter_chars: 3000,
        }
    }

    pub fn chapters(mut self, n: usize) -> Self {
        self.chapters = n;
        self
    }

    /// Approximate characters per chapter
    pub fn chapter_chars(mut self, n: usize) -> Self {
        self.chapter_chars = n;
        self
    }

    pub fn build(self) -> ParsedBook {
        let sentence = "The lighthouse keeper watched the fog roll in over the harbor. ";
        let repeats = (self.chapter_chars / sentence.len()).max(1);
        let chapters = (0..self.chapters)
            .map(|i| {
                let content = format!("Chapter {} opens. {}", i + 1, sentence.repeat(repeats));
                Chapter::new(i, format!("Chapter {}", i + 1), content)
            })
            .collect();
        ParsedBook::new(
            BookMetadata {
                title: self.title,
                author: self.author,
                ..Default::default()
            },
            chapters,
        )
    }
}

/// Twelve chapters of about 3,000 characters each
pub fn sample_book() -> ParsedBook {
    BookBuilder::new("The Keeper").build()
}
