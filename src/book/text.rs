//! Plain-text chapter splitting

use super::{BookError, BookMetadata, Chapter, ParsedBook};

/// Headings longer than this are treated as prose, not chapter markers
const MAX_HEADING_CHARS: usize = 60;

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}

/// Count words: whitespace-separated runs, with each CJK ideograph counted
/// as its own word.
pub fn count_words(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for c in text.chars() {
        if is_cjk(c) {
            count += 1;
            in_word = false;
        } else if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            count += 1;
            in_word = true;
        }
    }
    count
}

fn is_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.chars().count() > MAX_HEADING_CHARS {
        return false;
    }
    let lower = line.to_lowercase();
    if lower == "prologue" || lower == "epilogue" {
        return true;
    }
    if let Some(rest) = lower.strip_prefix("chapter") {
        return rest.starts_with(char::is_whitespace) && !rest.trim().is_empty();
    }
    if let Some(rest) = line.strip_prefix('第') {
        return rest.chars().take(12).any(|c| c == '章' || c == '回');
    }
    false
}

/// Split plain text into chapters on heading lines.
///
/// Text before the first heading becomes a "Preface" chapter when it is not
/// blank. Text without any heading becomes a single chapter.
pub fn parse_plain_text(title: &str, text: &str) -> Result<ParsedBook, BookError> {
    if text.trim().is_empty() {
        return Err(BookError::Empty);
    }

    let mut chapters: Vec<Chapter> = Vec::new();
    let mut current_title: Option<String> = None;
    let mut buffer = String::new();

    let flush = |heading: Option<String>, body: &mut String, out: &mut Vec<Chapter>| {
        let content = body.trim().to_string();
        body.clear();
        match heading {
            Some(h) => out.push(Chapter::new(out.len(), h, content)),
            None if !content.is_empty() => out.push(Chapter::new(out.len(), "Preface", content)),
            None => {}
        }
    };

    for line in text.lines() {
        if is_heading(line) {
            flush(current_title.take(), &mut buffer, &mut chapters);
            current_title = Some(line.trim().to_string());
        } else {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }
    flush(current_title.take(), &mut buffer, &mut chapters);

    if chapters.is_empty() {
        return Err(BookError::Empty);
    }
    if chapters.len() == 1 && chapters[0].title == "Preface" {
        chapters[0].title = title.to_string();
    }

    Ok(ParsedBook::new(
        BookMetadata {
            title: title.to_string(),
            ..Default::default()
        },
        chapters,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_mixed_scripts() {
        assert_eq!(count_words("hello world"), 2);
        assert_eq!(count_words("他说 hello"), 3);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn detects_headings() {
        assert!(is_heading("Chapter 12"));
        assert!(is_heading("CHAPTER ONE"));
        assert!(is_heading("第十二章 风起"));
        assert!(is_heading("Epilogue"));
        assert!(!is_heading("Chapters are hard to write."));
        assert!(!is_heading("Chapter"));
        assert!(!is_heading("The chapter closed."));
    }

    #[test]
    fn splits_with_preface() {
        let text = "A note.\n\nChapter 1\nIt began.\n\nChapter 2\nIt ended.\n";
        let book = parse_plain_text("Book", text).unwrap();
        assert_eq!(book.chapter_count(), 3);
        assert_eq!(book.chapters[0].title, "Preface");
        assert_eq!(book.chapters[1].title, "Chapter 1");
        assert_eq!(book.chapters[2].content, "It ended.");
        assert!(book.has_contiguous_indices());
    }

    #[test]
    fn text_without_headings_is_one_chapter() {
        let book = parse_plain_text("Solo", "Just some prose.\nMore prose.").unwrap();
        assert_eq!(book.chapter_count(), 1);
        assert_eq!(book.chapters[0].title, "Solo");
    }

    #[test]
    fn empty_heading_bodies_are_kept() {
        let book = parse_plain_text("B", "Chapter 1\nChapter 2\nbody").unwrap();
        assert_eq!(book.chapter_count(), 2);
        assert_eq!(book.chapters[0].content, "");
    }
}
