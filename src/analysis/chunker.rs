//! Chunking chapters into model-sized analysis units

use crate::book::Chapter;

/// Default character ceiling per chunk
pub const DEFAULT_MAX_CHARS: usize = 50_000;
/// Default chapter ceiling per chunk
pub const DEFAULT_MAX_CHAPTERS: usize = 20;

/// Size caps for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_chars: usize,
    pub max_chapters: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            max_chapters: DEFAULT_MAX_CHAPTERS,
        }
    }
}

/// A contiguous run of chapters sent to the model as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct BookChunk<'a> {
    pub chapters: &'a [Chapter],
    /// Index of the first chapter
    pub start_index: usize,
    /// Index of the last chapter
    pub end_index: usize,
    pub total_chars: usize,
}

impl<'a> BookChunk<'a> {
    fn new(chapters: &'a [Chapter], total_chars: usize) -> Self {
        Self {
            chapters,
            start_index: chapters.first().map(|c| c.index).unwrap_or(0),
            end_index: chapters.last().map(|c| c.index).unwrap_or(0),
            total_chars,
        }
    }

    /// Chapters rendered as prompt text with their titles
    pub fn render(&self) -> String {
        render_chapters(self.chapters.iter())
    }
}

/// Render chapters as `## title` sections separated by blank lines
pub fn render_chapters<'a>(chapters: impl Iterator<Item = &'a Chapter>) -> String {
    let mut out = String::new();
    for ch in chapters {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("## [{}] {}\n\n", ch.index, ch.title));
        out.push_str(ch.content.trim());
    }
    out
}

/// Split `chapters` into chunks bounded by both limits.
///
/// Chapters are never split: a single chapter larger than `max_chars` forms a
/// chunk of its own. Concatenating the chunks reproduces the input in order.
pub fn chunk_chapters(chapters: &[Chapter], limits: ChunkLimits) -> Vec<BookChunk<'_>> {
    let max_chapters = limits.max_chapters.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars = 0;

    for (i, ch) in chapters.iter().enumerate() {
        let len = ch.char_len();
        let count = i - start;
        let fits = count == 0 || (chars + len <= limits.max_chars && count < max_chapters);
        if !fits {
            chunks.push(BookChunk::new(&chapters[start..i], chars));
            start = i;
            chars = 0;
        }
        chars += len;
    }
    if start < chapters.len() {
        chunks.push(BookChunk::new(&chapters[start..], chars));
    }
    chunks
}

/// Positions of the first, middle and last chunk, deduplicated
pub fn representative_positions(chunk_count: usize) -> Vec<usize> {
    if chunk_count == 0 {
        return Vec::new();
    }
    let mut positions = vec![0, chunk_count / 2, chunk_count - 1];
    positions.sort_unstable();
    positions.dedup();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapters(sizes: &[usize]) -> Vec<Chapter> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, n)| Chapter::new(i, format!("Ch {}", i), "x".repeat(*n)))
            .collect()
    }

    fn assert_covers(chunks: &[BookChunk<'_>], input: &[Chapter]) {
        let flattened: Vec<usize> = chunks
            .iter()
            .flat_map(|c| c.chapters.iter().map(|ch| ch.index))
            .collect();
        let expected: Vec<usize> = input.iter().map(|c| c.index).collect();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn twelve_chapters_fit_in_one_chunk() {
        let input = chapters(&[3000; 12]);
        let chunks = chunk_chapters(&input, ChunkLimits::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chapters.len(), 12);
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].end_index, 11);
        assert_eq!(chunks[0].total_chars, 36_000);
    }

    #[test]
    fn chapter_cap_splits() {
        let input = chapters(&[10; 45]);
        let chunks = chunk_chapters(&input, ChunkLimits::default());
        let sizes: Vec<usize> = chunks.iter().map(|c| c.chapters.len()).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_covers(&chunks, &input);
    }

    #[test]
    fn char_cap_splits() {
        let input = chapters(&[30, 30, 30, 30]);
        let limits = ChunkLimits {
            max_chars: 60,
            max_chapters: 20,
        };
        let chunks = chunk_chapters(&input, limits);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.total_chars <= 60));
        assert_covers(&chunks, &input);
    }

    #[test]
    fn oversized_chapter_stands_alone() {
        let input = chapters(&[10, 500, 10]);
        let limits = ChunkLimits {
            max_chars: 100,
            max_chapters: 20,
        };
        let chunks = chunk_chapters(&input, limits);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].chapters.len(), 1);
        assert_eq!(chunks[1].total_chars, 500);
        assert_covers(&chunks, &input);
    }

    #[test]
    fn caps_hold_for_varied_sizes() {
        let sizes: Vec<usize> = (0..97).map(|i| (i * 37 % 113) + 1).collect();
        let input = chapters(&sizes);
        let limits = ChunkLimits {
            max_chars: 250,
            max_chapters: 4,
        };
        let chunks = chunk_chapters(&input, limits);
        assert_covers(&chunks, &input);
        for c in &chunks {
            assert!(c.chapters.len() <= 4);
            assert!(c.total_chars <= 250 || c.chapters.len() == 1);
        }
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(chunk_chapters(&[], ChunkLimits::default()).is_empty());
    }

    #[test]
    fn representative_positions_dedupe() {
        assert_eq!(representative_positions(0), Vec::<usize>::new());
        assert_eq!(representative_positions(1), vec![0]);
        assert_eq!(representative_positions(2), vec![0, 1]);
        assert_eq!(representative_positions(7), vec![0, 3, 6]);
    }

    #[test]
    fn render_includes_titles() {
        let input = chapters(&[2, 2]);
        let text = render_chapters(input.iter());
        assert!(text.starts_with("## [0] Ch 0\n\nxx"));
        assert!(text.contains("## [1] Ch 1"));
    }
}
