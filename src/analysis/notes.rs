//! Incremental markdown notes, one file per completed stage

use super::stage::{Stage, StageOutput};
use crate::storage::{sanitize_key_segment, StorageResult, TextStore};
use std::fmt::Write as _;
use std::sync::Arc;

/// Writes `notes/<title>/<NN>-<stage>.md` as stages complete
#[derive(Clone)]
pub struct NoteWriter {
    store: Arc<dyn TextStore>,
}

impl NoteWriter {
    pub fn new(store: Arc<dyn TextStore>) -> Self {
        Self { store }
    }

    pub fn key_for(book_title: &str, stage: Stage) -> String {
        format!(
            "notes/{}/{:02}-{}.md",
            sanitize_key_segment(book_title),
            stage as usize + 1,
            stage.id()
        )
    }

    /// Render and store the note for one stage, returning its key
    pub fn write(&self, book_title: &str, output: &StageOutput) -> StorageResult<String> {
        let key = Self::key_for(book_title, output.stage());
        self.store.write(&key, &render(book_title, output))?;
        Ok(key)
    }
}

fn bullets(out: &mut String, items: impl IntoIterator<Item = String>) {
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

/// Markdown for one stage output
pub fn render(book_title: &str, output: &StageOutput) -> String {
    let mut out = format!("# {}: {}\n\n", book_title, output.stage().label());
    match output {
        StageOutput::Synopsis(text) | StageOutput::WritingReview(text) => {
            out.push_str(text.trim());
            out.push('\n');
        }
        StageOutput::Characters(characters) => {
            for c in characters {
                let _ = writeln!(out, "## {} ({:?})\n\n{}\n", c.name, c.role, c.description);
                if !c.motivation.is_empty() {
                    let _ = writeln!(out, "Motivation: {}\n", c.motivation);
                }
                if let Some(arc) = &c.growth_arc {
                    let _ = writeln!(out, "Arc: {}\n", arc);
                }
                bullets(&mut out, c.relationships.iter().cloned());
            }
        }
        StageOutput::Techniques(techniques) => {
            for t in techniques {
                let _ = writeln!(out, "## {}\n\n{}\n", t.name, t.description);
                bullets(&mut out, t.examples.iter().map(|e| format!("> {}", e)));
                if !t.applicability.is_empty() {
                    let _ = writeln!(out, "\nUse it: {}\n", t.applicability);
                }
            }
        }
        StageOutput::Takeaways(items) => bullets(&mut out, items.iter().cloned()),
        StageOutput::EmotionCurve(points) => bullets(
            &mut out,
            points
                .iter()
                .map(|p| format!("Chapter {}: {}/10 {}", p.chapter, p.intensity, p.description)),
        ),
        StageOutput::ChapterStructure(chapters) => {
            for c in chapters {
                let _ = writeln!(out, "## [{}] {}\n\n{}\n", c.index, c.title, c.summary);
                bullets(&mut out, c.key_events.iter().cloned());
            }
        }
        StageOutput::Foreshadowing(hooks) => bullets(
            &mut out,
            hooks.iter().map(|f| {
                let payoff = f
                    .payoff_chapter
                    .map(|c| format!(" → {}", c))
                    .unwrap_or_default();
                format!(
                    "[{:?}] ch. {}{}: {}",
                    f.status, f.setup_chapter, payoff, f.description
                )
            }),
        ),
        StageOutput::ChapterDetails(details) => {
            for d in details {
                let _ = writeln!(out, "## [{}] {}\n\n{}\n", d.index, d.title, d.analysis);
                bullets(&mut out, d.highlights.iter().map(|h| format!("> {}", h)));
            }
        }
    }
    out
}
