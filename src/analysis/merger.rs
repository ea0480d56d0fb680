//! Merging analysis results
//!
//! Two contracts:
//! - **Entity merge** combines two results list by list, keyed on each
//!   entity's natural identity (character name, emotion chapter, summary
//!   index, foreshadowing description, detail index). Used between chunks of
//!   one stage and between whole results.
//! - **Mode-aware merge** combines results produced at different depths for
//!   different chapter ranges, letting the deeper side own the fields only it
//!   can produce.

use super::stage::StageOutput;
use super::types::{
    AnalysisMode, AnalysisRange, AnalysisResult, BookInfo, ChapterDetail, ChapterSummary,
    CharacterAnalysis, EmotionPoint, Foreshadowing, TechniqueAnalysis,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Examples kept per technique when merging chunk results. Tunable.
pub const MAX_TECHNIQUE_EXAMPLES: usize = 5;

/// Label placed between two narrative texts that were both kept
pub const TEXT_MERGE_SEPARATOR: &str = "\n\n---\n\n[Supplementary analysis]\n\n";

/// How conflicts are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// When both sides carry an entity, the incoming side's scalar fields win
    pub prefer_latest: bool,
    /// Cap on examples per technique, `None` for no cap
    pub example_cap: Option<usize>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            prefer_latest: true,
            example_cap: None,
        }
    }
}

impl MergeOptions {
    /// Options for folding chunk results inside one stage: the newer chunk
    /// wins and technique examples are capped.
    pub fn for_chunks() -> Self {
        Self {
            prefer_latest: true,
            example_cap: Some(MAX_TECHNIQUE_EXAMPLES),
        }
    }
}

/// A result annotated with the depth and chapter ranges that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModedResult {
    pub result: AnalysisResult,
    pub mode: AnalysisMode,
    pub ranges: Vec<AnalysisRange>,
}

impl ModedResult {
    pub fn new(result: AnalysisResult, range: AnalysisRange) -> Self {
        Self {
            result,
            mode: range.mode,
            ranges: vec![range],
        }
    }

    /// First chapter covered by any range
    pub fn start_chapter(&self) -> usize {
        self.ranges
            .iter()
            .map(|r| r.start_chapter)
            .min()
            .unwrap_or(0)
    }

    fn latest_deep_analysis(&self) -> Option<DateTime<Utc>> {
        self.ranges
            .iter()
            .filter(|r| r.mode == AnalysisMode::Deep)
            .map(|r| r.analyzed_at)
            .max()
    }
}

/// Merges analysis results
#[derive(Debug, Clone, Default)]
pub struct MergeService {
    options: MergeOptions,
}

/// Pick `preferred` unless it is blank
fn pick_text(preferred: &str, fallback: &str) -> String {
    if preferred.trim().is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

/// Union preserving first-seen order, deduplicated by value
fn union(existing: &[String], newer: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    existing
        .iter()
        .chain(newer.iter())
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

fn dedup(items: &[String]) -> Vec<String> {
    union(items, &[])
}

/// Fold `base` then `incoming` into one list keyed by `key`. The first
/// occurrence fixes the position and is stored through `normalize`; later
/// occurrences are combined into it with `combine(existing, newer)`.
///
/// `normalize` must leave an entity unchanged when combined with itself, so
/// merging a merged list with itself is the identity.
fn merge_keyed<T, K, F, N, C>(
    base: &[T],
    incoming: &[T],
    key: F,
    normalize: N,
    combine: C,
) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    N: Fn(&T) -> T,
    C: Fn(&T, &T) -> T,
{
    let mut out: Vec<T> = Vec::with_capacity(base.len() + incoming.len());
    let mut positions: HashMap<K, usize> = HashMap::new();
    for item in base.iter().chain(incoming.iter()) {
        match positions.get(&key(item)) {
            Some(&i) => out[i] = combine(&out[i], item),
            None => {
                positions.insert(key(item), out.len());
                out.push(normalize(item));
            }
        }
    }
    out
}

fn merge_optional<T: Clone>(
    base: &Option<Vec<T>>,
    incoming: &Option<Vec<T>>,
    merge: impl Fn(&[T], &[T]) -> Vec<T>,
) -> Option<Vec<T>> {
    match (base, incoming) {
        (None, None) => None,
        (Some(b), None) => Some(b.clone()),
        (None, Some(i)) => Some(i.clone()),
        (Some(b), Some(i)) => Some(merge(b.as_slice(), i.as_slice())),
    }
}

impl MergeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: MergeOptions) -> Self {
        Self { options }
    }

    /// Merger for folding chunk outputs within a stage
    pub fn for_chunks() -> Self {
        Self::with_options(MergeOptions::for_chunks())
    }

    pub fn options(&self) -> MergeOptions {
        self.options
    }

    fn prefer_latest(&self) -> bool {
        self.options.prefer_latest
    }

    /// Order a conflicting pair as (winner, loser)
    fn ranked<'a, T>(&self, existing: &'a T, newer: &'a T) -> (&'a T, &'a T) {
        if self.prefer_latest() {
            (newer, existing)
        } else {
            (existing, newer)
        }
    }

    // ---------------------------------------------------------------------
    // Entity merge
    // ---------------------------------------------------------------------

    /// Merge two results; `incoming` is the later one
    pub fn merge(&self, base: &AnalysisResult, incoming: &AnalysisResult) -> AnalysisResult {
        AnalysisResult {
            book_info: self.merge_book_info(&base.book_info, &incoming.book_info),
            synopsis: self.merge_text(&base.synopsis, &incoming.synopsis),
            characters: self.merge_characters(&base.characters, &incoming.characters),
            writing_techniques: self
                .merge_techniques(&base.writing_techniques, &incoming.writing_techniques),
            takeaways: union(&base.takeaways, &incoming.takeaways),
            emotion_curve: merge_optional(&base.emotion_curve, &incoming.emotion_curve, |b, i| {
                self.merge_emotion_curve(b, i)
            }),
            chapter_structure: merge_optional(
                &base.chapter_structure,
                &incoming.chapter_structure,
                |b, i| self.merge_chapter_structure(b, i),
            ),
            foreshadowing: merge_optional(&base.foreshadowing, &incoming.foreshadowing, |b, i| {
                self.merge_foreshadowing(b, i)
            }),
            chapter_details: merge_optional(
                &base.chapter_details,
                &incoming.chapter_details,
                |b, i| self.merge_chapter_details(b, i),
            ),
            writing_review: match (&base.writing_review, &incoming.writing_review) {
                (None, None) => None,
                (Some(b), None) => Some(b.clone()),
                (None, Some(i)) => Some(i.clone()),
                (Some(b), Some(i)) => Some(self.merge_text(b, i)),
            },
        }
    }

    fn merge_book_info(&self, existing: &BookInfo, newer: &BookInfo) -> BookInfo {
        let (win, lose) = self.ranked(existing, newer);
        BookInfo {
            title: pick_text(&win.title, &lose.title),
            author: pick_text(&win.author, &lose.author),
            novel_type: pick_text(&win.novel_type, &lose.novel_type),
            chapter_count: win.chapter_count.max(lose.chapter_count),
            word_count: win.word_count.max(lose.word_count),
        }
    }

    /// Combine two narrative texts without losing either.
    ///
    /// Blank or identical texts collapse; a text already contained in the
    /// other is not repeated. Otherwise the preferred text comes first and the
    /// other follows a labelled separator.
    pub fn merge_text(&self, existing: &str, newer: &str) -> String {
        let (e, n) = (existing.trim(), newer.trim());
        if n.is_empty() || e == n || e.contains(n) {
            return existing.to_string();
        }
        if e.is_empty() || n.contains(e) {
            return newer.to_string();
        }
        let (first, second) = if self.prefer_latest() { (n, e) } else { (e, n) };
        format!("{}{}{}", first, TEXT_MERGE_SEPARATOR, second)
    }

    pub fn merge_characters(
        &self,
        base: &[CharacterAnalysis],
        incoming: &[CharacterAnalysis],
    ) -> Vec<CharacterAnalysis> {
        merge_keyed(
            base,
            incoming,
            |c| c.name.trim().to_string(),
            |c| CharacterAnalysis {
                relationships: dedup(&c.relationships),
                ..c.clone()
            },
            |existing, newer| {
                let (win, lose) = self.ranked(existing, newer);
                CharacterAnalysis {
                    name: existing.name.clone(),
                    role: win.role,
                    description: pick_text(&win.description, &lose.description),
                    motivation: pick_text(&win.motivation, &lose.motivation),
                    growth_arc: win.growth_arc.clone().or_else(|| lose.growth_arc.clone()),
                    relationships: union(&existing.relationships, &newer.relationships),
                }
            },
        )
    }

    pub fn merge_techniques(
        &self,
        base: &[TechniqueAnalysis],
        incoming: &[TechniqueAnalysis],
    ) -> Vec<TechniqueAnalysis> {
        let mut merged = merge_keyed(
            base,
            incoming,
            |t| t.name.trim().to_string(),
            |t| TechniqueAnalysis {
                examples: dedup(&t.examples),
                ..t.clone()
            },
            |existing, newer| {
                let (win, lose) = self.ranked(existing, newer);
                TechniqueAnalysis {
                    name: existing.name.clone(),
                    description: pick_text(&win.description, &lose.description),
                    examples: union(&existing.examples, &newer.examples),
                    applicability: pick_text(&win.applicability, &lose.applicability),
                }
            },
        );
        if let Some(cap) = self.options.example_cap {
            for t in &mut merged {
                t.examples.truncate(cap);
            }
        }
        merged
    }

    /// Last write wins per chapter; sorted by chapter
    pub fn merge_emotion_curve(
        &self,
        base: &[EmotionPoint],
        incoming: &[EmotionPoint],
    ) -> Vec<EmotionPoint> {
        let mut merged = merge_keyed(
            base,
            incoming,
            |p| p.chapter,
            EmotionPoint::clone,
            |existing, newer| self.ranked(existing, newer).0.clone(),
        );
        merged.sort_by_key(|p| p.chapter);
        merged
    }

    /// Last write wins per index (key events unioned); sorted by index
    pub fn merge_chapter_structure(
        &self,
        base: &[ChapterSummary],
        incoming: &[ChapterSummary],
    ) -> Vec<ChapterSummary> {
        let mut merged = merge_keyed(
            base,
            incoming,
            |s| s.index,
            |s| ChapterSummary {
                key_events: dedup(&s.key_events),
                ..s.clone()
            },
            |existing, newer| {
                let (win, lose) = self.ranked(existing, newer);
                ChapterSummary {
                    index: existing.index,
                    title: pick_text(&win.title, &lose.title),
                    summary: pick_text(&win.summary, &lose.summary),
                    key_events: union(&existing.key_events, &newer.key_events),
                }
            },
        );
        merged.sort_by_key(|s| s.index);
        merged
    }

    /// Keyed by description. The status lattice `resolved > planted >
    /// abandoned` decides the status regardless of `prefer_latest`.
    pub fn merge_foreshadowing(
        &self,
        base: &[Foreshadowing],
        incoming: &[Foreshadowing],
    ) -> Vec<Foreshadowing> {
        merge_keyed(
            base,
            incoming,
            |f| f.description.trim().to_string(),
            Foreshadowing::clone,
            |existing, newer| {
                let (win, lose) = self.ranked(existing, newer);
                let status_side = match existing.status.priority().cmp(&newer.status.priority()) {
                    std::cmp::Ordering::Greater => existing,
                    std::cmp::Ordering::Less => newer,
                    std::cmp::Ordering::Equal => win,
                };
                Foreshadowing {
                    setup_chapter: win.setup_chapter,
                    payoff_chapter: status_side
                        .payoff_chapter
                        .or(win.payoff_chapter)
                        .or(lose.payoff_chapter),
                    description: existing.description.clone(),
                    status: status_side.status,
                }
            },
        )
    }

    /// Keyed by chapter index; sorted by index
    pub fn merge_chapter_details(
        &self,
        base: &[ChapterDetail],
        incoming: &[ChapterDetail],
    ) -> Vec<ChapterDetail> {
        let mut merged = merge_keyed(
            base,
            incoming,
            |d| d.index,
            |d| ChapterDetail {
                techniques: dedup(&d.techniques),
                highlights: dedup(&d.highlights),
                ..d.clone()
            },
            |existing, newer| {
                let (win, lose) = self.ranked(existing, newer);
                ChapterDetail {
                    index: existing.index,
                    title: pick_text(&win.title, &lose.title),
                    analysis: pick_text(&win.analysis, &lose.analysis),
                    techniques: union(&existing.techniques, &newer.techniques),
                    highlights: union(&existing.highlights, &newer.highlights),
                }
            },
        );
        merged.sort_by_key(|d| d.index);
        merged
    }

    /// Fold one unit's output into the stage accumulator.
    ///
    /// Both sides must come from the same stage; a mismatched pair keeps the
    /// newer output.
    pub fn merge_output(&self, acc: StageOutput, next: StageOutput) -> StageOutput {
        use StageOutput as O;
        match (acc, next) {
            (O::Synopsis(a), O::Synopsis(b)) => O::Synopsis(self.merge_text(&a, &b)),
            (O::WritingReview(a), O::WritingReview(b)) => O::WritingReview(self.merge_text(&a, &b)),
            (O::Characters(a), O::Characters(b)) => O::Characters(self.merge_characters(&a, &b)),
            (O::Techniques(a), O::Techniques(b)) => O::Techniques(self.merge_techniques(&a, &b)),
            (O::Takeaways(a), O::Takeaways(b)) => O::Takeaways(union(&a, &b)),
            (O::EmotionCurve(a), O::EmotionCurve(b)) => {
                O::EmotionCurve(self.merge_emotion_curve(&a, &b))
            }
            (O::ChapterStructure(a), O::ChapterStructure(b)) => {
                O::ChapterStructure(self.merge_chapter_structure(&a, &b))
            }
            (O::Foreshadowing(a), O::Foreshadowing(b)) => {
                O::Foreshadowing(self.merge_foreshadowing(&a, &b))
            }
            (O::ChapterDetails(a), O::ChapterDetails(b)) => {
                O::ChapterDetails(self.merge_chapter_details(&a, &b))
            }
            (_, next) => next,
        }
    }

    // ---------------------------------------------------------------------
    // Mode-aware merge
    // ---------------------------------------------------------------------

    /// Merge results analyzed at possibly different depths.
    ///
    /// After the entity merge, fields only a deeper mode produces are taken
    /// wholesale from the deeper side, and chapter details are limited to
    /// chapters inside a range analyzed in `deep` mode. The merged value
    /// carries `incoming`'s mode and both sides' ranges.
    pub fn merge_with_modes(&self, base: &ModedResult, incoming: &ModedResult) -> ModedResult {
        let mut merged = self.merge(&base.result, &incoming.result);

        let (bm, im) = (base.mode, incoming.mode);
        let standard_source = if bm == AnalysisMode::Quick && im >= AnalysisMode::Standard {
            Some(&incoming.result)
        } else if im == AnalysisMode::Quick && bm >= AnalysisMode::Standard {
            Some(&base.result)
        } else {
            None
        };
        if let Some(src) = standard_source {
            merged.emotion_curve = src.emotion_curve.clone();
            merged.chapter_structure = src.chapter_structure.clone();
            merged.foreshadowing = src.foreshadowing.clone();
        }

        if bm == AnalysisMode::Deep && im != AnalysisMode::Deep {
            merged.writing_review = base.result.writing_review.clone();
        } else if im == AnalysisMode::Deep && bm != AnalysisMode::Deep {
            merged.writing_review = incoming.result.writing_review.clone();
        }

        let mut ranges = base.ranges.clone();
        for r in &incoming.ranges {
            if !ranges.iter().any(|existing| existing.id == r.id) {
                ranges.push(r.clone());
            }
        }

        merged.chapter_details = self.merge_deep_details(base, incoming, &ranges);

        ModedResult {
            result: merged,
            mode: im,
            ranges,
        }
    }

    fn merge_deep_details(
        &self,
        base: &ModedResult,
        incoming: &ModedResult,
        ranges: &[AnalysisRange],
    ) -> Option<Vec<ChapterDetail>> {
        if base.result.chapter_details.is_none() && incoming.result.chapter_details.is_none() {
            return None;
        }
        let deep: Vec<&AnalysisRange> = ranges
            .iter()
            .filter(|r| r.mode == AnalysisMode::Deep)
            .collect();
        let in_deep = |d: &&ChapterDetail| deep.iter().any(|r| r.contains(d.index));
        let filter = |side: &ModedResult| -> Vec<ChapterDetail> {
            side.result
                .chapter_details
                .iter()
                .flatten()
                .filter(in_deep)
                .cloned()
                .collect()
        };

        let incoming_newer = match (base.latest_deep_analysis(), incoming.latest_deep_analysis()) {
            (Some(b), Some(i)) => i >= b,
            (None, _) => true,
            (Some(_), None) => false,
        };
        let merger = MergeService::with_options(MergeOptions {
            prefer_latest: incoming_newer,
            ..self.options
        });
        Some(merger.merge_chapter_details(&filter(base), &filter(incoming)))
    }

    /// Merge any number of mode-annotated results: sort by starting chapter
    /// and fold left to right.
    pub fn merge_all(&self, mut results: Vec<ModedResult>) -> Option<ModedResult> {
        results.sort_by_key(|r| r.start_chapter());
        let mut iter = results.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, |acc, next| self.merge_with_modes(&acc, &next)))
    }
}
