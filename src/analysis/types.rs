//! Core types for the analysis pipeline

use super::stage::Stage;
use crate::llm::CompletionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Analysis depth tier. Each mode runs a superset of the stages of the one
/// below it, so the derived ordering is meaningful: `Quick < Standard < Deep`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "deep" => Ok(Self::Deep),
            other => Err(AnalysisError::Config(format!("unknown analysis mode '{}'", other))),
        }
    }
}

/// What to analyze and which prompts to use
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    pub mode: AnalysisMode,
    /// Genre label fed into the prompts ("fantasy", "mystery", ...)
    #[serde(default)]
    pub novel_type: String,
    /// Per-stage prompt overrides, replacing the built-in instructions
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_prompts: HashMap<Stage, String>,
    /// Extra guidance appended to every prompt, keyed by novel type
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_type_prompts: HashMap<String, String>,
}

impl AnalysisConfig {
    pub fn new(mode: AnalysisMode, novel_type: impl Into<String>) -> Self {
        Self {
            mode,
            novel_type: novel_type.into(),
            ..Default::default()
        }
    }

    pub fn with_custom_prompt(mut self, stage: Stage, prompt: impl Into<String>) -> Self {
        self.custom_prompts.insert(stage, prompt.into());
        self
    }

    pub fn with_type_prompt(mut self, novel_type: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.custom_type_prompts.insert(novel_type.into(), prompt.into());
        self
    }
}

/// Inclusive range of chapter indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRange {
    pub start: usize,
    pub end: usize,
}

impl ChapterRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Range covering every chapter of an `n`-chapter book (`n > 0`)
    pub fn full(n: usize) -> Self {
        Self {
            start: 0,
            end: n.saturating_sub(1),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Book-level facts recorded alongside the analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInfo {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub novel_type: String,
    #[serde(default)]
    pub chapter_count: usize,
    #[serde(default)]
    pub word_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterRole {
    Protagonist,
    Antagonist,
    #[default]
    #[serde(other)]
    Supporting,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterAnalysis {
    pub name: String,
    pub role: CharacterRole,
    pub description: String,
    pub motivation: String,
    #[serde(skip_serializing_if = "Option::is_none", alias = "growth_arc")]
    pub growth_arc: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TechniqueAnalysis {
    pub name: String,
    pub description: String,
    pub examples: Vec<String>,
    pub applicability: String,
}

/// Intensity given to an emotion point whose answer omits one
pub const DEFAULT_INTENSITY: u8 = 5;

fn default_intensity() -> u8 {
    DEFAULT_INTENSITY
}

/// One point of the emotion curve. `chapter` is the merge key and is
/// required when parsing; items without it are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionPoint {
    #[serde(deserialize_with = "lenient_usize")]
    pub chapter: usize,
    /// 1–10, clamped on parse
    #[serde(default = "default_intensity", deserialize_with = "lenient_intensity")]
    pub intensity: u8,
    #[serde(default)]
    pub description: String,
}

impl Default for EmotionPoint {
    fn default() -> Self {
        Self {
            chapter: 0,
            intensity: DEFAULT_INTENSITY,
            description: String::new(),
        }
    }
}

/// `index` is the merge key and is required when parsing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    #[serde(deserialize_with = "lenient_usize")]
    pub index: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "key_events")]
    pub key_events: Vec<String>,
}

/// Lifecycle of a planted narrative hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeshadowStatus {
    Resolved,
    Abandoned,
    #[default]
    #[serde(other)]
    Planted,
}

impl ForeshadowStatus {
    /// Merge priority: resolved > planted > abandoned
    pub fn priority(&self) -> u8 {
        match self {
            Self::Resolved => 3,
            Self::Planted => 2,
            Self::Abandoned => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Foreshadowing {
    #[serde(deserialize_with = "lenient_usize", alias = "setup_chapter")]
    pub setup_chapter: usize,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_usize",
        alias = "payoff_chapter"
    )]
    pub payoff_chapter: Option<usize>,
    pub description: String,
    pub status: ForeshadowStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterDetail {
    #[serde(deserialize_with = "lenient_usize")]
    pub index: usize,
    pub title: String,
    pub analysis: String,
    pub techniques: Vec<String>,
    pub highlights: Vec<String>,
}

/// The accumulated analysis of one book (or one chapter range of it).
///
/// The optional fields exist only for deeper modes: emotion curve, chapter
/// structure and foreshadowing from `standard`, chapter details and the
/// writing review from `deep`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub book_info: BookInfo,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub characters: Vec<CharacterAnalysis>,
    #[serde(default)]
    pub writing_techniques: Vec<TechniqueAnalysis>,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_curve: Option<Vec<EmotionPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_structure: Option<Vec<ChapterSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreshadowing: Option<Vec<Foreshadowing>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_details: Option<Vec<ChapterDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writing_review: Option<String>,
}

impl AnalysisResult {
    pub fn new(book_info: BookInfo) -> Self {
        Self {
            book_info,
            ..Default::default()
        }
    }

    /// Return a copy with every field present in `partial` replaced
    pub fn with_partial(mut self, partial: &PartialResult) -> Self {
        if let Some(v) = &partial.synopsis {
            self.synopsis = v.clone();
        }
        if let Some(v) = &partial.characters {
            self.characters = v.clone();
        }
        if let Some(v) = &partial.writing_techniques {
            self.writing_techniques = v.clone();
        }
        if let Some(v) = &partial.takeaways {
            self.takeaways = v.clone();
        }
        if let Some(v) = &partial.emotion_curve {
            self.emotion_curve = Some(v.clone());
        }
        if let Some(v) = &partial.chapter_structure {
            self.chapter_structure = Some(v.clone());
        }
        if let Some(v) = &partial.foreshadowing {
            self.foreshadowing = Some(v.clone());
        }
        if let Some(v) = &partial.chapter_details {
            self.chapter_details = Some(v.clone());
        }
        if let Some(v) = &partial.writing_review {
            self.writing_review = Some(v.clone());
        }
        self
    }
}

/// A subset of `AnalysisResult` fields, as stored in checkpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters: Option<Vec<CharacterAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writing_techniques: Option<Vec<TechniqueAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeaways: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_curve: Option<Vec<EmotionPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_structure: Option<Vec<ChapterSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreshadowing: Option<Vec<Foreshadowing>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_details: Option<Vec<ChapterDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writing_review: Option<String>,
}

impl PartialResult {
    /// Shallow merge: every field present in `other` replaces ours
    pub fn merge_shallow(&mut self, other: PartialResult) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            synopsis,
            characters,
            writing_techniques,
            takeaways,
            emotion_curve,
            chapter_structure,
            foreshadowing,
            chapter_details,
            writing_review
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which mode analyzed which chapters, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRange {
    pub id: String,
    pub start_chapter: usize,
    pub end_chapter: usize,
    pub mode: AnalysisMode,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisRange {
    pub fn new(range: ChapterRange, mode: AnalysisMode) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            start_chapter: range.start,
            end_chapter: range.end,
            mode,
            analyzed_at: Utc::now(),
        }
    }

    pub fn contains(&self, chapter: usize) -> bool {
        chapter >= self.start_chapter && chapter <= self.end_chapter
    }
}

/// Error types for analysis
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The run was stopped through its controller
    #[error("analysis cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// Models return numbers as numbers, numeric strings, or floats.

fn value_to_usize(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as usize)),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.round() as usize),
        _ => None,
    }
}

fn lenient_usize<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    value_to_usize(&value).ok_or_else(|| serde::de::Error::custom("expected a chapter number"))
}

fn lenient_opt_usize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(value_to_usize(&value))
}

fn lenient_intensity<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(value_to_usize(&value).map_or(DEFAULT_INTENSITY, |raw| raw.clamp(1, 10) as u8))
}
