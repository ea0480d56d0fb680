//! Analysis stages and their static dispatch table
//!
//! Every stage is a `Stage` variant. `STAGE_TABLE` maps each one to the way
//! its input units are selected and the shape of its output, so the pipeline
//! dispatches on data rather than on stage names.

use super::types::{
    AnalysisError, AnalysisMode, ChapterDetail, ChapterSummary, CharacterAnalysis, EmotionPoint,
    Foreshadowing, PartialResult, TechniqueAnalysis,
};
use serde::{Deserialize, Serialize};

/// One named analytical task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Synopsis,
    Characters,
    Techniques,
    Takeaways,
    EmotionCurve,
    ChapterStructure,
    Foreshadowing,
    ChapterDetail,
    WritingReview,
}

/// How a stage picks the content it sends to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStrategy {
    /// Every chunk, merged by entity key as each completes
    AllChunks,
    /// First, middle and last chunk only
    RepresentativeChunks,
    /// Head + stride + tail sample concatenated into one unit
    GlobalSample,
    /// Selected key chapters, one request each
    KeyChapters,
}

/// Shape of a stage's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Free prose, used as-is
    Prose,
    /// A JSON object holding a list under `list_key`
    List { list_key: &'static str },
    /// A single JSON object describing one chapter
    Object,
}

/// Static description of a stage
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub stage: Stage,
    pub id: &'static str,
    pub label: &'static str,
    pub min_mode: AnalysisMode,
    pub strategy: UnitStrategy,
    pub output: OutputKind,
}

/// Pipeline order. Modes are prefixes of this table.
pub static STAGE_TABLE: [StageDescriptor; 9] = [
    StageDescriptor {
        stage: Stage::Synopsis,
        id: "synopsis",
        label: "Synopsis",
        min_mode: AnalysisMode::Quick,
        strategy: UnitStrategy::GlobalSample,
        output: OutputKind::Prose,
    },
    StageDescriptor {
        stage: Stage::Characters,
        id: "characters",
        label: "Characters",
        min_mode: AnalysisMode::Quick,
        strategy: UnitStrategy::AllChunks,
        output: OutputKind::List { list_key: "characters" },
    },
    StageDescriptor {
        stage: Stage::Techniques,
        id: "techniques",
        label: "Writing techniques",
        min_mode: AnalysisMode::Quick,
        strategy: UnitStrategy::RepresentativeChunks,
        output: OutputKind::List { list_key: "techniques" },
    },
    StageDescriptor {
        stage: Stage::Takeaways,
        id: "takeaways",
        label: "Takeaways",
        min_mode: AnalysisMode::Quick,
        strategy: UnitStrategy::GlobalSample,
        output: OutputKind::List { list_key: "takeaways" },
    },
    StageDescriptor {
        stage: Stage::EmotionCurve,
        id: "emotionCurve",
        label: "Emotion curve",
        min_mode: AnalysisMode::Standard,
        strategy: UnitStrategy::AllChunks,
        output: OutputKind::List { list_key: "emotionCurve" },
    },
    StageDescriptor {
        stage: Stage::ChapterStructure,
        id: "chapterStructure",
        label: "Chapter structure",
        min_mode: AnalysisMode::Standard,
        strategy: UnitStrategy::AllChunks,
        output: OutputKind::List { list_key: "chapters" },
    },
    StageDescriptor {
        stage: Stage::Foreshadowing,
        id: "foreshadowing",
        label: "Foreshadowing",
        min_mode: AnalysisMode::Standard,
        strategy: UnitStrategy::GlobalSample,
        output: OutputKind::List { list_key: "foreshadowing" },
    },
    StageDescriptor {
        stage: Stage::ChapterDetail,
        id: "chapterDetail",
        label: "Chapter details",
        min_mode: AnalysisMode::Deep,
        strategy: UnitStrategy::KeyChapters,
        output: OutputKind::Object,
    },
    StageDescriptor {
        stage: Stage::WritingReview,
        id: "writingReview",
        label: "Writing review",
        min_mode: AnalysisMode::Deep,
        strategy: UnitStrategy::GlobalSample,
        output: OutputKind::Prose,
    },
];

impl Stage {
    pub fn descriptor(&self) -> &'static StageDescriptor {
        // table order matches declaration order
        &STAGE_TABLE[*self as usize]
    }

    pub fn id(&self) -> &'static str {
        self.descriptor().id
    }

    pub fn label(&self) -> &'static str {
        self.descriptor().label
    }

    pub fn strategy(&self) -> UnitStrategy {
        self.descriptor().strategy
    }

    pub fn output_kind(&self) -> OutputKind {
        self.descriptor().output
    }

    /// Ordered stages run by `mode`
    pub fn for_mode(mode: AnalysisMode) -> Vec<Stage> {
        STAGE_TABLE
            .iter()
            .filter(|s| s.min_mode <= mode)
            .map(|s| s.stage)
            .collect()
    }

    pub fn all() -> impl Iterator<Item = Stage> {
        STAGE_TABLE.iter().map(|s| s.stage)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Stage {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::all()
            .find(|stage| stage.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AnalysisError::Config(format!("unknown stage '{}'", s)))
    }
}

/// A stage's contribution to the result, applied as a patch
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Synopsis(String),
    Characters(Vec<CharacterAnalysis>),
    Techniques(Vec<TechniqueAnalysis>),
    Takeaways(Vec<String>),
    EmotionCurve(Vec<EmotionPoint>),
    ChapterStructure(Vec<ChapterSummary>),
    Foreshadowing(Vec<Foreshadowing>),
    ChapterDetails(Vec<ChapterDetail>),
    WritingReview(String),
}

impl StageOutput {
    /// Empty output of the right variant for `stage`
    pub fn empty(stage: Stage) -> Self {
        match stage {
            Stage::Synopsis => Self::Synopsis(String::new()),
            Stage::Characters => Self::Characters(Vec::new()),
            Stage::Techniques => Self::Techniques(Vec::new()),
            Stage::Takeaways => Self::Takeaways(Vec::new()),
            Stage::EmotionCurve => Self::EmotionCurve(Vec::new()),
            Stage::ChapterStructure => Self::ChapterStructure(Vec::new()),
            Stage::Foreshadowing => Self::Foreshadowing(Vec::new()),
            Stage::ChapterDetail => Self::ChapterDetails(Vec::new()),
            Stage::WritingReview => Self::WritingReview(String::new()),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Synopsis(_) => Stage::Synopsis,
            Self::Characters(_) => Stage::Characters,
            Self::Techniques(_) => Stage::Techniques,
            Self::Takeaways(_) => Stage::Takeaways,
            Self::EmotionCurve(_) => Stage::EmotionCurve,
            Self::ChapterStructure(_) => Stage::ChapterStructure,
            Self::Foreshadowing(_) => Stage::Foreshadowing,
            Self::ChapterDetails(_) => Stage::ChapterDetail,
            Self::WritingReview(_) => Stage::WritingReview,
        }
    }

    /// Number of entities (or 1/0 for prose)
    pub fn item_count(&self) -> usize {
        match self {
            Self::Synopsis(s) | Self::WritingReview(s) => usize::from(!s.trim().is_empty()),
            Self::Characters(v) => v.len(),
            Self::Techniques(v) => v.len(),
            Self::Takeaways(v) => v.len(),
            Self::EmotionCurve(v) => v.len(),
            Self::ChapterStructure(v) => v.len(),
            Self::Foreshadowing(v) => v.len(),
            Self::ChapterDetails(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    pub fn into_partial(self) -> PartialResult {
        let mut p = PartialResult::default();
        match self {
            Self::Synopsis(v) => p.synopsis = Some(v),
            Self::Characters(v) => p.characters = Some(v),
            Self::Techniques(v) => p.writing_techniques = Some(v),
            Self::Takeaways(v) => p.takeaways = Some(v),
            Self::EmotionCurve(v) => p.emotion_curve = Some(v),
            Self::ChapterStructure(v) => p.chapter_structure = Some(v),
            Self::Foreshadowing(v) => p.foreshadowing = Some(v),
            Self::ChapterDetails(v) => p.chapter_details = Some(v),
            Self::WritingReview(v) => p.writing_review = Some(v),
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_matches_enum() {
        for (i, desc) in STAGE_TABLE.iter().enumerate() {
            assert_eq!(desc.stage as usize, i, "{} out of place", desc.id);
        }
    }

    #[test]
    fn modes_are_supersets() {
        let quick = Stage::for_mode(AnalysisMode::Quick);
        let standard = Stage::for_mode(AnalysisMode::Standard);
        let deep = Stage::for_mode(AnalysisMode::Deep);

        assert_eq!(
            quick,
            vec![Stage::Synopsis, Stage::Characters, Stage::Techniques, Stage::Takeaways]
        );
        assert_eq!(standard.len(), 7);
        assert_eq!(&standard[..4], &quick[..]);
        assert_eq!(&deep[..7], &standard[..]);
        assert_eq!(deep[7..], [Stage::ChapterDetail, Stage::WritingReview]);
    }

    #[test]
    fn ids_round_trip_through_from_str() {
        for stage in Stage::all() {
            assert_eq!(stage.id().parse::<Stage>().unwrap(), stage);
        }
        assert!("plot".parse::<Stage>().is_err());
    }

    #[test]
    fn serde_name_matches_id() {
        for stage in Stage::all() {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.id()));
        }
    }

    #[test]
    fn output_variant_matches_stage() {
        for stage in Stage::all() {
            let out = StageOutput::empty(stage);
            assert_eq!(out.stage(), stage);
            assert!(out.is_empty());
        }
    }

    #[test]
    fn into_partial_sets_one_field() {
        let p = StageOutput::Takeaways(vec!["a".into()]).into_partial();
        assert_eq!(p.takeaways, Some(vec!["a".to_string()]));
        assert!(p.synopsis.is_none());
    }
}
