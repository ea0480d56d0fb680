//! Entity merge and mode-aware merge of whole results

mod common;

use common::{sample_book, scripted_client};
use novel_analyzer::analysis::{
    AnalysisConfig, AnalysisController, AnalysisMode, AnalysisRange, AnalysisRequest,
    AnalysisResult, AnalysisService, BookInfo, ChapterDetail, ChapterRange, ChapterSummary,
    CharacterAnalysis, CharacterRole, EmotionPoint, ForeshadowStatus, Foreshadowing, MergeOptions,
    MergeService, ModedResult, Stage, TechniqueAnalysis,
};
use std::sync::Arc;

fn rich_result() -> AnalysisResult {
    AnalysisResult {
        book_info: BookInfo {
            title: "The Keeper".into(),
            author: "Test Author".into(),
            novel_type: "literary".into(),
            chapter_count: 12,
            word_count: 6000,
        },
        synopsis: "A keeper and a storm.".into(),
        characters: vec![
            CharacterAnalysis {
                name: "Mara".into(),
                role: CharacterRole::Protagonist,
                description: "Keeper".into(),
                motivation: "Duty".into(),
                growth_arc: Some("Learns to leave".into()),
                relationships: vec!["Tobin".into()],
            },
            CharacterAnalysis {
                name: "Tobin".into(),
                description: "Pilot".into(),
                ..Default::default()
            },
        ],
        writing_techniques: vec![TechniqueAnalysis {
            name: "Imagery".into(),
            description: "Fog".into(),
            examples: vec!["fog".into(), "lamp".into()],
            applicability: "Mood".into(),
        }],
        takeaways: vec!["Setting as mood".into()],
        emotion_curve: Some(vec![
            EmotionPoint {
                chapter: 0,
                intensity: 2,
                description: "calm".into(),
            },
            EmotionPoint {
                chapter: 11,
                intensity: 9,
                description: "storm".into(),
            },
        ]),
        chapter_structure: Some(vec![ChapterSummary {
            index: 0,
            title: "Chapter 1".into(),
            summary: "Arrival".into(),
            key_events: vec!["Takes the post".into()],
        }]),
        foreshadowing: Some(vec![Foreshadowing {
            setup_chapter: 1,
            payoff_chapter: Some(11),
            description: "Cracked lens".into(),
            status: ForeshadowStatus::Resolved,
        }]),
        chapter_details: Some(vec![ChapterDetail {
            index: 4,
            title: "Chapter 5".into(),
            analysis: "Tension".into(),
            techniques: vec!["weather".into()],
            highlights: vec!["the fog".into()],
        }]),
        writing_review: Some("Controlled.".into()),
    }
}

#[test]
fn merging_with_itself_is_identity() {
    let result = rich_result();
    for prefer_latest in [true, false] {
        let merger = MergeService::with_options(MergeOptions {
            prefer_latest,
            example_cap: None,
        });
        assert_eq!(merger.merge(&result, &result), result, "prefer_latest={}", prefer_latest);
    }
}

#[test]
fn keys_stay_unique_after_merge() {
    let a = rich_result();
    let mut b = rich_result();
    b.characters.push(CharacterAnalysis {
        name: "Ilse".into(),
        ..Default::default()
    });
    b.characters[0].relationships.push("Ilse".into());

    let merged = MergeService::new().merge(&a, &b);
    let names: Vec<&str> = merged.characters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Mara", "Tobin", "Ilse"]);
    assert_eq!(merged.characters[0].relationships, vec!["Tobin", "Ilse"]);
}

#[test]
fn planted_and_resolved_merge_to_resolved() {
    let hook = |status| Foreshadowing {
        setup_chapter: 1,
        payoff_chapter: None,
        description: "Cracked lens".into(),
        status,
    };
    let planted = AnalysisResult {
        foreshadowing: Some(vec![hook(ForeshadowStatus::Planted)]),
        ..Default::default()
    };
    let resolved = AnalysisResult {
        foreshadowing: Some(vec![hook(ForeshadowStatus::Resolved)]),
        ..Default::default()
    };
    for prefer_latest in [true, false] {
        let merger = MergeService::with_options(MergeOptions {
            prefer_latest,
            example_cap: None,
        });
        for (a, b) in [(&planted, &resolved), (&resolved, &planted)] {
            let merged = merger.merge(a, b);
            assert_eq!(
                merged.foreshadowing.unwrap()[0].status,
                ForeshadowStatus::Resolved
            );
        }
    }
}

fn moded(result: AnalysisResult, start: usize, end: usize, mode: AnalysisMode) -> ModedResult {
    ModedResult::new(result, AnalysisRange::new(ChapterRange::new(start, end), mode))
}

#[test]
fn quick_and_deep_take_deep_fields_from_deep() {
    let deep = rich_result();
    let mut quick = AnalysisResult {
        synopsis: "Quick synopsis.".into(),
        ..Default::default()
    };
    // stale deeper fields on the quick side are ignored
    quick.emotion_curve = Some(vec![EmotionPoint {
        chapter: 3,
        intensity: 1,
        description: "stale".into(),
    }]);
    quick.writing_review = Some("Stale review.".into());

    let merger = MergeService::new();
    for (a, b) in [
        (moded(quick.clone(), 0, 11, AnalysisMode::Quick), moded(deep.clone(), 0, 11, AnalysisMode::Deep)),
        (moded(deep.clone(), 0, 11, AnalysisMode::Deep), moded(quick.clone(), 0, 11, AnalysisMode::Quick)),
    ] {
        let merged = merger.merge_with_modes(&a, &b).result;
        assert_eq!(merged.emotion_curve, deep.emotion_curve);
        assert_eq!(merged.chapter_structure, deep.chapter_structure);
        assert_eq!(merged.foreshadowing, deep.foreshadowing);
        assert_eq!(merged.writing_review, deep.writing_review);
        assert_eq!(merged.chapter_details, deep.chapter_details);
        assert!(merged.synopsis.contains("Quick synopsis."));
        assert!(merged.synopsis.contains("A keeper and a storm."));
    }
}

#[test]
fn newer_deep_detail_wins() {
    let detail = |analysis: &str| ChapterDetail {
        index: 2,
        title: "Chapter 3".into(),
        analysis: analysis.into(),
        ..Default::default()
    };
    let older = moded(
        AnalysisResult {
            chapter_details: Some(vec![detail("old reading")]),
            ..Default::default()
        },
        0,
        5,
        AnalysisMode::Deep,
    );
    let mut newer = moded(
        AnalysisResult {
            chapter_details: Some(vec![detail("new reading")]),
            ..Default::default()
        },
        2,
        3,
        AnalysisMode::Deep,
    );
    newer.ranges[0].analyzed_at = older.ranges[0].analyzed_at + chrono::Duration::seconds(60);

    let merger = MergeService::new();
    for merged in [
        merger.merge_with_modes(&older, &newer),
        merger.merge_with_modes(&newer, &older),
    ] {
        let details = merged.result.chapter_details.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].analysis, "new reading");
    }
}

#[test]
fn merge_all_orders_by_start_chapter() {
    let part = |synopsis: &str, start, end| {
        moded(
            AnalysisResult {
                synopsis: synopsis.into(),
                ..Default::default()
            },
            start,
            end,
            AnalysisMode::Standard,
        )
    };
    let merger = MergeService::with_options(MergeOptions {
        prefer_latest: false,
        example_cap: None,
    });
    let merged = merger
        .merge_all(vec![part("Third.", 20, 29), part("First.", 0, 9), part("Second.", 10, 19)])
        .unwrap();

    let s = &merged.result.synopsis;
    let first = s.find("First.").unwrap();
    let second = s.find("Second.").unwrap();
    let third = s.find("Third.").unwrap();
    assert!(first < second && second < third);
    assert_eq!(merged.ranges.len(), 3);
    assert!(merger.merge_all(vec![]).is_none());
}

#[tokio::test]
async fn merging_real_runs_over_two_ranges() {
    let book = sample_book();
    let service = AnalysisService::new(Arc::new(scripted_client()), "m");
    let controller = AnalysisController::new();
    let request = |mode, range| {
        AnalysisRequest::new(AnalysisConfig::new(mode, "literary")).with_range(range)
    };
    let first = service
        .analyze(&book, request(AnalysisMode::Quick, ChapterRange::new(0, 5)), &controller)
        .await
        .unwrap();
    let second = service
        .analyze(&book, request(AnalysisMode::Deep, ChapterRange::new(6, 11)), &controller)
        .await
        .unwrap();

    let merged = MergeService::new()
        .merge_with_modes(&first.to_moded(), &second.to_moded());

    // identical scripted answers collapse instead of duplicating
    assert_eq!(merged.result.characters.len(), 2);
    assert_eq!(merged.result.synopsis, first.result.synopsis);
    assert!(merged.result.emotion_curve.is_some());
    let details = merged.result.chapter_details.unwrap();
    assert!(details.iter().all(|d| (6..=11).contains(&d.index)));
    assert_eq!(merged.mode, AnalysisMode::Deep);
}

#[tokio::test]
async fn pipeline_result_merged_with_itself_is_unchanged() {
    // repeated list values inside single answers
    let client = scripted_client()
        .with_response(
            Stage::Characters.id(),
            r#"{"characters": [{"name": "Ann", "relationships": ["Bo", "Bo"]}]}"#,
        )
        .with_response(
            Stage::Techniques.id(),
            r#"{"techniques": [{"name": "Irony", "examples": ["x", "x", "y"]}]}"#,
        )
        .with_response(
            Stage::ChapterStructure.id(),
            r#"{"chapters": [{"index": 1, "summary": "s", "keyEvents": ["e", "e"]}]}"#,
        )
        .with_response(
            Stage::ChapterDetail.id(),
            r#"{"analysis": "a", "techniques": ["t", "t"], "highlights": ["h", "h"]}"#,
        );
    let outcome = AnalysisService::new(Arc::new(client), "m")
        .analyze(
            &sample_book(),
            AnalysisRequest::new(AnalysisConfig::new(AnalysisMode::Deep, "literary")),
            &AnalysisController::new(),
        )
        .await
        .unwrap();

    let result = outcome.result;
    assert_eq!(result.characters[0].relationships, vec!["Bo".to_string()]);
    assert_eq!(result.writing_techniques[0].examples, vec!["x", "y"]);
    for prefer_latest in [true, false] {
        let merger = MergeService::with_options(MergeOptions {
            prefer_latest,
            example_cap: None,
        });
        assert_eq!(merger.merge(&result, &result), result, "prefer_latest={}", prefer_latest);
    }
}
