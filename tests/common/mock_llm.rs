//! Scripted completion client
//!
//! Every stage id maps to a fixed, well-formed answer so runs are
//! deterministic and results can be compared across runs.

use novel_analyzer::analysis::Stage;
use novel_analyzer::MockClient;

/// The scripted answer for each stage
pub fn scripted_responses() -> Vec<(Stage, &'static str)> {
    vec![
        (
            Stage::Synopsis,
            "A lighthouse keeper guards a harbor town through one long winter.",
        ),
        (
            Stage::Characters,
            r#"{"characters": [
                {"name": "Mara", "role": "protagonist", "description": "The keeper", "motivation": "Keep the light burning", "relationships": ["Tobin"]},
                {"name": "Tobin", "role": "supporting", "description": "Harbor pilot", "motivation": "Bring the boats home"}
            ]}"#,
        ),
        (
            Stage::Techniques,
            r#"```json
{"techniques": [{"name": "Recurring imagery", "description": "Fog marks every turn", "examples": ["the fog roll in"], "applicability": "Anchor mood shifts to one image"}]}
```"#,
        ),
        (
            Stage::Takeaways,
            r#"{"takeaways": ["Let setting carry the mood", "Repeat an image with variation"]}"#,
        ),
        (
            Stage::EmotionCurve,
            r#"{"emotionCurve": [{"chapter": 0, "intensity": 3, "description": "quiet"}, {"chapter": 11, "intensity": 9, "description": "storm"}]}"#,
        ),
        (
            Stage::ChapterStructure,
            r#"{"chapters": [{"index": 0, "title": "Chapter 1", "summary": "Arrival", "keyEvents": ["Mara takes the post"]}]}"#,
        ),
        (
            Stage::Foreshadowing,
            r#"{"foreshadowing": [{"setupChapter": 1, "payoffChapter": 11, "description": "The cracked lens", "status": "resolved"}]}"#,
        ),
        (
            Stage::ChapterDetail,
            r#"{"analysis": "Builds tension through weather", "techniques": ["pathetic fallacy"], "highlights": ["fog roll in"]}"#,
        ),
        (
            Stage::WritingReview,
            "Atmospheric and controlled, if slow in the middle.",
        ),
    ]
}

/// A mock client answering every stage with its scripted response
pub fn scripted_client() -> MockClient {
    scripted_responses()
        .into_iter()
        .fold(MockClient::available(), |client, (stage, answer)| {
            client.with_response(stage.id(), answer)
        })
}
