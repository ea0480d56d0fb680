//! Prompt templates per stage
//!
//! Each request is a system message (role + genre guidance) followed by a
//! user message (stage instructions, then the book text). Stage instructions
//! can be replaced per run through `AnalysisConfig::custom_prompts`; genre
//! guidance is extended through `AnalysisConfig::custom_type_prompts`.

use super::stage::Stage;
use super::types::AnalysisConfig;
use crate::llm::ChatMessage;

const SYSTEM_PROMPT: &str = "You are a literary analyst and writing coach. You read fiction \
closely and explain how it works so that other writers can learn from it. Base every claim on \
the supplied text. When asked for JSON, answer with a single JSON value and nothing else.";

/// Built-in instructions for a stage
pub fn default_instructions(stage: Stage) -> &'static str {
    match stage {
        Stage::Synopsis => {
            "Write a synopsis of the novel from the excerpts below: premise, main conflict, \
             how the story develops and where it ends up. Three to five paragraphs of plain prose."
        }
        Stage::Characters => {
            "Identify the important characters in the text below. Answer with JSON: \
             {\"characters\": [{\"name\": string, \"role\": \"protagonist\"|\"antagonist\"|\"supporting\", \
             \"description\": string, \"motivation\": string, \"growthArc\": string, \
             \"relationships\": [string]}]}"
        }
        Stage::Techniques => {
            "Identify the writing techniques the author relies on in the text below. Answer with JSON: \
             {\"techniques\": [{\"name\": string, \"description\": string, \
             \"examples\": [short quotations or paraphrases], \"applicability\": string}]}"
        }
        Stage::Takeaways => {
            "List the most useful lessons a writer can take from this novel. Answer with JSON: \
             {\"takeaways\": [string]}"
        }
        Stage::EmotionCurve => {
            "Rate the emotional intensity of each chapter below from 1 (calm) to 10 (climax). \
             Use the chapter numbers shown in the [brackets]. Answer with JSON: \
             {\"emotionCurve\": [{\"chapter\": number, \"intensity\": number, \"description\": string}]}"
        }
        Stage::ChapterStructure => {
            "Summarize each chapter below. Use the chapter numbers shown in the [brackets] as index. \
             Answer with JSON: {\"chapters\": [{\"index\": number, \"title\": string, \
             \"summary\": string, \"keyEvents\": [string]}]}"
        }
        Stage::Foreshadowing => {
            "Find foreshadowing in the excerpts below: setups, whether and where they pay off. \
             Use the chapter numbers shown in the [brackets]. Answer with JSON: \
             {\"foreshadowing\": [{\"setupChapter\": number, \"payoffChapter\": number|null, \
             \"description\": string, \"status\": \"planted\"|\"resolved\"|\"abandoned\"}]}"
        }
        Stage::ChapterDetail => {
            "Analyze this single chapter in depth: what it accomplishes, how it is built, and \
             the passages worth studying. Answer with JSON: {\"analysis\": string, \
             \"techniques\": [string], \"highlights\": [string]}"
        }
        Stage::WritingReview => {
            "Write a critical review of the novel's craft from the excerpts below: strengths, \
             weaknesses, and what a writer should imitate or avoid. Plain prose."
        }
    }
}

fn system_message(config: &AnalysisConfig) -> String {
    let mut system = SYSTEM_PROMPT.to_string();
    let novel_type = config.novel_type.trim();
    if !novel_type.is_empty() {
        system.push_str(&format!(
            "\n\nThe novel is a {} novel; judge it by the conventions of that genre.",
            novel_type
        ));
        if let Some(extra) = config.custom_type_prompts.get(novel_type) {
            system.push_str("\n\n");
            system.push_str(extra.trim());
        }
    }
    system
}

/// Build the chat messages for one stage unit.
///
/// `heading` identifies the book (and chapter range) above the content.
pub fn build_messages(
    stage: Stage,
    config: &AnalysisConfig,
    heading: &str,
    content: &str,
) -> Vec<ChatMessage> {
    let instructions = config
        .custom_prompts
        .get(&stage)
        .map(|s| s.as_str())
        .unwrap_or_else(|| default_instructions(stage));

    let user = format!("{}\n\n{}\n\n---\n\n{}", instructions.trim(), heading, content);
    vec![ChatMessage::system(system_message(config)), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::AnalysisMode;
    use crate::llm::Role;

    #[test]
    fn default_messages_have_system_and_user() {
        let config = AnalysisConfig::new(AnalysisMode::Quick, "");
        let messages = build_messages(Stage::Characters, &config, "Book: T", "text");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(!messages[0].content.contains("genre"));
        assert!(messages[1].content.contains("\"characters\""));
        assert!(messages[1].content.ends_with("text"));
    }

    #[test]
    fn custom_prompt_replaces_instructions() {
        let config = AnalysisConfig::new(AnalysisMode::Quick, "")
            .with_custom_prompt(Stage::Synopsis, "Summarize in one line.");
        let messages = build_messages(Stage::Synopsis, &config, "Book: T", "text");
        assert!(messages[1].content.starts_with("Summarize in one line."));
    }

    #[test]
    fn type_prompt_extends_system_message() {
        let config = AnalysisConfig::new(AnalysisMode::Quick, "mystery")
            .with_type_prompt("mystery", "Track every clue.")
            .with_type_prompt("romance", "Track the couple.");
        let messages = build_messages(Stage::Synopsis, &config, "Book: T", "text");
        assert!(messages[0].content.contains("mystery novel"));
        assert!(messages[0].content.contains("Track every clue."));
        assert!(!messages[0].content.contains("Track the couple."));
    }
}
