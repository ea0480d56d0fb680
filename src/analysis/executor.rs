//! Single-unit stage execution: prompt, complete, parse

use super::parse::parse_stage_output;
use super::prompts::build_messages;
use super::stage::{Stage, StageOutput};
use super::types::{AnalysisConfig, AnalysisError};
use crate::llm::{CompletionClient, CompletionRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs one stage against one unit of book text
pub struct StageExecutor {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl StageExecutor {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `content` to the model with `stage`'s prompt and parse the answer.
    ///
    /// Completion failures are returned; an unusable answer is not an error
    /// and yields an empty output.
    pub async fn execute(
        &self,
        stage: Stage,
        config: &AnalysisConfig,
        heading: &str,
        content: &str,
    ) -> Result<StageOutput, AnalysisError> {
        let messages = build_messages(stage, config, heading, content);
        let request = CompletionRequest::new(&self.model, messages).with_tag(stage.id());
        debug!(stage = %stage, prompt_chars = request.prompt_chars(), "sending stage request");

        let response = self.client.complete(&request).await?;
        let output = parse_stage_output(stage, &response.content);

        if output.is_empty() && !response.content.trim().is_empty() {
            warn!(stage = %stage, "model answer contained nothing usable");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::AnalysisMode;
    use crate::llm::{CompletionError, MockClient};

    fn config() -> AnalysisConfig {
        AnalysisConfig::new(AnalysisMode::Quick, "")
    }

    #[tokio::test]
    async fn tags_request_with_stage_id() {
        let mock = Arc::new(
            MockClient::available()
                .with_response("takeaways", r#"{"takeaways": ["Cut the prologue"]}"#),
        );
        let executor = StageExecutor::new(mock.clone(), "test-model");

        let out = executor
            .execute(Stage::Takeaways, &config(), "Book: T", "text")
            .await
            .unwrap();
        assert_eq!(out, StageOutput::Takeaways(vec!["Cut the prologue".into()]));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tag.as_deref(), Some("takeaways"));
        assert_eq!(requests[0].model, "test-model");
    }

    #[tokio::test]
    async fn unusable_answer_is_empty_not_error() {
        let mock = Arc::new(MockClient::available().with_response("characters", "sorry"));
        let executor = StageExecutor::new(mock, "m");
        let out = executor
            .execute(Stage::Characters, &config(), "Book: T", "text")
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn completion_failure_propagates() {
        let mock = Arc::new(
            MockClient::available()
                .with_failure("synopsis", CompletionError::Transport("reset".into())),
        );
        let executor = StageExecutor::new(mock, "m");
        let err = executor
            .execute(Stage::Synopsis, &config(), "Book: T", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Completion(_)));
    }
}
