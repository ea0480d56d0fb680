//! Completion-service client
//!
//! Defines the client trait and request/response types for calling a chat
//! completion service. Two implementations:
//! - `HttpCompletionClient`: OpenAI-compatible `/chat/completions` over HTTP
//! - `MockClient`: returns preconfigured responses keyed by request tag
//!
//! The analysis pipeline calls the client once per stage unit. Timeouts are
//! the transport's concern; retries are the caller's.

mod http;
mod sse;

pub use http::{HttpCompletionClient, HttpClientConfig};
pub use sse::SseDecoder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request: ordered messages plus the target model.
///
/// `tag` names the unit of work (the stage id) for logging and for mock
/// routing. It is never sent over the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tag: Option<String>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Total characters across all messages
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

/// Token accounting reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A completed response
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Errors from completion client operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("completion service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("completion service not available: {0}")]
    Unavailable(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Client trait for the completion service.
///
/// Abstracts over transport (HTTP, mock) so the pipeline doesn't depend on
/// how the model is reached.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the request and wait for the whole answer.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;
}

/// Mock client for testing: returns preconfigured responses by tag.
///
/// Every request is recorded so tests can assert on what was sent.
pub struct MockClient {
    available: bool,
    responses: HashMap<String, Result<String, CompletionError>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockClient {
    /// Create a mock client that reports as available.
    pub fn available() -> Self {
        Self {
            available: true,
            responses: HashMap::new(),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client whose every call fails.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Register the response text for a tag.
    pub fn with_response(mut self, tag: impl Into<String>, content: impl Into<String>) -> Self {
        self.responses.insert(tag.into(), Ok(content.into()));
        self
    }

    /// Register a failure for a tag.
    pub fn with_failure(mut self, tag: impl Into<String>, error: CompletionError) -> Self {
        self.responses.insert(tag.into(), Err(error));
        self
    }

    /// Response for tags without a registered entry.
    pub fn with_fallback(mut self, content: impl Into<String>) -> Self {
        self.fallback = Some(content.into());
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requests received with the given tag.
    pub fn calls_for(&self, tag: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.tag.as_deref() == Some(tag))
            .count()
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }

        if !self.available {
            return Err(CompletionError::Unavailable(
                "mock client configured as unavailable".to_string(),
            ));
        }

        let tag = request.tag.as_deref().unwrap_or_default();
        match self.responses.get(tag) {
            Some(Ok(content)) => Ok(CompletionResponse::text(content.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => match &self.fallback {
                Some(content) => Ok(CompletionResponse::text(content.clone())),
                None => Err(CompletionError::InvalidResponse(format!(
                    "no mock response for tag '{}'",
                    tag
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tag: &str) -> CompletionRequest {
        CompletionRequest::new("test-model", vec![ChatMessage::user("hi")]).with_tag(tag)
    }

    #[tokio::test]
    async fn mock_returns_registered_response() {
        let client = MockClient::available().with_response("synopsis", "A tale.");
        let response = client.complete(&request("synopsis")).await.unwrap();
        assert_eq!(response.content, "A tale.");
        assert_eq!(client.calls_for("synopsis"), 1);
    }

    #[tokio::test]
    async fn mock_unavailable_client_returns_error() {
        let client = MockClient::unavailable();
        let err = client.complete(&request("synopsis")).await.unwrap_err();
        assert!(matches!(err, CompletionError::Unavailable(_)));
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn mock_missing_tag_uses_fallback_or_fails() {
        let client = MockClient::available();
        let err = client.complete(&request("nope")).await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)));

        let client = MockClient::available().with_fallback("{}");
        let response = client.complete(&request("nope")).await.unwrap();
        assert_eq!(response.content, "{}");
    }

    #[tokio::test]
    async fn mock_registered_failure() {
        let client = MockClient::available().with_failure(
            "characters",
            CompletionError::Http {
                status: 500,
                body: "boom".into(),
            },
        );
        let err = client.complete(&request("characters")).await.unwrap_err();
        assert!(matches!(err, CompletionError::Http { status: 500, .. }));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("x")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"x"}"#);
    }
}
