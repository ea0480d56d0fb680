//! OpenAI-compatible chat completion client over HTTP

use super::{
    CompletionClient, CompletionError, CompletionRequest, CompletionResponse, SseDecoder, Usage,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Connection settings for `HttpCompletionClient`
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Request a server-sent event stream instead of a single JSON body
    pub stream: bool,
    pub temperature: Option<f32>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
            stream: false,
            temperature: None,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Calls `POST {base_url}/chat/completions`.
///
/// Non-2xx responses become `CompletionError::Http` carrying the status and
/// body text. No retries: one call, one request.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpCompletionClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Unavailable(format!("failed to build client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": self.config.stream,
        });
        if let Some(t) = self.config.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        body
    }

    async fn read_stream(
        &self,
        mut response: reqwest::Response,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut decoder = SseDecoder::new();
        // bytes may split a UTF-8 sequence; hold back the incomplete tail
        let mut carry: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?
        {
            carry.extend_from_slice(&chunk);
            let valid_up_to = match std::str::from_utf8(&carry) {
                Ok(_) => carry.len(),
                Err(e) => e.valid_up_to(),
            };
            let text = String::from_utf8_lossy(&carry[..valid_up_to]).to_string();
            carry.drain(..valid_up_to);
            decoder.feed(&text)?;
            if decoder.is_done() {
                break;
            }
        }
        decoder.finish()?;
        let usage = decoder.usage();
        Ok(CompletionResponse {
            content: decoder.into_content(),
            usage,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        tracing::debug!(
            tag = request.tag.as_deref().unwrap_or("-"),
            model = %request.model,
            prompt_chars = request.prompt_chars(),
            "sending completion request"
        );

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&self.body(request));
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        if self.config.stream {
            return self.read_stream(response).await;
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("no choices in response".to_string()))?;
        Ok(CompletionResponse {
            content,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[test]
    fn endpoint_joins_base_url() {
        let client = HttpCompletionClient::new(HttpClientConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn body_carries_messages_and_stream_flag() {
        let client = HttpCompletionClient::new(HttpClientConfig {
            stream: true,
            temperature: Some(0.5),
            ..Default::default()
        })
        .unwrap();
        let request = CompletionRequest::new(
            "m",
            vec![ChatMessage::system("s"), ChatMessage::user("u")],
        )
        .with_tag("synopsis");
        let body = client.body(&request);
        assert_eq!(body["model"], "m");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "u");
        assert!(body.get("tag").is_none());
    }
}
