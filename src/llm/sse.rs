//! Server-sent event reassembly for streamed completions
//!
//! The service streams `data: {json}` lines separated by blank lines and ends
//! with `data: [DONE]`. Network chunks split lines arbitrarily, so the decoder
//! buffers until a newline arrives.

use super::{CompletionError, Usage};
use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental decoder: feed raw text, collect content deltas.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: String,
    content: String,
    usage: Option<Usage>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next piece of the body. Returns the content deltas completed
    /// by this piece, in order.
    pub fn feed(&mut self, piece: &str) -> Result<Vec<String>, CompletionError> {
        self.pending.push_str(piece);
        let mut deltas = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            if let Some(delta) = self.handle_line(line.trim_end_matches(['\r', '\n']))? {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Result<Vec<String>, CompletionError> {
        let rest = std::mem::take(&mut self.pending);
        let mut deltas = Vec::new();
        if let Some(delta) = self.handle_line(rest.trim_end())? {
            deltas.push(delta);
        }
        Ok(deltas)
    }

    fn handle_line(&mut self, line: &str) -> Result<Option<String>, CompletionError> {
        if self.done {
            return Ok(None);
        }
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            // comments (":"), event names and blank separators carry no content
            return Ok(None);
        };
        let data = data.trim();
        if data == DONE_SENTINEL {
            self.done = true;
            return Ok(None);
        }
        if data.is_empty() {
            return Ok(None);
        }
        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| CompletionError::InvalidResponse(format!("bad stream event: {}", e)))?;
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        let delta: String = chunk
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .collect();
        if delta.is_empty() {
            return Ok(None);
        }
        self.content.push_str(&delta);
        Ok(Some(delta))
    }

    /// Whether the terminal sentinel was seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Content reassembled so far
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Consume the decoder, returning the full content
    pub fn into_content(self) -> String {
        self.content
    }
}
