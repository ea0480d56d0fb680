//! Tolerant parsing of model responses into stage outputs
//!
//! A malformed answer never fails a stage: whatever can be recovered is kept
//! and the rest degrades to an empty value of the right type.

use super::stage::{OutputKind, Stage, StageOutput};
use super::types::{
    ChapterDetail, ChapterSummary, CharacterAnalysis, EmotionPoint, Foreshadowing,
    TechniqueAnalysis,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Extract a JSON value from model response text.
///
/// Models sometimes wrap JSON in markdown code fences or add explanation
/// text. This tries, in order:
/// 1. Direct parse (response is pure JSON)
/// 2. The body of a ```json ... ``` or ``` ... ``` fenced block
/// 3. The first balanced `{ ... }` substring that parses as an object
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() || v.is_array() {
            return Some(v);
        }
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(block.trim()) {
            if v.is_object() || v.is_array() {
                return Some(v);
            }
        }
    }

    first_balanced_object(trimmed)
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // skip the info string ("json", "JSON", ...) up to the end of the line
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    body.find("```").map(|end| &body[..end])
}

/// Scan for `{`, find its matching `}` honoring string literals, and return
/// the first candidate that parses as an object.
fn first_balanced_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        if let Some(end) = matching_brace(bytes, start) {
            if let Ok(v) = serde_json::from_str::<Value>(&text[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
        from = start + 1;
    }
    None
}

fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate the list in a response: under `key`, the value itself when it is an
/// array, or the first array-valued field of an object.
fn find_list(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove(key) {
                return items;
            }
            map.into_iter()
                .find_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Deserialize each element independently, dropping the ones that don't fit
fn parse_items<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

fn parse_strings(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Object(map) => ["text", "content", "takeaway"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()).map(str::to_string)),
            _ => None,
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") && trimmed.len() > 6 {
        if let Some(body) = fenced_block(trimmed) {
            return body.trim();
        }
    }
    trimmed
}

/// Parse a model answer for `stage`. Never fails.
pub fn parse_stage_output(stage: Stage, raw: &str) -> StageOutput {
    let list_key = match stage.output_kind() {
        OutputKind::Prose => {
            let text = strip_fences(raw).to_string();
            return match stage {
                Stage::WritingReview => StageOutput::WritingReview(text),
                _ => StageOutput::Synopsis(text),
            };
        }
        OutputKind::Object => {
            let detail = extract_json(raw)
                .filter(Value::is_object)
                .and_then(|v| serde_json::from_value::<ChapterDetail>(v).ok());
            return StageOutput::ChapterDetails(detail.into_iter().collect());
        }
        OutputKind::List { list_key } => list_key,
    };

    let items = extract_json(raw)
        .map(|v| find_list(v, list_key))
        .unwrap_or_default();

    match stage {
        Stage::Characters => StageOutput::Characters(
            parse_items::<CharacterAnalysis>(items)
                .into_iter()
                .filter(|c| !c.name.trim().is_empty())
                .collect(),
        ),
        Stage::Techniques => StageOutput::Techniques(
            parse_items::<TechniqueAnalysis>(items)
                .into_iter()
                .filter(|t| !t.name.trim().is_empty())
                .collect(),
        ),
        Stage::Takeaways => StageOutput::Takeaways(parse_strings(items)),
        Stage::EmotionCurve => StageOutput::EmotionCurve(parse_items::<EmotionPoint>(items)),
        Stage::ChapterStructure => {
            StageOutput::ChapterStructure(parse_items::<ChapterSummary>(items))
        }
        Stage::Foreshadowing => StageOutput::Foreshadowing(
            parse_items::<Foreshadowing>(items)
                .into_iter()
                .filter(|f| !f.description.trim().is_empty())
                .collect(),
        ),
        other => StageOutput::empty(other),
    }
}
