//! Chat completion responses and parsing of the model's replies.

use bookscout_core::Completion;
use serde::Deserialize;

use super::OpenAiError;

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
pub struct ReplyMessage {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice.
    pub fn into_content(self) -> Result<String, OpenAiError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(OpenAiError::EmptyReply)
    }
}

#[derive(Debug, Deserialize)]
struct CorrectionReply {
    suggestion: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Strip a Markdown code fence some models wrap JSON in.
fn unfence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse a correction reply.
///
/// The expected shape is `{"suggestion": ..., "confidence": ...}`. A bare
/// `CORRECT` means the query needs no change.
pub fn parse_correction(query: &str, reply: &str) -> Result<Completion, OpenAiError> {
    let body = unfence(reply);
    if body.trim_matches('"').eq_ignore_ascii_case("correct") {
        return Ok(Completion { suggestion: query.to_string(), confidence: 1.0 });
    }

    let parsed: CorrectionReply =
        serde_json::from_str(body).map_err(|e| OpenAiError::Parse(format!("correction reply: {e}")))?;

    Ok(Completion {
        suggestion: parsed.suggestion.trim().to_string(),
        confidence: parsed.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
    })
}

/// Strip list markers such as `1.`, `2)`, `-`, `*` and surrounding quotes.
fn strip_marker(line: &str) -> &str {
    let line = line.trim();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let line = if digits > 0 {
        let rest = &line[digits..];
        rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')).unwrap_or(line)
    } else {
        line.trim_start_matches(['-', '*', '•'])
    };
    line.trim().trim_matches(['"', '\'']).trim()
}

/// Parse a one-per-line alternatives reply, keeping at most `count` entries.
pub fn parse_alternatives(reply: &str, count: usize) -> Vec<String> {
    reply
        .lines()
        .map(strip_marker)
        .filter(|line| !line.is_empty())
        .take(count)
        .map(str::to_string)
        .collect()
}
