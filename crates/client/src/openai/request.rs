//! Chat completion request bodies and prompts.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, max_tokens: u32, temperature: f32) -> Self {
        Self { model: model.into(), messages, max_tokens, temperature, response_format: None }
    }

    /// Ask the model for a single JSON object.
    pub fn json_reply(mut self) -> Self {
        self.response_format = Some(ResponseFormat { kind: "json_object" });
        self
    }
}

const CORRECTION_INSTRUCTIONS: &str = "You correct typos in search queries for a book discovery service. \
Fix misspelled titles, author names, and genres. Keep the user's intent and wording otherwise. \
Reply with a JSON object {\"suggestion\": string, \"confidence\": number between 0 and 1}. \
If the query is already correct, return it unchanged as the suggestion.";

pub fn correction_messages(query: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(CORRECTION_INSTRUCTIONS), ChatMessage::user(format!("Query: \"{query}\""))]
}

pub fn alternatives_messages(query: &str, count: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You help readers find books when their search returned nothing. \
             Suggest related search queries: broader terms, similar genres, well-known related titles or authors.",
        ),
        ChatMessage::user(format!(
            "The search \"{query}\" returned few or no results. \
             Suggest {count} alternative search queries, one per line, with no numbering or commentary."
        )),
    ]
}
