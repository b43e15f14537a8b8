//! Request and response types for the Anthropic Messages endpoint.
//!
//! Every struct derives `Serialize` and `Deserialize` so the same types
//! serve the live client, the offline stub and the test doubles.

use serde::{Deserialize, Serialize};

/// Body of a `POST /v1/messages` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    /// Model identifier (e.g. "claude-sonnet-4-5-20250929").
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// System prompt. Workers put their role preamble here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Sampling temperature; the API default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Conversation turns.
    pub messages: Vec<Message>,
}

impl MessagesRequest {
    /// Text of the first user turn, or an empty string.
    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Response returned by `/v1/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    /// Why generation stopped ("end_turn", "max_tokens"). `None` while streaming.
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl MessagesResponse {
    /// Builds a single-text-block response. Used by the stub backend and tests.
    pub fn from_text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            content: vec![ContentBlock {
                content_type: "text".into(),
                text: text.into(),
            }],
            model: model.into(),
            stop_reason: Some("end_turn".into()),
            usage: Usage::default(),
        }
    }

    /// Concatenated text of all `text` blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.content_type == "text")
            .map(|b| b.text.as_str())
            .collect()
    }
}

/// One content block. Non-text blocks carry no `text`, hence the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

/// Token accounting for a single call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
