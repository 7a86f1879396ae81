pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Role;

pub use http::HttpInferenceClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

impl From<Role> for WireRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => WireRole::User,
            Role::Assistant => WireRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: WireRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One chat-completion call: provider hint, model, and the full message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletionRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    /// Build a single-choice response, mostly useful for test doubles.
    pub fn with_content(content: Option<&str>) -> Self {
        Self {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: content.map(str::to_string),
                },
            }],
        }
    }

    /// Content of the first choice, if present and non-empty.
    pub fn reply_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode inference response: {0}")]
    Decode(String),

    #[error("no API key configured for {0}")]
    MissingApiKey(String),

    #[error("inference task ended before a response arrived: {0}")]
    Interrupted(String),
}

impl InferenceError {
    /// HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            InferenceError::Status { status, .. } => Some(*status),
            InferenceError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A hosted chat-completion service.
///
/// Implementations own transport, serialization, and vendor details; the
/// chat session only ever sees this request/response shape.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, InferenceError>;
}
