use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => anyhow::bail!("unknown message role: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Completion models the client knows how to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatModel {
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-32k")]
    Gpt4_32k,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
}

impl ChatModel {
    pub const ALL: [ChatModel; 5] = [
        ChatModel::Gpt35Turbo,
        ChatModel::Gpt4,
        ChatModel::Gpt4_32k,
        ChatModel::Gpt4o,
        ChatModel::Gpt4oMini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatModel::Gpt35Turbo => "gpt-3.5-turbo",
            ChatModel::Gpt4 => "gpt-4",
            ChatModel::Gpt4_32k => "gpt-4-32k",
            ChatModel::Gpt4o => "gpt-4o",
            ChatModel::Gpt4oMini => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        ChatModel::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unsupported model: {s}"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: ChatModel,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(model: ChatModel, messages: Vec<Message>) -> Self {
        Self { model, messages }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental text from the model. May be empty.
    Delta { text: String },
    /// An event that carries no text, e.g. the opening role announcement
    /// or the closing finish reason.
    Metadata {
        role: Option<Role>,
        finish_reason: Option<String>,
    },
    /// The server signalled the end of the stream.
    Done,
}

impl StreamChunk {
    pub fn delta(&self) -> Option<&str> {
        match self {
            StreamChunk::Delta { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited by the completion service: {0}")]
    RateLimited(String),
    #[error("completion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    /// Undecodable bytes at the tail of an otherwise healthy stream.
    #[error("failed to decode stream body: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }

    pub fn is_benign(&self) -> bool {
        matches!(self, ProviderError::Decode(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.status().map(|s| s.as_u16()) == Some(429) {
            ProviderError::RateLimited(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream a completion for `request`, sending chunks to `tx` in arrival
    /// order. Returns once the stream is exhausted or fails.
    async fn stream_complete(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError>;
}

/// Run `provider` on its own task. Chunks arrive on the returned receiver;
/// the handle yields the provider's final result once the stream ends.
pub fn spawn_stream(
    provider: Arc<dyn LlmProvider>,
    request: ChatRequest,
) -> (
    JoinHandle<Result<(), ProviderError>>,
    mpsc::Receiver<StreamChunk>,
) {
    let (tx, rx) = mpsc::channel(64);
    let handle = tokio::spawn(async move { provider.stream_complete(request, tx).await });
    (handle, rx)
}
