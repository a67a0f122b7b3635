use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Speaker of one history turn. Only conversational roles are ever sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: HistoryRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of `POST /assistant/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context_path: String,
    pub history: Vec<HistoryEntry>,
}

impl ChatRequest {
    pub fn new(
        message: impl Into<String>,
        context_path: impl Into<String>,
        history: Vec<HistoryEntry>,
    ) -> Self {
        Self {
            message: message.into(),
            context_path: context_path.into(),
            history,
        }
    }
}

/// A decoded reply. `Empty` covers a missing, null or blank `response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Answer(String),
    Empty,
}

impl ChatReply {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            Self::Empty
        } else {
            Self::Answer(text)
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answer(text) => Some(text),
            Self::Empty => None,
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("failed to build chat http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("chat transport failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("chat endpoint returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("chat request timed out after {after:?}"))]
    TimedOut {
        stage: &'static str,
        after: Duration,
    },
}

/// The remote assistant, treated as a black box.
pub trait ChatCapability: Send + Sync {
    fn chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ChatResult<ChatReply>>;
}
