use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single-message completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub message: String,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("empty completion")]
    Empty,
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
}

/// Incremental text fragments, terminated when the stream ends
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Wait for the whole reply
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Reply as a sequence of fragments
    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream, ProviderError>;
}
