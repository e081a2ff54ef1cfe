pub mod classify;
pub mod compatible;
pub mod sanitize;

use crate::types::{
    ChatCompletion, ChatMessageChunk, EmbeddingResponse, ModelDescriptor, OperationType,
};
use crate::request::RequestPayload;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Errors from the transport layer, before classification.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced to the host.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("{message}")]
    SetupFailure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation `{0}` is not implemented by the mittwald provider")]
    NotImplemented(OperationType),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Unclassified(ProviderError),
}

impl AiError {
    pub fn setup(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        AiError::SetupFailure {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// What the host should tell the user to do about this error.
    pub fn hint(&self) -> &'static str {
        match self {
            AiError::RateLimited(_) => "try again later",
            AiError::QuotaExceeded(_) => "add credits or upgrade the plan",
            AiError::SetupFailure { .. } => "check the provider configuration",
            AiError::NotImplemented(_) => "feature unavailable",
            AiError::InvalidInput(_) => "check the request input",
            AiError::Unclassified(_) => "unexpected provider error",
        }
    }
}

impl From<ProviderError> for AiError {
    fn from(err: ProviderError) -> Self {
        classify::classify(err).into()
    }
}

/// Lazily produced chunk sequence of one streamed chat call.
pub type ChunkStream = BoxStream<'static, Result<ChatMessageChunk, ProviderError>>;

/// The vendor client. Decides nothing; only moves payloads and decodes replies.
#[async_trait]
pub trait Transport: Send + Sync {
    /// List every model the vendor publishes (id + owner).
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, ProviderError>;

    /// Execute a chat completion (non-streaming).
    async fn create_chat_completion(
        &self,
        payload: &RequestPayload,
    ) -> Result<ChatCompletion, ProviderError>;

    /// Start a streamed chat completion. Nothing is sent until the stream is polled.
    fn create_chat_completion_streamed(&self, payload: &RequestPayload) -> ChunkStream;

    async fn create_embedding(
        &self,
        payload: &RequestPayload,
    ) -> Result<EmbeddingResponse, ProviderError>;
}
