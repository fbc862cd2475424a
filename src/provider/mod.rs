//! External provider clients.
//!
//! Both providers are OpenAI-compatible HTTP services reached over
//! `reqwest`. The traits here are the seams the engine calls through,
//! so conversation and retrieval tests can run against scripted
//! in-memory implementations.

pub mod chat;
pub mod embeddings;

pub use chat::{
    AssistantMessage, ChatClient, ChatMessage, ChatOutcome, ChatTurn, ContentBlock,
    FunctionCall, FunctionSpec, MessageContent, ToolCall, ToolChoice, ToolSpec,
};
pub use embeddings::EmbeddingsClient;

use serde::Deserialize;
use thiserror::Error;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variable holding the provider credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{API_KEY_VAR} is not set")]
    MissingCredential,

    #[error("credential is not a valid header value")]
    BadCredential,

    #[error("provider call failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{operation} request returned {status}: {body}")]
    Api {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{0} response contained no data")]
    EmptyResponse(&'static str),
}

/// Token counts reported by the chat provider for one completion.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Seam for the embedding provider: text in, query vector out.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, ProviderError>> + Send;
}

/// Seam for the chat-completion provider: one model turn per call.
pub trait ChatProvider: Send + Sync {
    fn chat(
        &self,
        turn: ChatTurn<'_>,
    ) -> impl std::future::Future<Output = Result<ChatOutcome, ProviderError>> + Send;
}

/// Read the provider credential, rejecting empty values.
pub(crate) fn api_key_from_env() -> Result<String, ProviderError> {
    match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ProviderError::MissingCredential),
    }
}
