mod config;
pub mod context;
pub mod conversation;
pub mod pricing;
pub mod retriever;
pub mod selector;
pub mod similarity;

pub use config::{
    DEFAULT_CHAT_MODEL, DEFAULT_CORPUS_PATH, DEFAULT_EMBEDDING_MODEL, EngineConfig,
};

use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("query embedding failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("chat completion failed: {0}")]
    Chat(#[source] ProviderError),
}
