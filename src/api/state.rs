use std::sync::Arc;

use anyhow::Context;

use crate::engine::EngineConfig;
use crate::provider::{ChatClient, EmbeddingsClient};
use crate::store::ChunkStore;

/// Shared state for all handlers
pub struct AppState {
    // Lazily populated on first request, read-only afterwards
    pub store: ChunkStore,

    // Provider clients hold their own connection pools
    pub embeddings: EmbeddingsClient,
    pub chat: ChatClient,

    pub config: EngineConfig,
}

impl AppState {
    /// Build provider clients and the corpus store. Fails fast when the
    /// provider credential is missing, before any request is served.
    pub fn from_config(config: EngineConfig) -> anyhow::Result<Arc<Self>> {
        let embeddings = EmbeddingsClient::from_env(config.embedding_model.clone())
            .context("failed to build embeddings client")?;
        let chat = ChatClient::from_env().context("failed to build chat client")?;
        let store = ChunkStore::from_snapshot(&config.corpus_path);

        Ok(Arc::new(Self {
            store,
            embeddings,
            chat,
            config,
        }))
    }
}
