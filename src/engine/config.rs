use std::path::PathBuf;

/// Chat model used when a request does not name one.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Embedding model; must match the model that produced the corpus vectors.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default on-disk location of the corpus snapshot.
pub const DEFAULT_CORPUS_PATH: &str = "data/docs-corpus.json";

/// RAG pipeline configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub corpus_path: PathBuf,
    pub chat_model: String,
    pub embedding_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            chat_model: DEFAULT_CHAT_MODEL.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
        }
    }
}
