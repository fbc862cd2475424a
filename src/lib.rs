//! docs-rag-chat: documentation question answering
//!
//! Semantic search over a precomputed embedding corpus, plus a bounded
//! tool-calling conversation loop that lets a chat model request extra
//! searches before producing a sourced answer. Served over HTTP as
//! POST /search and POST /ask, with a health probe at GET /health.

pub mod api;
pub mod engine;
pub mod models;
pub mod provider;
pub mod store;

pub use models::DocumentChunk;
pub use store::ChunkStore;
