//! Query-time retrieval pipeline.

use crate::models::DocumentChunk;
use crate::provider::EmbeddingProvider;

use super::EngineError;
use super::pricing;
use super::selector;
use super::similarity::cosine_similarity;

/// A corpus chunk paired with its similarity to the current query.
/// Borrows the corpus; created fresh per query and discarded after
/// response formatting.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a DocumentChunk,
    pub score: f32,
}

/// Chunks selected for one query, plus what the embedding call cost.
#[derive(Debug)]
pub struct SearchOutcome<'a> {
    pub chunks: Vec<ScoredChunk<'a>>,
    pub tokens_used: u32,
    pub cost: f64,
}

/// 1. Embed the query text
/// 2. Score every corpus chunk against the query vector
/// 3. Collapse SDK variants, sort by score, keep the best `limit`
///
/// `limit` is taken as-is; callers clamp it to their endpoint maximum.
pub async fn search<'a, E: EmbeddingProvider>(
    query: &str,
    corpus: &'a [DocumentChunk],
    target_sdk: Option<&str>,
    limit: usize,
    embedder: &E,
) -> Result<SearchOutcome<'a>, EngineError> {
    let tokens_used = pricing::estimate_tokens(query);
    let query_embedding = embedder
        .embed(query)
        .await
        .map_err(EngineError::Embedding)?;

    let scored: Vec<ScoredChunk<'a>> = corpus
        .iter()
        .map(|chunk| ScoredChunk {
            chunk,
            score: cosine_similarity(&query_embedding, &chunk.embedding),
        })
        .collect();

    let mut selected = selector::select_for_sdk(scored, target_sdk);
    selected.sort_by(|a, b| b.score.total_cmp(&a.score));
    selected.truncate(limit);

    tracing::debug!(
        query_tokens = tokens_used,
        results = selected.len(),
        sdk = target_sdk.unwrap_or("-"),
        "retrieval complete"
    );

    Ok(SearchOutcome {
        chunks: selected,
        tokens_used,
        cost: pricing::embedding_cost(tokens_used),
    })
}
