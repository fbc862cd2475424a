use serde::{Deserialize, Serialize};

use crate::engine::conversation::{AskOutcome, SourceRef};
use crate::engine::pricing::{self, CostBreakdown};
use crate::engine::retriever::{ScoredChunk, SearchOutcome};

/// Character budget for chunk previews in search responses.
const CONTENT_PREVIEW_CHARS: usize = 500;

/// POST /search request
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub sdk: Option<String>,
}

/// POST /search response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub cost: SearchCost,
}

/// One retrieved chunk in a search response.
#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    /// Chunk body, cut to the preview budget with a trailing ellipsis.
    pub content: String,
    /// Cosine similarity, rounded to 3 decimals.
    pub score: f32,
    pub chunk_index: usize,
}

/// Embedding spend for one search call.
#[derive(Debug, Serialize)]
pub struct SearchCost {
    pub tokens: u32,
    pub cost: f64,
}

impl SearchResponse {
    pub fn from_outcome(outcome: &SearchOutcome<'_>) -> Self {
        Self {
            results: outcome.chunks.iter().map(SearchResult::from_scored).collect(),
            cost: SearchCost {
                tokens: outcome.tokens_used,
                cost: pricing::round_cost(outcome.cost),
            },
        }
    }
}

impl SearchResult {
    fn from_scored(scored: &ScoredChunk<'_>) -> Self {
        Self {
            url: scored.chunk.url.clone(),
            title: scored.chunk.title.clone(),
            content: truncate_content(&scored.chunk.content, CONTENT_PREVIEW_CHARS),
            score: round_score(scored.score),
            chunk_index: scored.chunk.chunk_index,
        }
    }
}

/// POST /ask request
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: Option<String>,
    pub sdk: Option<String>,
    pub limit: Option<usize>,
    pub model: Option<String>,
}

/// POST /ask response
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceInfo>,
    pub iterations: usize,
    pub cost: AskCost,
}

/// One cited page in an ask response.
#[derive(Debug, Serialize)]
pub struct SourceInfo {
    pub url: String,
    pub title: String,
    pub chunk_index: usize,
}

/// Full cost breakdown for one answered question, all figures rounded
/// to 8 decimals.
#[derive(Debug, Serialize)]
pub struct AskCost {
    pub search_tokens: u32,
    pub search_cost: f64,
    pub completion_tokens: u32,
    pub completion_cost: f64,
    pub total_cost: f64,
}

impl AskResponse {
    pub fn from_outcome(outcome: AskOutcome) -> Self {
        Self {
            answer: outcome.answer,
            sources: outcome.sources.iter().map(SourceInfo::from_ref).collect(),
            iterations: outcome.iterations,
            cost: AskCost::from_breakdown(&outcome.cost),
        }
    }
}

impl SourceInfo {
    fn from_ref(source: &SourceRef) -> Self {
        Self {
            url: source.url.clone(),
            title: source.title.clone(),
            chunk_index: source.chunk_index,
        }
    }
}

impl AskCost {
    fn from_breakdown(cost: &CostBreakdown) -> Self {
        Self {
            search_tokens: cost.search_tokens,
            search_cost: cost.search_cost,
            completion_tokens: cost.completion_tokens,
            completion_cost: cost.completion_cost,
            total_cost: cost.total_cost,
        }
    }
}

/// GET /health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Truncate to a character budget, appending an ellipsis when cut.
/// Operates on characters, so multi-byte content never splits.
fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
        None => content.to_string(),
    }
}

/// Round a similarity score to 3 decimals for display.
fn round_score(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentChunk;

    fn sample_chunk(content: &str) -> DocumentChunk {
        DocumentChunk {
            id: "chunk-1".into(),
            content: content.into(),
            embedding: vec![1.0, 0.0],
            url: "/docs/webhooks".into(),
            title: "Webhooks".into(),
            chunk_index: 2,
            file_path: "docs/webhooks.mdx".into(),
            sdk: None,
            base_url: None,
        }
    }

    #[test]
    fn test_truncate_short_content_untouched() {
        assert_eq!(truncate_content("short", 500), "short");
    }

    #[test]
    fn test_truncate_exact_budget_untouched() {
        let content = "a".repeat(500);
        assert_eq!(truncate_content(&content, 500), content);
    }

    #[test]
    fn test_truncate_long_content_gets_ellipsis() {
        let content = "a".repeat(501);
        let truncated = truncate_content(&content, 500);
        assert_eq!(truncated.chars().count(), 503);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_multibyte_content() {
        let content = "é".repeat(600);
        let truncated = truncate_content(&content, 500);
        assert!(truncated.starts_with(&"é".repeat(500)));
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_round_score_three_decimals() {
        assert_eq!(round_score(0.8765), 0.877);
        assert_eq!(round_score(0.1234), 0.123);
        assert_eq!(round_score(1.0), 1.0);
        assert_eq!(round_score(0.0), 0.0);
    }

    #[test]
    fn test_search_result_mapping() {
        let chunk = sample_chunk("Install the webhook handler.");
        let scored = ScoredChunk {
            chunk: &chunk,
            score: 0.87654,
        };

        let result = SearchResult::from_scored(&scored);

        assert_eq!(result.url, "/docs/webhooks");
        assert_eq!(result.title, "Webhooks");
        assert_eq!(result.content, "Install the webhook handler.");
        assert_eq!(result.score, 0.877);
        assert_eq!(result.chunk_index, 2);
    }

    #[test]
    fn test_search_response_rounds_cost() {
        let chunk = sample_chunk("body");
        let outcome = SearchOutcome {
            chunks: vec![ScoredChunk {
                chunk: &chunk,
                score: 0.5,
            }],
            tokens_used: 7,
            cost: 0.000_000_123_456_789,
        };

        let response = SearchResponse::from_outcome(&outcome);

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.cost.tokens, 7);
        assert_eq!(response.cost.cost, 0.000_000_12);
    }

    #[test]
    fn test_ask_response_mapping() {
        let outcome = AskOutcome {
            answer: "Use the session helper.".into(),
            sources: vec![SourceRef {
                url: "/docs/sessions".into(),
                title: "Sessions".into(),
                chunk_index: 0,
            }],
            iterations: 2,
            cost: CostBreakdown {
                search_tokens: 12,
                search_cost: 0.000_000_24,
                completion_tokens: 340,
                completion_cost: 0.000_063,
                total_cost: 0.000_063_24,
            },
        };

        let response = AskResponse::from_outcome(outcome);

        assert_eq!(response.answer, "Use the session helper.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].url, "/docs/sessions");
        assert_eq!(response.iterations, 2);
        assert_eq!(response.cost.total_cost, 0.000_063_24);
    }

    #[test]
    fn test_request_deserializes_with_optional_fields() {
        let req: SearchRequest = serde_json::from_str(r#"{ "query": "webhooks" }"#).unwrap();
        assert_eq!(req.query.as_deref(), Some("webhooks"));
        assert!(req.limit.is_none());
        assert!(req.sdk.is_none());

        let req: AskRequest =
            serde_json::from_str(r#"{ "query": "q", "model": "gpt-4o" }"#).unwrap();
        assert_eq!(req.model.as_deref(), Some("gpt-4o"));
        assert!(req.limit.is_none());
    }
}
