use axum::{Json, extract::State, extract::rejection::JsonRejection};
use std::sync::Arc;

use super::dto::{AskRequest, AskResponse, HealthResponse, SearchRequest, SearchResponse};
use super::error::ApiError;
use super::state::AppState;
use crate::engine::{conversation, retriever, selector};

const SEARCH_DEFAULT_LIMIT: usize = 10;
const SEARCH_MAX_LIMIT: usize = 50;

const ASK_DEFAULT_LIMIT: usize = 8;
const ASK_MAX_LIMIT: usize = 20;

/// POST /search - Semantic search over the documentation corpus
pub async fn search(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(req) = body.map_err(bad_json)?;
    let query = required_query(req.query.as_deref())?;
    let sdk = validated_sdk(req.sdk.as_deref());
    let limit = clamp_limit(req.limit, SEARCH_DEFAULT_LIMIT, SEARCH_MAX_LIMIT);

    let corpus = state.store.load().await?;
    let outcome = retriever::search(query, corpus, sdk, limit, &state.embeddings).await?;

    tracing::info!(
        query = %query,
        sdk = sdk.unwrap_or("-"),
        results = outcome.chunks.len(),
        "search complete"
    );

    Ok(Json(SearchResponse::from_outcome(&outcome)))
}

/// POST /ask - Answer a question via the tool-calling conversation loop
pub async fn ask(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(req) = body.map_err(bad_json)?;
    let query = required_query(req.query.as_deref())?;
    let sdk = validated_sdk(req.sdk.as_deref());
    let limit = clamp_limit(req.limit, ASK_DEFAULT_LIMIT, ASK_MAX_LIMIT);
    let model = req.model.as_deref().unwrap_or(&state.config.chat_model);

    let corpus = state.store.load().await?;
    let params = conversation::AskParams {
        question: query,
        target_sdk: sdk,
        initial_limit: limit,
        model,
    };
    let outcome = conversation::run(&params, corpus, &state.embeddings, &state.chat).await?;

    tracing::info!(
        query = %query,
        iterations = outcome.iterations,
        sources = outcome.sources.len(),
        "ask complete"
    );

    Ok(Json(AskResponse::from_outcome(outcome)))
}

/// GET /health - Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

fn required_query(query: Option<&str>) -> Result<&str, ApiError> {
    let trimmed = query.unwrap_or("").trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(
            "Query is required and cannot be empty".into(),
        ));
    }
    Ok(trimmed)
}

fn validated_sdk(requested: Option<&str>) -> Option<&'static str> {
    requested.and_then(selector::validate_sdk)
}

fn clamp_limit(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(1, max)
}
