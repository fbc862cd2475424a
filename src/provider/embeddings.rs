//! OpenAI-compatible embeddings client.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, OPENAI_API_BASE, ProviderError, api_key_from_env};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Async embeddings client bound to one model.
#[derive(Debug)]
pub struct EmbeddingsClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl EmbeddingsClient {
    /// Create a client from the `OPENAI_API_KEY` env var.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key_from_env()?;
        Self::new(&api_key, OPENAI_API_BASE, model)
    }

    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential);
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| ProviderError::BadCredential)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }

    /// Embed a single text and return its vector.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: &[text],
        };

        let resp = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".into());
            return Err(ProviderError::Api {
                operation: "embeddings",
                status,
                body,
            });
        }

        let mut parsed: EmbeddingResponse = resp.json().await?;
        parsed.data.sort_by_key(|entry| entry.index);
        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or(ProviderError::EmptyResponse("embeddings"))
    }
}

impl EmbeddingProvider for EmbeddingsClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_one(text).await
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
