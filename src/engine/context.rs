//! Prompt and tool-payload construction for the conversation loop.

use serde_json::{Value, json};

use super::retriever::ScoredChunk;

/// Separates rendered chunks inside the user prompt.
pub const CHUNK_DELIMITER: &str = "\n\n---\n\n";

const BASE_SYSTEM_PROMPT: &str = r#"You are a helpful assistant answering questions about a product's developer documentation.

Guidelines:
- Ground every answer in the provided documentation excerpts
- Cite the URL of each page you draw from
- If the excerpts do not cover the question, call the search_docs tool with a focused query before answering
- If the documentation genuinely does not answer the question, say so honestly
- Be concise and specific; prefer working code samples over prose when the docs include them"#;

/// System prompt for one question. Adds an SDK-preference line when the
/// caller requested a specific SDK.
pub fn build_system_prompt(target_sdk: Option<&str>) -> String {
    match target_sdk {
        Some(sdk) => format!(
            "{BASE_SYSTEM_PROMPT}\n- The user works with the {sdk} SDK; prefer {sdk}-specific pages and examples when they exist"
        ),
        None => BASE_SYSTEM_PROMPT.to_string(),
    }
}

/// Render retrieved chunks into the context section of the user prompt.
pub fn build_context(chunks: &[ScoredChunk<'_>]) -> String {
    if chunks.is_empty() {
        return "No relevant documentation found.".into();
    }

    chunks
        .iter()
        .map(|scored| {
            format!(
                "### {}\nURL: {}\n\n{}",
                scored.chunk.title,
                scored.chunk.url,
                scored.chunk.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join(CHUNK_DELIMITER)
}

/// Build the user prompt: formatted context followed by the question.
pub fn build_user_prompt(query: &str, context: &str) -> String {
    format!("Documentation excerpts:\n\n{context}\n\nQuestion: {query}")
}

/// Serialize search results for a tool message. The model sees title,
/// url, content and score for each chunk, as a JSON array.
pub fn tool_result_payload(chunks: &[ScoredChunk<'_>]) -> String {
    let entries: Vec<Value> = chunks
        .iter()
        .map(|scored| {
            json!({
                "title": scored.chunk.title,
                "url": scored.chunk.url,
                "content": scored.chunk.content,
                "score": scored.score,
            })
        })
        .collect();

    Value::Array(entries).to_string()
}
