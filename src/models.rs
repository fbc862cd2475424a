use serde::{Deserialize, Serialize};

/// One retrievable slice of a documentation page, as stored in the
/// corpus snapshot. Snapshot JSON uses camelCase keys.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub id: String,      // unique across the whole corpus
    pub content: String, // the chunk's text body
    pub embedding: Vec<f32>,
    pub url: String,   // source documentation page
    pub title: String, // source page title
    pub chunk_index: usize, // ordinal position within the page
    pub file_path: String,  // originating source file (diagnostic only)
    /// SDK variant this chunk's page belongs to, if the page is SDK-specific
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
    /// Canonical URL shared by all SDK variants of the same conceptual page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl DocumentChunk {
    /// The key that groups SDK-variant siblings of one logical page.
    pub fn page_key(&self) -> &str {
        self.base_url.as_deref().unwrap_or(&self.url)
    }
}
