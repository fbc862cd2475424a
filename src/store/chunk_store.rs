//! In-memory corpus of documentation chunks.
//!
//! The corpus is produced by an offline build step as a JSON snapshot
//! (`{ "chunks": [...] }`) and consumed read-only here. Loading happens
//! at most once per process; every request after the first read hits
//! the cached slice. A failed load is not cached, so the next request
//! retries the source.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::sync::OnceCell;

use super::CorpusError;
use crate::models::DocumentChunk;

/// Where chunks come from. The store is generic over its source so
/// tests can substitute a fixed in-memory corpus.
pub trait CorpusSource: Send + Sync {
    fn load(&self) -> Result<Vec<DocumentChunk>, CorpusError>;
}

/// Snapshot wire format.
#[derive(Deserialize)]
struct CorpusSnapshot {
    chunks: Vec<DocumentChunk>,
}

/// Reads the snapshot JSON from disk.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusSource for SnapshotFile {
    fn load(&self) -> Result<Vec<DocumentChunk>, CorpusError> {
        let shown = self.path.display().to_string();
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| CorpusError::Read(shown.clone(), e))?;
        let snapshot: CorpusSnapshot =
            serde_json::from_str(&raw).map_err(|e| CorpusError::Parse(shown, e))?;
        Ok(snapshot.chunks)
    }
}

/// A fixed corpus handed over at construction. Used by tests and demos.
pub struct StaticCorpus(pub Vec<DocumentChunk>);

impl CorpusSource for StaticCorpus {
    fn load(&self) -> Result<Vec<DocumentChunk>, CorpusError> {
        Ok(self.0.clone())
    }
}

/// Lazily-initialized, process-scoped chunk collection.
///
/// `load` is safe to call from concurrent requests: the source runs at
/// most once, and all callers share the same immutable slice afterward.
pub struct ChunkStore {
    source: Box<dyn CorpusSource>,
    cell: OnceCell<Vec<DocumentChunk>>,
}

impl ChunkStore {
    pub fn new(source: Box<dyn CorpusSource>) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    /// Store backed by a snapshot file on disk.
    pub fn from_snapshot(path: impl AsRef<Path>) -> Self {
        Self::new(Box::new(SnapshotFile::new(path.as_ref())))
    }

    /// Load the corpus, reading from the source on first call only.
    pub async fn load(&self) -> Result<&[DocumentChunk], CorpusError> {
        let chunks = self
            .cell
            .get_or_try_init(|| async {
                let chunks = self.source.load()?;
                for warning in validate(&chunks) {
                    tracing::warn!("corpus: {}", warning);
                }
                tracing::info!(chunks = chunks.len(), "corpus loaded");
                Ok(chunks)
            })
            .await?;
        Ok(chunks.as_slice())
    }
}

/// Sanity-check the loaded corpus against its documented invariants.
/// Returns human-readable warnings; none of these block serving.
fn validate(chunks: &[DocumentChunk]) -> Vec<String> {
    let mut warnings = Vec::new();

    if chunks.is_empty() {
        warnings.push("snapshot contains no chunks".into());
        return warnings;
    }

    let dimension = chunks[0].embedding.len();
    let mismatched = chunks
        .iter()
        .filter(|c| c.embedding.len() != dimension)
        .count();
    if mismatched > 0 {
        warnings.push(format!(
            "{} chunks have embedding dimension != {}",
            mismatched, dimension
        ));
    }

    let mut seen = std::collections::HashSet::new();
    let duplicates = chunks.iter().filter(|c| !seen.insert(c.id.as_str())).count();
    if duplicates > 0 {
        warnings.push(format!("{} duplicate chunk ids", duplicates));
    }

    warnings
}
