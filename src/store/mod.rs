pub mod chunk_store;

pub use chunk_store::{ChunkStore, CorpusSource, SnapshotFile, StaticCorpus};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("failed to read corpus snapshot {0}: {1}")]
    Read(String, #[source] std::io::Error),

    #[error("failed to parse corpus snapshot {0}: {1}")]
    Parse(String, #[source] serde_json::Error),
}
