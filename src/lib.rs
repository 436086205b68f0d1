use thiserror::Error;

pub type Result<T> = std::result::Result<T, StaywiseError>;

#[derive(Error, Debug)]
pub enum StaywiseError {
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{service} is unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("Malformed embedding response: {0}")]
    EmbeddingFormat(String),

    #[error("Index dimension mismatch: index has {actual} dimensions, configuration expects {expected}")]
    DimensionMismatch { expected: u32, actual: u32 },

    #[error("Index '{0}' did not become ready within the timeout")]
    IndexNotReady(String),

    #[error("Upsert batch failed: {0}")]
    UpsertBatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod llm;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod vector_store;
