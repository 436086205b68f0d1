// Embeddings module
// Converts guest questions and document chunks into fixed-dimension vectors
// via the Gemini embedding API.

pub mod gemini;

pub use gemini::{EMBED_BATCH_SIZE, GeminiClient, TaskType};

/// Seam for the query-path embedder so the answer service can take a test
/// double. A `None` means the question could not be embedded; callers degrade
/// instead of failing.
pub trait QueryEmbedder {
    fn embed_query(&self, text: &str) -> Option<Vec<f32>>;
}
