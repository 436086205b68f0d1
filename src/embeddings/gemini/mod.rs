#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::AppConfig;
use crate::embeddings::QueryEmbedder;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound on texts per embedding request.
pub const EMBED_BATCH_SIZE: usize = 100;

/// Pause between consecutive embedding requests to stay under the service's
/// rate limit. Operational knob, not a correctness requirement.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Task hint sent to the embedding service. Queries and documents use
/// different hints but share the same vector space and dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

impl TaskType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: Option<String>,
    model: String,
    agent: ureq::Agent,
    batch_pause: Duration,
}

#[derive(Debug, Serialize)]
struct ContentPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    #[serde(default)]
    embedding: Option<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Option<Vec<EmbeddingValues>>,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &AppConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default URL is valid"),
            api_key: config.google_api_key.clone(),
            model: config.google_embedding_model_id.clone(),
            agent,
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }

    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    fn configured(&self) -> Option<&str> {
        if self.model.trim().is_empty() {
            return None;
        }
        self.api_key.as_deref()
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}{}:{}",
            self.base_url,
            self.model.trim_start_matches('/'),
            operation
        )
    }

    /// Embed a batch of document chunks, one output per input in order.
    ///
    /// Inputs are split into requests of at most [`EMBED_BATCH_SIZE`] texts
    /// with a short pause in between. A failed request or a malformed vector
    /// yields `None` at the affected positions rather than failing the run.
    #[inline]
    pub fn embed_documents(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        if texts.is_empty() {
            return Vec::new();
        }

        if self.configured().is_none() {
            error!("Google API key or embedding model not configured; cannot embed documents");
            return vec![None; texts.len()];
        }

        let mut results = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
            if i > 0 && !self.batch_pause.is_zero() {
                std::thread::sleep(self.batch_pause);
            }
            results.extend(self.embed_single_batch(batch, TaskType::RetrievalDocument));
        }
        results
    }

    fn embed_single_batch(&self, texts: &[String], task_type: TaskType) -> Vec<Option<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content {
                        parts: vec![ContentPart { text }],
                    },
                    task_type: task_type.as_str(),
                })
                .collect(),
        };

        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialize batch embedding request: {}", e);
                return vec![None; texts.len()];
            }
        };

        let response_text = match self.post(&self.endpoint("batchEmbedContents"), &body) {
            Ok(text) => text,
            Err(e) => {
                error!("Batch embedding request failed: {}", e);
                return vec![None; texts.len()];
            }
        };

        let response: BatchEmbedResponse = match serde_json::from_str(&response_text) {
            Ok(response) => response,
            Err(e) => {
                error!("Unexpected embedding response structure: {}", e);
                return vec![None; texts.len()];
            }
        };

        let Some(embeddings) = response.embeddings else {
            error!("Embedding response carried no embeddings field");
            return vec![None; texts.len()];
        };

        let mut vectors: Vec<Option<Vec<f32>>> = embeddings
            .into_iter()
            .map(|embedding| match embedding.values {
                Some(values) if !values.is_empty() => Some(values),
                _ => {
                    warn!("Received invalid embedding format for one item");
                    None
                }
            })
            .collect();

        // Keep outputs aligned with inputs even if the service returned a
        // short list.
        vectors.resize_with(texts.len(), || None);
        vectors
    }

    fn post(&self, url: &str, body: &str) -> Result<String, ureq::Error> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        self.agent
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key)
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
    }
}

impl QueryEmbedder for GeminiClient {
    /// Embed a single guest question with the query task hint.
    ///
    /// Any failure (missing credentials, transport error, malformed vector)
    /// returns `None`; the caller degrades to an apology instead of erroring.
    #[inline]
    fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        if self.configured().is_none() {
            error!("Google API key or embedding model not configured for embeddings");
            return None;
        }

        let request = EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: vec![ContentPart { text }],
            },
            task_type: TaskType::RetrievalQuery.as_str(),
        };

        let body = serde_json::to_string(&request).ok()?;
        let response_text = match self.post(&self.endpoint("embedContent"), &body) {
            Ok(response_text) => response_text,
            Err(e) => {
                error!("Error embedding query: {}", e);
                return None;
            }
        };

        let response: EmbedContentResponse = match serde_json::from_str(&response_text) {
            Ok(response) => response,
            Err(e) => {
                error!("Unexpected embedding response structure: {}", e);
                return None;
            }
        };

        let vector = response.embedding.and_then(|embedding| embedding.values)?;
        if vector.is_empty() {
            warn!("Received empty embedding for query");
            return None;
        }

        debug!("Generated query embedding with {} dimensions", vector.len());
        Some(vector)
    }
}
