// Configuration management module
// Settings are layered from an optional `staywise` config file and the
// process environment; secrets stay optional so missing ones can be
// enumerated per pipeline instead of failing at load time.


use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::warn;

use crate::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_MAX_CHUNK_CHARS};
use crate::{Result, StaywiseError};

pub const DEFAULT_EMBEDDING_DIMENSIONS: u32 = 768;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    pub pinecone_api_key: Option<String>,
    #[serde(default = "default_index_name")]
    pub pinecone_index_name: String,
    /// Deployment environment string, e.g. `aws-us-east-1` or `gcp-starter`.
    pub pinecone_environment: Option<String>,
    pub google_api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub google_embedding_model_id: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model_name: Option<String>,
    pub openrouter_site_url: Option<String>,
    pub openrouter_site_name: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_property_data_dir")]
    pub property_data_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_index_name() -> String {
    "staywise".to_string()
}

fn default_embedding_model() -> String {
    "models/embedding-001".to_string()
}

fn default_embedding_dimensions() -> u32 {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_property_data_dir() -> String {
    "./property_data".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for AppConfig {
    #[inline]
    fn default() -> Self {
        Self {
            pinecone_api_key: None,
            pinecone_index_name: default_index_name(),
            pinecone_environment: None,
            google_api_key: None,
            google_embedding_model_id: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            openrouter_api_key: None,
            openrouter_model_name: None,
            openrouter_site_url: None,
            openrouter_site_name: None,
            top_k: default_top_k(),
            max_chunk_chars: default_max_chunk_chars(),
            chunk_overlap: default_chunk_overlap(),
            property_data_dir: default_property_data_dir(),
            http_port: default_http_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional `staywise` file with environment
    /// variables taking precedence.
    #[inline]
    pub fn load() -> Result<Self> {
        let source = Config::builder()
            .add_source(File::with_name("staywise").required(false))
            .add_source(Environment::default())
            .build()
            .map_err(|e| StaywiseError::Config(e.to_string()))?;

        let config: Self = source
            .try_deserialize()
            .map_err(|e| StaywiseError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config.normalized())
    }

    /// embedding-001 always produces 768-dimension vectors; honoring a
    /// different configured value would poison the index.
    fn normalized(mut self) -> Self {
        if self.google_embedding_model_id == "models/embedding-001"
            && self.embedding_dimensions != DEFAULT_EMBEDDING_DIMENSIONS
        {
            warn!(
                "embedding_dimensions is {}, but {} produces {} dimensions; using {}",
                self.embedding_dimensions,
                self.google_embedding_model_id,
                DEFAULT_EMBEDDING_DIMENSIONS,
                DEFAULT_EMBEDDING_DIMENSIONS
            );
            self.embedding_dimensions = DEFAULT_EMBEDDING_DIMENSIONS;
        }
        self
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.max_chunk_chars {
            return Err(StaywiseError::Config(format!(
                "chunk_overlap ({}) must be smaller than max_chunk_chars ({})",
                self.chunk_overlap, self.max_chunk_chars
            )));
        }
        if self.embedding_dimensions == 0 {
            return Err(StaywiseError::Config(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(StaywiseError::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings the query path cannot run without, by their environment names.
    #[inline]
    pub fn missing_for_query(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.pinecone_api_key.is_none() {
            missing.push("PINECONE_API_KEY");
        }
        if self.pinecone_index_name.trim().is_empty() {
            missing.push("PINECONE_INDEX_NAME");
        }
        if self.google_api_key.is_none() {
            missing.push("GOOGLE_API_KEY");
        }
        if self.google_embedding_model_id.trim().is_empty() {
            missing.push("GOOGLE_EMBEDDING_MODEL_ID");
        }
        if self.openrouter_api_key.is_none() {
            missing.push("OPENROUTER_API_KEY");
        }
        if self.openrouter_model_name.is_none() {
            missing.push("OPENROUTER_MODEL_NAME");
        }
        missing
    }

    /// Settings an ingestion run cannot start without.
    #[inline]
    pub fn missing_for_ingest(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.pinecone_api_key.is_none() {
            missing.push("PINECONE_API_KEY");
        }
        if self.pinecone_environment.is_none() {
            missing.push("PINECONE_ENVIRONMENT");
        }
        if self.google_api_key.is_none() {
            missing.push("GOOGLE_API_KEY");
        }
        if self.pinecone_index_name.trim().is_empty() {
            missing.push("PINECONE_INDEX_NAME");
        }
        missing
    }
}
