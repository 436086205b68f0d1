// Indexer module
// Offline ingestion pipeline: read property documents, chunk, embed in
// batches and upsert into the vector store. Fatal errors (bad config, index
// mismatch) abort the run; per-item and per-batch failures are logged and
// skipped so one bad document cannot sink a whole run.


use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::chunking::{chunk_text, sanitize_property_id};
use crate::config::AppConfig;
use crate::embeddings::{EMBED_BATCH_SIZE, GeminiClient};
use crate::vector_store::{
    DeploymentSpec, IndexHandle, PineconeClient, RecordMetadata, VectorRecord,
};
use crate::{Result, StaywiseError};

const UPSERT_BATCH_SIZE: usize = 100;
const READINESS_TIMEOUT: Duration = Duration::from_secs(300);
const READINESS_INTERVAL: Duration = Duration::from_secs(10);

/// Summary of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub documents_read: usize,
    pub chunks_read: usize,
    pub vectors_upserted: usize,
}

/// One chunk of a source document, carrying everything needed to build its
/// vector record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DocumentChunk {
    property_id: String,
    original_file: String,
    chunk_index: usize,
    text: String,
}

#[derive(Debug)]
pub struct IngestionPipeline {
    config: AppConfig,
    store: PineconeClient,
    embedder: GeminiClient,
    readiness_timeout: Duration,
    readiness_interval: Duration,
}

impl IngestionPipeline {
    /// Build a pipeline from configuration, aborting with the full list of
    /// missing settings if any required one is absent.
    #[inline]
    pub fn new(config: AppConfig) -> Result<Self> {
        let missing = config.missing_for_ingest();
        if !missing.is_empty() {
            return Err(StaywiseError::MissingConfig(
                missing.iter().map(|s| (*s).to_string()).collect(),
            ));
        }
        config.validate()?;

        let api_key = config
            .pinecone_api_key
            .as_deref()
            .expect("checked by missing_for_ingest");
        let store = PineconeClient::new(api_key);
        let embedder = GeminiClient::new(&config);

        Ok(Self::with_clients(config, store, embedder))
    }

    /// Assemble a pipeline from pre-built clients. Config completeness is the
    /// caller's responsibility on this path.
    #[inline]
    pub fn with_clients(config: AppConfig, store: PineconeClient, embedder: GeminiClient) -> Self {
        Self {
            config,
            store,
            embedder,
            readiness_timeout: READINESS_TIMEOUT,
            readiness_interval: READINESS_INTERVAL,
        }
    }

    #[inline]
    pub fn with_readiness_poll(mut self, timeout: Duration, interval: Duration) -> Self {
        self.readiness_timeout = timeout;
        self.readiness_interval = interval;
        self
    }

    /// Run the full ingestion over a folder of `.txt` property documents.
    ///
    /// Re-running over unchanged documents produces identical vector ids, so
    /// the upserts overwrite prior records instead of growing the index.
    #[inline]
    pub fn run(&self, folder: &Path) -> Result<IngestionReport> {
        let index = self.ensure_index()?;

        let documents = collect_documents(folder)?;
        if documents.is_empty() {
            info!("No property documents found in {}", folder.display());
            return Ok(IngestionReport::default());
        }

        info!("Step 1: chunking {} documents", documents.len());
        let mut chunks = Vec::new();
        for document in &documents {
            let document_chunks = chunk_text(
                &document.content,
                self.config.max_chunk_chars,
                self.config.chunk_overlap,
            )?;
            if document_chunks.is_empty() {
                warn!("No valid chunks for {}", document.file_name);
                continue;
            }
            info!(
                "  {} (property '{}'): {} chunks",
                document.file_name,
                document.property_id,
                document_chunks.len()
            );
            chunks.extend(
                document_chunks
                    .into_iter()
                    .enumerate()
                    .map(|(chunk_index, text)| DocumentChunk {
                        property_id: document.property_id.clone(),
                        original_file: document.file_name.clone(),
                        chunk_index,
                        text,
                    }),
            );
        }

        if chunks.is_empty() {
            info!("No text chunks to process");
            return Ok(IngestionReport {
                documents_read: documents.len(),
                ..IngestionReport::default()
            });
        }

        info!(
            "Step 2: embedding {} chunks with '{}' (batch size {})",
            chunks.len(),
            self.config.google_embedding_model_id,
            EMBED_BATCH_SIZE
        );
        let embeddings = self.embed_chunks(&chunks);

        let records =
            build_vector_records(&chunks, &embeddings, self.config.embedding_dimensions);
        if records.is_empty() {
            info!("No valid vectors generated, nothing to upsert");
            return Ok(IngestionReport {
                documents_read: documents.len(),
                chunks_read: chunks.len(),
                vectors_upserted: 0,
            });
        }

        info!(
            "Step 3: upserting {} vectors into '{}' (batch size {})",
            records.len(),
            self.config.pinecone_index_name,
            UPSERT_BATCH_SIZE
        );
        let upserted = self.upsert_records(&index, &records);

        match index.describe_stats() {
            Ok(stats) => info!(
                "Index '{}' now holds {} vectors",
                self.config.pinecone_index_name, stats.total_vector_count
            ),
            Err(e) => warn!("Could not fetch final index stats: {}", e),
        }

        Ok(IngestionReport {
            documents_read: documents.len(),
            chunks_read: chunks.len(),
            vectors_upserted: upserted,
        })
    }

    /// Make sure the target index exists, is ready and matches the configured
    /// dimension. Creates it (deriving the deployment shape from the
    /// environment string) when absent.
    fn ensure_index(&self) -> Result<IndexHandle> {
        let name = &self.config.pinecone_index_name;
        let existing = self.store.list_indexes()?;

        if existing.iter().any(|index| &index.name == name) {
            info!("Using existing index '{}'", name);
            let description = self.store.describe_index(name)?;
            if description.dimension != self.config.embedding_dimensions {
                return Err(StaywiseError::DimensionMismatch {
                    expected: self.config.embedding_dimensions,
                    actual: description.dimension,
                });
            }
            if !description.status.ready {
                return Err(StaywiseError::ServiceUnavailable {
                    service: "vector store".to_string(),
                    reason: format!("index '{name}' exists but is not ready"),
                });
            }
        } else {
            let environment = self
                .config
                .pinecone_environment
                .as_deref()
                .unwrap_or_default();
            let spec = DeploymentSpec::parse(environment)?;
            self.store.create_index(
                name,
                self.config.embedding_dimensions,
                "cosine",
                &spec,
            )?;
            self.wait_for_ready(name)?;
        }

        self.store.index(name)
    }

    fn wait_for_ready(&self, name: &str) -> Result<()> {
        info!("Waiting for index '{}' to become ready", name);
        let started = Instant::now();
        loop {
            let description = self.store.describe_index(name)?;
            if description.status.ready {
                info!("Index '{}' created and ready", name);
                return Ok(());
            }
            if started.elapsed() >= self.readiness_timeout {
                return Err(StaywiseError::IndexNotReady(name.to_string()));
            }
            std::thread::sleep(self.readiness_interval);
        }
    }

    fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Vec<Option<Vec<f32>>> {
        let bar = progress_bar(chunks.len() as u64, "Embedding");
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            embeddings.extend(self.embedder.embed_documents(&texts));
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();
        embeddings
    }

    fn upsert_records(&self, index: &IndexHandle, records: &[VectorRecord]) -> usize {
        let bar = progress_bar(records.len() as u64, "Upserting");
        let mut upserted = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            match index.upsert(batch) {
                Ok(count) => {
                    upserted += usize::try_from(count).unwrap_or(batch.len());
                }
                Err(e) => {
                    error!("Error upserting batch: {}; continuing with remaining batches", e);
                }
            }
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();
        upserted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceDocument {
    property_id: String,
    file_name: String,
    content: String,
}

/// Enumerate readable `.txt` documents in the folder, sorted by file name so
/// runs are deterministic. Unreadable files are skipped with an error log.
fn collect_documents(folder: &Path) -> Result<Vec<SourceDocument>> {
    if !folder.is_dir() {
        return Err(StaywiseError::Config(format!(
            "property data folder not found: {}",
            folder.display()
        )));
    }

    let mut documents = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        let is_txt = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if !path.is_file() || !is_txt {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let property_id = sanitize_property_id(&file_name);
                documents.push(SourceDocument {
                    property_id,
                    file_name,
                    content,
                });
            }
            Err(e) => {
                error!("Could not read {}: {}", path.display(), e);
            }
        }
    }

    documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(documents)
}

/// Pair chunks with their embeddings, keeping only vectors of the configured
/// dimension. Ids are deterministic (`{propertyId}_chunk_{index}`) so re-runs
/// overwrite instead of duplicating.
fn build_vector_records(
    chunks: &[DocumentChunk],
    embeddings: &[Option<Vec<f32>>],
    dimension: u32,
) -> Vec<VectorRecord> {
    let mut records = Vec::with_capacity(chunks.len());
    for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
        match embedding {
            Some(values) if values.len() == dimension as usize => {
                records.push(VectorRecord {
                    id: format!("{}_chunk_{}", chunk.property_id, chunk.chunk_index),
                    values: values.clone(),
                    metadata: RecordMetadata {
                        property_id: chunk.property_id.clone(),
                        text: Some(chunk.text.clone()),
                        original_file: Some(chunk.original_file.clone()),
                    },
                });
            }
            _ => {
                warn!(
                    "Skipping chunk {} for '{}' due to embedding error",
                    chunk.chunk_index, chunk.property_id
                );
            }
        }
    }
    records
}

fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(len).with_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .expect("style template is valid"),
        )
        .with_message(message)
    } else {
        ProgressBar::hidden()
    }
}
