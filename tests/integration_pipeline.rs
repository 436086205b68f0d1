//! End-to-end pipeline tests against mocked embedding, vector store and LLM
//! services. The ingestion side writes real files to a temp folder; the query
//! side drives the full answer path through HTTP mocks.

use std::fs;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use staywise::StaywiseError;
use staywise::answer::AnswerService;
use staywise::config::AppConfig;
use staywise::embeddings::GeminiClient;
use staywise::indexer::IngestionPipeline;
use staywise::llm::OpenRouterClient;
use staywise::vector_store::PineconeClient;

const WIFI_CHUNK: &str =
    "Welcome to Unit 4B. The wifi network is StayConnect and the wifi password is Sunshine123.";

fn test_config() -> AppConfig {
    AppConfig {
        pinecone_api_key: Some("test-pinecone-key".to_string()),
        pinecone_environment: Some("aws-us-east-1".to_string()),
        google_api_key: Some("test-google-key".to_string()),
        openrouter_api_key: Some("test-openrouter-key".to_string()),
        openrouter_model_name: Some("test/model".to_string()),
        embedding_dimensions: 3,
        ..AppConfig::default()
    }
}

fn base_url(server: &MockServer) -> Url {
    Url::parse(&server.uri()).expect("mock server URI is a valid URL")
}

/// Index description pointing the data plane back at the same mock server.
fn index_description(server: &MockServer, name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "dimension": 3,
        "metric": "cosine",
        "host": server.uri(),
        "status": { "ready": true, "state": "Ready" }
    })
}

async fn mount_control_plane(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "indexes": [index_description(server, name)]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/indexes/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_description(server, name)))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn ingestion_chunks_embeds_and_upserts() {
    let server = MockServer::start().await;
    let config = test_config();
    mount_control_plane(&server, &config.pinecone_index_name).await;

    Mock::given(method("POST"))
        .and(path("/models/embedding-001:batchEmbedContents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [{ "values": [0.1, 0.2, 0.3] }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(body_string_contains("Unit_4B_chunk_0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalVectorCount": 1 })))
        .mount(&server)
        .await;

    let folder = tempfile::tempdir().expect("temp dir");
    fs::write(folder.path().join("Unit 4B.txt"), WIFI_CHUNK).expect("write document");

    let pipeline = ingestion_pipeline(&server, config);

    let folder_path = folder.path().to_path_buf();
    let first = {
        let pipeline = &pipeline;
        let path = folder_path.clone();
        tokio::task::block_in_place(move || pipeline.run(&path)).expect("first run")
    };
    assert_eq!(first.documents_read, 1);
    assert_eq!(first.chunks_read, 1);
    assert_eq!(first.vectors_upserted, 1);

    // A second run over unchanged documents produces the same vector ids and
    // counts.
    let second = {
        let pipeline = &pipeline;
        tokio::task::block_in_place(move || pipeline.run(&folder_path)).expect("second run")
    };
    assert_eq!(second, first);
}

#[tokio::test(flavor = "multi_thread")]
async fn ingestion_creates_a_missing_index() {
    let server = MockServer::start().await;
    let config = test_config();
    let name = config.pinecone_index_name.clone();

    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "indexes": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_string_contains("serverless"))
        .and(body_string_contains("us-east-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(index_description(&server, &name)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/indexes/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_description(&server, &name)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalVectorCount": 0 })))
        .mount(&server)
        .await;

    let folder = tempfile::tempdir().expect("temp dir");

    let pipeline = ingestion_pipeline(&server, config)
        .with_readiness_poll(Duration::from_secs(1), Duration::from_millis(10));

    let report = {
        let path = folder.path().to_path_buf();
        tokio::task::block_in_place(move || pipeline.run(&path)).expect("run")
    };
    assert_eq!(report.documents_read, 0);
    assert_eq!(report.vectors_upserted, 0);
}

fn ingestion_pipeline(server: &MockServer, config: AppConfig) -> IngestionPipeline {
    let store = PineconeClient::new("test-pinecone-key").with_base_url(base_url(server));
    let embedder = GeminiClient::new(&config)
        .with_base_url(base_url(server))
        .with_batch_pause(Duration::ZERO);
    IngestionPipeline::with_clients(config, store, embedder)
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatched_index_dimension_aborts_ingestion() {
    let server = MockServer::start().await;
    let config = test_config();
    let name = config.pinecone_index_name.clone();

    let description = json!({
        "name": name,
        "dimension": 4,
        "metric": "cosine",
        "host": server.uri(),
        "status": { "ready": true, "state": "Ready" }
    });
    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "indexes": [description.clone()] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/indexes/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(description))
        .mount(&server)
        .await;

    let folder = tempfile::tempdir().expect("temp dir");
    let pipeline = ingestion_pipeline(&server, config);

    let result = {
        let path = folder.path().to_path_buf();
        tokio::task::block_in_place(move || pipeline.run(&path))
    };
    match result {
        Err(StaywiseError::DimensionMismatch { expected, actual }) => {
            assert_eq!(expected, 3);
            assert_eq!(actual, 4);
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn index_that_never_becomes_ready_aborts_ingestion() {
    let server = MockServer::start().await;
    let config = test_config();
    let name = config.pinecone_index_name.clone();

    Mock::given(method("GET"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "indexes": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": name })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/indexes/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": name,
            "dimension": 3,
            "host": server.uri(),
            "status": { "ready": false, "state": "Initializing" }
        })))
        .mount(&server)
        .await;

    let folder = tempfile::tempdir().expect("temp dir");
    let pipeline = ingestion_pipeline(&server, config)
        .with_readiness_poll(Duration::from_millis(50), Duration::from_millis(10));

    let result = {
        let path = folder.path().to_path_buf();
        tokio::task::block_in_place(move || pipeline.run(&path))
    };
    match result {
        Err(StaywiseError::IndexNotReady(index)) => assert_eq!(index, "staywise"),
        other => panic!("expected IndexNotReady, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_upsert_batch_does_not_sink_the_run() {
    let server = MockServer::start().await;
    let config = test_config();
    mount_control_plane(&server, &config.pinecone_index_name).await;

    // One embedding request per 100 chunks; extra values are truncated to the
    // request size, so a fixed 100-vector response serves both batches.
    let vectors: Vec<serde_json::Value> =
        (0..100).map(|_| json!({ "values": [0.1, 0.2, 0.3] })).collect();
    Mock::given(method("POST"))
        .and(path("/models/embedding-001:batchEmbedContents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": vectors })))
        .mount(&server)
        .await;

    // 101 single-chunk documents split the upsert into a batch of 100 and a
    // batch of 1. The first fails; the run must continue into the second.
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(body_string_contains("doc_000_chunk_0"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(body_string_contains("doc_100_chunk_0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalVectorCount": 1 })))
        .mount(&server)
        .await;

    let folder = tempfile::tempdir().expect("temp dir");
    for i in 0..101 {
        fs::write(
            folder.path().join(format!("doc_{i:03}.txt")),
            format!("Property document {i:03} with plenty of descriptive text inside."),
        )
        .expect("write document");
    }

    let pipeline = ingestion_pipeline(&server, config);
    let report = {
        let path = folder.path().to_path_buf();
        tokio::task::block_in_place(move || pipeline.run(&path)).expect("run completes")
    };

    assert_eq!(report.documents_read, 101);
    assert_eq!(report.chunks_read, 101);
    assert_eq!(report.vectors_upserted, 1);
}

async fn mount_query_embedding(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/models/embedding-001:embedContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": { "values": [0.1, 0.2, 0.3] }
        })))
        .mount(server)
        .await;
}

fn answer_service(
    server: &MockServer,
    config: AppConfig,
) -> AnswerService<GeminiClient, staywise::vector_store::IndexHandle, OpenRouterClient> {
    let embedder = GeminiClient::new(&config).with_base_url(base_url(server));
    let chat = OpenRouterClient::new(&config).with_base_url(base_url(server));
    let index = PineconeClient::new("test-pinecone-key")
        .with_base_url(base_url(server))
        .index(&config.pinecone_index_name)
        .expect("index resolves against mock");
    AnswerService::new(config, embedder, Some(index), chat)
}

#[tokio::test(flavor = "multi_thread")]
async fn question_with_matching_context_is_answered_from_it() {
    let server = MockServer::start().await;
    let config = test_config();
    mount_control_plane(&server, &config.pinecone_index_name).await;
    mount_query_embedding(&server).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_string_contains(r#""propertyId":"Unit_4B""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [{
                "id": "Unit_4B_chunk_0",
                "score": 0.93,
                "metadata": {
                    "propertyId": "Unit_4B",
                    "text": WIFI_CHUNK,
                    "original_file": "Unit 4B.txt"
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Routed by the grounded-mode marker in the prompt body.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Property Information Context"))
        .and(body_string_contains("Sunshine123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "The wifi password is Sunshine123." }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = answer_service(&server, config);
    let answer = tokio::task::block_in_place(|| {
        service.answer("What is the wifi password?", Some("Unit_4B"))
    });

    assert_eq!(answer, "The wifi password is Sunshine123.");
}

#[tokio::test(flavor = "multi_thread")]
async fn question_without_context_falls_back_to_local_knowledge() {
    let server = MockServer::start().await;
    let config = test_config();
    mount_control_plane(&server, &config.pinecone_index_name).await;
    mount_query_embedding(&server).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matches": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("knowledgeable local expert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "There are several beaches nearby." }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = answer_service(&server, config);
    let answer = tokio::task::block_in_place(|| {
        service.answer("What are the best beaches?", Some("Unit_4B"))
    });

    assert_eq!(answer, "There are several beaches nearby.");
}

#[tokio::test(flavor = "multi_thread")]
async fn llm_failure_degrades_to_an_apology() {
    let server = MockServer::start().await;
    let config = test_config();
    mount_control_plane(&server, &config.pinecone_index_name).await;
    mount_query_embedding(&server).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matches": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream error"))
        .mount(&server)
        .await;

    let service = answer_service(&server, config);
    let answer =
        tokio::task::block_in_place(|| service.answer("What is the wifi password?", None));

    assert_eq!(answer, staywise::answer::APOLOGY_LLM_TRANSPORT);
}
