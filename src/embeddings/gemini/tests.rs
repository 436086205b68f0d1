use super::*;

fn configured_client() -> GeminiClient {
    let config = AppConfig {
        google_api_key: Some("test-key".to_string()),
        ..AppConfig::default()
    };
    GeminiClient::new(&config)
}

#[test]
fn task_type_hints() {
    assert_eq!(TaskType::RetrievalQuery.as_str(), "RETRIEVAL_QUERY");
    assert_eq!(TaskType::RetrievalDocument.as_str(), "RETRIEVAL_DOCUMENT");
}

#[test]
fn client_configuration() {
    let client = configured_client();
    assert_eq!(client.model, "models/embedding-001");
    assert_eq!(client.api_key.as_deref(), Some("test-key"));
    assert_eq!(client.batch_pause, DEFAULT_BATCH_PAUSE);
}

#[test]
fn builder_overrides() {
    let base = Url::parse("http://localhost:9999").expect("valid URL");
    let client = configured_client()
        .with_base_url(base.clone())
        .with_batch_pause(Duration::ZERO);

    assert_eq!(client.base_url, base);
    assert!(client.batch_pause.is_zero());
}

#[test]
fn endpoint_joins_model_and_operation() {
    let client = configured_client()
        .with_base_url(Url::parse("http://localhost:9999").expect("valid URL"));

    assert_eq!(
        client.endpoint("embedContent"),
        "http://localhost:9999/models/embedding-001:embedContent"
    );
}

#[test]
fn unconfigured_query_embedding_is_none() {
    let client = GeminiClient::new(&AppConfig::default());
    assert!(client.embed_query("what is the wifi password?").is_none());
}

#[test]
fn unconfigured_document_embedding_yields_all_none() {
    let client = GeminiClient::new(&AppConfig::default());
    let results = client.embed_documents(&["a".to_string(), "b".to_string()]);
    assert_eq!(results, vec![None, None]);
}

#[test]
fn empty_document_batch_is_empty() {
    let client = configured_client();
    assert!(client.embed_documents(&[]).is_empty());
}
