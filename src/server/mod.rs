// Server module
// Thin HTTP front end over the answer service. Clients are built once at
// startup; request handling stays stateless and each question runs on the
// blocking pool since the underlying pipeline is synchronous.


use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::answer::AnswerService;
use crate::config::AppConfig;
use crate::embeddings::GeminiClient;
use crate::llm::OpenRouterClient;
use crate::vector_store::{IndexHandle, PineconeClient};
use crate::{Result, StaywiseError};

const CONFIG_ERROR_MESSAGE: &str = "Server configuration error. Cannot process request.";
const MISSING_QUESTION_MESSAGE: &str = "Missing 'question' in JSON payload";

#[derive(Clone)]
pub struct AppState {
    service: Arc<AnswerService<GeminiClient, IndexHandle, OpenRouterClient>>,
    configured: bool,
}

impl AppState {
    /// Build all pipeline clients up front. A vector store that cannot be
    /// reached at startup is logged and degraded, not fatal; requests then
    /// receive the store-unavailable apology.
    #[inline]
    pub fn initialize(config: AppConfig) -> Self {
        let missing = config.missing_for_query();
        let configured = missing.is_empty();
        if !configured {
            warn!(
                "Query path is missing configuration: {}; requests will be rejected",
                missing.join(", ")
            );
        }

        let embedder = GeminiClient::new(&config);
        let chat = OpenRouterClient::new(&config);
        let index = config.pinecone_api_key.as_deref().and_then(|api_key| {
            let store = PineconeClient::new(api_key);
            match store.index(&config.pinecone_index_name) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!(
                        "Could not connect to index '{}': {}",
                        config.pinecone_index_name, e
                    );
                    None
                }
            }
        });

        Self {
            service: Arc::new(AnswerService::new(config, embedder, index, chat)),
            configured,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
    #[serde(default, alias = "propertyId")]
    property_id: Option<String>,
}

#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/api/ask", post(ask))
        .with_state(state)
}

/// Bind and run the HTTP server until shutdown.
#[inline]
pub async fn serve(config: AppConfig) -> Result<()> {
    let port = config.http_port;
    let state = AppState::initialize(config);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| StaywiseError::Other(e.into()))
}

async fn liveness() -> &'static str {
    "Guest question answering service is running.\n"
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(json!({ "error": message }))).into_response()
}

async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<axum::Json<AskRequest>, JsonRejection>,
) -> Response {
    let axum::Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let question = match request.question.as_deref().map(str::trim) {
        Some(question) if !question.is_empty() => question.to_string(),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, MISSING_QUESTION_MESSAGE);
        }
    };

    if !state.configured {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, CONFIG_ERROR_MESSAGE);
    }

    let property_id = request.property_id;
    let service = Arc::clone(&state.service);
    let answered = tokio::task::spawn_blocking(move || {
        service.answer(&question, property_id.as_deref())
    })
    .await;

    match answered {
        Ok(answer) => (StatusCode::OK, axum::Json(json!({ "answer": answer }))).into_response(),
        Err(e) => {
            error!("Answer task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        }
    }
}
