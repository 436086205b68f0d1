// Answer module
// Orchestrates the query path: config check, index reachability, question
// embedding, retrieval, prompt composition and the LLM call. Never raises
// past this boundary; every failure becomes a user-facing apology.


use tracing::{error, info};

use crate::config::AppConfig;
use crate::embeddings::QueryEmbedder;
use crate::llm::{ChatModel, LlmError};
use crate::prompt::compose_prompt;
use crate::retrieval::{Retriever, VectorQuerier};

pub const APOLOGY_NOT_CONFIGURED: &str =
    "I'm sorry, I'm not fully configured to answer questions right now. Please contact support.";
pub const APOLOGY_STORE_UNAVAILABLE: &str =
    "I'm sorry, I can't access the property information database at the moment.";
pub const APOLOGY_EMBEDDING_FAILED: &str =
    "I'm sorry, I couldn't understand your question for searching. Could you rephrase?";
pub const APOLOGY_LLM_NOT_CONFIGURED: &str =
    "Sorry, I'm having trouble connecting to my brain right now.";
pub const APOLOGY_LLM_MALFORMED: &str =
    "Sorry, I received an unusual response. Please try again.";
pub const APOLOGY_LLM_TRANSPORT: &str =
    "Sorry, there was an error communicating with the AI. Please try again later.";

/// Stateless query-path service over injected clients. The index handle is
/// resolved once at startup; `None` means the vector store was unreachable
/// and every request gets the store-unavailable apology.
pub struct AnswerService<E, V, C> {
    config: AppConfig,
    embedder: E,
    retriever: Option<Retriever<V>>,
    chat: C,
}

impl<E, V, C> AnswerService<E, V, C>
where
    E: QueryEmbedder,
    V: VectorQuerier,
    C: ChatModel,
{
    #[inline]
    pub fn new(config: AppConfig, embedder: E, index: Option<V>, chat: C) -> Self {
        let retriever = index.map(|index| Retriever::new(index, config.top_k));
        Self {
            config,
            embedder,
            retriever,
            chat,
        }
    }

    /// Answer a guest question, optionally scoped to one property's records.
    /// Always returns a string; failure paths return apologies per category.
    #[inline]
    pub fn answer(&self, question: &str, property_id: Option<&str>) -> String {
        info!(
            "New question (property: {}): {}",
            property_id.unwrap_or("<none>"),
            question
        );

        let missing = self.config.missing_for_query();
        if !missing.is_empty() {
            error!("Missing critical configuration: {}", missing.join(", "));
            return APOLOGY_NOT_CONFIGURED.to_string();
        }

        let Some(retriever) = &self.retriever else {
            error!("Vector store index is not available");
            return APOLOGY_STORE_UNAVAILABLE.to_string();
        };

        let Some(embedding) = self.embedder.embed_query(question) else {
            return APOLOGY_EMBEDDING_FAILED.to_string();
        };

        let context = retriever.retrieve(Some(&embedding), property_id);
        if context.is_empty() {
            info!(
                "No property context found for '{}'",
                property_id.unwrap_or("<none>")
            );
        } else {
            info!("Retrieved {} context chunks", context.len());
        }

        let prompt = compose_prompt(question, &context, property_id);

        match self.chat.complete(&prompt) {
            Ok(answer) => answer,
            Err(LlmError::NotConfigured) => {
                error!("LLM API key or model name not configured");
                APOLOGY_LLM_NOT_CONFIGURED.to_string()
            }
            Err(LlmError::MalformedResponse(reason)) => {
                error!("Unexpected response structure from LLM service: {}", reason);
                APOLOGY_LLM_MALFORMED.to_string()
            }
            Err(LlmError::Transport(reason)) => {
                error!("Error calling LLM service: {}", reason);
                APOLOGY_LLM_TRANSPORT.to_string()
            }
        }
    }
}
