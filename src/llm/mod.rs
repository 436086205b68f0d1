// LLM module
// Blocking OpenRouter chat-completions client with fixed decoding parameters
// tuned for factual answers. One attempt per call; transient failures are
// surfaced to the answer boundary instead of retried.


use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::AppConfig;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const TEMPERATURE: f32 = 0.4;
const MAX_TOKENS: u32 = 400;

/// Failure categories for an LLM call. The answer service maps each to a
/// distinct user-facing apology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("LLM API key or model name not configured")]
    NotConfigured,
    #[error("Unexpected response structure from LLM service: {0}")]
    MalformedResponse(String),
    #[error("Error communicating with LLM service: {0}")]
    Transport(String),
}

/// Seam for the chat model so the answer service can take a test double.
pub trait ChatModel {
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    base_url: Url,
    api_key: Option<String>,
    model: Option<String>,
    site_url: Option<String>,
    site_name: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterClient {
    #[inline]
    pub fn new(config: &AppConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();

        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default URL is valid"),
            api_key: config.openrouter_api_key.clone(),
            model: config.openrouter_model_name.clone(),
            site_url: config.openrouter_site_url.clone(),
            site_name: config.openrouter_site_name.clone(),
            agent,
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
}

/// Pull the first choice's message content out of a raw response body.
fn extract_answer(response_text: &str) -> Result<String, LlmError> {
    let response: ChatResponse = serde_json::from_str(response_text)
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| LlmError::MalformedResponse("response carried no choices".to_string()))
}

impl ChatModel for OpenRouterClient {
    #[inline]
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let (Some(api_key), Some(model)) = (self.api_key.as_deref(), self.model.as_deref())
        else {
            return Err(LlmError::NotConfigured);
        };

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        info!("Sending prompt to LLM service with model {}", model);

        let mut call = self
            .agent
            .post(url.as_str())
            .header("Authorization", &format!("Bearer {api_key}"))
            .header("Content-Type", "application/json");
        if let Some(site_url) = &self.site_url {
            call = call.header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = &self.site_name {
            call = call.header("X-Title", site_name);
        }

        let response_text = call
            .send(body.as_str())
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let answer = extract_answer(&response_text)?;
        debug!("LLM answer: {:.100}...", answer);
        Ok(answer)
    }
}
