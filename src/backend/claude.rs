//! Anthropic messages API backend.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    build_http_client, check_error_response, decode_json, join_url, log_response_success,
    BackendError, BackendFuture, BackendMetadata, GenerationBackend, MAX_OUTPUT_TOKENS,
    TEMPERATURE,
};

/// Default Claude model.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "Anthropic";

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

/// Claude messages API client.
pub struct ClaudeBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeBackend {
    /// Creates a client; `base_url` defaults to the public Anthropic API.
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT)?,
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

impl GenerationBackend for ClaudeBackend {
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                model = %self.model,
                "Preparing Claude request"
            );
            debug!(
                system_prompt = %system_prompt,
                user_prompt = %user_prompt,
                "Claude request content"
            );

            let request = ClaudeRequest {
                model: &self.model,
                max_tokens: MAX_OUTPUT_TOKENS,
                temperature: TEMPERATURE,
                system: system_prompt,
                messages: vec![Message {
                    role: "user",
                    content: user_prompt,
                }],
            };

            let url = join_url(&self.base_url, "v1/messages");
            info!(url = %url, model = %self.model, "Sending request to Claude API");

            let response = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&request)
                .send()
                .await
                .map_err(|e| BackendError::from_transport(&e))?;

            let response = check_error_response(PROVIDER, response).await?;
            let claude: ClaudeResponse = decode_json(PROVIDER, response).await?;

            debug!(
                content_count = claude.content.len(),
                "Received Claude response"
            );

            let result = claude
                .content
                .into_iter()
                .find(|c| c.content_type == "text")
                .map(|c| c.text)
                .ok_or_else(|| BackendError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                    detail: "no text content in response".to_string(),
                });

            log_response_success(PROVIDER, &result);
            result
        })
    }

    fn get_metadata(&self) -> BackendMetadata {
        BackendMetadata {
            provider: PROVIDER.to_string(),
            model: self.model.clone(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}
