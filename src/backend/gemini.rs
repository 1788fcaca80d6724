//! Google Gemini `generateContent` backend.
//!
//! Authenticates with either an API key or an OAuth access token obtained
//! through the browser flow in [`crate::auth`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    build_http_client, check_error_response, decode_json, join_url, log_response_success,
    BackendError, BackendFuture, BackendMetadata, GenerationBackend, MAX_OUTPUT_TOKENS,
    TEMPERATURE,
};
use crate::auth::GeminiTokenProvider;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const PROVIDER: &str = "Gemini";

/// How requests are authenticated.
#[derive(Clone)]
pub enum GeminiAuth {
    /// Static API key sent as `x-goog-api-key`.
    ApiKey(String),
    /// OAuth bearer token, refreshed on demand.
    OAuth(Arc<GeminiTokenProvider>),
}

impl std::fmt::Debug for GeminiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::OAuth(_) => f.write_str("OAuth"),
        }
    }
}

#[derive(Deserialize, Debug)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Debug)]
struct SystemInstruction<'a> {
    parts: [PartRef<'a>; 1],
}

#[derive(Serialize, Debug)]
struct PartRef<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [PartRef<'a>; 1],
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// Gemini API client.
pub struct GeminiBackend {
    client: Client,
    auth: GeminiAuth,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    /// Creates a client; `base_url` defaults to the public Gemini API.
    pub fn new(
        model: String,
        auth: GeminiAuth,
        base_url: Option<String>,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_http_client(REQUEST_TIMEOUT)?,
            auth,
            model,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn api_url(&self) -> String {
        join_url(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", self.model),
        )
    }
}

impl GenerationBackend for GeminiBackend {
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                model = %self.model,
                auth = ?self.auth,
                "Preparing Gemini request"
            );

            let request = GenerateRequest {
                system_instruction: (!system_prompt.is_empty()).then(|| SystemInstruction {
                    parts: [PartRef {
                        text: system_prompt,
                    }],
                }),
                contents: [RequestContent {
                    role: "user",
                    parts: [PartRef { text: user_prompt }],
                }],
                generation_config: GenerationConfig {
                    temperature: TEMPERATURE,
                    max_output_tokens: MAX_OUTPUT_TOKENS,
                },
            };

            let url = self.api_url();
            info!(url = %url, model = %self.model, "Sending request to Gemini API");

            let builder = self.client.post(&url).json(&request);
            let builder = match &self.auth {
                GeminiAuth::ApiKey(key) => builder.header("x-goog-api-key", key),
                GeminiAuth::OAuth(tokens) => {
                    let token = tokens
                        .access_token()
                        .await
                        .map_err(|e| BackendError::AuthenticationFailed(e.to_string()))?;
                    builder.bearer_auth(token)
                }
            };

            let response = builder
                .send()
                .await
                .map_err(|e| BackendError::from_transport(&e))?;

            let response = check_error_response(PROVIDER, response).await?;
            let generated: GenerateResponse = decode_json(PROVIDER, response).await?;

            debug!(
                candidate_count = generated.candidates.len(),
                finish_reason = ?generated.candidates.first().and_then(|c| c.finish_reason.as_deref()),
                "Received Gemini response"
            );

            let result = generated
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|content| {
                    content
                        .parts
                        .into_iter()
                        .map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .filter(|text| !text.is_empty())
                .ok_or_else(|| BackendError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                    detail: "no text in first candidate".to_string(),
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
