//! Generation backend trait, provider selection and shared HTTP helpers.

pub mod claude;
pub mod disabled;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_utils;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::GeminiTokenProvider;
use crate::config::BackendConfig;
use crate::message::TypeVocabulary;

pub use error::BackendError;
pub use retry::RetryPolicy;

/// Boxed future returned by backend calls.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<String, BackendError>> + Send + 'a>>;

/// Upper bound on generated tokens; commit messages are short.
pub(crate) const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Sampling temperature for all providers.
pub(crate) const TEMPERATURE: f32 = 0.2;

/// Supported backend providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions.
    #[default]
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// Google Gemini, API key or OAuth.
    Gemini,
    /// Retired text-completions endpoint.
    Legacy,
}

impl Provider {
    /// Configuration identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Legacy => "legacy",
        }
    }

    /// Human-readable provider name used in logs and errors.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Gemini",
            Self::Legacy => "Legacy Completions",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => openai::DEFAULT_MODEL,
            Self::Anthropic => claude::DEFAULT_MODEL,
            Self::Gemini => gemini::DEFAULT_MODEL,
            Self::Legacy => disabled::DEFAULT_MODEL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "legacy" | "completions" => Ok(Self::Legacy),
            other => Err(BackendError::ConfigurationError(format!(
                "unknown provider `{other}` (expected openai, anthropic, gemini or legacy)"
            ))),
        }
    }
}

/// Metadata about a backend implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendMetadata {
    /// Provider display name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// A text-generation service capable of writing commit messages.
///
/// Implementations provide one raw request primitive; the generation
/// operations are built on top of it from the shared prompt templates.
/// A single call is one network attempt: retries are the caller's concern.
pub trait GenerationBackend: Send + Sync {
    /// Sends one request and returns the raw response text.
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> BackendFuture<'a>;

    /// Returns metadata about the backend.
    fn get_metadata(&self) -> BackendMetadata;

    /// Configured model identifier.
    fn model(&self) -> String {
        self.get_metadata().model
    }

    /// Generates a raw single-line commit title for `diff`.
    fn generate_message<'a>(
        &'a self,
        diff: &'a str,
        vocabulary: &'a TypeVocabulary,
        context: Option<&'a str>,
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let user_prompt = prompts::diff_user_prompt(diff, vocabulary, context);
            self.send_request(prompts::MESSAGE_SYSTEM_PROMPT, &user_prompt)
                .await
        })
    }

    /// Generates raw `Title:` / `Body:` output for `diff`.
    fn generate_detailed<'a>(
        &'a self,
        diff: &'a str,
        vocabulary: &'a TypeVocabulary,
        context: Option<&'a str>,
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let user_prompt = prompts::diff_user_prompt(diff, vocabulary, context);
            self.send_request(prompts::DETAILED_SYSTEM_PROMPT, &user_prompt)
                .await
        })
    }
}

/// Selects and constructs the backend named by `config`.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn GenerationBackend>, BackendError> {
    let provider = config.provider;
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());

    info!(provider = %provider, model = %model, "Creating generation backend");

    let backend: Arc<dyn GenerationBackend> = match provider {
        Provider::OpenAi => {
            let api_key = require_key(provider, config.api_key.as_ref(), "OPENAI_API_KEY")?;
            Arc::new(openai::OpenAiBackend::new(
                model,
                api_key,
                config.base_url.clone(),
            )?)
        }
        Provider::Anthropic => {
            let api_key = require_key(provider, config.api_key.as_ref(), "ANTHROPIC_API_KEY")?;
            Arc::new(claude::ClaudeBackend::new(
                model,
                api_key,
                config.base_url.clone(),
            )?)
        }
        Provider::Gemini => {
            let auth = match (&config.api_key, &config.oauth) {
                (Some(key), _) => gemini::GeminiAuth::ApiKey(key.clone()),
                (None, Some(oauth)) => gemini::GeminiAuth::OAuth(Arc::new(
                    GeminiTokenProvider::new(oauth.clone(), config.credentials_path.clone())?,
                )),
                (None, None) => {
                    return Err(BackendError::ApiKeyNotFound {
                        provider: provider.display_name().to_string(),
                        env_var: "GEMINI_API_KEY",
                    })
                }
            };
            Arc::new(gemini::GeminiBackend::new(model, auth, config.base_url.clone())?)
        }
        Provider::Legacy => Arc::new(disabled::LegacyCompletionsBackend::new(model)),
    };

    Ok(backend)
}

fn require_key(
    provider: Provider,
    key: Option<&String>,
    env_var: &'static str,
) -> Result<String, BackendError> {
    key.filter(|k| !k.trim().is_empty())
        .cloned()
        .ok_or_else(|| BackendError::ApiKeyNotFound {
            provider: provider.display_name().to_string(),
            env_var,
        })
}

// ── Shared helpers for backend implementations ──────────────────────

/// Builds an HTTP client with the given per-request timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::ConfigurationError(format!("failed to build HTTP client: {e}")))
}

/// Joins a base URL and an endpoint path without doubling slashes.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Checks an HTTP response for error status.
///
/// On success, returns the response unchanged. On failure, reads the body
/// and returns [`BackendError::ApiRequestFailed`] carrying the status and
/// the best-effort `error.message`.
pub(crate) async fn check_error_response(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });
    Err(BackendError::ApiRequestFailed {
        provider: provider.to_string(),
        status: status.as_u16(),
        message: error::extract_error_message(&error_text),
    })
}

/// Decodes a JSON response body, mapping failures to an invalid-format error.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    response
        .json()
        .await
        .map_err(|e| BackendError::InvalidResponseFormat {
            provider: provider.to_string(),
            detail: e.to_string(),
        })
}

/// Logs successful text extraction from a provider response.
pub(crate) fn log_response_success(provider: &str, result: &Result<String, BackendError>) {
    if let Ok(text) = result {
        debug!(
            response_len = text.len(),
            "Successfully extracted text content from {} response", provider
        );
        debug!(response_content = %text, "{} response content", provider);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::OAuthClientConfig;

    fn config(provider: Provider) -> BackendConfig {
        BackendConfig {
            provider,
            ..BackendConfig::default()
        }
    }

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!(" gemini ".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("legacy".parse::<Provider>().unwrap(), Provider::Legacy);
        assert!("bard".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_round_trips_through_display() {
        for provider in [
            Provider::OpenAi,
            Provider::Anthropic,
            Provider::Gemini,
            Provider::Legacy,
        ] {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn missing_key_is_reported_with_env_var() {
        let err = create_backend(&config(Provider::OpenAi)).err().unwrap();
        assert!(matches!(
            err,
            BackendError::ApiKeyNotFound {
                env_var: "OPENAI_API_KEY",
                ..
            }
        ));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let mut cfg = config(Provider::Anthropic);
        cfg.api_key = Some("  ".to_string());
        assert!(matches!(
            create_backend(&cfg).err().unwrap(),
            BackendError::ApiKeyNotFound { .. }
        ));
    }

    #[test]
    fn default_model_is_used_when_unset() {
        let mut cfg = config(Provider::Anthropic);
        cfg.api_key = Some("sk-test".to_string());
        let backend = create_backend(&cfg).unwrap();
        assert_eq!(backend.model(), claude::DEFAULT_MODEL);
        assert_eq!(backend.get_metadata().provider, "Anthropic");
    }

    #[test]
    fn gemini_requires_key_or_oauth() {
        assert!(matches!(
            create_backend(&config(Provider::Gemini)).err().unwrap(),
            BackendError::ApiKeyNotFound {
                env_var: "GEMINI_API_KEY",
                ..
            }
        ));

        let mut cfg = config(Provider::Gemini);
        cfg.oauth = Some(OAuthClientConfig {
            client_id: "id".to_string(),
            client_secret: Some("secret".to_string()),
        });
        cfg.credentials_path = Some(std::env::temp_dir().join("commitsmith-unused-credentials.json"));
        let backend = create_backend(&cfg).unwrap();
        assert_eq!(backend.get_metadata().request_timeout, gemini::REQUEST_TIMEOUT);
    }

    #[test]
    fn legacy_backend_needs_no_credentials() {
        let backend = create_backend(&config(Provider::Legacy)).unwrap();
        assert_eq!(backend.get_metadata().provider, "Legacy Completions");
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("http://localhost:8080/", "/v1/messages"),
            "http://localhost:8080/v1/messages"
        );
        assert_eq!(join_url("http://h", "v1/x"), "http://h/v1/x");
    }
}
