//! OpenAI-compatible chat completions backend.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    build_http_client, check_error_response, decode_json, join_url, log_response_success,
    BackendError, BackendFuture, BackendMetadata, GenerationBackend, MAX_OUTPUT_TOKENS,
    TEMPERATURE,
};

/// Default OpenAI model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "OpenAI";

#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    /// Creates a client; `base_url` defaults to the public OpenAI API.
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

    fn api_url(&self) -> String {
        join_url(&self.base_url, "v1/chat/completions")
    }
}

impl GenerationBackend for OpenAiBackend {
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            debug!(
                system_prompt_len = system_prompt.len(),
                user_prompt_len = user_prompt.len(),
                model = %self.model,
                base_url = %self.base_url,
                "Preparing OpenAI request"
            );

            let mut messages = Vec::with_capacity(2);
            if !system_prompt.is_empty() {
                messages.push(Message {
                    role: "system",
                    content: system_prompt,
                });
            }
            messages.push(Message {
                role: "user",
                content: user_prompt,
            });

            let request = ChatRequest {
                model: &self.model,
                messages,
                max_tokens: MAX_OUTPUT_TOKENS,
                temperature: TEMPERATURE,
                stream: false,
            };

            let url = self.api_url();
            info!(url = %url, model = %self.model, "Sending request to OpenAI API");

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| BackendError::from_transport(&e))?;

            let response = check_error_response(PROVIDER, response).await?;
            let chat: ChatResponse = decode_json(PROVIDER, response).await?;

            debug!(
                choice_count = chat.choices.len(),
                model = ?chat.model,
                usage = ?chat.usage,
                "Received OpenAI response"
            );

            let result = chat
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| BackendError::InvalidResponseFormat {
                    provider: PROVIDER.to_string(),
                    detail: "no message content in choices".to_string(),
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn backend(server: &MockServer) -> OpenAiBackend {
        OpenAiBackend::new("gpt-test".to_string(), "sk-test".to_string(), Some(server.uri()))
            .unwrap()
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-test",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "feat: add x"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = backend(&server).await.send_request("sys", "diff").await.unwrap();
        assert_eq!(text, "feat: add x");
    }

    #[tokio::test]
    async fn error_envelope_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "model not found", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let err = backend(&server).await.send_request("s", "u").await.unwrap_err();
        match err {
            BackendError::ApiRequestFailed {
                status, message, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "model not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_text_error_body_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&server)
            .await;

        let err = backend(&server).await.send_request("s", "u").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("HTTP 503: upstream overloaded"));
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = backend(&server).await.send_request("s", "u").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponseFormat { .. }));
        assert!(!err.is_retryable());
    }
}
