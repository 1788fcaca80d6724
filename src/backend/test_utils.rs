//! Shared test utilities for the `backend` module.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BackendError, BackendFuture, BackendMetadata, GenerationBackend};

type Responder = dyn Fn(&str, &str) -> Result<String, BackendError> + Send + Sync;

enum Script {
    Queue(Mutex<VecDeque<Result<String, BackendError>>>),
    Responder(Box<Responder>),
}

/// Mock backend driven by a response queue or a prompt-aware closure.
///
/// Queued responses are returned in FIFO order; when the queue is
/// exhausted, calls fail with a configuration error. With concurrent
/// chunk processing the call order is not deterministic, so tests that
/// fan out should use [`with_responder`](Self::with_responder) and answer
/// based on the prompt.
///
/// Every call records its `(system_prompt, user_prompt)` pair.
pub(crate) struct ConfigurableMockBackend {
    script: Script,
    metadata: BackendMetadata,
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl ConfigurableMockBackend {
    /// Creates a mock that returns `responses` in order.
    pub(crate) fn new(responses: Vec<Result<String, BackendError>>) -> Self {
        Self::with_script(Script::Queue(Mutex::new(VecDeque::from(responses))))
    }

    /// Creates a mock that answers each call with `responder(system, user)`.
    pub(crate) fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, BackendError> + Send + Sync + 'static,
    {
        Self::with_script(Script::Responder(Box::new(responder)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            metadata: BackendMetadata {
                provider: "Mock".to_string(),
                model: "mock-model".to_string(),
                request_timeout: Duration::from_secs(1),
            },
            recorded_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a handle for inspecting prompts after the mock is moved.
    pub(crate) fn prompt_handle(&self) -> PromptRecordHandle {
        PromptRecordHandle {
            recorded_prompts: self.recorded_prompts.clone(),
        }
    }
}

/// Shared handle to a mock backend's recorded prompts.
pub(crate) struct PromptRecordHandle {
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl PromptRecordHandle {
    /// Returns all recorded `(system_prompt, user_prompt)` pairs.
    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.recorded_prompts.lock().unwrap().clone()
    }

    /// Returns the number of requests made.
    pub(crate) fn request_count(&self) -> usize {
        self.recorded_prompts.lock().unwrap().len()
    }
}

/// Builds a fatal HTTP error for scripted failures.
pub(crate) fn http_error(status: u16) -> BackendError {
    BackendError::ApiRequestFailed {
        provider: "Mock".to_string(),
        status,
        message: format!("mock failure {status}"),
    }
}

impl GenerationBackend for ConfigurableMockBackend {
    fn send_request<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            self.recorded_prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            match &self.script {
                Script::Queue(queue) => queue.lock().unwrap().pop_front().unwrap_or_else(|| {
                    Err(BackendError::ConfigurationError(
                        "no more mock responses".to_string(),
                    ))
                }),
                Script::Responder(responder) => responder(system_prompt, user_prompt),
            }
        })
    }

    fn get_metadata(&self) -> BackendMetadata {
        self.metadata.clone()
    }
}
