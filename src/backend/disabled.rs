//! Retired text-completions backend.
//!
//! Still selectable so existing configuration parses, but every call fails
//! with a non-retryable [`BackendError::Disabled`].

use std::time::Duration;

use tracing::warn;

use super::{BackendError, BackendFuture, BackendMetadata, GenerationBackend};

/// Model name the legacy backend used to default to.
pub const DEFAULT_MODEL: &str = "text-davinci-003";

const PROVIDER: &str = "Legacy Completions";
const REASON: &str =
    "the text completions endpoint has been retired; use `--provider openai` instead";

/// Backend whose every call fails.
#[derive(Debug, Clone)]
pub struct LegacyCompletionsBackend {
    model: String,
}

impl LegacyCompletionsBackend {
    /// Creates the disabled backend.
    pub fn new(model: String) -> Self {
        Self { model }
    }
}

impl GenerationBackend for LegacyCompletionsBackend {
    fn send_request<'a>(&'a self, _system_prompt: &'a str, _user_prompt: &'a str) -> BackendFuture<'a> {
        Box::pin(async move {
            warn!(model = %self.model, "Legacy completions backend is disabled");
            Err(BackendError::Disabled {
                provider: PROVIDER.to_string(),
                reason: REASON.to_string(),
            })
        })
    }

    fn get_metadata(&self) -> BackendMetadata {
        BackendMetadata {
            provider: PROVIDER.to_string(),
            model: self.model.clone(),
            request_timeout: Duration::ZERO,
        }
    }
}
