//! Backend error handling and transient-failure classification.

use serde::Deserialize;
use thiserror::Error;

/// Errors raised by a single generation backend call.
#[derive(Error, Debug)]
pub enum BackendError {
    /// API key not found in environment variables or settings.
    #[error("{provider} API key not found. Set the {env_var} environment variable")]
    ApiKeyNotFound {
        /// Provider display name.
        provider: String,
        /// Environment variable that should hold the key.
        env_var: &'static str,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("{provider} API request failed with HTTP {status}: {message}")]
    ApiRequestFailed {
        /// Provider display name.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// `error.message` from the JSON envelope, or the raw body.
        message: String,
    },

    /// Connection-level failure before a response arrived.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request exceeded its per-request timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The response body did not have the expected shape.
    #[error("Invalid response format from {provider}: {detail}")]
    InvalidResponseFormat {
        /// Provider display name.
        provider: String,
        /// What was wrong with the payload.
        detail: String,
    },

    /// Credentials could not be obtained or were rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The selected backend has been retired.
    #[error("The {provider} backend is disabled: {reason}")]
    Disabled {
        /// Provider display name.
        provider: String,
        /// Why, and what to use instead.
        reason: String,
    },

    /// Invalid backend configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Every retry attempt failed with a transient error.
    #[error("All {attempts} attempts failed: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last transient error.
        #[source]
        source: Box<BackendError>,
    },
}

impl BackendError {
    /// Returns true for failures worth retrying: HTTP 429, HTTP 503 and
    /// network-level timeouts or connection errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiRequestFailed { status, .. } => matches!(*status, 429 | 503),
            Self::NetworkError(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiRequestFailed { status, .. } => Some(*status),
            Self::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Maps a transport error from `reqwest` into a backend error.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Extracts `error.message` from a JSON error envelope.
///
/// Falls back to the trimmed raw body when the envelope is absent or
/// unparseable.
pub(crate) fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorBody {
                message: Some(message),
            },
        }) if !message.trim().is_empty() => message,
        _ => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "<empty response body>".to_string()
            } else {
                trimmed.to_string()
            }
        }
    }
}
