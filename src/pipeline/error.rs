//! Pipeline and per-chunk error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::message::ValidationError;

/// Failure of one chunk request. Chunk numbers in messages are one-based.
#[derive(Error, Debug)]
pub enum ChunkError {
    /// The backend call failed, after retries where applicable.
    #[error("chunk {}: {source}", .index + 1)]
    Backend {
        /// Zero-based chunk index.
        index: usize,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// The backend answered but nothing usable could be extracted.
    #[error("chunk {}: backend returned an empty or unusable response", .index + 1)]
    Unusable {
        /// Zero-based chunk index.
        index: usize,
    },

    /// The worker pool shut down before the chunk was processed.
    #[error("chunk {}: worker pool closed", .index + 1)]
    Interrupted {
        /// Zero-based chunk index.
        index: usize,
    },
}

impl ChunkError {
    /// Zero-based index of the failed chunk.
    pub fn index(&self) -> usize {
        match self {
            Self::Backend { index, .. } | Self::Unusable { index } | Self::Interrupted { index } => {
                *index
            }
        }
    }
}

/// Errors surfaced by [`CommitPipeline::generate`](super::CommitPipeline::generate).
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Nothing to describe.
    #[error("No staged changes: the diff is empty")]
    EmptyDiff,

    /// No commit types to choose from.
    #[error("The commit type vocabulary is empty")]
    EmptyVocabulary,

    /// The caller-supplied vocabulary could not be parsed.
    #[error("Invalid commit type vocabulary: {0}")]
    InvalidVocabulary(String),

    /// A non-chunked backend call failed.
    #[error("{stage} request failed")]
    Backend {
        /// Pipeline stage that issued the call.
        stage: &'static str,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// Every chunk failed; no partial result exists.
    #[error("All {} chunks failed: {}", .failures.len(), join_failures(.failures))]
    AllChunksFailed {
        /// One entry per chunk, in chunk order.
        failures: Vec<ChunkError>,
    },

    /// The backend answered but no commit title could be recovered.
    #[error("Backend returned an empty or unusable response during {stage}")]
    UnusableResponse {
        /// Pipeline stage that produced the response.
        stage: &'static str,
    },

    /// Strict validation rejected the final title.
    #[error("Generated title `{title}` is invalid: {source}")]
    InvalidMessage {
        /// Rejected title.
        title: String,
        /// Validation failure.
        #[source]
        source: ValidationError,
    },
}

fn join_failures(failures: &[ChunkError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
