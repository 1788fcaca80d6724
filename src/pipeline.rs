//! Diff-to-commit-message generation pipeline.
//!
//! A diff is summarized, split into chunks when it exceeds the chunk
//! budget, sent to the backend chunk by chunk, merged, extracted,
//! validated and finally styled.

pub mod error;
pub mod orchestrator;

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{BackendFuture, GenerationBackend};
use crate::config::PipelineConfig;
use crate::diff::{chunk_diff, prepare_diff, summarize, truncate_diff, DiffSummary};
use crate::message::{
    extract_commit_message, parse_title_body, CommitResult, StyleOptions, TypeCheck,
    TypeVocabulary, Validator,
};

pub use error::{ChunkError, PipelineError};
pub use orchestrator::{ChunkOrchestrator, ChunkResult, MergeOutcome};

/// What to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationMode {
    /// A single title line.
    #[default]
    Message,
    /// A title plus bullet-point body.
    Detailed,
}

impl GenerationMode {
    /// Issues the generation request matching this mode.
    pub(crate) fn request<'a>(
        self,
        backend: &'a dyn GenerationBackend,
        diff: &'a str,
        vocabulary: &'a TypeVocabulary,
        context: Option<&'a str>,
    ) -> BackendFuture<'a> {
        match self {
            Self::Message => backend.generate_message(diff, vocabulary, context),
            Self::Detailed => backend.generate_detailed(diff, vocabulary, context),
        }
    }
}

/// Turns raw backend output into a commit result, if anything is usable.
///
/// Detailed output is split on its `Title:`/`Body:` markers and the title
/// then goes through the same extraction as message mode.
pub(crate) fn interpret(
    mode: GenerationMode,
    raw: &str,
    validator: &Validator<'_>,
) -> Option<CommitResult> {
    match mode {
        GenerationMode::Message => {
            let title = extract_commit_message(raw, validator);
            (!title.is_empty()).then(|| CommitResult::new(title, None))
        }
        GenerationMode::Detailed => {
            let mut parsed = parse_title_body(raw);
            let title = extract_commit_message(&parsed.message, validator);
            if title.is_empty() {
                return None;
            }
            parsed.message = title;
            Some(parsed)
        }
    }
}

/// Input for one pipeline run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Unified diff text.
    pub diff: String,
    /// Allowed commit types.
    pub vocabulary: TypeVocabulary,
    /// Free-form extra context for the model.
    pub context: Option<String>,
    /// Title only, or title and body.
    pub mode: GenerationMode,
    /// Post-processing of the final title.
    pub style: StyleOptions,
}

impl GenerationRequest {
    /// Creates a plain message-mode request.
    pub fn new(diff: impl Into<String>, vocabulary: TypeVocabulary) -> Self {
        Self {
            diff: diff.into(),
            vocabulary,
            context: None,
            mode: GenerationMode::Message,
            style: StyleOptions::default(),
        }
    }

    /// Sets extra context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Sets the generation mode.
    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the title style.
    pub fn with_style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }
}

/// Result of a pipeline run with diagnostics.
#[derive(Debug)]
pub struct GenerationReport {
    /// The commit message.
    pub result: CommitResult,
    /// Summarization bookkeeping for the input diff.
    pub summary: DiffSummary,
    /// Number of backend generation units: 1 unless the diff was chunked.
    pub chunk_count: usize,
    /// Chunks that failed while others succeeded.
    pub chunk_failures: Vec<ChunkError>,
    /// True if the merge call failed and a chunk result was used instead.
    pub merge_fallback: bool,
    /// True if the diff was truncated instead of chunked.
    pub truncated: bool,
}

/// Generates commit messages with one backend.
pub struct CommitPipeline {
    backend: Arc<dyn GenerationBackend>,
    config: PipelineConfig,
}

impl CommitPipeline {
    /// Creates a pipeline around `backend`.
    pub fn new(backend: Arc<dyn GenerationBackend>, config: PipelineConfig) -> Self {
        Self { backend, config }
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline for one request.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationReport, PipelineError> {
        if request.diff.trim().is_empty() {
            return Err(PipelineError::EmptyDiff);
        }
        if request.vocabulary.is_empty() {
            return Err(PipelineError::EmptyVocabulary);
        }

        let metadata = self.backend.get_metadata();
        info!(
            provider = %metadata.provider,
            model = %metadata.model,
            diff_size = request.diff.len(),
            mode = ?request.mode,
            "Generating commit message"
        );

        let validator = Validator::new(&request.vocabulary, self.config.type_check);
        let summarized = summarize(&request.diff, self.config.chunk_budget);
        let context = combine_context(
            request.context.as_deref(),
            summarized.summary.disclosure().as_deref(),
        );
        let prepared = prepare_diff(&summarized.diff, self.config.min_diff_size);

        let mut report = GenerationReport {
            result: CommitResult::new(String::new(), None),
            summary: summarized.summary.clone(),
            chunk_count: 1,
            chunk_failures: Vec::new(),
            merge_fallback: false,
            truncated: false,
        };

        let result = if prepared.len() <= self.config.chunk_budget {
            self.single_pass(&prepared, request, context.as_deref(), &validator)
                .await?
        } else if self.config.chunking {
            let chunks = chunk_diff(&prepared, self.config.chunk_budget);
            report.chunk_count = chunks.len();

            let orchestrator = ChunkOrchestrator::new(
                self.backend.as_ref(),
                &request.vocabulary,
                validator,
                self.config.retry,
                self.config.concurrency,
                request.mode,
            );
            let outcome = orchestrator.run(&chunks, context.as_deref()).await?;
            report.merge_fallback = outcome.merge_fallback;
            report.chunk_failures = outcome
                .chunk_results
                .into_iter()
                .filter_map(|r| r.error)
                .collect();
            outcome.result
        } else {
            let truncated = truncate_diff(
                &prepared,
                self.config.truncate_budget,
                self.config.header_lines,
            );
            report.truncated = matches!(truncated, Cow::Owned(_));
            self.single_pass(&truncated, request, context.as_deref(), &validator)
                .await?
        };

        if let Err(e) = validator.validate(&result.message) {
            match self.config.type_check {
                TypeCheck::Strict => {
                    return Err(PipelineError::InvalidMessage {
                        title: result.message,
                        source: e,
                    })
                }
                TypeCheck::Permissive => {
                    warn!(title = %result.message, error = %e, "Generated title failed validation");
                }
            }
        }

        report.result = result.styled(&request.style);
        debug!(title = %report.result.message, "Commit message ready");
        Ok(report)
    }

    async fn single_pass(
        &self,
        diff: &str,
        request: &GenerationRequest,
        context: Option<&str>,
        validator: &Validator<'_>,
    ) -> Result<CommitResult, PipelineError> {
        debug!(diff_size = diff.len(), "Single-pass generation");
        let raw = self
            .config
            .retry
            .run("generate", || {
                request
                    .mode
                    .request(self.backend.as_ref(), diff, &request.vocabulary, context)
            })
            .await
            .map_err(|source| PipelineError::Backend {
                stage: "generation",
                source,
            })?;

        interpret(request.mode, &raw, validator).ok_or(PipelineError::UnusableResponse {
            stage: "generation",
        })
    }
}

/// Joins caller context and the compression disclosure.
fn combine_context(context: Option<&str>, disclosure: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [context, disclosure]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}
