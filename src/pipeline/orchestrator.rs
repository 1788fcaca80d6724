//! Per-chunk fan-out and the merge call.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::error::{ChunkError, PipelineError};
use super::{interpret, GenerationMode};
use crate::backend::prompts::{self, PartialSummary};
use crate::backend::{GenerationBackend, RetryPolicy};
use crate::diff::{affected_paths, Chunk};
use crate::message::{CommitResult, TypeVocabulary, Validator};

/// Outcome of one chunk request.
#[derive(Debug)]
pub struct ChunkResult {
    /// Zero-based chunk index.
    pub index: usize,
    /// Extracted title in message mode, raw output in detailed mode.
    /// Empty when the chunk failed.
    pub message: String,
    /// Files whose headers appear in the chunk.
    pub files: Vec<String>,
    /// Failure, if any.
    pub error: Option<ChunkError>,
}

impl ChunkResult {
    /// Returns true if the chunk produced a usable result.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Final result of a chunked run.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Synthesized commit message.
    pub result: CommitResult,
    /// Every chunk result in index order, failures included.
    pub chunk_results: Vec<ChunkResult>,
    /// True if a merge call produced `result`.
    pub merged: bool,
    /// True if the merge call failed and the first successful chunk was used.
    pub merge_fallback: bool,
}

impl MergeOutcome {
    /// Failures of individual chunks, for diagnostics.
    pub fn failures(&self) -> impl Iterator<Item = &ChunkError> {
        self.chunk_results.iter().filter_map(|r| r.error.as_ref())
    }
}

/// Runs one backend call per chunk and synthesizes a single result.
pub struct ChunkOrchestrator<'a> {
    backend: &'a dyn GenerationBackend,
    vocabulary: &'a TypeVocabulary,
    validator: Validator<'a>,
    retry: RetryPolicy,
    concurrency: usize,
    mode: GenerationMode,
}

impl<'a> ChunkOrchestrator<'a> {
    /// Creates an orchestrator; at most `concurrency` chunk requests run at once.
    pub fn new(
        backend: &'a dyn GenerationBackend,
        vocabulary: &'a TypeVocabulary,
        validator: Validator<'a>,
        retry: RetryPolicy,
        concurrency: usize,
        mode: GenerationMode,
    ) -> Self {
        Self {
            backend,
            vocabulary,
            validator,
            retry,
            concurrency: concurrency.max(1),
            mode,
        }
    }

    /// Processes `chunks` and merges the results.
    pub async fn run(
        &self,
        chunks: &[Chunk],
        context: Option<&str>,
    ) -> Result<MergeOutcome, PipelineError> {
        let results = self.process_chunks(chunks, context).await;
        self.merge(results, context).await
    }

    /// Sends every chunk to the backend, bounded by the concurrency limit.
    ///
    /// Results come back in chunk order regardless of completion order.
    pub async fn process_chunks(&self, chunks: &[Chunk], context: Option<&str>) -> Vec<ChunkResult> {
        let total = chunks.len();
        info!(
            chunk_count = total,
            concurrency = self.concurrency,
            "Processing diff in chunks"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let futs: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                let sem = semaphore.clone();

                async move {
                    match sem.acquire().await {
                        Ok(_permit) => self.process_chunk(chunk, total, context).await,
                        Err(_) => ChunkResult {
                            index: chunk.index,
                            message: String::new(),
                            files: affected_paths(&chunk.text),
                            error: Some(ChunkError::Interrupted { index: chunk.index }),
                        },
                    }
                }
            })
            .collect();

        futures::future::join_all(futs).await
    }

    async fn process_chunk(&self, chunk: &Chunk, total: usize, context: Option<&str>) -> ChunkResult {
        let index = chunk.index;
        let files = affected_paths(&chunk.text);
        let note = format!("(processing chunk {} of {total})", index + 1);
        let chunk_context = match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(context) => format!("{context} {note}"),
            None => note,
        };

        debug!(
            chunk_index = index,
            chunk_size = chunk.text.len(),
            file_count = files.len(),
            "Sending chunk"
        );

        let operation = format!("chunk {}", index + 1);
        let response = self
            .retry
            .run(&operation, || {
                self.mode
                    .request(self.backend, &chunk.text, self.vocabulary, Some(chunk_context.as_str()))
            })
            .await;

        let (message, error) = match response {
            Ok(raw) => match self.mode {
                GenerationMode::Message => {
                    match interpret(self.mode, &raw, &self.validator) {
                        Some(result) => (result.message, None),
                        None => (String::new(), Some(ChunkError::Unusable { index })),
                    }
                }
                GenerationMode::Detailed => {
                    if interpret(self.mode, &raw, &self.validator).is_some() {
                        (raw.trim().to_string(), None)
                    } else {
                        (String::new(), Some(ChunkError::Unusable { index }))
                    }
                }
            },
            Err(source) => (String::new(), Some(ChunkError::Backend { index, source })),
        };

        match &error {
            None => debug!(chunk_index = index, "Chunk succeeded"),
            Some(e) => warn!(chunk_index = index, error = %e, "Chunk failed"),
        }

        ChunkResult {
            index,
            message,
            files,
            error,
        }
    }

    /// Combines chunk results into one commit message.
    ///
    /// No successes is an error listing every failure. A single success is
    /// used directly. Several successes are synthesized by one merge call;
    /// if that call fails, the first success is used instead.
    pub async fn merge(
        &self,
        results: Vec<ChunkResult>,
        context: Option<&str>,
    ) -> Result<MergeOutcome, PipelineError> {
        let partials: Vec<(usize, CommitResult)> = results
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| interpret(self.mode, &r.message, &self.validator).map(|c| (r.index, c)))
            .collect();

        let Some((first_index, first)) = partials.first().cloned() else {
            return Err(PipelineError::AllChunksFailed {
                failures: results.into_iter().filter_map(|r| r.error).collect(),
            });
        };

        if partials.len() == 1 {
            debug!(chunk_index = first_index, "Single successful chunk, skipping merge");
            return Ok(MergeOutcome {
                result: first,
                chunk_results: results,
                merged: false,
                merge_fallback: false,
            });
        }

        let summaries: Vec<PartialSummary<'_>> = partials
            .iter()
            .map(|(index, partial)| PartialSummary {
                index: *index,
                title: &partial.message,
                body: partial.body.as_deref(),
            })
            .collect();
        let files = union_files(&results);
        let user_prompt = prompts::merge_user_prompt(&summaries, &files, self.vocabulary, context);
        let system_prompt = match self.mode {
            GenerationMode::Message => prompts::MERGE_SYSTEM_PROMPT,
            GenerationMode::Detailed => prompts::DETAILED_MERGE_SYSTEM_PROMPT,
        };

        info!(
            summary_count = summaries.len(),
            file_count = files.len(),
            "Merging chunk summaries"
        );

        let merged = self
            .retry
            .run("merge", || self.backend.send_request(system_prompt, &user_prompt))
            .await;

        let merged = match merged {
            Ok(raw) => {
                let result = interpret(self.mode, &raw, &self.validator);
                if result.is_none() {
                    warn!("Merge response was unusable, falling back to first chunk result");
                }
                result
            }
            Err(e) => {
                warn!(error = %e, "Merge call failed, falling back to first chunk result");
                None
            }
        };

        Ok(match merged {
            Some(result) => MergeOutcome {
                result,
                chunk_results: results,
                merged: true,
                merge_fallback: false,
            },
            None => MergeOutcome {
                result: first,
                chunk_results: results,
                merged: false,
                merge_fallback: true,
            },
        })
    }
}

/// Affected files across all chunks, first-seen order, without duplicates.
fn union_files(results: &[ChunkResult]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for file in results.iter().flat_map(|r| &r.files) {
        if !files.contains(file) {
            files.push(file.clone());
        }
    }
    files
}
