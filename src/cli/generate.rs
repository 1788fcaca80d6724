//! Generate command: diff in, commit message out.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::backend::{create_backend, Provider};
use crate::config::{BackendConfig, PipelineConfig, Settings};
use crate::git::GitRepository;
use crate::message::{StyleOptions, TypeCheck, TypeVocabulary};
use crate::pipeline::{CommitPipeline, GenerationMode, GenerationRequest, PipelineError};

/// Generate command options.
#[derive(Parser)]
pub struct GenerateCommand {
    /// Reads the diff from a file ("-" for stdin) instead of the staged changes.
    #[arg(long, value_name = "PATH")]
    pub diff_file: Option<PathBuf>,

    /// Generates a title and a bullet-point body.
    #[arg(long)]
    pub detailed: bool,

    /// Extra context for the model (e.g., "closes #42").
    #[arg(long)]
    pub context: Option<String>,

    /// JSON file mapping commit types to descriptions.
    #[arg(long, value_name = "FILE")]
    pub types: Option<PathBuf>,

    /// Prefixes the title with a gitmoji for its type.
    #[arg(long)]
    pub emoji: bool,

    /// Forces the conventional commit scope.
    #[arg(long)]
    pub scope: Option<String>,

    /// Backend provider: openai, anthropic, gemini or legacy.
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Model to use (if not specified, uses settings or the provider default).
    #[arg(long)]
    pub model: Option<String>,

    /// Truncates oversized diffs instead of splitting them into chunks.
    #[arg(long)]
    pub no_chunking: bool,

    /// Rejects commit types that are not in the vocabulary.
    #[arg(long)]
    pub strict_types: bool,

    /// Maximum number of concurrent chunk requests.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Commits the staged changes with the generated message.
    #[arg(long, conflicts_with = "diff_file")]
    pub commit: bool,
}

impl GenerateCommand {
    /// Executes the generate command.
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load()?;
        let backend_config = BackendConfig::resolve(&settings, self.provider, self.model.clone())?;
        let backend = create_backend(&backend_config).context("Failed to create backend")?;
        let pipeline = CommitPipeline::new(backend, self.pipeline_config(&settings));

        let vocabulary = load_vocabulary(self.types.as_deref())?;
        let (diff, repo) = match &self.diff_file {
            Some(path) => (read_diff(path, io::stdin())?, None),
            None => {
                let repo = GitRepository::open()?;
                (repo.staged_diff()?, Some(repo))
            }
        };

        let mut request = GenerationRequest::new(diff, vocabulary)
            .with_mode(self.mode())
            .with_style(self.style());
        if let Some(context) = &self.context {
            request = request.with_context(context.clone());
        }

        let report = pipeline.generate(&request).await?;

        for failure in &report.chunk_failures {
            eprintln!("warning: {failure}");
        }
        if report.merge_fallback {
            eprintln!("warning: merging chunk summaries failed; using the first chunk's message");
        }
        info!(
            chunk_count = report.chunk_count,
            compressed = report.summary.is_compressed(),
            truncated = report.truncated,
            "Generation finished"
        );

        let message = report.result.format();
        println!("{message}");

        if self.commit {
            if let Some(repo) = &repo {
                let oid = repo.commit(&message)?;
                let short = oid.to_string();
                eprintln!("✓ Created commit {}", &short[..short.len().min(8)]);
            }
        }

        Ok(())
    }

    fn mode(&self) -> GenerationMode {
        if self.detailed {
            GenerationMode::Detailed
        } else {
            GenerationMode::Message
        }
    }

    fn style(&self) -> StyleOptions {
        StyleOptions {
            emoji: self.emoji,
            scope: self.scope.clone(),
        }
    }

    fn pipeline_config(&self, settings: &Settings) -> PipelineConfig {
        let mut config = PipelineConfig::from_settings(settings);
        if self.no_chunking {
            config.chunking = false;
        }
        if self.strict_types {
            config.type_check = TypeCheck::Strict;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.max(1);
        }
        config
    }
}

/// Loads the type vocabulary from a JSON file, or the built-in one.
fn load_vocabulary(path: Option<&Path>) -> Result<TypeVocabulary> {
    let vocabulary = match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read types file: {}", path.display()))?;
            TypeVocabulary::from_json(&json)
                .map_err(|e| PipelineError::InvalidVocabulary(e.to_string()))
                .with_context(|| format!("Failed to parse types file: {}", path.display()))?
        }
        None => TypeVocabulary::builtin()
            .map_err(|e| PipelineError::InvalidVocabulary(e.to_string()))?,
    };
    Ok(vocabulary)
}

/// Reads a diff from `path`, or from `stdin` when `path` is `-`.
fn read_diff(path: &Path, mut stdin: impl Read) -> Result<String> {
    if path == Path::new("-") {
        let mut diff = String::new();
        stdin
            .read_to_string(&mut diff)
            .context("Failed to read diff from stdin")?;
        return Ok(diff);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read diff file: {}", path.display()))
}
