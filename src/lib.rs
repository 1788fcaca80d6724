//! # commitsmith
//!
//! Conventional commit messages from arbitrarily large diffs.
//!
//! A diff is summarized, split into size-bounded chunks when needed, sent
//! to a pluggable LLM backend chunk by chunk, and the partial results are
//! merged into one validated commit title (and optional body).
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use commitsmith::backend::{create_backend, Provider};
//! use commitsmith::config::{BackendConfig, PipelineConfig};
//! use commitsmith::message::TypeVocabulary;
//! use commitsmith::pipeline::{CommitPipeline, GenerationRequest};
//!
//! # async fn run(diff: String) -> anyhow::Result<()> {
//! let config = BackendConfig {
//!     provider: Provider::OpenAi,
//!     api_key: Some("sk-...".to_string()),
//!     ..BackendConfig::default()
//! };
//! let pipeline = CommitPipeline::new(create_backend(&config)?, PipelineConfig::default());
//! let request = GenerationRequest::new(diff, TypeVocabulary::builtin()?);
//! let report = pipeline.generate(&request).await?;
//! println!("{}", report.result.format());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod backend;
pub mod cli;
pub mod config;
pub mod diff;
pub mod git;
pub mod message;
pub mod pipeline;

pub use crate::cli::Cli;
pub use crate::message::CommitResult;
pub use crate::pipeline::{CommitPipeline, GenerationReport, GenerationRequest};

/// The current version of commitsmith.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
