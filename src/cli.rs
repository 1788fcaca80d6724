//! CLI interface for commitsmith.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod auth;
pub mod generate;

/// commitsmith: conventional commit messages from staged changes.
#[derive(Parser)]
#[command(name = "commitsmith")]
#[command(about = "Generates conventional commit messages with an LLM", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Generates a commit message for a diff.
    Generate(generate::GenerateCommand),
    /// Manages cached Gemini OAuth credentials.
    Auth(auth::AuthCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate(cmd) => cmd.execute().await,
            Commands::Auth(cmd) => cmd.execute().await,
        }
    }
}

/// Renders an error and its causes, one per line, for stderr.
pub fn error_report(error: &anyhow::Error) -> String {
    let mut report = format!("Error: {error}");
    for cause in error.chain().skip(1) {
        report.push_str(&format!("\n  Caused by: {cause}"));
    }
    report
}
