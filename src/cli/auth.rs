//! Auth commands for the Gemini OAuth credential cache.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::auth::{cache, GeminiTokenProvider};
use crate::backend::Provider;
use crate::config::{BackendConfig, Settings};

/// Credential operations.
#[derive(Parser)]
pub struct AuthCommand {
    /// The auth subcommand to execute.
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

/// Auth subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum AuthSubcommand {
    /// Runs the browser login and caches the credentials.
    Login,
    /// Deletes cached credentials.
    Logout,
}

impl AuthCommand {
    /// Executes the auth command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            AuthSubcommand::Login => login().await,
            AuthSubcommand::Logout => logout(),
        }
    }
}

async fn login() -> Result<()> {
    let settings = Settings::load()?;
    let config = BackendConfig::resolve(&settings, Some(Provider::Gemini), None)?;
    let client = config
        .oauth
        .context("GEMINI_OAUTH_CLIENT_ID is not set; it is required for browser login")?;

    let provider = GeminiTokenProvider::new(client, config.credentials_path)?;
    let credentials = provider.login().await.context("Browser login failed")?;

    println!(
        "✓ Logged in; credentials cached at {} (expires {})",
        provider.cache_path().display(),
        credentials.expires_at.to_rfc3339()
    );
    Ok(())
}

fn logout() -> Result<()> {
    let path = cache::default_cache_path()?;
    if cache::remove_credentials(&path)? {
        println!("✓ Removed cached credentials at {}", path.display());
    } else {
        println!("No cached credentials found");
    }
    Ok(())
}
