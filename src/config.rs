//! Settings and configuration resolution.
//!
//! Settings are read from `$HOME/.commitsmith/settings.json`. Its `env` map
//! is a fallback for environment variables, which always win.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::backend::{Provider, RetryPolicy};
use crate::diff::truncate::{DEFAULT_HEADER_LINES, DEFAULT_TRUNCATE_BUDGET, MIN_MEANINGFUL_DIFF};
use crate::diff::DEFAULT_CHUNK_BUDGET;
use crate::message::TypeCheck;

/// Default number of chunk requests in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings loaded from `$HOME/.commitsmith/settings.json`.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable overrides.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Provider used when none is given on the command line.
    #[serde(default)]
    pub provider: Option<String>,

    /// Model override.
    #[serde(default)]
    pub model: Option<String>,

    /// Chunk budget in bytes.
    #[serde(default)]
    pub chunk_budget: Option<usize>,

    /// Concurrent chunk requests.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Reject commit types outside the vocabulary.
    #[serde(default)]
    pub strict_types: Option<bool>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path; a missing file yields defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".commitsmith").join("settings.json"))
    }

    /// Returns an environment variable with fallback to settings.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        self.lookup(key, &|k| env::var(k).ok())
    }

    /// Returns the first of `keys` that is set.
    pub fn get_env_vars(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get_env_var(key))
    }

    /// Blank values count as unset.
    fn lookup(&self, key: &str, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        env(key)
            .or_else(|| self.env.get(key).cloned())
            .filter(|value| !value.trim().is_empty())
    }

    fn lookup_any(&self, keys: &[&str], env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        keys.iter().find_map(|key| self.lookup(key, env))
    }
}

/// OAuth client registration for the Gemini browser flow.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    /// OAuth client identifier.
    pub client_id: String,
    /// Client secret, for clients registered as confidential.
    pub client_secret: Option<String>,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Everything needed to construct one generation backend.
#[derive(Clone, Default)]
pub struct BackendConfig {
    /// Selected provider.
    pub provider: Provider,
    /// Model override; the provider default applies when `None`.
    pub model: Option<String>,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// OAuth client for Gemini when no API key is set.
    pub oauth: Option<OAuthClientConfig>,
    /// Credential cache location override.
    pub credentials_path: Option<PathBuf>,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("oauth", &self.oauth)
            .field("credentials_path", &self.credentials_path)
            .finish()
    }
}

impl BackendConfig {
    /// Resolves backend configuration from overrides, environment and settings.
    ///
    /// Precedence: explicit overrides, then environment variables, then the
    /// settings file `env` map, then typed settings keys.
    pub fn resolve(
        settings: &Settings,
        provider_override: Option<Provider>,
        model_override: Option<String>,
    ) -> Result<Self> {
        Self::resolve_with(settings, provider_override, model_override, |key| {
            env::var(key).ok()
        })
    }

    /// Like [`BackendConfig::resolve`] with a custom environment lookup.
    pub fn resolve_with<F>(
        settings: &Settings,
        provider_override: Option<Provider>,
        model_override: Option<String>,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match provider_override {
            Some(provider) => provider,
            None => match settings
                .lookup("COMMITSMITH_PROVIDER", &env)
                .or_else(|| settings.provider.clone())
            {
                Some(name) => name
                    .parse::<Provider>()
                    .context("Invalid provider in configuration")?,
                None => Provider::default(),
            },
        };

        let model = model_override
            .filter(|m| !m.trim().is_empty())
            .or_else(|| settings.lookup("COMMITSMITH_MODEL", &env))
            .or_else(|| settings.model.clone());

        let mut config = Self {
            provider,
            model,
            ..Self::default()
        };

        match provider {
            Provider::OpenAi | Provider::Legacy => {
                config.api_key = settings.lookup("OPENAI_API_KEY", &env);
                config.base_url = settings.lookup("OPENAI_BASE_URL", &env);
            }
            Provider::Anthropic => {
                config.api_key =
                    settings.lookup_any(&["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"], &env);
            }
            Provider::Gemini => {
                config.api_key = settings.lookup("GEMINI_API_KEY", &env);
                config.oauth = settings
                    .lookup("GEMINI_OAUTH_CLIENT_ID", &env)
                    .map(|client_id| OAuthClientConfig {
                        client_id,
                        client_secret: settings.lookup("GEMINI_OAUTH_CLIENT_SECRET", &env),
                    });
            }
        }

        Ok(config)
    }
}

/// Tuning for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum bytes per chunk.
    pub chunk_budget: usize,
    /// Whole-diff budget when chunking is disabled.
    pub truncate_budget: usize,
    /// Leading lines kept by truncation.
    pub header_lines: usize,
    /// Diffs smaller than this get a clarifying note.
    pub min_diff_size: usize,
    /// Chunk requests in flight at once.
    pub concurrency: usize,
    /// Split oversized diffs instead of truncating them.
    pub chunking: bool,
    /// Commit type validation mode.
    pub type_check: TypeCheck,
    /// Retry policy for every backend call.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_budget: DEFAULT_CHUNK_BUDGET,
            truncate_budget: DEFAULT_TRUNCATE_BUDGET,
            header_lines: DEFAULT_HEADER_LINES,
            min_diff_size: MIN_MEANINGFUL_DIFF,
            concurrency: DEFAULT_CONCURRENCY,
            chunking: true,
            type_check: TypeCheck::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with the typed settings keys.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut config = Self::default();
        if let Some(budget) = settings.chunk_budget.filter(|b| *b > 0) {
            config.chunk_budget = budget;
        }
        if let Some(concurrency) = settings.concurrency {
            config.concurrency = concurrency.max(1);
        }
        if settings.strict_types == Some(true) {
            config.type_check = TypeCheck::Strict;
        }
        config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_path(temp_dir.path().join("nope.json")).unwrap();
        assert!(settings.env.is_empty());
        assert!(settings.provider.is_none());
    }

    #[test]
    fn settings_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        fs::write(
            &settings_path,
            r#"{
                "env": { "OPENAI_API_KEY": "from-settings" },
                "provider": "anthropic",
                "chunk_budget": 1000,
                "concurrency": 0,
                "strict_types": true
            }"#,
        )
        .unwrap();

        let settings = Settings::load_from_path(&settings_path).unwrap();
        assert_eq!(settings.env.get("OPENAI_API_KEY").unwrap(), "from-settings");
        assert_eq!(settings.provider.as_deref(), Some("anthropic"));

        let pipeline = PipelineConfig::from_settings(&settings);
        assert_eq!(pipeline.chunk_budget, 1000);
        assert_eq!(pipeline.concurrency, 1);
        assert_eq!(pipeline.type_check, TypeCheck::Strict);
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        fs::write(&settings_path, "{ not json").unwrap();

        let err = Settings::load_from_path(&settings_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn environment_wins_over_settings() {
        let mut settings = Settings::default();
        settings
            .env
            .insert("OPENAI_API_KEY".to_string(), "settings-key".to_string());

        let config =
            BackendConfig::resolve_with(&settings, None, None, env_of(&[("OPENAI_API_KEY", "env-key")]))
                .unwrap();
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.api_key.as_deref(), Some("env-key"));

        let config = BackendConfig::resolve_with(&settings, None, None, env_of(&[])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("settings-key"));
    }

    #[test]
    fn blank_values_are_unset() {
        let config = BackendConfig::resolve_with(
            &Settings::default(),
            None,
            Some("  ".to_string()),
            env_of(&[("OPENAI_API_KEY", "   ")]),
        )
        .unwrap();
        assert!(config.api_key.is_none());
        assert!(config.model.is_none());
    }

    #[test]
    fn provider_precedence() {
        let settings = Settings {
            provider: Some("gemini".to_string()),
            ..Settings::default()
        };

        let from_settings = BackendConfig::resolve_with(&settings, None, None, env_of(&[])).unwrap();
        assert_eq!(from_settings.provider, Provider::Gemini);

        let from_env = BackendConfig::resolve_with(
            &settings,
            None,
            None,
            env_of(&[("COMMITSMITH_PROVIDER", "claude")]),
        )
        .unwrap();
        assert_eq!(from_env.provider, Provider::Anthropic);

        let from_flag = BackendConfig::resolve_with(
            &settings,
            Some(Provider::Legacy),
            None,
            env_of(&[("COMMITSMITH_PROVIDER", "claude")]),
        )
        .unwrap();
        assert_eq!(from_flag.provider, Provider::Legacy);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = BackendConfig::resolve_with(
            &Settings::default(),
            None,
            None,
            env_of(&[("COMMITSMITH_PROVIDER", "cohere")]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("unknown provider `cohere`"));
    }

    #[test]
    fn anthropic_accepts_either_key_name() {
        let config = BackendConfig::resolve_with(
            &Settings::default(),
            Some(Provider::Anthropic),
            None,
            env_of(&[("CLAUDE_API_KEY", "ck")]),
        )
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("ck"));
    }

    #[test]
    fn gemini_oauth_client_is_resolved() {
        let config = BackendConfig::resolve_with(
            &Settings::default(),
            Some(Provider::Gemini),
            Some("gemini-1.5-pro".to_string()),
            env_of(&[
                ("GEMINI_OAUTH_CLIENT_ID", "cid"),
                ("GEMINI_OAUTH_CLIENT_SECRET", "secret"),
            ]),
        )
        .unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(
            config.oauth,
            Some(OAuthClientConfig {
                client_id: "cid".to_string(),
                client_secret: Some("secret".to_string()),
            })
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = BackendConfig {
            api_key: Some("sk-very-secret".to_string()),
            oauth: Some(OAuthClientConfig {
                client_id: "cid".to_string(),
                client_secret: Some("hidden".to_string()),
            }),
            ..BackendConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(!rendered.contains("hidden"));
        assert!(rendered.contains("cid"));
    }

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_budget, 24_000);
        assert_eq!(config.truncate_budget, 50_000);
        assert_eq!(config.header_lines, 12);
        assert_eq!(config.min_diff_size, 10);
        assert_eq!(config.concurrency, 4);
        assert!(config.chunking);
        assert_eq!(config.type_check, TypeCheck::Permissive);
    }
}
