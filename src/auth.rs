//! OAuth credential acquisition for the Gemini backend.

pub mod cache;
pub mod callback;
pub mod oauth;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::BackendError;
use crate::config::OAuthClientConfig;

use self::cache::StoredCredentials;
use self::callback::{CallbackServer, CALLBACK_TIMEOUT};
use self::oauth::{OAuthEndpoints, Pkce};

/// Timeout for token endpoint requests.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// OAuth flow errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The callback's `state` did not match the one we issued.
    #[error("OAuth callback state mismatch; possible CSRF attempt")]
    StateMismatch,

    /// The user or server refused authorization.
    #[error("Authorization denied: {0}")]
    Denied(String),

    /// The callback carried no authorization code.
    #[error("OAuth callback did not include an authorization code")]
    MissingCode,

    /// The callback server failed.
    #[error("OAuth callback failed: {0}")]
    Callback(String),

    /// The user did not complete the browser flow in time.
    #[error("Timed out after {0:?} waiting for browser authorization")]
    Timeout(Duration),

    /// Code exchange or refresh was rejected.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Authorization URL could not be built.
    #[error("Invalid authorization URL: {0}")]
    InvalidUrl(String),

    /// Home directory could not be determined.
    #[error("Failed to determine home directory")]
    NoHomeDir,

    /// Credential cache I/O failed.
    #[error("Credential cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential cache serialization failed.
    #[error("Credential cache format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AuthError> for BackendError {
    fn from(err: AuthError) -> Self {
        Self::AuthenticationFailed(err.to_string())
    }
}

/// Supplies Gemini access tokens, caching them on disk.
///
/// Cached tokens are used until shortly before expiry, then refreshed.
/// Without a usable refresh token the interactive browser flow runs.
/// Concurrent callers share one flow through an async mutex.
pub struct GeminiTokenProvider {
    client: OAuthClientConfig,
    cache_path: PathBuf,
    endpoints: OAuthEndpoints,
    http: Client,
    current: Mutex<Option<StoredCredentials>>,
}

impl GeminiTokenProvider {
    /// Creates a provider; `cache_path` defaults to
    /// `$HOME/.commitsmith/gemini_credentials.json`.
    pub fn new(client: OAuthClientConfig, cache_path: Option<PathBuf>) -> Result<Self, AuthError> {
        let cache_path = match cache_path {
            Some(path) => path,
            None => cache::default_cache_path()?,
        };
        let http = Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::TokenExchange(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache_path,
            endpoints: OAuthEndpoints::default(),
            http,
            current: Mutex::new(None),
        })
    }

    /// Overrides the authorization server endpoints.
    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Location of the credential cache.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Returns a valid access token, refreshing or logging in as needed.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;

        if current.is_none() {
            *current = cache::load_credentials(&self.cache_path);
        }

        if let Some(credentials) = current.as_ref() {
            if !credentials.is_expired() {
                debug!("Using cached OAuth access token");
                return Ok(credentials.access_token.clone());
            }
        }

        let refresh_token = current.as_ref().and_then(|c| c.refresh_token.clone());
        if let Some(refresh_token) = refresh_token {
            match oauth::refresh_access_token(
                &self.http,
                &self.endpoints,
                &self.client,
                &refresh_token,
            )
            .await
            {
                Ok(credentials) => {
                    cache::save_credentials_best_effort(&self.cache_path, &credentials);
                    let token = credentials.access_token.clone();
                    *current = Some(credentials);
                    return Ok(token);
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, falling back to browser login");
                }
            }
        }

        let credentials = self.browser_login().await?;
        let token = credentials.access_token.clone();
        *current = Some(credentials);
        Ok(token)
    }

    /// Runs the browser flow unconditionally and caches the result.
    pub async fn login(&self) -> Result<StoredCredentials, AuthError> {
        let mut current = self.current.lock().await;
        let credentials = self.browser_login().await?;
        *current = Some(credentials.clone());
        Ok(credentials)
    }

    /// Deletes cached credentials. Returns false if none were cached.
    pub async fn logout(&self) -> Result<bool, AuthError> {
        let mut current = self.current.lock().await;
        *current = None;
        cache::remove_credentials(&self.cache_path)
    }

    async fn browser_login(&self) -> Result<StoredCredentials, AuthError> {
        let pkce = Pkce::generate();
        let state = oauth::new_state();
        let server = CallbackServer::start(&state).await?;
        let redirect_uri = server.redirect_uri().to_string();

        let url = oauth::authorization_url(
            &self.endpoints,
            &self.client.client_id,
            &redirect_uri,
            &state,
            &pkce,
        )?;

        info!(redirect_uri = %redirect_uri, "Waiting for browser authorization");
        eprintln!("Open this URL in your browser to authorize commitsmith:\n\n  {url}\n");
        open_browser(url.as_str());

        let code = server.wait_for_code(CALLBACK_TIMEOUT).await?;
        let credentials = oauth::exchange_code(
            &self.http,
            &self.endpoints,
            &self.client,
            &code,
            &pkce,
            &redirect_uri,
        )
        .await?;

        cache::save_credentials_best_effort(&self.cache_path, &credentials);
        Ok(credentials)
    }
}

/// Launches the system browser; failure only means the user copies the URL.
fn open_browser(url: &str) {
    let result = if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()
    } else {
        std::process::Command::new("xdg-open").arg(url).spawn()
    };
    if let Err(e) = result {
        debug!(error = %e, "Could not launch browser");
    }
}
