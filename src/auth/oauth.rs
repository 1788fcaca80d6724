//! OAuth 2.0 authorization-code flow with PKCE.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use super::cache::StoredCredentials;
use super::AuthError;
use crate::config::OAuthClientConfig;

/// Scope granting access to the Gemini API.
pub const GEMINI_SCOPE: &str = "https://www.googleapis.com/auth/generative-language.retriever \
                                https://www.googleapis.com/auth/cloud-platform";

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Authorization server endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    /// Browser authorization endpoint.
    pub auth_url: String,
    /// Token exchange and refresh endpoint.
    pub token_url: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    /// Secret sent with the token exchange.
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`, sent with the authorization request.
    pub challenge: String,
}

impl Pkce {
    /// Generates a fresh random verifier.
    pub fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self::from_verifier(verifier)
    }

    /// Derives the challenge for a known verifier.
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Random anti-CSRF `state` value.
pub fn new_state() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Builds the browser authorization URL.
pub fn authorization_url(
    endpoints: &OAuthEndpoints,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    pkce: &Pkce,
) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &endpoints.auth_url,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", GEMINI_SCOPE),
            ("state", state),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::InvalidUrl(e.to_string()))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self, previous_refresh: Option<&str>) -> StoredCredentials {
        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        StoredCredentials {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }
}

async fn post_form(
    http: &Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();

    let response = http
        .post(token_url)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange(format!(
            "HTTP {status}: {}",
            text.trim()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::TokenExchange(format!("invalid token response: {e}")))
}

/// Exchanges an authorization code for credentials.
pub async fn exchange_code(
    http: &Client,
    endpoints: &OAuthEndpoints,
    client: &OAuthClientConfig,
    code: &str,
    pkce: &Pkce,
    redirect_uri: &str,
) -> Result<StoredCredentials, AuthError> {
    info!("Exchanging OAuth authorization code");
    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", client.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("code_verifier", pkce.verifier.as_str()),
    ];
    if let Some(secret) = client.client_secret.as_deref() {
        params.push(("client_secret", secret));
    }

    let token = post_form(http, &endpoints.token_url, &params).await?;
    debug!(has_refresh_token = token.refresh_token.is_some(), "Received OAuth tokens");
    Ok(token.into_credentials(None))
}

/// Obtains a fresh access token from a refresh token.
///
/// The refresh token is carried over when the server does not rotate it.
pub async fn refresh_access_token(
    http: &Client,
    endpoints: &OAuthEndpoints,
    client: &OAuthClientConfig,
    refresh_token: &str,
) -> Result<StoredCredentials, AuthError> {
    info!("Refreshing OAuth access token");
    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client.client_id.as_str()),
    ];
    if let Some(secret) = client.client_secret.as_deref() {
        params.push(("client_secret", secret));
    }

    let token = post_form(http, &endpoints.token_url, &params).await?;
    Ok(token.into_credentials(Some(refresh_token)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_config() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client-123".to_string(),
            client_secret: Some("s3cret".to_string()),
        }
    }

    fn endpoints(server: &MockServer) -> OAuthEndpoints {
        OAuthEndpoints {
            auth_url: format!("{}/auth", server.uri()),
            token_url: format!("{}/token", server.uri()),
        }
    }

    #[test]
    fn pkce_challenge_matches_rfc_7636_example() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn generated_verifier_has_valid_length() {
        let pkce = Pkce::generate();
        assert!((43..=128).contains(&pkce.verifier.len()));
        assert_ne!(pkce.verifier, Pkce::generate().verifier);
    }

    #[test]
    fn authorization_url_carries_pkce_and_state() {
        let pkce = Pkce::from_verifier("v".repeat(43));
        let url = authorization_url(
            &OAuthEndpoints::default(),
            "client-123",
            "http://127.0.0.1:4242/callback",
            "state-xyz",
            &pkce,
        )
        .unwrap();

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(pairs["state"], "state-xyz");
        assert_eq!(pairs["code_challenge"], pkce.challenge);
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:4242/callback");
    }

    #[tokio::test]
    async fn exchange_posts_form_encoded_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc%2F123"))
            .and(body_string_contains("code_verifier=verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let creds = exchange_code(
            &Client::new(),
            &endpoints(&server),
            &client_config(),
            "abc/123",
            &Pkce::from_verifier("verifier".to_string()),
            "http://127.0.0.1:1/callback",
        )
        .await
        .unwrap();

        assert_eq!(creds.access_token, "at");
        assert_eq!(creds.refresh_token.as_deref(), Some("rt"));
        assert!(!creds.is_expired());
    }

    #[tokio::test]
    async fn refresh_keeps_refresh_token_when_not_rotated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let creds =
            refresh_access_token(&Client::new(), &endpoints(&server), &client_config(), "rt-old")
                .await
                .unwrap();
        assert_eq!(creds.access_token, "fresh");
        assert_eq!(creds.refresh_token.as_deref(), Some("rt-old"));
    }

    #[tokio::test]
    async fn token_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
            )
            .mount(&server)
            .await;

        let err = refresh_access_token(&Client::new(), &endpoints(&server), &client_config(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExchange(ref m) if m.contains("invalid_grant")));
    }
}
