//! Ephemeral local HTTP listener receiving the OAuth redirect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::AuthError;

/// How long to wait for the user to finish in the browser.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const CALLBACK_PATH: &str = "/callback";

const SUCCESS_PAGE: &str =
    "<html><body><h1>Authorization complete</h1><p>You can close this window.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h1>Authorization failed</h1><p>Return to the terminal for details.</p></body></html>";

/// Query parameters of the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed anti-CSRF state.
    pub state: Option<String>,
    /// Error code when the user denied access.
    pub error: Option<String>,
}

/// Checks a redirect against the expected state and extracts the code.
pub fn validate_callback(expected_state: &str, params: CallbackParams) -> Result<String, AuthError> {
    if let Some(error) = params.error {
        return Err(AuthError::Denied(error));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: mpsc::Sender<Result<String, AuthError>>,
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = validate_callback(&state.expected_state, params);
    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Rejected OAuth callback");
            StatusCode::BAD_REQUEST
        }
    };

    // only the first callback counts
    if state.sender.try_send(outcome).is_err() {
        debug!("Ignoring repeated OAuth callback");
    }

    let page = if status == StatusCode::OK {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };
    (status, Html(page))
}

/// Short-lived server accepting exactly one OAuth redirect.
pub struct CallbackServer {
    redirect_uri: String,
    receiver: mpsc::Receiver<Result<String, AuthError>>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CallbackServer {
    /// Binds `127.0.0.1` on an ephemeral port and starts serving.
    pub async fn start(expected_state: &str) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let redirect_uri = format!("http://{addr}{CALLBACK_PATH}");

        let (sender, receiver) = mpsc::channel(1);
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(CallbackState {
                expected_state: Arc::from(expected_state),
                sender,
            });

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                warn!(error = %e, "OAuth callback server failed");
            }
        });

        debug!(redirect_uri = %redirect_uri, "OAuth callback server listening");
        Ok(Self {
            redirect_uri,
            receiver,
            shutdown,
            task,
        })
    }

    /// Redirect URI to register with the authorization request.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the redirect, then shuts the server down.
    pub async fn wait_for_code(mut self, timeout: Duration) -> Result<String, AuthError> {
        let outcome = match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => Err(AuthError::Callback(
                "callback server stopped unexpectedly".to_string(),
            )),
            Err(_) => Err(AuthError::Timeout(timeout)),
        };

        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            debug!(error = %e, "OAuth callback server task ended abnormally");
        }
        outcome
    }
}
