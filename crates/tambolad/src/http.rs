//! HTTP trigger endpoints for the Tambola daemon.
//!
//! A small axum router exposed next to the game socket:
//! - `POST /game/start` resets the session for a fresh round
//! - `POST /game/draw` calls the next number
//! - `GET /game/snapshot` reports the session state as JSON
//!
//! The two POST routes return fixed acknowledgement strings; the
//! resulting events reach players over the game socket broadcast.
//! This keeps the caller (a dashboard button, a curl one-liner) free
//! of any protocol.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::game::{CoordinatorError, GameHandle};

/// Default HTTP listen address
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:9091";

// ============================================================================
// Router
// ============================================================================

/// Build the trigger router over a game handle.
pub fn router(game: GameHandle) -> Router {
    Router::new()
        .route("/game/start", post(start_handler))
        .route("/game/draw", post(draw_handler))
        .route("/game/snapshot", get(snapshot_handler))
        .with_state(game)
}

/// POST /game/start
async fn start_handler(State(game): State<GameHandle>) -> (StatusCode, String) {
    match game.start_round().await {
        Ok(()) => (StatusCode::OK, "Game started!".to_string()),
        Err(err) => trigger_failure(err),
    }
}

/// POST /game/draw
async fn draw_handler(State(game): State<GameHandle>) -> (StatusCode, String) {
    match game.draw_number().await {
        Ok(_) => (StatusCode::OK, "Number drawn!".to_string()),
        Err(err) => trigger_failure(err),
    }
}

/// GET /game/snapshot
async fn snapshot_handler(State(game): State<GameHandle>) -> Response {
    match game.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => trigger_failure(err).into_response(),
    }
}

/// Map a coordinator failure to a status and body.
///
/// A domain refusal (the number pool ran dry) is a conflict with the
/// session state; a closed command channel means the daemon is going
/// down and the trigger should be retried against a fresh instance.
fn trigger_failure(err: CoordinatorError) -> (StatusCode, String) {
    match err {
        CoordinatorError::Game(game) => (StatusCode::CONFLICT, game.to_string()),
        CoordinatorError::ChannelClosed => (
            StatusCode::SERVICE_UNAVAILABLE,
            "game coordinator is unavailable".to_string(),
        ),
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// HTTP listener serving the trigger routes.
pub struct HttpServer {
    /// Address to listen on
    addr: String,

    /// Handle to the game coordinator
    game: GameHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl HttpServer {
    /// Creates a new HTTP trigger server.
    ///
    /// # Arguments
    ///
    /// * `addr` - TCP address to listen on ("host:port")
    /// * `game` - Handle to the game coordinator
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(addr: impl Into<String>, game: GameHandle, cancel_token: CancellationToken) -> Self {
        Self {
            addr: addr.into(),
            game,
            cancel_token,
        }
    }

    /// Creates a server on the default address.
    pub fn with_default_addr(game: GameHandle, cancel_token: CancellationToken) -> Self {
        Self::new(DEFAULT_HTTP_ADDR, game, cancel_token)
    }

    /// Returns the configured listen address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Runs the HTTP listener until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), HttpServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Binds the listener.
    ///
    /// Split out from [`run`](Self::run) so callers binding to an
    /// ephemeral port can learn the assigned address before serving.
    pub async fn bind(&self) -> Result<TcpListener, HttpServerError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| HttpServerError::BindFailed {
                addr: self.addr.clone(),
                error: e.to_string(),
            })?;

        info!(addr = %self.addr, "HTTP trigger listener ready");
        Ok(listener)
    }

    /// Serves the trigger routes on a bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), HttpServerError> {
        let app = router(self.game.clone());

        tokio::select! {
            _ = self.cancel_token.cancelled() => {
                info!("HTTP trigger listener stopped");
                Ok(())
            }

            result = axum::serve(listener, app) => {
                result.map_err(|e| HttpServerError::Serve(e.to_string()))
            }
        }
    }
}

/// Errors that can occur in the HTTP listener.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("Failed to bind {addr}: {error}")]
    BindFailed { addr: String, error: String },

    #[error("HTTP listener failed: {0}")]
    Serve(String),
}
