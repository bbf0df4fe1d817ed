//! TCP server for the Tambola daemon.
//!
//! The server:
//! - Listens on a TCP address for game clients
//! - Spawns a ConnectionHandler for each client
//! - Registers each connection with the fan-out broadcaster
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    GameServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│    GameHandle   │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         ▲
//!         │ outbound queue
//!         │
//! ┌─────────────────┐
//! │FanoutBroadcaster│
//! │ (coordinator →  │
//! │  all clients)   │
//! └─────────────────┘
//! ```

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::broadcast::FanoutBroadcaster;
use crate::game::GameHandle;

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:9090";

/// TCP server for the Tambola daemon.
///
/// Accepts game clients and hands each one to a connection handler.
pub struct GameServer {
    /// Address to listen on
    addr: String,

    /// Handle to the game coordinator
    game: GameHandle,

    /// Fan-out broadcaster shared with connection handlers
    broadcaster: Arc<FanoutBroadcaster>,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection IDs
    connection_counter: AtomicU64,
}

impl GameServer {
    /// Creates a new game server.
    ///
    /// # Arguments
    ///
    /// * `addr` - TCP address to listen on ("host:port")
    /// * `game` - Handle to the game coordinator
    /// * `broadcaster` - Fan-out broadcaster shared with the coordinator
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        addr: impl Into<String>,
        game: GameHandle,
        broadcaster: Arc<FanoutBroadcaster>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            addr: addr.into(),
            game,
            broadcaster,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Creates a server on the default address.
    pub fn with_default_addr(
        game: GameHandle,
        broadcaster: Arc<FanoutBroadcaster>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self::new(DEFAULT_ADDR, game, broadcaster, cancel_token)
    }

    /// Returns the configured listen address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Runs the server.
    ///
    /// Binds the listener and accepts connections until the cancellation
    /// token is triggered. This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Binds the listener.
    ///
    /// Split out from [`run`](Self::run) so callers binding to an
    /// ephemeral port can learn the assigned address before serving.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                addr: self.addr.clone(),
                error: e.to_string(),
            })?;

        info!(addr = %self.addr, "Game server listening");
        Ok(listener)
    }

    /// Accepts connections on a bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Accept new connection
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            debug!(connection = conn_num, peer = %peer, "Accepted connection");
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: tokio::net::TcpStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let game = self.game.clone();
        let broadcaster = Arc::clone(&self.broadcaster);

        tokio::spawn(async move {
            let handler =
                ConnectionHandler::new(reader, writer, game, broadcaster, connection_number);
            handler.run().await;
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    BindFailed { addr: String, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addr() {
        assert_eq!(DEFAULT_ADDR, "127.0.0.1:9090");
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::BindFailed {
            addr: "127.0.0.1:9090".to_string(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:9090"));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_connection_error_converts() {
        let err: ServerError = ConnectionError::Eof.into();
        assert!(err.to_string().contains("Connection closed"));
    }
}
