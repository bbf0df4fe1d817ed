//! Connection handler for individual game clients.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation
//! - Parses incoming line-delimited JSON frames
//! - Routes game actions to the coordinator
//! - Feeds a dedicated writer task from the connection's outbound queue
//!
//! Outbound frames (broadcasts from the coordinator as well as direct
//! replies like pongs and error frames) all travel through the same
//! per-connection queue, so the socket is written from exactly one task.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use tambola_core::ConnectionId;
use tambola_protocol::{ClientEvent, ClientMessage, ProtocolVersion, ServerMessage};

use crate::broadcast::FanoutBroadcaster;
use crate::game::GameHandle;

/// Maximum message size (1 MB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Time allowed for the handshake frame to arrive
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound queue depth per connection
const OUTBOUND_BUFFER: usize = 64;

// There is deliberately no read timeout after the handshake: players
// listen passively for long stretches between draws, and an idle cutoff
// would evict correct clients. Liveness is probed with ping/pong instead.

/// Connection handler for a single client.
///
/// Manages the lifecycle of a client connection including:
/// - Protocol handshake
/// - Message processing loop
/// - Coordinator notification on disconnect
pub struct ConnectionHandler {
    /// Buffered reader for incoming frames
    reader: BufReader<OwnedReadHalf>,

    /// Send half of this connection's outbound queue
    outbound: mpsc::Sender<Arc<String>>,

    /// Handle to the game coordinator
    game: GameHandle,

    /// Fan-out registry; this connection's sink is added after handshake
    broadcaster: Arc<FanoutBroadcaster>,

    /// Connection identity (assigned during handshake)
    connection_id: Option<ConnectionId>,

    /// Counter value for generating connection IDs
    connection_number: u64,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// The write half is handed to a dedicated writer task immediately;
    /// every outbound frame for this connection flows through its queue.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the TCP stream
    /// * `writer` - Write half of the TCP stream
    /// * `game` - Handle to the game coordinator
    /// * `broadcaster` - Fan-out registry for coordinator broadcasts
    /// * `connection_number` - Unique number for this connection
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        game: GameHandle,
        broadcaster: Arc<FanoutBroadcaster>,
        connection_number: u64,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        spawn_writer_task(writer, outbound_rx, connection_number);

        Self {
            reader: BufReader::new(reader),
            outbound: outbound_tx,
            game,
            broadcaster,
            connection_id: None,
            connection_number,
        }
    }

    /// Runs the connection handler.
    ///
    /// This is the main entry point - performs handshake then enters the
    /// message processing loop. Returns when the connection closes.
    pub async fn run(mut self) -> Option<ConnectionId> {
        debug!(connection = self.connection_number, "New client connected");

        let connection_id = match self.handle_handshake().await {
            Ok(id) => {
                info!(connection = %id, "Client handshake completed");
                id
            }
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Handshake failed"
                );
                return None;
            }
        };
        self.connection_id = Some(connection_id.clone());

        // Subscribe this connection to coordinator broadcasts, then ask
        // for the roster; it arrives through the queue like every other
        // outbound frame.
        self.broadcaster
            .register(connection_id.clone(), self.outbound.clone());
        self.game.connect(connection_id.clone()).await;

        if let Err(e) = self.process_messages().await {
            debug!(connection = %connection_id, error = %e, "Connection closed");
        }

        self.broadcaster.unregister(&connection_id);
        self.game.leave(connection_id.clone()).await;

        info!(connection = %connection_id, "Client disconnected");
        Some(connection_id)
    }

    /// Handles the initial protocol handshake.
    ///
    /// The first frame must be a `connect` carrying a compatible protocol
    /// version. Anything else is answered with `rejected` and the
    /// connection is dropped.
    async fn handle_handshake(&mut self) -> Result<ConnectionId, ConnectionError> {
        let line = match timeout(HANDSHAKE_TIMEOUT, self.read_line()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::HandshakeTimeout),
        };

        let msg: ClientMessage = match serde_json::from_str(&line) {
            Ok(msg) => msg,
            Err(e) => {
                self.send_direct(&ServerMessage::rejected(format!(
                    "malformed handshake frame: {e}"
                )))
                .await?;
                return Err(ConnectionError::ParseError(e.to_string()));
            }
        };

        let client_version = msg.protocol_version;
        if !client_version.is_compatible_with(&ProtocolVersion::CURRENT) {
            warn!(
                client_version = %client_version,
                server_version = %ProtocolVersion::CURRENT,
                "Protocol version mismatch"
            );

            self.send_direct(&ServerMessage::rejected(
                client_version.mismatch_reason(&ProtocolVersion::CURRENT),
            ))
            .await?;

            return Err(ConnectionError::VersionMismatch {
                client: client_version,
                server: ProtocolVersion::CURRENT,
            });
        }

        match msg.event {
            ClientEvent::Connect { client_id } => {
                // Generate or use provided connection ID
                let assigned = client_id
                    .map(ConnectionId::new)
                    .unwrap_or_else(|| ConnectionId::new(format!("conn-{}", self.connection_number)));

                self.send_direct(&ServerMessage::connected(assigned.clone()))
                    .await?;

                Ok(assigned)
            }
            other => {
                self.send_direct(&ServerMessage::rejected(
                    "handshake must begin with a connect frame",
                ))
                .await?;

                Err(ConnectionError::UnexpectedMessage(other.kind().to_string()))
            }
        }
    }

    /// Main message processing loop.
    ///
    /// Reads and processes frames until the connection closes. A frame
    /// that fails to parse is answered with an error and skipped; the
    /// connection stays up.
    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(ConnectionError::Eof) => {
                    debug!(connection = ?self.connection_id, "Client sent EOF");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            let msg: ClientMessage = match serde_json::from_str(&line) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(
                        connection = ?self.connection_id,
                        error = %e,
                        "Discarding malformed frame"
                    );
                    self.send_direct(&ServerMessage::error(format!("malformed message: {e}")))
                        .await?;
                    continue;
                }
            };

            match self.handle_message(msg).await {
                Ok(()) => {}
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Handles a single client frame.
    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        let Some(connection_id) = self.connection_id.clone() else {
            return Err(ConnectionError::UnexpectedMessage(
                "frame before handshake".to_string(),
            ));
        };

        debug!(connection = %connection_id, kind = msg.event.kind(), "Received frame");

        match msg.event {
            ClientEvent::Connect { .. } => {
                // Already connected - send error
                self.send_direct(&ServerMessage::error("already connected"))
                    .await?;
            }

            ClientEvent::Join { name } => {
                self.game.join(connection_id, name).await;
            }

            ClientEvent::Claim { name, category } => {
                self.game.claim(connection_id, name, category).await;
            }

            ClientEvent::StartRound => {
                if let Err(e) = self.game.start_round().await {
                    self.send_direct(&ServerMessage::error(e.to_string())).await?;
                }
            }

            ClientEvent::DrawNumber => {
                // A successful draw is broadcast by the coordinator; only
                // failures come back to the requester.
                if let Err(e) = self.game.draw_number().await {
                    self.send_direct(&ServerMessage::error(e.to_string())).await?;
                }
            }

            ClientEvent::Ping { seq } => {
                self.send_direct(&ServerMessage::pong(seq)).await?;
            }

            ClientEvent::Disconnect => {
                debug!(connection = %connection_id, "Client requested disconnect");
                return Err(ConnectionError::Eof);
            }
        }

        Ok(())
    }

    /// Reads a single line-delimited frame from the client.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        Ok(line)
    }

    /// Queues a frame for this connection, bypassing the fan-out registry.
    ///
    /// Used for handshake replies and requester-only answers (pongs,
    /// error frames).
    async fn send_direct(&self, message: &ServerMessage) -> Result<(), ConnectionError> {
        let json = serde_json::to_string(message)
            .map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        self.outbound
            .send(Arc::new(json))
            .await
            .map_err(|_| ConnectionError::Io("outbound queue closed".to_string()))
    }
}

/// Spawns the task that drains a connection's outbound queue onto the
/// socket.
///
/// The task stops when the queue closes (handler and fan-out registry
/// both dropped their senders) or when a write fails or times out.
fn spawn_writer_task(
    writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Arc<String>>,
    connection_number: u64,
) {
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);

        while let Some(json) = outbound.recv().await {
            let result = timeout(WRITE_TIMEOUT, async {
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
                Ok::<(), std::io::Error>(())
            })
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(
                        connection = connection_number,
                        error = %e,
                        "Write failed, stopping writer"
                    );
                    break;
                }
                Err(_) => {
                    warn!(
                        connection = connection_number,
                        "Write timed out, stopping writer"
                    );
                    break;
                }
            }
        }

        debug!(connection = connection_number, "Writer task stopped");
    });
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}
