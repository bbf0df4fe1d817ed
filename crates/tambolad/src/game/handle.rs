//! Client interface for interacting with the GameActor.
//!
//! The `GameHandle` provides a cheap-to-clone interface for sending
//! commands to the game actor. Connection-scoped operations are
//! fire-and-forget (outcomes reach clients through the broadcaster);
//! trigger operations await the actor's reply.

use tokio::sync::{mpsc, oneshot};

use tambola_core::{ClaimCategory, ConnectionId, PlayerName, SessionSnapshot};

use super::commands::{CoordinatorError, GameCommand};

// ============================================================================
// Game Handle
// ============================================================================

/// Handle for interacting with the game actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// // Clone the handle to share across tasks
/// let handle = game_handle.clone();
///
/// // Report a join; the ticket comes back over the broadcaster
/// handle.join(connection_id, name).await;
///
/// // Trigger a draw and await the called number
/// let number = handle.draw_number().await?;
/// ```
#[derive(Clone)]
pub struct GameHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    /// Create a new game handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    pub fn new(sender: mpsc::Sender<GameCommand>) -> Self {
        Self { sender }
    }

    /// Report a connection that completed its handshake.
    ///
    /// The actor answers with the roster over the broadcaster. This is a
    /// fire-and-forget operation; send errors are ignored because the
    /// actor may be shutting down.
    pub async fn connect(&self, connection: ConnectionId) {
        let _ = self.sender.send(GameCommand::Connect { connection }).await;
    }

    /// Enter the session under a display name.
    ///
    /// The ticket reaches the joining connection over the broadcaster;
    /// everyone else is told the name joined. Fire-and-forget.
    pub async fn join(&self, connection: ConnectionId, name: PlayerName) {
        let _ = self
            .sender
            .send(GameCommand::Join { connection, name })
            .await;
    }

    /// Submit a prize claim for a named player.
    ///
    /// The verdict reaches clients over the broadcaster: an announcement
    /// to everyone on success, an error to the submitting connection on
    /// conflict or premature claims. Fire-and-forget.
    pub async fn claim(&self, connection: ConnectionId, name: PlayerName, category: ClaimCategory) {
        let _ = self
            .sender
            .send(GameCommand::Claim {
                connection,
                name,
                category,
            })
            .await;
    }

    /// Report a departed connection.
    ///
    /// If the connection had joined, its player is removed and the
    /// departure broadcast. Fire-and-forget.
    pub async fn leave(&self, connection: ConnectionId) {
        let _ = self.sender.send(GameCommand::Leave { connection }).await;
    }

    /// Reset draws and winners so a fresh round can begin.
    ///
    /// The reset is broadcast to every connection before this returns.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn start_round(&self) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(GameCommand::StartRound { respond_to: tx })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Call the next number.
    ///
    /// The draw is broadcast to every connection; the number also comes
    /// back to the caller.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::Game(GameError::NumbersExhausted)` if all 90
    ///   numbers have been drawn
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn draw_number(&self) -> Result<u8, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(GameCommand::DrawNumber { respond_to: tx })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        let result = rx.await.map_err(|_| CoordinatorError::ChannelClosed)?;
        Ok(result?)
    }

    /// Read the current session state.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::ChannelClosed` if the actor has shut down
    pub async fn snapshot(&self) -> Result<SessionSnapshot, CoordinatorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(GameCommand::Snapshot { respond_to: tx })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;

        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tambola_core::GameError;

    fn create_test_handle() -> (GameHandle, mpsc::Receiver<GameCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let handle = GameHandle::new(cmd_tx);
        (handle, cmd_rx)
    }

    #[tokio::test]
    async fn test_handle_is_clone() {
        let (handle, _rx) = create_test_handle();
        let _cloned = handle.clone();
        // Compiles = test passes
    }

    #[tokio::test]
    async fn test_join_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(GameCommand::Join { connection, name }) = rx.recv().await {
                assert_eq!(connection.as_str(), "conn-1");
                assert_eq!(name.as_str(), "alice");
                return true;
            }
            false
        });

        handle
            .join(ConnectionId::new("conn-1"), PlayerName::new("alice"))
            .await;
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(GameCommand::Claim {
                connection,
                name,
                category,
            }) = rx.recv().await
            {
                assert_eq!(connection.as_str(), "conn-1");
                assert_eq!(name.as_str(), "bob");
                assert_eq!(category, ClaimCategory::EarlyFive);
                return true;
            }
            false
        });

        handle
            .claim(
                ConnectionId::new("conn-1"),
                PlayerName::new("bob"),
                ClaimCategory::EarlyFive,
            )
            .await;
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_start_round_round_trip() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(GameCommand::StartRound { respond_to }) = rx.recv().await {
                let _ = respond_to.send(());
                return true;
            }
            false
        });

        let result = handle.start_round().await;
        assert!(result.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_draw_number_round_trip() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(GameCommand::DrawNumber { respond_to }) = rx.recv().await {
                let _ = respond_to.send(Ok(55));
                return true;
            }
            false
        });

        let number = handle.draw_number().await;
        assert_eq!(number.ok(), Some(55));
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_draw_number_propagates_game_error() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(GameCommand::DrawNumber { respond_to }) = rx.recv().await {
                let _ = respond_to.send(Err(GameError::NumbersExhausted));
                return true;
            }
            false
        });

        let result = handle.draw_number().await;
        assert!(matches!(
            result,
            Err(CoordinatorError::Game(GameError::NumbersExhausted))
        ));
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(GameCommand::Snapshot { respond_to }) = rx.recv().await {
                let _ = respond_to.send(SessionSnapshot {
                    players: vec![PlayerName::new("alice")],
                    drawn_numbers: vec![4, 16],
                    winners: Vec::new(),
                    round_started_at: None,
                });
                return true;
            }
            false
        });

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.players, [PlayerName::new("alice")]);
        assert_eq!(snapshot.drawn_numbers, [4, 16]);
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_start_round_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx); // Close the channel

        let result = handle.start_round().await;
        assert!(matches!(result, Err(CoordinatorError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_snapshot_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.snapshot().await;
        assert!(matches!(result, Err(CoordinatorError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_fire_and_forget_ignores_closed_channel() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        // Should not panic or error
        handle.connect(ConnectionId::new("conn-1")).await;
        handle.leave(ConnectionId::new("conn-1")).await;
    }

    #[tokio::test]
    async fn test_is_connected() {
        let (handle, rx) = create_test_handle();

        assert!(handle.is_connected());

        drop(rx);
        // Need to send to detect closure
        handle.connect(ConnectionId::new("conn-1")).await;

        // After dropping receiver and attempting send, channel should be closed
        assert!(!handle.is_connected());
    }
}
