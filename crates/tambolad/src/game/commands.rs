//! Game coordinator commands and errors.
//!
//! This module defines the message types for communicating with the
//! `GameActor`:
//! - `GameCommand`: Commands sent to the actor
//! - `CoordinatorError`: Errors that can occur while commanding the actor
//!
//! Connection-scoped commands (`Connect`, `Join`, `Claim`, `Leave`) are
//! fire-and-forget; their results travel to clients through the
//! broadcaster. Trigger commands carry a oneshot channel so HTTP callers
//! get an acknowledgement or error back.

use tambola_core::{ClaimCategory, ConnectionId, GameError, PlayerName, SessionSnapshot};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Game Commands
// ============================================================================

/// Commands sent to the game actor.
///
/// Request-response commands use a oneshot channel for the reply:
///
/// ```ignore
/// let (tx, rx) = oneshot::channel();
/// game_tx.send(GameCommand::DrawNumber { respond_to: tx }).await?;
/// let number = rx.await??;
/// ```
#[derive(Debug)]
pub enum GameCommand {
    /// A connection completed its handshake.
    ///
    /// The actor answers with the current roster over the broadcaster,
    /// addressed to this connection only.
    Connect {
        /// The newly connected client
        connection: ConnectionId,
    },

    /// Enter the session under a display name.
    ///
    /// Generates a ticket for the name and stores it. The ticket goes
    /// back to this connection; everyone else learns the name joined.
    /// Joining again on the same connection renames the player in place.
    Join {
        /// Connection the join arrived on
        connection: ConnectionId,
        /// Chosen display name
        name: PlayerName,
    },

    /// Judge a prize claim for a named player.
    ///
    /// A valid claim is announced to everyone. A conflicting or premature
    /// claim is reported to the submitting connection alone. A claim for
    /// a name with no ticket is dropped.
    Claim {
        /// Connection the claim arrived on
        connection: ConnectionId,
        /// Player the claim is made for
        name: PlayerName,
        /// Category being claimed
        category: ClaimCategory,
    },

    /// A connection went away.
    ///
    /// If it had joined, the player and ticket are removed and the
    /// departure is broadcast. Unknown connections are a no-op.
    Leave {
        /// The departed connection
        connection: ConnectionId,
    },

    /// Reset draws and winners so a fresh round can begin.
    ///
    /// The reset is broadcast to every connection; the oneshot carries
    /// the acknowledgement for the trigger caller.
    StartRound {
        /// Channel to confirm the reset happened
        respond_to: oneshot::Sender<()>,
    },

    /// Call the next number.
    ///
    /// A successful draw is broadcast to every connection and echoed on
    /// the oneshot.
    ///
    /// # Errors
    /// - `GameError::NumbersExhausted` if all 90 numbers have been drawn
    DrawNumber {
        /// Channel to send the drawn number or the failure
        respond_to: oneshot::Sender<Result<u8, GameError>>,
    },

    /// Read the current session state.
    Snapshot {
        /// Channel to send the snapshot
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

// ============================================================================
// Coordinator Errors
// ============================================================================

/// Errors that can occur while commanding the game actor.
///
/// Uses `thiserror` for ergonomic error handling and Display implementations.
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    /// A game rule rejected the operation.
    #[error("{0}")]
    Game(#[from] GameError),

    /// The command or response channel was closed before a reply arrived.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}
