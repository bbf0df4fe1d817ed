//! Domain error types for session operations.

use crate::claim::ClaimCategory;
use crate::session::PlayerName;
use thiserror::Error;

/// Errors a session operation can report.
///
/// None of these are fatal; the session stays servable after any of
/// them. The `AlreadyClaimed` message text is part of the client
/// contract and must name the standing winner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Another player already holds this category.
    #[error("{category} has already been claimed by {winner}")]
    AlreadyClaimed {
        category: ClaimCategory,
        winner: PlayerName,
    },

    /// The ticket does not satisfy the category right now.
    #[error("{category} is not a valid claim for {name}")]
    InvalidClaim {
        category: ClaimCategory,
        name: PlayerName,
    },

    /// No ticket is stored under this name.
    #[error("no ticket found for {0}")]
    UnknownPlayer(PlayerName),

    /// Every number has been called; the round has nothing left to draw.
    #[error("all 90 numbers have been drawn")]
    NumbersExhausted,
}

/// Result type for session operations.
pub type GameResult<T> = Result<T, GameError>;
