//! Tambola Core - Domain types for the session daemon
//!
//! This crate provides the game domain shared between the daemon
//! (tambolad) and the wire protocol: tickets and their constrained
//! generator, claim verification, the draw pool and the session state
//! that ties them together.
//!
//! Everything here is synchronous and I/O-free; randomness comes in
//! through `&mut impl Rng` parameters so callers control seeding.

pub mod claim;
pub mod draw;
pub mod error;
pub mod session;
pub mod ticket;

// Re-exports for convenience
pub use claim::{verify, ClaimCategory, EARLY_FIVE_COUNT};
pub use draw::DrawnNumbers;
pub use error::{GameError, GameResult};
pub use session::{
    ConnectionId, PlayerEntry, PlayerName, RecordedWin, SessionSnapshot, SessionState,
};
pub use ticket::{
    band_column, Ticket, MAX_NUMBER, MAX_PER_BAND, NUMBERS_PER_ROW, NUMBERS_PER_TICKET,
    TICKET_COLS, TICKET_ROWS,
};
