//! Game session coordination using Actor pattern.
//!
//! The coordinator is the central state manager for the Tambola session.
//! It receives commands via a tokio mpsc channel and is the canonical
//! source of truth for players, tickets, drawn numbers, and winners.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ TCP connections  │────▶│    GameActor    │────▶│   Broadcaster   │
//! │ + HTTP triggers  │     │  (state owner)  │     │   (fan-out)     │
//! └──────────────────┘     └─────────────────┘     └─────────────────┘
//!         │                        │                       │
//!         │    GameCommand         │    SessionState       │  ServerMessage
//!         │    (mpsc channel)      │    (single task)      │  (per-conn queues)
//!         ▼                        ▼                       ▼
//!    join/claim/draw        sequential handling      connected clients
//! ```
//!
//! Sequential command handling is what makes claim resolution atomic:
//! the first valid claim for a category wins, every later one is refused
//! with the standing winner's name.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use crate::broadcast::Broadcaster;

mod actor;
mod commands;
mod handle;

pub use actor::GameActor;
pub use commands::{CoordinatorError, GameCommand};
pub use handle::GameHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the game actor and return a handle for interaction.
///
/// This function:
/// 1. Creates the command channel
/// 2. Spawns the GameActor on a tokio task with an entropy-seeded RNG
/// 3. Returns a GameHandle for client use
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tambolad::broadcast::FanoutBroadcaster;
/// use tambolad::game::spawn_coordinator;
///
/// #[tokio::main]
/// async fn main() {
///     let broadcaster = Arc::new(FanoutBroadcaster::new());
///     let handle = spawn_coordinator(broadcaster);
///
///     let _ = handle.start_round().await;
/// }
/// ```
pub fn spawn_coordinator<B: Broadcaster>(broadcaster: Arc<B>) -> GameHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = GameActor::new(cmd_rx, broadcaster, StdRng::from_os_rng());
    tokio::spawn(actor.run());

    GameHandle::new(cmd_tx)
}
