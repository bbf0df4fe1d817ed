//! Session state and identity value objects.

use crate::claim::{self, ClaimCategory};
use crate::draw::DrawnNumbers;
use crate::error::{GameError, GameResult};
use crate::ticket::Ticket;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// A player's chosen display name.
///
/// Names are not unique across a session; a second join under an
/// existing name simply takes over that name's ticket slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PlayerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PlayerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PlayerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Transport-level identity of one client connection.
///
/// Assigned by the server at handshake ("conn-1", "conn-2", ...) unless
/// the client supplies its own. Distinct from [`PlayerName`] so the two
/// can never be mixed up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Players
// ============================================================================

/// One joined player: the connection it arrived on, the chosen name and
/// when the join happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEntry {
    pub connection: ConnectionId,
    pub name: PlayerName,
    pub joined_at: DateTime<Utc>,
}

// ============================================================================
// Session State
// ============================================================================

/// The whole mutable state of one running session.
///
/// Owned exclusively by the coordinator; everything mutates through the
/// operation methods below, each of which is a single atomic transition.
/// Players are kept in join order so the roster reads out the way
/// players arrived.
#[derive(Debug, Default)]
pub struct SessionState {
    players: Vec<PlayerEntry>,
    tickets: HashMap<PlayerName, Ticket>,
    drawn: DrawnNumbers,
    winners: HashMap<ClaimCategory, PlayerName>,
    round_started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` on `connection` and stores its freshly
    /// generated `ticket`.
    ///
    /// A connection joining again keeps its roster position but takes
    /// the new name, dropping the old name's ticket; a name joining
    /// from a second connection takes over the name's ticket slot.
    /// Neither case is rejected.
    pub fn join(&mut self, connection: ConnectionId, name: PlayerName, ticket: Ticket) {
        match self.players.iter_mut().find(|p| p.connection == connection) {
            Some(entry) => {
                let old = std::mem::replace(&mut entry.name, name.clone());
                if old != name {
                    self.tickets.remove(&old);
                }
            }
            None => self.players.push(PlayerEntry {
                connection,
                name: name.clone(),
                joined_at: Utc::now(),
            }),
        }
        self.tickets.insert(name, ticket);
    }

    /// Removes the player joined on `connection`, dropping their ticket.
    ///
    /// Returns the name that left, or `None` when the connection never
    /// joined (in which case nothing changes).
    pub fn leave(&mut self, connection: &ConnectionId) -> Option<PlayerName> {
        let idx = self.players.iter().position(|p| p.connection == *connection)?;
        let entry = self.players.remove(idx);
        self.tickets.remove(&entry.name);
        Some(entry.name)
    }

    /// Starts a round: clears the call history and the winner record in
    /// one step. Tickets and joined players carry over.
    pub fn start_round(&mut self) {
        self.drawn.clear();
        self.winners.clear();
        self.round_started_at = Some(Utc::now());
        debug!(players = self.players.len(), "Round state reset");
    }

    /// Draws the next number for the round.
    pub fn draw(&mut self, rng: &mut impl Rng) -> GameResult<u8> {
        self.drawn.draw(rng)
    }

    /// Resolves a claim of `category` by `name`.
    ///
    /// The lookup, the standing-winner check, the verification and the
    /// commit all happen inside this one call, so no other claim can
    /// slip between the check and the record.
    pub fn claim(&mut self, name: &PlayerName, category: ClaimCategory) -> GameResult<()> {
        let Some(ticket) = self.tickets.get(name) else {
            return Err(GameError::UnknownPlayer(name.clone()));
        };

        if let Some(winner) = self.winners.get(&category) {
            return Err(GameError::AlreadyClaimed {
                category,
                winner: winner.clone(),
            });
        }

        if !claim::verify(ticket, category, &self.drawn) {
            return Err(GameError::InvalidClaim {
                category,
                name: name.clone(),
            });
        }

        self.winners.insert(category, name.clone());
        debug!(winner = %name, %category, "Win recorded");
        Ok(())
    }

    /// Display names in join order.
    pub fn roster(&self) -> Vec<PlayerName> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    /// The name joined on `connection`, if any.
    pub fn name_of(&self, connection: &ConnectionId) -> Option<&PlayerName> {
        self.players
            .iter()
            .find(|p| p.connection == *connection)
            .map(|p| &p.name)
    }

    /// The ticket stored under `name`, if any.
    pub fn ticket_for(&self, name: &PlayerName) -> Option<&Ticket> {
        self.tickets.get(name)
    }

    /// The round's call history.
    pub fn drawn(&self) -> &DrawnNumbers {
        &self.drawn
    }

    /// The standing winner of `category`, if the prize is gone.
    pub fn winner_of(&self, category: ClaimCategory) -> Option<&PlayerName> {
        self.winners.get(&category)
    }

    /// Count of joined players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// A serializable view of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            players: self.roster(),
            drawn_numbers: self.drawn.as_slice().to_vec(),
            winners: ClaimCategory::ALL
                .into_iter()
                .filter_map(|category| {
                    self.winners.get(&category).map(|winner| RecordedWin {
                        category,
                        winner: winner.clone(),
                    })
                })
                .collect(),
            round_started_at: self.round_started_at,
        }
    }
}

// ============================================================================
// Snapshot View
// ============================================================================

/// One settled prize in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedWin {
    pub category: ClaimCategory,
    pub winner: PlayerName,
}

/// Read-only view of a session, safe to hand to dashboards and tests.
///
/// Winners are listed in category declaration order regardless of when
/// each prize fell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub players: Vec<PlayerName>,
    pub drawn_numbers: Vec<u8>,
    pub winners: Vec<RecordedWin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_started_at: Option<DateTime<Utc>>,
}
