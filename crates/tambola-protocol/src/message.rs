//! Wire message types between clients and the session daemon.

use crate::version::ProtocolVersion;
use serde::{Deserialize, Serialize};
use tambola_core::{ClaimCategory, ConnectionId, PlayerName, Ticket};

/// Game actions a client can request.
///
/// Categories inside `Claim` travel by variant name ("FirstRow", ...,
/// "FullHouse"); a spelling outside that set fails deserialization, so
/// an unknown category never reaches the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Handshake, must be the first frame on a connection
    Connect {
        /// Connection identity the client wants; server assigns one if absent
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Enter the session under a display name and receive a ticket
    Join {
        /// Chosen display name
        name: PlayerName,
    },

    /// Claim a prize category for a named player
    Claim {
        /// Player the claim is made for
        name: PlayerName,
        /// Category being claimed
        category: ClaimCategory,
    },

    /// Reset draws and winners, begin a round
    StartRound,

    /// Call the next number
    DrawNumber,

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Client disconnecting gracefully
    Disconnect,
}

impl ClientEvent {
    /// Wire tag of this event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Join { .. } => "join",
            Self::Claim { .. } => "claim",
            Self::StartRound => "start_round",
            Self::DrawNumber => "draw_number",
            Self::Ping { .. } => "ping",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub event: ClientEvent,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(event: ClientEvent) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            event,
        }
    }

    /// Creates a connect handshake.
    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(ClientEvent::Connect { client_id })
    }

    /// Creates a join request.
    pub fn join(name: impl Into<PlayerName>) -> Self {
        Self::new(ClientEvent::Join { name: name.into() })
    }

    /// Creates a claim request.
    pub fn claim(name: impl Into<PlayerName>, category: ClaimCategory) -> Self {
        Self::new(ClientEvent::Claim {
            name: name.into(),
            category,
        })
    }

    /// Creates a round start request.
    pub fn start_round() -> Self {
        Self::new(ClientEvent::StartRound)
    }

    /// Creates a draw request.
    pub fn draw_number() -> Self {
        Self::new(ClientEvent::DrawNumber)
    }

    /// Creates a ping message.
    pub fn ping(seq: u64) -> Self {
        Self::new(ClientEvent::Ping { seq })
    }

    /// Creates a disconnect message.
    pub fn disconnect() -> Self {
        Self::new(ClientEvent::Disconnect)
    }
}

/// Messages sent from the daemon to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted
    Connected {
        /// Daemon's protocol version
        protocol_version: ProtocolVersion,
        /// Connection identity for this client
        client_id: ConnectionId,
    },

    /// Handshake refused (version mismatch, server full)
    Rejected {
        /// Reason for rejection
        reason: String,
        /// Daemon's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// Names currently in the session, join order; sent once at connect
    Roster {
        players: Vec<PlayerName>,
    },

    /// The joining player's freshly generated ticket
    TicketIssued {
        ticket: Ticket,
    },

    /// Someone else joined the session
    PlayerJoined {
        name: PlayerName,
    },

    /// A named player disconnected
    PlayerLeft {
        name: PlayerName,
    },

    /// Draws and winners were reset
    RoundStarted,

    /// The caller drew a number
    NumberDrawn {
        number: u8,
    },

    /// A claim was verified and the prize is settled
    WinnerAnnounced {
        name: PlayerName,
        category: ClaimCategory,
    },

    /// Pong response to ping
    Pong {
        seq: u64,
    },

    /// Error response, delivered only to the requesting connection
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Rejected { .. } => "rejected",
            Self::Roster { .. } => "roster",
            Self::TicketIssued { .. } => "ticket_issued",
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::RoundStarted => "round_started",
            Self::NumberDrawn { .. } => "number_drawn",
            Self::WinnerAnnounced { .. } => "winner_announced",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }

    /// Creates a connected response.
    pub fn connected(client_id: ConnectionId) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    /// Creates a roster push.
    pub fn roster(players: Vec<PlayerName>) -> Self {
        Self::Roster { players }
    }

    /// Creates a ticket delivery.
    pub fn ticket_issued(ticket: Ticket) -> Self {
        Self::TicketIssued { ticket }
    }

    /// Creates a player joined notification.
    pub fn player_joined(name: PlayerName) -> Self {
        Self::PlayerJoined { name }
    }

    /// Creates a player left notification.
    pub fn player_left(name: PlayerName) -> Self {
        Self::PlayerLeft { name }
    }

    /// Creates a round started notification.
    pub fn round_started() -> Self {
        Self::RoundStarted
    }

    /// Creates a number drawn notification.
    pub fn number_drawn(number: u8) -> Self {
        Self::NumberDrawn { number }
    }

    /// Creates a winner announcement.
    pub fn winner_announced(name: PlayerName, category: ClaimCategory) -> Self {
        Self::WinnerAnnounced { name, category }
    }

    /// Creates a pong response.
    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
