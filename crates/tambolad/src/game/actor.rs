//! Game actor - owns session state and processes commands.
//!
//! The GameActor is the single owner of game state in the daemon. It
//! receives commands via an mpsc channel and delivers outcomes to clients
//! through the [`Broadcaster`].

use std::sync::Arc;

use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tambola_core::{ClaimCategory, ConnectionId, GameError, PlayerName, SessionState, Ticket};
use tambola_protocol::ServerMessage;

use crate::broadcast::Broadcaster;

use super::commands::GameCommand;

// ============================================================================
// Game Actor
// ============================================================================

/// The game actor - owns all session state.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and pushes outcomes to clients through
/// the broadcaster.
///
/// # Ownership
///
/// The actor owns:
/// - `state`: the session (players, tickets, drawn numbers, winners)
/// - `rng`: the randomness source for ticket generation and draws
///
/// # Claim Ordering
///
/// The actor runs in a single task and processes commands sequentially,
/// so competing claims for the same category are judged in arrival
/// order. The first valid claim records the winner; every later claim
/// for that category sees the recorded entry and is refused.
pub struct GameActor<B: Broadcaster> {
    /// Command receiver
    receiver: mpsc::Receiver<GameCommand>,

    /// Players, tickets, drawn numbers, and winners for the session
    state: SessionState,

    /// Randomness for ticket generation and number draws
    rng: StdRng,

    /// Outbound delivery to connected clients
    broadcaster: Arc<B>,
}

impl<B: Broadcaster> GameActor<B> {
    /// Creates a new game actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `broadcaster` - Outbound delivery to connected clients
    /// * `rng` - Randomness source (seeded in tests, entropy in production)
    pub fn new(receiver: mpsc::Receiver<GameCommand>, broadcaster: Arc<B>, rng: StdRng) -> Self {
        Self {
            receiver,
            state: SessionState::new(),
            rng,
            broadcaster,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Game actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            "Game actor stopped (players: {})",
            self.state.player_count()
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Connect { connection } => {
                self.handle_connect(connection);
            }
            GameCommand::Join { connection, name } => {
                self.handle_join(connection, name);
            }
            GameCommand::Claim {
                connection,
                name,
                category,
            } => {
                self.handle_claim(connection, name, category);
            }
            GameCommand::Leave { connection } => {
                self.handle_leave(connection);
            }
            GameCommand::StartRound { respond_to } => {
                self.handle_start_round();
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(());
            }
            GameCommand::DrawNumber { respond_to } => {
                let result = self.handle_draw_number();
                let _ = respond_to.send(result);
            }
            GameCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.state.snapshot());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Answers a fresh connection with the current roster.
    fn handle_connect(&self, connection: ConnectionId) {
        let roster = self.state.roster();
        info!(
            connection = %connection,
            players = roster.len(),
            "Connection entered session"
        );
        self.broadcaster
            .send_to(&connection, &ServerMessage::roster(roster));
    }

    /// Registers a player and issues a ticket.
    ///
    /// The ticket goes back to the joining connection; everyone else
    /// learns the name. A second join on the same connection renames the
    /// player in place and issues a fresh ticket under the new name.
    fn handle_join(&mut self, connection: ConnectionId, name: PlayerName) {
        let ticket = Ticket::generate(&mut self.rng);
        self.state
            .join(connection.clone(), name.clone(), ticket.clone());

        info!(
            connection = %connection,
            name = %name,
            players = self.state.player_count(),
            "Player joined"
        );

        self.broadcaster
            .send_to(&connection, &ServerMessage::ticket_issued(ticket));
        self.broadcaster
            .broadcast_except(&connection, &ServerMessage::player_joined(name));
    }

    /// Judges a claim and routes the outcome.
    ///
    /// Valid claims are announced to everyone. Conflicting or premature
    /// claims are reported to the submitting connection alone. A claim
    /// for a name with no ticket is dropped without an answer.
    fn handle_claim(&mut self, connection: ConnectionId, name: PlayerName, category: ClaimCategory) {
        match self.state.claim(&name, category) {
            Ok(()) => {
                info!(name = %name, category = %category, "Claim verified");
                self.broadcaster
                    .broadcast_all(&ServerMessage::winner_announced(name, category));
            }
            Err(GameError::UnknownPlayer(_)) => {
                debug!(
                    name = %name,
                    category = %category,
                    "Claim for unknown player dropped"
                );
            }
            Err(err) => {
                debug!(name = %name, category = %category, error = %err, "Claim refused");
                self.broadcaster
                    .send_to(&connection, &ServerMessage::error(err.to_string()));
            }
        }
    }

    /// Removes a departed connection's player, if it had one.
    fn handle_leave(&mut self, connection: ConnectionId) {
        match self.state.leave(&connection) {
            Some(name) => {
                info!(
                    connection = %connection,
                    name = %name,
                    players = self.state.player_count(),
                    "Player left"
                );
                self.broadcaster
                    .broadcast_all(&ServerMessage::player_left(name));
            }
            None => {
                debug!(connection = %connection, "Connection left without joining");
            }
        }
    }

    /// Clears draws and winners and announces the fresh round.
    fn handle_start_round(&mut self) {
        self.state.start_round();
        info!("Round started, draws and winners cleared");
        self.broadcaster
            .broadcast_all(&ServerMessage::round_started());
    }

    /// Draws the next number and announces it.
    ///
    /// On exhaustion nothing is broadcast; the error travels back on the
    /// command's reply channel only.
    fn handle_draw_number(&mut self) -> Result<u8, GameError> {
        match self.state.draw(&mut self.rng) {
            Ok(number) => {
                info!(
                    number,
                    total_drawn = self.state.drawn().len(),
                    "Number drawn"
                );
                self.broadcaster
                    .broadcast_all(&ServerMessage::number_drawn(number));
                Ok(number)
            }
            Err(err) => {
                warn!(error = %err, "Draw refused");
                Err(err)
            }
        }
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of players currently in the session.
    #[cfg(test)]
    pub fn player_count(&self) -> usize {
        self.state.player_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{RecordingBroadcaster, SendTarget};
    use rand::SeedableRng;
    use tokio::sync::oneshot;

    fn create_actor() -> (GameActor<RecordingBroadcaster>, Arc<RecordingBroadcaster>) {
        let (_cmd_tx, cmd_rx) = mpsc::channel(16);
        let recorder = Arc::new(RecordingBroadcaster::new());
        let actor = GameActor::new(cmd_rx, Arc::clone(&recorder), StdRng::seed_from_u64(7));
        (actor, recorder)
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    /// Pulls the issued ticket out of the recorded deliveries.
    fn issued_ticket(recorder: &RecordingBroadcaster, connection: &ConnectionId) -> Ticket {
        recorder
            .recorded()
            .iter()
            .find_map(|(target, message)| match (target, message) {
                (SendTarget::One(id), ServerMessage::TicketIssued { ticket })
                    if id == connection =>
                {
                    Some(ticket.clone())
                }
                _ => None,
            })
            .expect("no ticket issued to connection")
    }

    /// Draws through commands until every ticket number has been called.
    ///
    /// The draw that completes coverage is necessarily a ticket number,
    /// so a FullHouse claim made right after is valid.
    fn draw_until_covered(actor: &mut GameActor<RecordingBroadcaster>, ticket: &Ticket) {
        let numbers = ticket.numbers();
        loop {
            let (tx, _rx) = oneshot::channel();
            actor.handle_command(GameCommand::DrawNumber { respond_to: tx });
            if numbers.iter().all(|n| actor.state.drawn().contains(*n)) {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_connect_sends_roster_to_requester() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Connect {
            connection: conn("conn-1"),
        });

        let recorded = recorder.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, SendTarget::One(conn("conn-1")));
        assert!(
            matches!(&recorded[0].1, ServerMessage::Roster { players } if players.is_empty())
        );
    }

    #[tokio::test]
    async fn test_join_issues_ticket_and_notifies_others() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
        });

        let recorded = recorder.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].0, SendTarget::One(conn("conn-1")));
        assert!(matches!(recorded[0].1, ServerMessage::TicketIssued { .. }));
        assert_eq!(recorded[1].0, SendTarget::AllExcept(conn("conn-1")));
        assert!(
            matches!(&recorded[1].1, ServerMessage::PlayerJoined { name } if name.as_str() == "alice")
        );
        assert_eq!(actor.player_count(), 1);
    }

    #[tokio::test]
    async fn test_rejoin_same_connection_renames_in_place() {
        let (mut actor, _recorder) = create_actor();

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
        });
        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("alicia"),
        });

        assert_eq!(actor.player_count(), 1);
        assert_eq!(actor.state.roster(), [PlayerName::new("alicia")]);
    }

    #[tokio::test]
    async fn test_roster_lists_players_in_join_order() {
        let (mut actor, recorder) = create_actor();

        for (id, name) in [("conn-1", "carol"), ("conn-2", "alice"), ("conn-3", "bob")] {
            actor.handle_command(GameCommand::Join {
                connection: conn(id),
                name: PlayerName::new(name),
            });
        }
        actor.handle_command(GameCommand::Connect {
            connection: conn("conn-4"),
        });

        let recorded = recorder.recorded();
        let (target, message) = recorded.last().unwrap();
        assert_eq!(*target, SendTarget::One(conn("conn-4")));
        match message {
            ServerMessage::Roster { players } => {
                let names: Vec<&str> = players.iter().map(|p| p.as_str()).collect();
                assert_eq!(names, ["carol", "alice", "bob"]);
            }
            other => panic!("Expected Roster, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leave_broadcasts_player_left() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
        });
        actor.handle_command(GameCommand::Leave {
            connection: conn("conn-1"),
        });

        let recorded = recorder.recorded();
        let (target, message) = recorded.last().unwrap();
        assert_eq!(*target, SendTarget::All);
        assert!(
            matches!(message, ServerMessage::PlayerLeft { name } if name.as_str() == "alice")
        );
        assert_eq!(actor.player_count(), 0);
    }

    #[tokio::test]
    async fn test_leave_without_join_is_silent() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Leave {
            connection: conn("conn-9"),
        });

        assert!(recorder.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_start_round_broadcasts_and_acknowledges() {
        let (mut actor, recorder) = create_actor();
        let (tx, rx) = oneshot::channel();

        actor.handle_command(GameCommand::StartRound { respond_to: tx });

        assert!(rx.await.is_ok());
        let recorded = recorder.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, SendTarget::All);
        assert!(matches!(recorded[0].1, ServerMessage::RoundStarted));
    }

    #[tokio::test]
    async fn test_draw_broadcasts_number_to_everyone() {
        let (mut actor, recorder) = create_actor();
        let (tx, rx) = oneshot::channel();

        actor.handle_command(GameCommand::DrawNumber { respond_to: tx });

        let number = rx.await.unwrap().unwrap();
        assert!((1..=90).contains(&number));

        let recorded = recorder.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, SendTarget::All);
        assert!(
            matches!(recorded[0].1, ServerMessage::NumberDrawn { number: n } if n == number)
        );
    }

    #[tokio::test]
    async fn test_draw_exhaustion_errors_without_broadcast() {
        let (mut actor, recorder) = create_actor();

        for _ in 0..90 {
            let (tx, rx) = oneshot::channel();
            actor.handle_command(GameCommand::DrawNumber { respond_to: tx });
            assert!(rx.await.unwrap().is_ok());
        }

        let (tx, rx) = oneshot::channel();
        actor.handle_command(GameCommand::DrawNumber { respond_to: tx });
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(GameError::NumbersExhausted)));

        let drawn_broadcasts = recorder
            .recorded()
            .iter()
            .filter(|(_, m)| matches!(m, ServerMessage::NumberDrawn { .. }))
            .count();
        assert_eq!(drawn_broadcasts, 90);
    }

    #[tokio::test]
    async fn test_claim_for_unknown_player_is_dropped() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Claim {
            connection: conn("conn-1"),
            name: PlayerName::new("ghost"),
            category: ClaimCategory::EarlyFive,
        });

        assert!(recorder.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_premature_claim_refused_to_claimant_only() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("carol"),
        });
        actor.handle_command(GameCommand::Claim {
            connection: conn("conn-1"),
            name: PlayerName::new("carol"),
            category: ClaimCategory::FirstRow,
        });

        let recorded = recorder.recorded();
        let (target, message) = recorded.last().unwrap();
        assert_eq!(*target, SendTarget::One(conn("conn-1")));
        match message {
            ServerMessage::Error { message } => {
                assert_eq!(message, "FirstRow is not a valid claim for carol");
            }
            other => panic!("Expected Error, got {other:?}"),
        }
        assert!(
            !recorded
                .iter()
                .any(|(_, m)| matches!(m, ServerMessage::WinnerAnnounced { .. }))
        );
    }

    #[tokio::test]
    async fn test_full_house_claim_announced_to_everyone() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
        });
        let ticket = issued_ticket(&recorder, &conn("conn-1"));
        draw_until_covered(&mut actor, &ticket);

        actor.handle_command(GameCommand::Claim {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
            category: ClaimCategory::FullHouse,
        });

        let recorded = recorder.recorded();
        let (target, message) = recorded.last().unwrap();
        assert_eq!(*target, SendTarget::All);
        assert!(matches!(
            message,
            ServerMessage::WinnerAnnounced { name, category: ClaimCategory::FullHouse }
                if name.as_str() == "alice"
        ));
    }

    #[tokio::test]
    async fn test_conflicting_claim_names_standing_winner() {
        let (mut actor, recorder) = create_actor();

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
        });
        let ticket = issued_ticket(&recorder, &conn("conn-1"));
        draw_until_covered(&mut actor, &ticket);
        actor.handle_command(GameCommand::Claim {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
            category: ClaimCategory::FullHouse,
        });

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-2"),
            name: PlayerName::new("bob"),
        });
        actor.handle_command(GameCommand::Claim {
            connection: conn("conn-2"),
            name: PlayerName::new("bob"),
            category: ClaimCategory::FullHouse,
        });

        let recorded = recorder.recorded();
        let (target, message) = recorded.last().unwrap();
        assert_eq!(*target, SendTarget::One(conn("conn-2")));
        match message {
            ServerMessage::Error { message } => {
                assert_eq!(message, "FullHouse has already been claimed by alice");
            }
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_reports_session() {
        let (mut actor, _recorder) = create_actor();

        actor.handle_command(GameCommand::Join {
            connection: conn("conn-1"),
            name: PlayerName::new("alice"),
        });
        let (tx, _rx) = oneshot::channel();
        actor.handle_command(GameCommand::StartRound { respond_to: tx });
        let (tx, rx) = oneshot::channel();
        actor.handle_command(GameCommand::DrawNumber { respond_to: tx });
        let number = rx.await.unwrap().unwrap();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(GameCommand::Snapshot { respond_to: tx });
        let snapshot = rx.await.unwrap();

        assert_eq!(snapshot.players, [PlayerName::new("alice")]);
        assert_eq!(snapshot.drawn_numbers, [number]);
        assert!(snapshot.winners.is_empty());
        assert!(snapshot.round_started_at.is_some());
    }
}
