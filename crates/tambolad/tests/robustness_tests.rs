//! Robustness tests for the game daemon.
//!
//! These tests verify the daemon handles edge cases and error conditions
//! gracefully:
//! - Malformed frames
//! - Frame size limits
//! - Rapid connect/disconnect
//! - High-frequency draws
//! - Recovery after errors

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tambola_core::{ClaimCategory, MAX_NUMBER};
use tambola_protocol::{ClientMessage, ServerMessage};
use tambolad::broadcast::FanoutBroadcaster;
use tambolad::game::spawn_coordinator;
use tambolad::server::GameServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        let broadcaster = Arc::new(FanoutBroadcaster::new());
        let game = spawn_coordinator(Arc::clone(&broadcaster));
        let cancel_token = CancellationToken::new();

        let server = GameServer::new("127.0.0.1:0", game, broadcaster, cancel_token.clone());
        let listener = server.bind().await.expect("bind server");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        TestServer { addr, cancel_token }
    }

    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient::new(stream)
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        sleep(SHUTDOWN_GRACE_PERIOD).await;
    }
}

struct TestClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, msg: ClientMessage) {
        let json = serde_json::to_string(&msg).unwrap();
        self.writer.write_all(json.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Writes raw bytes without appending a frame terminator.
    async fn send_bytes(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        let mut line = String::new();
        timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server frame")
            .expect("read server frame");
        serde_json::from_str(&line).expect("parse server frame")
    }

    async fn recv_eof(&mut self) {
        let mut line = String::new();
        let bytes = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for EOF")
            .expect("read after close");
        assert_eq!(bytes, 0, "expected EOF, got frame: {line}");
    }

    /// Receives frames until one that is not a roster-churn broadcast.
    ///
    /// Concurrent tests see player_joined/player_left frames from other
    /// connections interleaved with their own replies.
    async fn recv_skipping_churn(&mut self) -> ServerMessage {
        loop {
            match self.recv().await {
                ServerMessage::PlayerJoined { .. } | ServerMessage::PlayerLeft { .. } => continue,
                other => return other,
            }
        }
    }

    async fn handshake(&mut self, client_id: Option<&str>) -> String {
        self.send(ClientMessage::connect(client_id.map(String::from)))
            .await;

        let id = match self.recv().await {
            ServerMessage::Connected { client_id, .. } => client_id.as_str().to_string(),
            other => panic!("Expected Connected, got {other:?}"),
        };

        match self.recv().await {
            ServerMessage::Roster { .. } => {}
            other => panic!("Expected Roster, got {other:?}"),
        }

        id
    }
}

// ============================================================================
// Malformed Frame Tests
// ============================================================================

#[tokio::test]
async fn test_malformed_json_answered_and_survived() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;
    client.send_bytes(b"this is not valid json\n").await;

    match client.recv().await {
        ServerMessage::Error { message } => {
            assert!(message.starts_with("malformed message"));
        }
        other => panic!("Expected Error, got {other:?}"),
    }

    // Server should still be accepting connections
    let mut client2 = server.connect().await;
    client2.handshake(Some("after-malformed")).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_empty_line_handled() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;
    client.send_bytes(b"\n").await;

    match client.recv().await {
        ServerMessage::Error { message } => {
            assert!(message.starts_with("malformed message"));
        }
        other => panic!("Expected Error, got {other:?}"),
    }

    // Same connection keeps working
    client.send(ClientMessage::ping(1)).await;
    match client.recv().await {
        ServerMessage::Pong { seq } => assert_eq!(seq, 1),
        other => panic!("Expected Pong, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_partial_frame_completed_later() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;

    // Half a frame; the server must keep waiting for the terminator
    client.send_bytes(b"{\"protocol_version\"").await;
    sleep(Duration::from_millis(50)).await;
    client.send_bytes(b"\n").await;

    match client.recv().await {
        ServerMessage::Error { message } => {
            assert!(message.starts_with("malformed message"));
        }
        other => panic!("Expected Error, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_category_spelling_rejected() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;

    // Valid JSON shape, but the category is not one of the five
    let frame = r#"{"protocol_version":{"major":1,"minor":0},"type":"claim","name":"alice","category":"MiddleRow"}"#;
    client.send_bytes(frame.as_bytes()).await;
    client.send_bytes(b"\n").await;

    match client.recv().await {
        ServerMessage::Error { message } => {
            assert!(message.starts_with("malformed message"));
        }
        other => panic!("Expected Error, got {other:?}"),
    }

    client.send(ClientMessage::ping(2)).await;
    match client.recv().await {
        ServerMessage::Pong { seq } => assert_eq!(seq, 2),
        other => panic!("Expected Pong, got {other:?}"),
    }

    server.shutdown().await;
}

// ============================================================================
// Frame Size Limit Tests
// ============================================================================

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;

    // Well past the 1 MB frame limit
    let padding = "x".repeat(2 * 1024 * 1024);
    let frame = format!(
        r#"{{"protocol_version":{{"major":1,"minor":0}},"type":"join","name":"{padding}"}}"#
    );
    client.send_bytes(frame.as_bytes()).await;
    client.send_bytes(b"\n").await;

    client.recv_eof().await;

    // Server should still accept new connections
    let mut client2 = server.connect().await;
    client2.handshake(None).await;

    server.shutdown().await;
}

// ============================================================================
// Rapid Connect/Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    // Rapidly connect and disconnect 20 times
    for i in 0..20 {
        let mut client = server.connect().await;
        client.handshake(Some(&format!("rapid-{i}"))).await;
        client.send(ClientMessage::disconnect()).await;
        // Don't wait, just move on
    }

    sleep(Duration::from_millis(100)).await;

    // Server should still work
    let mut final_client = server.connect().await;
    let id = final_client.handshake(Some("final")).await;
    assert_eq!(id, "final");

    server.shutdown().await;
}

#[tokio::test]
async fn test_many_concurrent_players() {
    let server = TestServer::spawn().await;

    let mut handles = Vec::new();
    for i in 0..20u64 {
        let addr = server.addr;
        let handle = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut client = TestClient::new(stream);
            let id = client.handshake(Some(&format!("concurrent-{i}"))).await;
            assert_eq!(id, format!("concurrent-{i}"));

            // Joining triggers player_joined churn on every other
            // connection; skim past it to this client's own replies
            client.send(ClientMessage::join(format!("player-{i}"))).await;
            match client.recv_skipping_churn().await {
                ServerMessage::TicketIssued { .. } => {}
                other => panic!("Expected TicketIssued, got {other:?}"),
            }

            client.send(ClientMessage::ping(i)).await;
            match client.recv_skipping_churn().await {
                ServerMessage::Pong { seq } => assert_eq!(seq, i),
                other => panic!("Expected Pong, got {other:?}"),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.expect("concurrent player should succeed");
    }

    server.shutdown().await;
}

// ============================================================================
// High-Frequency Draw Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_draws_reach_all_clients_in_order() {
    let server = TestServer::spawn().await;
    let mut driver = server.connect().await;
    let mut observer = server.connect().await;

    driver.handshake(Some("driver")).await;
    observer.handshake(Some("observer")).await;

    // Fire 30 draws without reading anything back
    for _ in 0..30 {
        driver.send(ClientMessage::draw_number()).await;
    }

    let mut driver_seen = Vec::new();
    let mut observer_seen = Vec::new();
    for _ in 0..30 {
        match driver.recv().await {
            ServerMessage::NumberDrawn { number } => driver_seen.push(number),
            other => panic!("Expected NumberDrawn, got {other:?}"),
        }
        match observer.recv().await {
            ServerMessage::NumberDrawn { number } => observer_seen.push(number),
            other => panic!("Expected NumberDrawn, got {other:?}"),
        }
    }

    // Same numbers, same order, no repeats
    assert_eq!(driver_seen, observer_seen);
    let distinct: HashSet<u8> = driver_seen.iter().copied().collect();
    assert_eq!(distinct.len(), 30);
    assert!(driver_seen.iter().all(|n| (1..=MAX_NUMBER).contains(n)));

    server.shutdown().await;
}

#[tokio::test]
async fn test_draw_past_exhaustion_recovers() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;

    // Drain the whole pool one draw at a time
    for _ in 0..90 {
        client.send(ClientMessage::draw_number()).await;
        match client.recv().await {
            ServerMessage::NumberDrawn { .. } => {}
            other => panic!("Expected NumberDrawn, got {other:?}"),
        }
    }

    client.send(ClientMessage::draw_number()).await;
    match client.recv().await {
        ServerMessage::Error { message } => {
            assert_eq!(message, "all 90 numbers have been drawn");
        }
        other => panic!("Expected Error, got {other:?}"),
    }

    // The refusal is not fatal; a round reset makes draws work again
    client.send(ClientMessage::start_round()).await;
    match client.recv().await {
        ServerMessage::RoundStarted => {}
        other => panic!("Expected RoundStarted, got {other:?}"),
    }

    client.send(ClientMessage::draw_number()).await;
    match client.recv().await {
        ServerMessage::NumberDrawn { .. } => {}
        other => panic!("Expected NumberDrawn, got {other:?}"),
    }

    server.shutdown().await;
}

// ============================================================================
// Error Recovery Tests
// ============================================================================

#[tokio::test]
async fn test_multiple_errors_dont_break_connection() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;

    for _ in 0..5 {
        client.send_bytes(b"{\"invalid\":\"data\"}\n").await;
        match client.recv().await {
            ServerMessage::Error { .. } => {}
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    // Connection should still work
    client.send(ClientMessage::join("survivor")).await;
    match client.recv().await {
        ServerMessage::TicketIssued { .. } => {}
        other => panic!("Expected TicketIssued after errors, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_claim_spam_is_refused_each_time() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;
    client.send(ClientMessage::join("eager")).await;
    match client.recv().await {
        ServerMessage::TicketIssued { .. } => {}
        other => panic!("Expected TicketIssued, got {other:?}"),
    }

    // Nothing has been drawn, so every claim is premature
    for _ in 0..5 {
        client
            .send(ClientMessage::claim("eager", ClaimCategory::FullHouse))
            .await;
        match client.recv().await {
            ServerMessage::Error { message } => {
                assert_eq!(message, "FullHouse is not a valid claim for eager");
            }
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    client.send(ClientMessage::ping(9)).await;
    match client.recv().await {
        ServerMessage::Pong { seq } => assert_eq!(seq, 9),
        other => panic!("Expected Pong, got {other:?}"),
    }

    server.shutdown().await;
}

// ============================================================================
// Edge Cases
// ============================================================================

#[tokio::test]
async fn test_empty_name_join_handled() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;

    // An empty display name is odd but not rejected
    client.send(ClientMessage::join("")).await;
    match client.recv().await {
        ServerMessage::TicketIssued { .. } => {}
        other => panic!("Expected TicketIssued, got {other:?}"),
    }

    client.send(ClientMessage::ping(99)).await;
    match client.recv().await {
        ServerMessage::Pong { seq } => assert_eq!(seq, 99),
        other => panic!("Expected Pong, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_rejoin_storm_keeps_single_roster_entry() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.handshake(None).await;

    // Rename in place 10 times; each join answers with a fresh ticket
    for i in 0..10 {
        client.send(ClientMessage::join(format!("name-{i}"))).await;
        match client.recv().await {
            ServerMessage::TicketIssued { .. } => {}
            other => panic!("Expected TicketIssued, got {other:?}"),
        }
    }

    // A fresh connection's roster shows only the final name
    let mut watcher = server.connect().await;
    watcher.send(ClientMessage::connect(None)).await;
    match watcher.recv().await {
        ServerMessage::Connected { .. } => {}
        other => panic!("Expected Connected, got {other:?}"),
    }
    match watcher.recv().await {
        ServerMessage::Roster { players } => {
            let names: Vec<&str> = players.iter().map(|p| p.as_str()).collect();
            assert_eq!(names, ["name-9"]);
        }
        other => panic!("Expected Roster, got {other:?}"),
    }

    server.shutdown().await;
}
