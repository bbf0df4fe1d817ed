//! Event fan-out to connected game clients.
//!
//! The coordinator hands every outbound [`ServerMessage`] to a
//! [`Broadcaster`]. The production implementation serializes each message
//! once and pushes the shared string into every recipient's bounded
//! outbound queue with a non-blocking send, so a stalled client can never
//! hold up the game loop. Overflow increments the client's drop counter;
//! past [`MAX_TOTAL_DROPS`] the client is evicted from the fan-out set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use tambola_core::ConnectionId;
use tambola_protocol::ServerMessage;

/// Maximum total lifetime message drops before a slow client is evicted.
const MAX_TOTAL_DROPS: u64 = 100;

// ============================================================================
// Broadcaster Trait
// ============================================================================

/// Outbound delivery capability handed to the game coordinator.
///
/// Delivery is fire-and-forget: a message reaches each recipient at most
/// once, and failures are logged rather than surfaced to the caller.
pub trait Broadcaster: Send + Sync + 'static {
    /// Deliver a message to a single connection.
    fn send_to(&self, connection: &ConnectionId, message: &ServerMessage);

    /// Deliver a message to every registered connection.
    fn broadcast_all(&self, message: &ServerMessage);

    /// Deliver a message to every registered connection except one.
    fn broadcast_except(&self, excluded: &ConnectionId, message: &ServerMessage);
}

// ============================================================================
// Connection Sink
// ============================================================================

/// A registered connection's outbound queue plus its drop accounting.
struct ConnectionSink {
    /// Send half of the outbound queue; the connection's writer task
    /// drains the other half onto the socket.
    sender: mpsc::Sender<Arc<String>>,

    /// Messages dropped because the queue was full or closed.
    dropped: AtomicU64,
}

impl ConnectionSink {
    fn new(sender: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a serialized message without blocking.
    ///
    /// Returns `false` and increments the drop counter if the queue is
    /// full or closed.
    fn send(&self, message: Arc<String>) -> bool {
        if self.sender.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this connection.
    fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Fanout Broadcaster
// ============================================================================

/// Production [`Broadcaster`] backed by per-connection bounded queues.
pub struct FanoutBroadcaster {
    /// Registered sinks indexed by connection ID.
    sinks: RwLock<HashMap<ConnectionId, ConnectionSink>>,

    /// Atomic count of registered sinks (avoids locking for count queries).
    active_count: AtomicUsize,
}

impl FanoutBroadcaster {
    /// Creates an empty broadcaster.
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Register a connection's outbound queue.
    ///
    /// Re-registering an existing connection replaces its sink; the count
    /// is unchanged.
    pub fn register(&self, connection: ConnectionId, sender: mpsc::Sender<Arc<String>>) {
        let mut sinks = self.write_sinks();
        if sinks
            .insert(connection, ConnectionSink::new(sender))
            .is_none()
        {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection's sink. Unknown connections are a no-op.
    pub fn unregister(&self, connection: &ConnectionId) {
        let mut sinks = self.write_sinks();
        if sinks.remove(connection).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Serialize once, fan out to matching sinks, evict slow clients.
    fn fan_out(&self, filter: impl Fn(&ConnectionId) -> bool, message: &ServerMessage, label: &str) {
        let kind = message.kind();
        let json = match serde_json::to_string(message) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(kind, error = %e, "Failed to serialize outbound message");
                return;
            }
        };

        let mut to_evict = Vec::new();
        {
            let sinks = self.read_sinks();
            let mut recipients = 0u32;
            for (id, sink) in sinks.iter() {
                if filter(id) {
                    recipients += 1;
                    if !sink.send(Arc::clone(&json)) {
                        let drops = sink.drop_count();
                        if drops >= MAX_TOTAL_DROPS {
                            warn!(connection = %id, kind, drops, "Evicting slow client");
                            to_evict.push(id.clone());
                        } else {
                            warn!(
                                connection = %id,
                                kind,
                                total_drops = drops,
                                "Outbound queue full, message dropped"
                            );
                        }
                    }
                }
            }
            debug!(kind, label, recipients, "Fanned out message");
        }

        if !to_evict.is_empty() {
            let mut sinks = self.write_sinks();
            for id in &to_evict {
                if sinks.remove(id).is_some() {
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }
    }

    // Lock poisoning only matters if a panic happened mid-operation; the
    // map stays usable either way, so recover the guard and continue.
    fn read_sinks(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, ConnectionSink>> {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sinks(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, ConnectionSink>> {
        self.sinks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Broadcaster for FanoutBroadcaster {
    fn send_to(&self, connection: &ConnectionId, message: &ServerMessage) {
        self.fan_out(|id| id == connection, message, "one");
    }

    fn broadcast_all(&self, message: &ServerMessage) {
        self.fan_out(|_| true, message, "all");
    }

    fn broadcast_except(&self, excluded: &ConnectionId, message: &ServerMessage) {
        self.fan_out(|id| id != excluded, message, "others");
    }
}

impl Default for FanoutBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Test Double
// ============================================================================

/// Where a recorded message was aimed.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    One(ConnectionId),
    All,
    AllExcept(ConnectionId),
}

/// [`Broadcaster`] that records every delivery for assertions.
#[cfg(test)]
pub struct RecordingBroadcaster {
    events: std::sync::Mutex<Vec<(SendTarget, ServerMessage)>>,
}

#[cfg(test)]
impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// All recorded `(target, message)` pairs in delivery order.
    pub fn recorded(&self) -> Vec<(SendTarget, ServerMessage)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, target: SendTarget, message: &ServerMessage) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((target, message.clone()));
    }
}

#[cfg(test)]
impl Broadcaster for RecordingBroadcaster {
    fn send_to(&self, connection: &ConnectionId, message: &ServerMessage) {
        self.record(SendTarget::One(connection.clone()), message);
    }

    fn broadcast_all(&self, message: &ServerMessage) {
        self.record(SendTarget::All, message);
    }

    fn broadcast_except(&self, excluded: &ConnectionId, message: &ServerMessage) {
        self.record(SendTarget::AllExcept(excluded.clone()), message);
    }
}
