//! Broadcast router: turns accepted events into frames for every connection.
//!
//! Every mutation (a connection joining or leaving, a stroke, a clear) runs
//! under one sequencing lock. Inside it the router only ever pushes onto
//! bounded per-connection queues with `try_send`, so the lock is short and
//! never held across an await. As a result:
//!
//! - broadcast order, append order and snapshot order are the same order;
//! - a joining connection's `init` contains exactly the strokes it will not
//!   also receive live;
//! - every `players` count matches the registry at the moment it was sent.
//!
//! The lock also guards the encoded form of every logged stroke, so a join
//! only concatenates text while holding it.
//!
//! A connection whose queue is full is not keeping up. It is dropped rather
//! than waited on, so one stalled client cannot hold up the others; on
//! reconnect its `init` brings it back in sync.

use crate::persist::Persister;
use crate::registry::{ConnectionId, ConnectionRegistry, Frame};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tiltpaint_core::{init_frame, Inbound, ServerMessage, Snapshot, StrokeLog, StrokeSegment};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Whether strokes are sent back to the client that painted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoPolicy {
    /// Skip the sending connection
    #[default]
    Suppress,
    /// Send every stroke to every connection
    Deliver,
}

/// Shared relay state: the stroke log, who is connected, and where history
/// is persisted.
pub struct Hub {
    /// Held for every mutation. Guards each logged segment, encoded.
    sequencer: Mutex<Vec<String>>,
    log: StrokeLog,
    registry: ConnectionRegistry,
    persister: Option<Persister>,
    echo: EchoPolicy,
    queue_capacity: usize,
}

impl Hub {
    pub fn new(
        log: StrokeLog,
        persister: Option<Persister>,
        echo: EchoPolicy,
        queue_capacity: usize,
    ) -> Self {
        let encoded = log
            .snapshot()
            .strokes
            .iter()
            .filter_map(encode_segment)
            .collect();
        Self {
            sequencer: Mutex::new(encoded),
            log,
            registry: ConnectionRegistry::new(),
            persister,
            echo,
            // Room for at least the `init` and first `players` frames.
            queue_capacity: queue_capacity.max(2),
        }
    }

    /// Admit a new connection.
    ///
    /// The connection's queue starts with an `init` frame holding the full
    /// history, followed by the `players` announcement that everyone gets.
    pub fn join(&self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let encoded = self.lock();

        let strokes = encoded.len();
        // Fresh queue with capacity >= 2, cannot be full.
        let _ = tx.try_send(Frame::from(init_frame(encoded.as_slice())));

        let id = self.registry.admit(tx);
        info!(
            "Connection {} joined with {} strokes of history ({} connected)",
            id,
            strokes,
            self.registry.count()
        );

        let dead = self.announce_players();
        self.evict(dead);
        (id, rx)
    }

    /// Act on one classified inbound frame.
    pub fn dispatch(&self, from: ConnectionId, inbound: Inbound) {
        match inbound {
            Inbound::Stroke(segment) => self.stroke(from, segment),
            Inbound::Clear => self.clear(from),
            Inbound::Unrecognized(reason) => {
                debug!("Dropping frame from {}: {}", from, reason);
            }
        }
    }

    /// Remove a connection and tell the others the new count.
    pub fn leave(&self, id: ConnectionId) {
        let _guard = self.lock();
        let Some(participant) = self.registry.remove(&id) else {
            return;
        };
        info!(
            "Connection {} left after {:.1?} ({} connected)",
            id,
            participant.joined_at.elapsed(),
            self.registry.count()
        );

        let dead = self.announce_players();
        self.evict(dead);
    }

    /// Current history.
    pub fn snapshot(&self) -> Snapshot {
        self.log.snapshot()
    }

    /// Number of connected clients.
    pub fn player_count(&self) -> usize {
        self.registry.count()
    }

    pub fn is_connected(&self, id: &ConnectionId) -> bool {
        self.registry.contains(id)
    }

    /// Wait for queued history writes to reach the store.
    pub async fn flush_persistence(&self) {
        if let Some(persister) = &self.persister {
            persister.flush().await;
        }
    }

    fn stroke(&self, from: ConnectionId, segment: StrokeSegment) {
        let Some(line) = encode_segment(&segment) else {
            return;
        };
        let Some(frame) = encode(&ServerMessage::Stroke { s: segment.clone() }) else {
            return;
        };

        let mut encoded = self.lock();
        if !self.registry.contains(&from) {
            debug!("Ignoring stroke from departed connection {}", from);
            return;
        }
        trace!("Stroke from {} (origin {:?})", from, segment.origin_id());

        encoded.push(line);
        self.log.append(segment.clone());
        if let Some(persister) = &self.persister {
            persister.append(segment);
        }

        let except = match self.echo {
            EchoPolicy::Deliver => None,
            EchoPolicy::Suppress => Some(from),
        };
        let dead = self.registry.for_each_except(except, |p| p.deliver(&frame));
        self.evict(dead);
    }

    fn clear(&self, from: ConnectionId) {
        let Some(frame) = encode(&ServerMessage::Clear) else {
            return;
        };

        let mut encoded = self.lock();
        if !self.registry.contains(&from) {
            debug!("Ignoring clear from departed connection {}", from);
            return;
        }

        encoded.clear();
        let epoch = self.log.clear();
        if let Some(persister) = &self.persister {
            persister.reset();
        }
        info!("History cleared by {} (epoch {})", from, epoch);

        // Everyone wipes, including the sender.
        let dead = self.registry.for_each_except(None, |p| p.deliver(&frame));
        self.evict(dead);
    }

    /// Send the current count to everyone. Returns connections that failed.
    fn announce_players(&self) -> Vec<ConnectionId> {
        let n = self.registry.count();
        match encode(&ServerMessage::Players { n }) {
            Some(frame) => self.registry.for_each_except(None, |p| p.deliver(&frame)),
            None => Vec::new(),
        }
    }

    /// Drop connections that failed a delivery.
    ///
    /// Each removal changes the count, and announcing it can fail on yet
    /// another stalled connection, so this repeats until nothing fails.
    fn evict(&self, mut dead: Vec<ConnectionId>) {
        while !dead.is_empty() {
            let mut removed = 0;
            for id in dead.drain(..) {
                if self.registry.remove(&id).is_some() {
                    warn!("Dropping connection {}: not keeping up or already closed", id);
                    removed += 1;
                }
            }
            if removed == 0 {
                break;
            }
            dead = self.announce_players();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.sequencer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode_segment(segment: &StrokeSegment) -> Option<String> {
    match segment.to_json() {
        Ok(line) => Some(line),
        Err(e) => {
            error!("Failed to encode {:?}: {}", segment, e);
            None
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Frame> {
    match message.to_json() {
        Ok(text) => Some(Frame::from(text)),
        Err(e) => {
            error!("Failed to encode {:?}: {}", message, e);
            None
        }
    }
}
