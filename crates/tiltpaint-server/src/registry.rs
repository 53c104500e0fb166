//! Connection registry: who is connected right now.

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use std::fmt;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// An encoded text frame, shared between every queue it is pushed to.
pub type Frame = Utf8Bytes;

/// Handle for one open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of pushing a frame at one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the connection's writer
    Sent,
    /// The connection's queue is full; it is not keeping up
    Full,
    /// The connection's writer is gone
    Closed,
}

impl Delivery {
    /// Whether the connection should be dropped after this delivery.
    pub fn is_failure(self) -> bool {
        matches!(self, Delivery::Full | Delivery::Closed)
    }
}

/// One connected client.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ConnectionId,
    pub joined_at: Instant,
    outbound: mpsc::Sender<Frame>,
}

impl Participant {
    /// Queue a frame without waiting.
    pub fn deliver(&self, frame: &Frame) -> Delivery {
        match self.outbound.try_send(frame.clone()) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// The set of open connections.
///
/// Iteration works on a copy of the set, so admitting or removing a
/// connection never races a fan-out in progress.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    participants: DashMap<ConnectionId, Participant>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection that reads frames from `outbound`'s receiver.
    pub fn admit(&self, outbound: mpsc::Sender<Frame>) -> ConnectionId {
        let id = ConnectionId::new();
        self.participants.insert(
            id,
            Participant {
                id,
                joined_at: Instant::now(),
                outbound,
            },
        );
        id
    }

    /// Forget a connection. Dropping the returned participant closes its
    /// queue, which ends the connection's writer.
    pub fn remove(&self, id: &ConnectionId) -> Option<Participant> {
        self.participants.remove(id).map(|(_, participant)| participant)
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.participants.contains_key(id)
    }

    /// Call `deliver` for every connection except `except`.
    ///
    /// Returns the connections whose delivery failed. One failure does not
    /// stop delivery to the rest.
    pub fn for_each_except<F>(&self, except: Option<ConnectionId>, mut deliver: F) -> Vec<ConnectionId>
    where
        F: FnMut(&Participant) -> Delivery,
    {
        let live: Vec<Participant> = self
            .participants
            .iter()
            .filter(|entry| Some(*entry.key()) != except)
            .map(|entry| entry.value().clone())
            .collect();

        let mut failed = Vec::new();
        for participant in &live {
            if deliver(participant).is_failure() {
                failed.push(participant.id);
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Frame {
        Frame::from(text.to_string())
    }

    #[test]
    fn test_admit_and_remove_track_count() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);

        let a = registry.admit(tx.clone());
        let b = registry.admit(tx.clone());
        let c = registry.admit(tx);
        assert_eq!(registry.count(), 3);
        assert_ne!(a, b);

        assert!(registry.remove(&b).is_some());
        assert!(registry.remove(&b).is_none());
        assert_eq!(registry.count(), 2);
        assert!(registry.contains(&a) && registry.contains(&c));
    }

    #[test]
    fn test_for_each_except_skips_one() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let a = registry.admit(tx_a);
        registry.admit(tx_b);

        let hello = frame("hello");
        let failed = registry.for_each_except(Some(a), |p| p.deliver(&hello));

        assert!(failed.is_empty());
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().as_str(), "hello");
    }

    #[test]
    fn test_failures_are_isolated() {
        let registry = ConnectionRegistry::new();
        let (tx_full, _rx_full) = mpsc::channel(1);
        let (tx_closed, rx_closed) = mpsc::channel(1);
        let (tx_ok, mut rx_ok) = mpsc::channel(4);

        let full = registry.admit(tx_full);
        let closed = registry.admit(tx_closed);
        registry.admit(tx_ok);
        drop(rx_closed);

        let first = frame("1");
        let failed = registry.for_each_except(None, |p| p.deliver(&first));
        assert_eq!(failed, vec![closed]);

        let second = frame("2");
        let failed = registry.for_each_except(None, |p| p.deliver(&second));
        assert_eq!(failed.len(), 2);
        assert!(failed.contains(&full) && failed.contains(&closed));

        assert_eq!(rx_ok.try_recv().unwrap().as_str(), "1");
        assert_eq!(rx_ok.try_recv().unwrap().as_str(), "2");
    }

    #[test]
    fn test_remove_during_iteration() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(8);
        let ids: Vec<_> = (0..4).map(|_| registry.admit(tx.clone())).collect();

        let mut visited = 0;
        registry.for_each_except(None, |p| {
            visited += 1;
            registry.remove(&p.id);
            Delivery::Sent
        });

        assert_eq!(visited, ids.len());
        assert_eq!(registry.count(), 0);
    }
}
