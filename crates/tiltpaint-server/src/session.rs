//! One WebSocket connection, from handshake to close.

use crate::hub::Hub;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tiltpaint_core::{classify, Inbound, Rejection};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Upgraded, not yet admitted
    Connecting,
    /// Admitted; `init` queued, live traffic flowing
    Active,
    /// Removed from the registry; nothing more is sent
    Closed,
}

impl ConnectionPhase {
    /// Whether moving to `next` is allowed.
    pub fn can_become(self, next: ConnectionPhase) -> bool {
        matches!(
            (self, next),
            (ConnectionPhase::Connecting, ConnectionPhase::Active)
                | (ConnectionPhase::Connecting, ConnectionPhase::Closed)
                | (ConnectionPhase::Active, ConnectionPhase::Closed)
        )
    }
}

/// What the client side of the socket produced.
enum Incoming {
    Frame(Message),
    Closed,
    Error(axum::Error),
    Idle,
}

/// Drive a connection until either side closes it.
pub async fn run(socket: WebSocket, hub: Arc<Hub>, idle_timeout: Option<Duration>) {
    let mut phase = ConnectionPhase::Connecting;
    let (mut sender, mut receiver) = socket.split();

    let (id, mut outbound) = hub.join();
    advance(&mut phase, ConnectionPhase::Active);
    let mut deadline = idle_timeout.map(|d| Instant::now() + d);

    loop {
        tokio::select! {
            // Frames from the client
            incoming = next_incoming(&mut receiver, deadline) => {
                if let (Incoming::Frame(_), Some(d)) = (&incoming, idle_timeout) {
                    deadline = Some(Instant::now() + d);
                }
                match incoming {
                    Incoming::Frame(Message::Text(text)) => {
                        hub.dispatch(id, classify(text.as_str()));
                    }
                    Incoming::Frame(Message::Binary(data)) => {
                        let inbound = std::str::from_utf8(&data)
                            .map_or(Inbound::Unrecognized(Rejection::Malformed), classify);
                        hub.dispatch(id, inbound);
                    }
                    Incoming::Frame(Message::Close(_)) | Incoming::Closed => break,
                    Incoming::Frame(_) => {} // Ping/pong
                    Incoming::Error(e) => {
                        warn!("WebSocket error for {}: {}", id, e);
                        break;
                    }
                    Incoming::Idle => {
                        info!("Closing idle connection {}", id);
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            // Frames for the client
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // The router dropped us.
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    hub.leave(id);
    advance(&mut phase, ConnectionPhase::Closed);
    debug!("Connection {} finished", id);
}

fn advance(phase: &mut ConnectionPhase, next: ConnectionPhase) {
    debug_assert!(phase.can_become(next), "{:?} -> {:?}", phase, next);
    *phase = next;
}

async fn next_incoming(
    receiver: &mut SplitStream<WebSocket>,
    deadline: Option<Instant>,
) -> Incoming {
    let next = match deadline {
        Some(deadline) => match timeout_at(deadline, receiver.next()).await {
            Ok(next) => next,
            Err(_) => return Incoming::Idle,
        },
        None => receiver.next().await,
    };
    match next {
        Some(Ok(message)) => Incoming::Frame(message),
        Some(Err(e)) => Incoming::Error(e),
        None => Incoming::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use ConnectionPhase::*;

        assert!(Connecting.can_become(Active));
        assert!(Connecting.can_become(Closed));
        assert!(Active.can_become(Closed));

        assert!(!Active.can_become(Connecting));
        assert!(!Closed.can_become(Active));
        assert!(!Closed.can_become(Closed));
    }
}
