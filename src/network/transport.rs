//! Transport
//!
//! The stage talks to other peers through [`Transport`]: an ordered, reliable
//! byte stream per connected peer plus join/leave notifications. Polling
//! never blocks.
//!
//! [`LoopbackHub`] connects any number of transports inside one process.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::game::player::PeerId;

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer connected.
    PeerJoined(PeerId),
    /// A peer disconnected.
    PeerLeft(PeerId),
    /// A payload arrived from a peer.
    Message {
        /// Sender
        from: PeerId,
        /// Payload bytes
        payload: Vec<u8>,
    },
}

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Destination is not connected.
    #[error("Unknown peer {0}")]
    UnknownPeer(PeerId),

    /// The transport has been closed.
    #[error("Transport closed")]
    Closed,

    /// Outgoing queue is full.
    #[error("Send queue full")]
    QueueFull,

    /// Frame could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Per-peer message transport.
pub trait Transport {
    /// Id of this end.
    fn local_id(&self) -> PeerId;

    /// Queue a payload for one peer.
    fn send(&mut self, peer: PeerId, payload: &[u8]) -> Result<(), TransportError>;

    /// Next pending event, `None` when nothing is available right now.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Drop a peer from the session.
    fn disconnect(&mut self, peer: PeerId);
}

// =============================================================================
// LOOPBACK
// =============================================================================

#[derive(Debug, Default)]
struct HubState {
    next_id: u32,
    inboxes: BTreeMap<PeerId, VecDeque<TransportEvent>>,
}

impl HubState {
    fn broadcast(&mut self, except: PeerId, event: TransportEvent) {
        for (id, inbox) in self.inboxes.iter_mut() {
            if *id != except {
                inbox.push_back(event.clone());
            }
        }
    }

    fn remove(&mut self, peer: PeerId) -> bool {
        if self.inboxes.remove(&peer).is_none() {
            return false;
        }
        self.broadcast(peer, TransportEvent::PeerLeft(peer));
        true
    }
}

/// In-process hub connecting loopback transports.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // A panic while holding the lock leaves the queues intact
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Connect a new peer. Every peer already present is announced to it,
    /// and it is announced to them.
    pub fn connect(&self) -> LoopbackTransport {
        let mut state = self.lock();
        state.next_id += 1;
        let id = PeerId(state.next_id);

        let existing: VecDeque<TransportEvent> =
            state.inboxes.keys().map(|&peer| TransportEvent::PeerJoined(peer)).collect();
        state.broadcast(id, TransportEvent::PeerJoined(id));
        state.inboxes.insert(id, existing);
        info!("Loopback peer {} connected", id);

        LoopbackTransport {
            hub: self.clone(),
            id,
        }
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.lock().inboxes.len()
    }
}

/// One end of a [`LoopbackHub`]. Leaves the hub when dropped.
#[derive(Debug)]
pub struct LoopbackTransport {
    hub: LoopbackHub,
    id: PeerId,
}

impl LoopbackTransport {
    /// Leave the hub.
    pub fn close(&mut self) {
        if self.hub.lock().remove(self.id) {
            info!("Loopback peer {} left", self.id);
        }
    }
}

impl Transport for LoopbackTransport {
    fn local_id(&self) -> PeerId {
        self.id
    }

    fn send(&mut self, peer: PeerId, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.hub.lock();
        if !state.inboxes.contains_key(&self.id) {
            return Err(TransportError::Closed);
        }
        let inbox = state
            .inboxes
            .get_mut(&peer)
            .ok_or(TransportError::UnknownPeer(peer))?;
        inbox.push_back(TransportEvent::Message {
            from: self.id,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.hub.lock().inboxes.get_mut(&self.id)?.pop_front()
    }

    fn disconnect(&mut self, peer: PeerId) {
        if peer == self.id {
            self.close();
            return;
        }
        if self.hub.lock().remove(peer) {
            debug!("{} disconnected {}", self.id, peer);
        }
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(t: &mut LoopbackTransport) -> Vec<TransportEvent> {
        std::iter::from_fn(|| t.poll_event()).collect()
    }

    #[test]
    fn test_join_announcements() {
        let hub = LoopbackHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();

        assert_eq!(a.local_id(), PeerId(1));
        assert_eq!(b.local_id(), PeerId(2));
        assert_eq!(drain(&mut a), vec![TransportEvent::PeerJoined(PeerId(2))]);
        assert_eq!(drain(&mut b), vec![TransportEvent::PeerJoined(PeerId(1))]);
        assert_eq!(hub.peer_count(), 2);
    }

    #[test]
    fn test_messages_in_order() {
        let hub = LoopbackHub::new();
        let mut a = hub.connect();
        let mut b = hub.connect();
        drain(&mut b);

        a.send(b.local_id(), &[1]).unwrap();
        a.send(b.local_id(), &[2, 3]).unwrap();

        assert_eq!(
            drain(&mut b),
            vec![
                TransportEvent::Message { from: PeerId(1), payload: vec![1] },
                TransportEvent::Message { from: PeerId(1), payload: vec![2, 3] },
            ]
        );
        assert!(b.poll_event().is_none());
    }

    #[test]
    fn test_send_to_unknown_peer() {
        let hub = LoopbackHub::new();
        let mut a = hub.connect();
        assert_eq!(a.send(PeerId(9), &[0]), Err(TransportError::UnknownPeer(PeerId(9))));
    }

    #[test]
    fn test_disconnect_and_drop_notify() {
        let hub = LoopbackHub::new();
        let mut a = hub.connect();
        let b = hub.connect();
        let mut c = hub.connect();
        drain(&mut a);
        drain(&mut c);

        a.disconnect(b.local_id());
        assert_eq!(drain(&mut c), vec![TransportEvent::PeerLeft(PeerId(2))]);
        // The disconnecting side is told as well
        assert_eq!(drain(&mut a), vec![TransportEvent::PeerLeft(PeerId(2))]);

        drop(c);
        assert_eq!(drain(&mut a), vec![TransportEvent::PeerLeft(PeerId(3))]);
        assert_eq!(hub.peer_count(), 1);

        // A kicked transport can no longer send
        let mut b = b;
        assert_eq!(b.send(PeerId(1), &[0]), Err(TransportError::Closed));
        assert!(b.poll_event().is_none());
    }
}
