//! Relay Client
//!
//! [`Transport`] over a WebSocket connection to the relay. The socket is
//! pumped by tokio tasks; the simulation side only touches channels, so
//! [`poll_event`](Transport::poll_event) never waits.

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::{Error as WsError, Message}};
use futures_util::{SinkExt, Stream, StreamExt};
use tracing::{info, warn, error, debug};

use crate::game::player::PeerId;
use crate::network::protocol::RelayFrame;
use crate::network::relay::RelayError;
use crate::network::transport::{Transport, TransportError, TransportEvent};

/// How long to wait for the relay's welcome.
pub const WELCOME_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection to a relay.
pub struct RelayClient {
    id: PeerId,
    outgoing: mpsc::Sender<Vec<u8>>,
    incoming: mpsc::Receiver<TransportEvent>,
    local_events: VecDeque<TransportEvent>,
    ignored: BTreeSet<PeerId>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RelayClient {
    /// Connect and wait for the relay to assign an id.
    pub async fn connect(url: &str, channel_capacity: usize) -> Result<Self, RelayError> {
        info!("Connecting to {}...", url);
        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();

        let id = tokio::time::timeout(WELCOME_TIMEOUT, read_welcome(&mut read))
            .await
            .map_err(|_| RelayError::Protocol("timed out waiting for welcome".to_string()))??;
        info!("Connected to relay as {}", id);

        let capacity = channel_capacity.max(1);
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Vec<u8>>(capacity);
        let (incoming_tx, incoming_rx) = mpsc::channel::<TransportEvent>(capacity);

        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                let data = match msg_result {
                    Ok(Message::Binary(data)) => data,
                    Ok(Message::Close(_)) => {
                        info!("Relay closed connection");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                };

                let event = match RelayFrame::from_bytes(&data) {
                    Ok(RelayFrame::PeerJoined { id }) => TransportEvent::PeerJoined(id),
                    Ok(RelayFrame::PeerLeft { id }) => TransportEvent::PeerLeft(id),
                    Ok(RelayFrame::Data { peer, payload }) => TransportEvent::Message { from: peer, payload },
                    Ok(RelayFrame::Welcome { .. }) => continue,
                    Err(e) => {
                        warn!("Failed to parse relay frame: {}", e);
                        continue;
                    }
                };
                if incoming_tx.send(event).await.is_err() {
                    break;
                }
            }
            debug!("Reader task ended");
        });

        let writer = tokio::spawn(async move {
            while let Some(bytes) = outgoing_rx.recv().await {
                if let Err(e) = write.send(Message::Binary(bytes)).await {
                    error!("Failed to send frame: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Writer task ended");
        });

        Ok(Self {
            id,
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            local_events: VecDeque::new(),
            ignored: BTreeSet::new(),
            reader,
            writer,
        })
    }

    /// Check if the socket tasks are still running.
    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished() && !self.writer.is_finished()
    }
}

async fn read_welcome<S>(read: &mut S) -> Result<PeerId, RelayError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        if let Message::Binary(data) = msg? {
            return match RelayFrame::from_bytes(&data)? {
                RelayFrame::Welcome { id } => Ok(id),
                other => Err(RelayError::Protocol(format!("expected welcome, got {:?}", other))),
            };
        }
    }
    Err(RelayError::Protocol("connection closed before welcome".to_string()))
}

impl Transport for RelayClient {
    fn local_id(&self) -> PeerId {
        self.id
    }

    fn send(&mut self, peer: PeerId, payload: &[u8]) -> Result<(), TransportError> {
        if self.ignored.contains(&peer) {
            return Err(TransportError::UnknownPeer(peer));
        }
        let frame = RelayFrame::Data {
            peer,
            payload: payload.to_vec(),
        };
        let bytes = frame.to_bytes().map_err(|e| TransportError::Encode(e.to_string()))?;
        self.outgoing.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.local_events.pop_front() {
            return Some(event);
        }
        loop {
            let event = self.incoming.try_recv().ok()?;
            let ignored = match &event {
                TransportEvent::Message { from, .. } | TransportEvent::PeerLeft(from) => {
                    self.ignored.contains(from)
                }
                TransportEvent::PeerJoined(_) => false,
            };
            if !ignored {
                return Some(event);
            }
        }
    }

    /// The relay keeps the peer connected; this end stops talking to it.
    fn disconnect(&mut self, peer: PeerId) {
        if self.ignored.insert(peer) {
            debug!("Ignoring {} from now on", peer);
            self.local_events.push_back(TransportEvent::PeerLeft(peer));
        }
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
