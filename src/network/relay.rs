//! WebSocket Relay
//!
//! Forwards opaque payloads between connected peers, in order, without
//! looking inside them. Each connection gets a [`PeerId`] on arrival and is
//! told about every other peer.
//!
//! ```text
//!  client A ──Data{peer: B}──▶ relay ──Data{peer: A}──▶ client B
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::config::RelayConfig;
use crate::game::player::PeerId;
use crate::network::protocol::RelayFrame;

/// Relay errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Failed to bind or accept.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Relay frame could not be decoded or encoded.
    #[error("Frame error: {0}")]
    Frame(#[from] bincode::Error),

    /// Relay did not behave as expected.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

type PeerMap = Arc<RwLock<BTreeMap<PeerId, mpsc::Sender<RelayFrame>>>>;

/// The relay server.
pub struct RelayServer {
    config: RelayConfig,
    listener: TcpListener,
    peers: PeerMap,
    next_id: Arc<AtomicU32>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Bind the listening socket.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            listener,
            peers: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU32::new(1)),
            shutdown_tx,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Sender that stops the relay and closes every connection.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Number of connected peers.
    pub async fn connection_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Accept connections until shut down.
    #[instrument(skip(self), fields(addr = %self.config.bind_addr))]
    pub async fn run(self) -> Result<(), RelayError> {
        info!("Relay listening on {}", self.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let count = self.peers.read().await.len();
                            if count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Serve one WebSocket connection on its own task.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let peers = self.peers.clone();
        let id = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let capacity = self.config.channel_capacity.max(1);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (frame_tx, mut frame_rx) = mpsc::channel::<RelayFrame>(capacity);

            // Welcome goes out before anyone can address this peer
            if frame_tx.send(RelayFrame::Welcome { id }).await.is_err() {
                return;
            }

            let existing: Vec<(PeerId, mpsc::Sender<RelayFrame>)> = {
                let mut peers = peers.write().await;
                let existing = peers.iter().map(|(id, tx)| (*id, tx.clone())).collect();
                peers.insert(id, frame_tx.clone());
                existing
            };
            for (other, other_tx) in existing {
                let _ = frame_tx.send(RelayFrame::PeerJoined { id: other }).await;
                let _ = other_tx.send(RelayFrame::PeerJoined { id }).await;
            }
            info!("{} joined from {}", id, addr);

            let sender_task = tokio::spawn(async move {
                while let Some(frame) = frame_rx.recv().await {
                    let bytes = match frame.to_bytes() {
                        Ok(b) => b,
                        Err(e) => {
                            error!("Failed to serialize frame: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Binary(bytes)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Binary(data))) => {
                                Self::forward(id, &data, &peers).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("{} disconnected", id);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", id, e);
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            let remaining: Vec<mpsc::Sender<RelayFrame>> = {
                let mut peers = peers.write().await;
                peers.remove(&id);
                peers.values().cloned().collect()
            };
            for tx in remaining {
                let _ = tx.send(RelayFrame::PeerLeft { id }).await;
            }

            drop(frame_tx);
            let _ = sender_task.await;
            info!("{} cleaned up", id);
        });
    }

    /// Route a client frame. Only `Data` is accepted from clients.
    async fn forward(from: PeerId, data: &[u8], peers: &PeerMap) {
        let frame = match RelayFrame::from_bytes(data) {
            Ok(f) => f,
            Err(e) => {
                debug!("Invalid frame from {}: {}", from, e);
                return;
            }
        };

        let (to, payload) = match frame {
            RelayFrame::Data { peer, payload } => (peer, payload),
            other => {
                debug!("Ignoring {:?} from {}", other, from);
                return;
            }
        };

        let target = peers.read().await.get(&to).cloned();
        match target {
            Some(tx) => {
                if tx.send(RelayFrame::Data { peer: from, payload }).await.is_err() {
                    debug!("{} left before delivery from {}", to, from);
                }
            }
            None => debug!("Dropping payload from {} to unknown {}", from, to),
        }
    }
}
