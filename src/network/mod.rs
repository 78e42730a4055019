//! Network Layer
//!
//! Player state deltas, the transport abstraction, and a WebSocket relay with
//! its client. The simulation only sees [`Transport`]; everything async lives
//! behind it.

pub mod protocol;
pub mod transport;
pub mod relay;
pub mod client;

pub use protocol::{DecodeError, DeltaTracker, RelayFrame, StateChangeHeader, StateDelta, SyncPolicy};
pub use transport::{LoopbackHub, LoopbackTransport, Transport, TransportError, TransportEvent};
pub use relay::{RelayError, RelayServer};
pub use client::RelayClient;
