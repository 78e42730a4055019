//! # Maze Sync
//!
//! Tile maze simulation with networked player state sync.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MAZE SYNC                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Geometry and numeric primitives           │
//! │  ├── vec2.rs     - 2D float vector                           │
//! │  ├── rect.rs     - Integer rectangle and overlap             │
//! │  ├── half.rs     - IEEE 754 half precision packing           │
//! │  └── rng.rs      - Seeded Xorshift128+ for maze layout       │
//! │                                                              │
//! │  game/           - Simulation                                │
//! │  ├── direction.rs- Direction flags, facing, velocity         │
//! │  ├── player.rs   - Player entity                             │
//! │  ├── grid.rs     - Tile maze                                 │
//! │  ├── collision.rs- Clamp and tile push-out                   │
//! │  ├── camera.rs   - Follow camera                             │
//! │  ├── input.rs    - Controllers                               │
//! │  └── stage.rs    - Per-tick orchestration                    │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── protocol.rs - State deltas and relay frames             │
//! │  ├── transport.rs- Transport trait and loopback hub          │
//! │  ├── relay.rs    - WebSocket relay server                    │
//! │  └── client.rs   - WebSocket relay client                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sync Model
//!
//! Every peer simulates every player. Each tick the local player's state is
//! sent to every other peer as a [`StateDelta`]; receivers overwrite their
//! copy and then simulate it forward with the same movement rules.
//! Ordering and reliability come from the transport.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod config;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rect::Rect;
pub use config::{ConfigError, RelayConfig, SimConfig};
pub use game::stage::{DrawCommand, Stage, TickReport};
pub use game::player::{PeerId, PlayerEntity};
pub use network::protocol::StateDelta;
pub use network::transport::{Transport, TransportEvent};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
