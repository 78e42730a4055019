//! Game Logic Module
//!
//! Maze simulation: direction encoding, player movement, tile collision and
//! the camera. Nothing here touches the network directly; the stage drives a
//! [`Transport`](crate::network::Transport) handed to it each tick.
//!
//! ## Module Structure
//!
//! - `direction`: Movement vector to direction flags, facing and velocity
//! - `movement`: Per-entity direction, facing and activation
//! - `player`: Player entity with position and collision box
//! - `grid`: Tile maze and neighborhood queries
//! - `collision`: Stage clamping and tile push-out
//! - `camera`: Follow camera and visible tile range
//! - `input`: Controllers, edge-latched buttons, scripted playback
//! - `stage`: Per-tick orchestration and draw list

pub mod direction;
pub mod movement;
pub mod player;
pub mod grid;
pub mod collision;
pub mod camera;
pub mod input;
pub mod stage;

// Re-export key types
pub use direction::{DirectionFlags, Facing, vector_to_flags, facing_from_flags, moving_velocity};
pub use movement::MovementState;
pub use player::{PeerId, PlayerEntity, SpriteId};
pub use grid::{GridError, Neighborhood, Tile, TileCoord, TileGrid};
pub use collision::{CollisionScan, resolve_movement};
pub use camera::{Camera, VisibleTiles};
pub use input::{Controller, InputFrame, InputSource, ScriptedInput};
pub use stage::{DrawCommand, Stage, StageError, TickReport};
