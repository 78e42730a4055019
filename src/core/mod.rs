//! Core primitives.
//!
//! Geometry and numeric building blocks shared by the simulation and the
//! wire protocol.

pub mod vec2;
pub mod rect;
pub mod half;
pub mod rng;

// Re-export core types
pub use vec2::Vec2;
pub use rect::Rect;
pub use half::{f32_to_half, half_to_f32, pack_half2, unpack_half2};
pub use rng::DeterministicRng;
