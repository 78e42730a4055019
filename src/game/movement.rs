//! Movement State
//!
//! Per-entity direction mask, facing and activation flag. Mutated each tick
//! from local input or from decoded network deltas.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::direction::{DirectionFlags, Facing, facing_from_flags, vector_to_flags};

/// Movement record of one entity.
///
/// `facing` always reflects the last nonzero direction unless it was set
/// explicitly; stopping never resets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovementState {
    direction: DirectionFlags,
    facing: Facing,
    active: bool,
}

impl MovementState {
    /// Create an inactive state with an explicit facing.
    pub const fn new(direction: DirectionFlags, facing: Facing) -> Self {
        Self {
            direction,
            facing,
            active: false,
        }
    }

    /// Create an inactive state, deriving facing from the direction.
    pub fn from_flags(direction: DirectionFlags) -> Self {
        Self::new(direction, facing_from_flags(direction))
    }

    /// Create an inactive state from a movement vector.
    pub fn from_vector(direction: Vec2) -> Self {
        Self::from_flags(vector_to_flags(direction))
    }

    /// Current direction mask.
    #[inline]
    pub fn direction(&self) -> DirectionFlags {
        self.direction
    }

    /// Set the direction mask.
    ///
    /// Any nonzero mask recomputes the facing; STOPPED keeps it.
    pub fn set_direction(&mut self, direction: DirectionFlags) {
        self.direction = direction;
        if !direction.is_stopped() {
            self.facing = facing_from_flags(direction);
        }
    }

    /// Apply a movement vector from input.
    pub fn steer(&mut self, direction: Vec2) {
        self.set_direction(vector_to_flags(direction));
    }

    /// Current facing.
    #[inline]
    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Override the facing.
    #[inline]
    pub fn set_facing(&mut self, facing: Facing) {
        self.facing = facing;
    }

    /// Whether the entity takes part in simulation and rendering.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate or deactivate the entity.
    #[inline]
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Check if the entity has no movement input.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.direction.is_stopped()
    }
}
