//! Player Entity
//!
//! A movable entity with a fixed collision box and a [`MovementState`].

use serde::{Serialize, Deserialize};

use crate::core::rect::Rect;
use crate::core::vec2::Vec2;
use crate::game::direction::{Facing, moving_velocity};
use crate::game::movement::MovementState;

/// Collision box width of the reference player.
pub const PLAYER_COLLISION_WIDTH: i32 = 32;

/// Collision box height of the reference player.
pub const PLAYER_COLLISION_HEIGHT: i32 = 44;

/// Identifier of a peer (and of the player it controls).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Sprite handle handed to the render collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SpriteId(pub u16);

/// A player on the stage.
///
/// Position writes are truncated to whole pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntity {
    position: Vec2,
    velocity: Vec2,
    collision_width: i32,
    collision_height: i32,
    /// Movement state (direction, facing, active)
    pub state: MovementState,
    /// Sprite to draw this player with
    pub sprite: SpriteId,
}

impl PlayerEntity {
    /// Create an inactive player at (1, 1), facing south.
    pub fn new(collision_width: i32, collision_height: i32, sprite: SpriteId) -> Self {
        Self {
            position: Vec2::new(1.0, 1.0),
            velocity: Vec2::ZERO,
            collision_width,
            collision_height,
            state: MovementState::default(),
            sprite,
        }
    }

    /// Create a player with the reference 32×44 collision box.
    pub fn with_default_size(sprite: SpriteId) -> Self {
        Self::new(PLAYER_COLLISION_WIDTH, PLAYER_COLLISION_HEIGHT, sprite)
    }

    /// Current position (top-left of the collision box).
    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Set position, truncated to whole pixels.
    #[inline]
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position.truncate();
    }

    /// Set the X coordinate, truncated.
    #[inline]
    pub fn set_x(&mut self, x: f32) {
        self.position.x = x.trunc();
    }

    /// Set the Y coordinate, truncated.
    #[inline]
    pub fn set_y(&mut self, y: f32) {
        self.position.y = y.trunc();
    }

    /// Velocity applied by the next [`apply_velocity`](Self::apply_velocity).
    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Set the velocity.
    #[inline]
    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    /// `position += velocity`, truncated.
    #[inline]
    pub fn apply_velocity(&mut self) {
        self.set_position(self.position + self.velocity);
    }

    /// Velocity implied by the current direction mask.
    #[inline]
    pub fn moving_velocity(&self) -> Vec2 {
        moving_velocity(self.state.direction())
    }

    /// Collision box at the current position.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.position.x as i32,
            self.position.y as i32,
            self.collision_width,
            self.collision_height,
        )
    }

    /// Center of the collision box.
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.bounds().center()
    }

    /// Current facing.
    #[inline]
    pub fn facing(&self) -> Facing {
        self.state.facing()
    }

    /// Whether this player is simulated and drawn.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::direction::DirectionFlags;

    #[test]
    fn test_new_player() {
        let player = PlayerEntity::with_default_size(SpriteId(7));
        assert_eq!(player.position(), Vec2::new(1.0, 1.0));
        assert_eq!(player.bounds(), Rect::new(1, 1, 32, 44));
        assert_eq!(player.facing(), Facing::South);
        assert!(!player.is_active());
    }

    #[test]
    fn test_position_truncated_on_write() {
        let mut player = PlayerEntity::with_default_size(SpriteId(0));
        player.set_position(Vec2::new(10.9, -3.5));
        assert_eq!(player.position(), Vec2::new(10.0, -3.0));

        player.set_velocity(Vec2::new(0.7, 0.7));
        player.apply_velocity();
        player.apply_velocity();
        // Sub-pixel steps are discarded, never accumulated
        assert_eq!(player.position(), Vec2::new(10.0, -3.0));
    }

    #[test]
    fn test_center_uses_integer_half_size() {
        let mut player = PlayerEntity::new(33, 45, SpriteId(0));
        player.set_position(Vec2::new(100.0, 200.0));
        assert_eq!(player.center(), Vec2::new(116.0, 222.0));
    }

    #[test]
    fn test_moving_velocity_from_state() {
        let mut player = PlayerEntity::with_default_size(SpriteId(0));
        player.state.set_direction(DirectionFlags::HARD_DOWN | DirectionFlags::HARD_RIGHT);
        assert_eq!(player.moving_velocity(), Vec2::new(3.0, 3.0));
    }
}
