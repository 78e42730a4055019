//! Collision Resolution
//!
//! Moves an entity by its velocity, clamps it to the stage and pushes it out
//! of collidable tiles. The side of each push is inferred from how the
//! entity's bounds crossed the tile edge between the previous and current
//! positions.

use serde::{Serialize, Deserialize};
use tracing::trace;

use crate::core::rect::Rect;
use crate::game::grid::{Tile, TileGrid};
use crate::game::player::PlayerEntity;

/// How candidate tiles are selected for collision checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionScan {
    /// Check every tile in the grid.
    #[default]
    BruteForce,
    /// Check only the 3×3 block around the entity.
    Neighborhood,
}

/// Axis motion flags derived from a velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
struct Heading {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

impl Heading {
    fn of(entity: &PlayerEntity) -> Self {
        let v = entity.velocity();
        Self {
            left: v.x < 0.0,
            right: v.x > 0.0,
            up: v.y < 0.0,
            down: v.y > 0.0,
        }
    }

    fn is_moving(&self) -> bool {
        self.left || self.right || self.up || self.down
    }
}

/// Advance an entity by its velocity and resolve stage and tile collisions.
///
/// A zero velocity moves nothing and skips collision checks entirely.
pub fn resolve_movement(entity: &mut PlayerEntity, grid: &TileGrid, scan: CollisionScan) {
    let prev_bounds = entity.bounds();
    entity.apply_velocity();

    let heading = Heading::of(entity);
    if !heading.is_moving() {
        return;
    }

    clamp_to_stage(entity, grid.stage_width(), grid.stage_height());

    match scan {
        CollisionScan::BruteForce => {
            push_out_of_tiles(entity, &prev_bounds, heading, grid.tiles());
        }
        CollisionScan::Neighborhood => match grid.neighborhood(&entity.bounds()) {
            Ok(hood) => push_out_of_tiles(entity, &prev_bounds, heading, hood.tiles()),
            Err(e) => {
                trace!("Neighborhood query rejected ({}), scanning all tiles", e);
                push_out_of_tiles(entity, &prev_bounds, heading, grid.tiles());
            }
        },
    }
}

/// Keep an entity's bounds inside `[0, width] × [0, height]`.
///
/// Each edge is checked independently in the order left, top, right, bottom.
pub fn clamp_to_stage(entity: &mut PlayerEntity, stage_width: i32, stage_height: i32) {
    let bounds = entity.bounds();
    let mut x = bounds.x;
    let mut y = bounds.y;

    if bounds.left() < 0 {
        x = 0;
    }
    if bounds.top() < 0 {
        y = 0;
    }
    if bounds.right() > stage_width {
        x = stage_width - bounds.width;
    }
    if bounds.bottom() > stage_height {
        y = stage_height - bounds.height;
    }

    entity.set_x(x as f32);
    entity.set_y(y as f32);
}

/// Push an entity out of every collidable tile it touches, scanning all
/// tiles in grid order.
pub fn resolve_tile_collisions(entity: &mut PlayerEntity, prev_bounds: &Rect, grid: &TileGrid) {
    let heading = Heading::of(entity);
    push_out_of_tiles(entity, prev_bounds, heading, grid.tiles());
}

fn push_out_of_tiles<'a, I>(entity: &mut PlayerEntity, prev: &Rect, heading: Heading, tiles: I)
where
    I: IntoIterator<Item = &'a Tile>,
{
    for tile in tiles {
        // Bounds are re-read per tile; earlier pushes affect later tests
        let bounds = entity.bounds();
        if !tile.collidable || !tile.bounds.touches(&bounds) {
            continue;
        }
        let wall = &tile.bounds;

        if heading.right && bounds.right() > wall.left() && prev.right() <= wall.left() {
            entity.set_x((wall.left() - bounds.width) as f32);
        } else if heading.left && bounds.left() < wall.right() && prev.left() >= wall.right() {
            entity.set_x(wall.right() as f32);
        }

        if heading.down && bounds.bottom() > wall.top() && prev.bottom() <= wall.top() {
            entity.set_y((wall.top() - bounds.height) as f32);
        } else if heading.up && bounds.top() < wall.bottom() && prev.top() >= wall.bottom() {
            entity.set_y(wall.bottom() as f32);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::grid::TileCoord;
    use crate::game::player::SpriteId;

    /// 5×5 grid of 20px tiles (100×100 stage) with walls at the given tiles.
    fn grid_with_walls(walls: &[(i32, i32)]) -> TileGrid {
        TileGrid::from_fn(5, 5, 20, 20, |c| walls.contains(&(c.x, c.y))).unwrap()
    }

    fn entity_at(x: f32, y: f32, velocity: Vec2) -> PlayerEntity {
        let mut entity = PlayerEntity::new(16, 16, SpriteId(0));
        entity.set_position(Vec2::new(x, y));
        entity.set_velocity(velocity);
        entity
    }

    #[test]
    fn test_free_movement() {
        let grid = grid_with_walls(&[]);
        let mut entity = entity_at(30.0, 30.0, Vec2::new(3.0, -2.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position(), Vec2::new(33.0, 28.0));
    }

    #[test]
    fn test_push_out_moving_right() {
        // Wall column starts at x = 100 on a wider stage
        let grid = TileGrid::from_fn(8, 5, 20, 20, |c| c.x == 5).unwrap();
        let mut entity = entity_at(82.0, 40.0, Vec2::new(4.0, 0.0));
        assert_eq!(entity.bounds().right(), 98);

        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position().x, (100 - 16) as f32);
        assert_eq!(entity.position().y, 40.0);
    }

    #[test]
    fn test_meeting_wall_exactly_is_not_pushed() {
        let grid = TileGrid::from_fn(8, 5, 20, 20, |c| c.x == 5).unwrap();
        let mut entity = entity_at(80.0, 40.0, Vec2::new(4.0, 0.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        // Right edge lands on 100, not past it
        assert_eq!(entity.position().x, 84.0);
        assert_eq!(entity.bounds().right(), 100);
    }

    #[test]
    fn test_push_out_moving_left_and_up() {
        let grid = grid_with_walls(&[(1, 2), (2, 1)]);

        let mut entity = entity_at(42.0, 42.0, Vec2::new(-4.0, 0.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position().x, 40.0);

        let mut entity = entity_at(42.0, 42.0, Vec2::new(0.0, -4.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position().y, 40.0);
    }

    #[test]
    fn test_push_out_moving_down() {
        let grid = grid_with_walls(&[(2, 3)]);
        let mut entity = entity_at(42.0, 42.0, Vec2::new(0.0, 4.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position().y, (60 - 16) as f32);
    }

    #[test]
    fn test_axes_resolved_independently() {
        // Walls right of and below the entity; diagonal move into the corner
        let grid = grid_with_walls(&[(3, 2), (2, 3), (3, 3)]);
        let mut entity = entity_at(42.0, 42.0, Vec2::new(3.0, 3.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position(), Vec2::new(44.0, 44.0));
    }

    #[test]
    fn test_stationary_entity_not_clamped() {
        let grid = grid_with_walls(&[]);
        let mut entity = entity_at(-2.0, 10.0, Vec2::ZERO);
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position(), Vec2::new(-2.0, 10.0));
    }

    #[test]
    fn test_clamp_left_leaves_y() {
        let mut entity = entity_at(-2.0, 10.0, Vec2::ZERO);
        clamp_to_stage(&mut entity, 100, 100);
        assert_eq!(entity.position(), Vec2::new(0.0, 10.0));
    }

    #[test]
    fn test_clamp_far_edges() {
        let grid = grid_with_walls(&[]);
        let mut entity = entity_at(86.0, 86.0, Vec2::new(4.0, 4.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position(), Vec2::new(84.0, 84.0));

        let mut entity = entity_at(1.0, 50.0, Vec2::new(-4.0, 0.0));
        resolve_movement(&mut entity, &grid, CollisionScan::BruteForce);
        assert_eq!(entity.position(), Vec2::new(0.0, 50.0));
    }

    #[test]
    fn test_resolve_tile_collisions_directly() {
        let grid = grid_with_walls(&[(3, 2)]);
        let mut entity = entity_at(46.0, 42.0, Vec2::new(4.0, 0.0));
        let prev = Rect::new(42, 42, 16, 16);
        resolve_tile_collisions(&mut entity, &prev, &grid);
        assert_eq!(entity.position().x, 44.0);
    }

    #[test]
    fn test_neighborhood_scan_matches_brute_force() {
        let grid = TileGrid::generate(12, 12, 20, 20, 50, 3).unwrap();
        let velocities = [
            Vec2::new(4.0, 0.0),
            Vec2::new(-4.0, 0.0),
            Vec2::new(0.0, 4.0),
            Vec2::new(0.0, -4.0),
            Vec2::new(3.0, 3.0),
            Vec2::new(-3.0, 2.0),
        ];

        for x in (0..220).step_by(7) {
            for y in (0..220).step_by(11) {
                for v in velocities {
                    let mut brute = entity_at(x as f32, y as f32, v);
                    let mut local = brute.clone();
                    resolve_movement(&mut brute, &grid, CollisionScan::BruteForce);
                    resolve_movement(&mut local, &grid, CollisionScan::Neighborhood);
                    assert_eq!(brute.position(), local.position(), "start ({}, {}) v {}", x, y, v);
                }
            }
        }
    }

    #[test]
    fn test_neighborhood_scan_falls_back_for_large_entities() {
        let grid = TileGrid::from_fn(8, 5, 20, 20, |c| c == TileCoord::new(5, 1)).unwrap();
        let mut entity = PlayerEntity::new(30, 30, SpriteId(0));
        entity.set_position(Vec2::new(68.0, 10.0));
        entity.set_velocity(Vec2::new(4.0, 0.0));
        resolve_movement(&mut entity, &grid, CollisionScan::Neighborhood);
        assert_eq!(entity.position().x, 70.0);
    }
}
