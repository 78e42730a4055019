//! Stage Camera
//!
//! Screen-space offset for a followed entity. The offset is clamped so that
//! nothing beyond the stage edges is ever drawn.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::grid::{TileCoord, TileGrid};
use crate::game::player::PeerId;

/// Camera over a stage of fixed pixel size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    stage_width: i32,
    stage_height: i32,
    screen_width: i32,
    screen_height: i32,
    following: Option<PeerId>,
}

/// Inclusive range of tile coordinates on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibleTiles {
    /// Top-left visible tile
    pub min: TileCoord,
    /// Bottom-right visible tile
    pub max: TileCoord,
}

impl VisibleTiles {
    /// Check if a tile coordinate is in the range.
    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.x >= self.min.x && coord.x <= self.max.x && coord.y >= self.min.y && coord.y <= self.max.y
    }
}

impl Camera {
    /// Create a camera following nobody.
    pub fn new(stage_width: i32, stage_height: i32, screen_width: i32, screen_height: i32) -> Self {
        Self {
            stage_width,
            stage_height,
            screen_width,
            screen_height,
            following: None,
        }
    }

    /// Follow an entity, replacing the previous target.
    pub fn follow(&mut self, id: PeerId) {
        self.following = Some(id);
    }

    /// Entity being followed.
    pub fn following(&self) -> Option<PeerId> {
        self.following
    }

    /// Screen size in pixels.
    pub fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }

    /// Draw offset for a followed entity whose bounds center is `center`.
    pub fn offset_for(&self, center: Vec2) -> Vec2 {
        Vec2::new(
            axis_offset(center.x, self.screen_width, self.stage_width),
            axis_offset(center.y, self.screen_height, self.stage_height),
        )
    }

    /// Convert a stage position to a screen position.
    pub fn to_screen(&self, world: Vec2, center: Vec2) -> Vec2 {
        world + self.offset_for(center)
    }

    /// Tiles that fall at least partly on screen.
    pub fn visible_tiles(&self, grid: &TileGrid, center: Vec2) -> VisibleTiles {
        let offset = self.offset_for(center);
        let left = -offset.x as i32;
        let top = -offset.y as i32;
        let right = left + self.screen_width - 1;
        let bottom = top + self.screen_height - 1;

        let max_x = grid.width_tiles() - 1;
        let max_y = grid.height_tiles() - 1;
        VisibleTiles {
            min: TileCoord::new(
                left.div_euclid(grid.tile_width()).clamp(0, max_x),
                top.div_euclid(grid.tile_height()).clamp(0, max_y),
            ),
            max: TileCoord::new(
                right.div_euclid(grid.tile_width()).clamp(0, max_x),
                bottom.div_euclid(grid.tile_height()).clamp(0, max_y),
            ),
        }
    }
}

fn axis_offset(position: f32, screen: i32, stage: i32) -> f32 {
    let middle = (screen / 2) as f32;
    if position > middle {
        if stage as f32 - position > middle {
            middle - position
        } else {
            (screen - stage) as f32
        }
    } else {
        0.0
    }
}
