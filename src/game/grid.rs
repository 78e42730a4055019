//! Tile Grid
//!
//! Uniform fixed-size grid of tiles. Tiles are stored column-major
//! (x outer, y inner) and every scan over the grid visits them in that order.
//!
//! ## Neighborhood Query
//!
//! ```text
//!   TL ──────── TR        corners tested in order TL, TR, BL, BR
//!   │   box     │         winner = corner tile with largest overlap
//!   BL ──────── BR        result = 3×3 block centered on the winner
//! ```

use std::ops::Index;
use serde::{Serialize, Deserialize};

use crate::core::rect::Rect;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::player::{PlayerEntity, SpriteId};

/// Sprite used for walkable tiles.
pub const FLOOR_SPRITE: SpriteId = SpriteId(0);

/// Sprite used for wall tiles.
pub const WALL_SPRITE: SpriteId = SpriteId(1);

/// Grid coordinate (tile column, tile row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl TileCoord {
    /// Create a new coordinate.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate shifted by an offset.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// A single tile. Immutable once the grid is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Stage-space bounds
    pub bounds: Rect,
    /// Whether entities are pushed out of this tile
    pub collidable: bool,
    /// Sprite to draw
    pub sprite: SpriteId,
}

/// Grid construction and query errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Grid or tile dimensions are zero or negative.
    #[error("Grid dimensions must be positive")]
    Empty,

    /// Layout rows differ in length.
    #[error("Layout row {row} has {found} tiles, expected {expected}")]
    RaggedLayout {
        /// Offending row
        row: usize,
        /// Expected tile count
        expected: usize,
        /// Actual tile count
        found: usize,
    },

    /// Layout contains a character that is not a tile.
    #[error("Unknown tile {found:?} at row {row}, column {column}")]
    UnknownTile {
        /// Character found
        found: char,
        /// Row
        row: usize,
        /// Column
        column: usize,
    },

    /// Coordinate is outside the grid.
    #[error("Tile {0} is out of range")]
    OutOfRange(TileCoord),

    /// Query box is larger than one tile.
    #[error("Query box {width}x{height} is larger than a tile")]
    OversizedQuery {
        /// Box width
        width: i32,
        /// Box height
        height: i32,
    },

    /// No corner of the query box lies inside the grid.
    #[error("Query box lies outside the grid")]
    OutsideGrid,

    /// Stage pixel size or tile count does not fit in an `i32`.
    #[error("Grid of {width_tiles}x{height_tiles} tiles of {tile_width}x{tile_height} is too large")]
    TooLarge {
        /// Grid width in tiles
        width_tiles: i32,
        /// Grid height in tiles
        height_tiles: i32,
        /// Tile width in pixels
        tile_width: i32,
        /// Tile height in pixels
        tile_height: i32,
    },
}

/// Check that a grid's pixel size and tile count fit in an `i32`.
pub fn check_grid_size(
    width_tiles: i32,
    height_tiles: i32,
    tile_width: i32,
    tile_height: i32,
) -> Result<(), GridError> {
    if width_tiles <= 0 || height_tiles <= 0 || tile_width <= 0 || tile_height <= 0 {
        return Err(GridError::Empty);
    }
    let fits = width_tiles.checked_mul(tile_width).is_some()
        && height_tiles.checked_mul(tile_height).is_some()
        && width_tiles.checked_mul(height_tiles).is_some();
    if !fits {
        return Err(GridError::TooLarge {
            width_tiles,
            height_tiles,
            tile_width,
            tile_height,
        });
    }
    Ok(())
}

// =============================================================================
// TILE GRID
// =============================================================================

/// Fixed-size grid of equally sized tiles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    width_tiles: i32,
    height_tiles: i32,
    tile_width: i32,
    tile_height: i32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Build a grid, asking `collidable` for every coordinate in grid order.
    pub fn from_fn<F>(
        width_tiles: i32,
        height_tiles: i32,
        tile_width: i32,
        tile_height: i32,
        mut collidable: F,
    ) -> Result<Self, GridError>
    where
        F: FnMut(TileCoord) -> bool,
    {
        check_grid_size(width_tiles, height_tiles, tile_width, tile_height)?;

        // x < width_tiles and y < height_tiles, so no product below overflows
        let mut tiles = Vec::with_capacity((width_tiles * height_tiles) as usize);
        for x in 0..width_tiles {
            for y in 0..height_tiles {
                let wall = collidable(TileCoord::new(x, y));
                tiles.push(Tile {
                    bounds: Rect::new(x * tile_width, y * tile_height, tile_width, tile_height),
                    collidable: wall,
                    sprite: if wall { WALL_SPRITE } else { FLOOR_SPRITE },
                });
            }
        }

        Ok(Self {
            width_tiles,
            height_tiles,
            tile_width,
            tile_height,
            tiles,
        })
    }

    /// Build a random maze from a seed. Each tile is a wall with a
    /// 1-in-`wall_one_in` chance; the spawn tile (0, 0) is always floor.
    pub fn generate(
        width_tiles: i32,
        height_tiles: i32,
        tile_width: i32,
        tile_height: i32,
        seed: u64,
        wall_one_in: u32,
    ) -> Result<Self, GridError> {
        let mut rng = DeterministicRng::new(seed);
        Self::from_fn(width_tiles, height_tiles, tile_width, tile_height, |coord| {
            let wall = rng.one_in(wall_one_in);
            wall && coord != TileCoord::new(0, 0)
        })
    }

    /// Build a grid from text rows: `#` is a wall, `.` is floor.
    ///
    /// Rows run top to bottom; blank lines and surrounding whitespace are
    /// ignored.
    pub fn from_layout(layout: &str, tile_width: i32, tile_height: i32) -> Result<Self, GridError> {
        let rows: Vec<Vec<char>> = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.chars().collect())
            .collect();

        let expected = rows.first().map(Vec::len).ok_or(GridError::Empty)?;
        let mut walls = Vec::with_capacity(rows.len());
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(GridError::RaggedLayout {
                    row,
                    expected,
                    found: cells.len(),
                });
            }
            let mut line = Vec::with_capacity(expected);
            for (column, &c) in cells.iter().enumerate() {
                match c {
                    '#' => line.push(true),
                    '.' => line.push(false),
                    found => return Err(GridError::UnknownTile { found, row, column }),
                }
            }
            walls.push(line);
        }

        Self::from_fn(expected as i32, walls.len() as i32, tile_width, tile_height, |coord| {
            walls[coord.y as usize][coord.x as usize]
        })
    }

    /// Width in tiles.
    #[inline]
    pub fn width_tiles(&self) -> i32 {
        self.width_tiles
    }

    /// Height in tiles.
    #[inline]
    pub fn height_tiles(&self) -> i32 {
        self.height_tiles
    }

    /// Width of every tile in pixels.
    #[inline]
    pub fn tile_width(&self) -> i32 {
        self.tile_width
    }

    /// Height of every tile in pixels.
    #[inline]
    pub fn tile_height(&self) -> i32 {
        self.tile_height
    }

    /// Stage width in pixels.
    #[inline]
    pub fn stage_width(&self) -> i32 {
        self.tile_width.saturating_mul(self.width_tiles)
    }

    /// Stage height in pixels.
    #[inline]
    pub fn stage_height(&self) -> i32 {
        self.tile_height.saturating_mul(self.height_tiles)
    }

    /// Check if a coordinate lies inside the grid.
    #[inline]
    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.x >= 0 && coord.x < self.width_tiles && coord.y >= 0 && coord.y < self.height_tiles
    }

    fn index_of(&self, coord: TileCoord) -> Option<usize> {
        self.contains(coord)
            .then(|| (coord.x * self.height_tiles + coord.y) as usize)
    }

    /// Look up a tile.
    pub fn tile(&self, coord: TileCoord) -> Result<&Tile, GridError> {
        self.index_of(coord)
            .map(|i| &self.tiles[i])
            .ok_or(GridError::OutOfRange(coord))
    }

    /// Look up a tile, `None` when out of range.
    pub fn get(&self, coord: TileCoord) -> Option<&Tile> {
        self.index_of(coord).map(|i| &self.tiles[i])
    }

    /// All tiles in grid order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.iter()
    }

    /// Coordinate of the tile containing a stage pixel.
    pub fn coord_at_point(&self, x: i32, y: i32) -> Option<TileCoord> {
        let coord = TileCoord::new(x.div_euclid(self.tile_width), y.div_euclid(self.tile_height));
        self.contains(coord).then_some(coord)
    }

    /// Tile containing a stage pixel.
    pub fn tile_at_point(&self, x: i32, y: i32) -> Option<&Tile> {
        self.coord_at_point(x, y).and_then(|coord| self.get(coord))
    }

    /// Place an entity so its collision box is centered in a tile.
    pub fn center_in_tile(&self, coord: TileCoord, entity: &mut PlayerEntity) -> Result<(), GridError> {
        if !self.contains(coord) {
            return Err(GridError::OutOfRange(coord));
        }
        let bounds = entity.bounds();
        entity.set_position(Vec2::from_ints(
            coord.x * self.tile_width + self.tile_width / 2 - bounds.width / 2,
            coord.y * self.tile_height + self.tile_height / 2 - bounds.height / 2,
        ));
        Ok(())
    }

    /// 3×3 block of tiles around the tile the box overlaps most.
    ///
    /// The box may not be larger than a tile in either dimension.
    pub fn neighborhood(&self, bounds: &Rect) -> Result<Neighborhood<'_>, GridError> {
        if bounds.width > self.tile_width || bounds.height > self.tile_height {
            return Err(GridError::OversizedQuery {
                width: bounds.width,
                height: bounds.height,
            });
        }

        let corners = [
            (bounds.left(), bounds.top()),
            (bounds.right(), bounds.top()),
            (bounds.left(), bounds.bottom()),
            (bounds.right(), bounds.bottom()),
        ];

        let mut best: Option<(TileCoord, i32)> = None;
        for (px, py) in corners {
            let Some(coord) = self.coord_at_point(px, py) else {
                continue;
            };
            let Some(tile) = self.get(coord) else {
                continue;
            };
            let area = tile.bounds.intersection_area(bounds);
            match best {
                Some((_, best_area)) if area <= best_area => {}
                _ => best = Some((coord, area)),
            }
        }

        let (center, _) = best.ok_or(GridError::OutsideGrid)?;

        let mut cells = [[None; 3]; 3];
        for (i, column) in cells.iter_mut().enumerate() {
            for (j, cell) in column.iter_mut().enumerate() {
                *cell = self.get(center.offset(i as i32 - 1, j as i32 - 1));
            }
        }

        Ok(Neighborhood { center, cells })
    }
}

impl Index<TileCoord> for TileGrid {
    type Output = Tile;

    /// Panics if the coordinate is out of range.
    fn index(&self, coord: TileCoord) -> &Tile {
        match self.index_of(coord) {
            Some(i) => &self.tiles[i],
            None => panic!("tile {} is out of range", coord),
        }
    }
}

// =============================================================================
// NEIGHBORHOOD
// =============================================================================

/// 3×3 block of tiles around a center coordinate. Cells outside the grid are
/// `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Neighborhood<'a> {
    center: TileCoord,
    cells: [[Option<&'a Tile>; 3]; 3],
}

impl<'a> Neighborhood<'a> {
    /// Coordinate of the center tile.
    #[inline]
    pub fn center_coord(&self) -> TileCoord {
        self.center
    }

    /// Center tile.
    #[inline]
    pub fn center(&self) -> Option<&'a Tile> {
        self.cells[1][1]
    }

    /// Tile at an offset from the center, with `dx, dy` in `-1..=1`.
    pub fn get(&self, dx: i32, dy: i32) -> Option<&'a Tile> {
        if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) {
            return None;
        }
        self.cells[(dx + 1) as usize][(dy + 1) as usize]
    }

    /// Tiles inside the grid, in grid order.
    pub fn tiles(&self) -> impl Iterator<Item = &'a Tile> + '_ {
        self.cells.iter().flatten().filter_map(|cell| *cell)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid() -> TileGrid {
        TileGrid::from_fn(10, 8, 48, 48, |_| false).unwrap()
    }

    #[test]
    fn test_stage_size() {
        let grid = open_grid();
        assert_eq!(grid.stage_width(), 480);
        assert_eq!(grid.stage_height(), 384);
        assert_eq!(grid.tiles().count(), 80);
    }

    #[test]
    fn test_tile_bounds_and_order() {
        let grid = open_grid();
        let tile = grid.tile(TileCoord::new(2, 3)).unwrap();
        assert_eq!(tile.bounds, Rect::new(96, 144, 48, 48));

        // Column-major: second stored tile is (0, 1)
        let second = grid.tiles().nth(1).unwrap();
        assert_eq!(second.bounds, Rect::new(0, 48, 48, 48));
    }

    #[test]
    fn test_out_of_range_lookup() {
        let grid = open_grid();
        assert_eq!(
            grid.tile(TileCoord::new(10, 0)),
            Err(GridError::OutOfRange(TileCoord::new(10, 0)))
        );
        assert!(grid.tile(TileCoord::new(-1, 0)).is_err());
        assert!(grid.get(TileCoord::new(0, 8)).is_none());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_panics_out_of_range() {
        let grid = open_grid();
        let _tile = &grid[TileCoord::new(0, 99)];
    }

    #[test]
    fn test_empty_grid_rejected() {
        assert_eq!(TileGrid::from_fn(0, 5, 48, 48, |_| false), Err(GridError::Empty));
        assert_eq!(TileGrid::from_fn(5, 5, 0, 48, |_| false), Err(GridError::Empty));
        assert_eq!(TileGrid::from_layout("\n  \n", 48, 48), Err(GridError::Empty));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let err = TileGrid::from_fn(50_000, 1, 50_000, 48, |_| false).unwrap_err();
        assert!(matches!(err, GridError::TooLarge { width_tiles: 50_000, .. }));
        assert!(matches!(
            TileGrid::generate(1, 60_000, 48, 60_000, 50, 0),
            Err(GridError::TooLarge { .. })
        ));
        assert!(matches!(check_grid_size(70_000, 70_000, 1, 1), Err(GridError::TooLarge { .. })));
        assert_eq!(check_grid_size(40, 40, 48, 48), Ok(()));
    }

    #[test]
    fn test_from_layout() {
        let grid = TileGrid::from_layout(
            "
            ..#
            #..
            ",
            10,
            10,
        )
        .unwrap();
        assert_eq!(grid.width_tiles(), 3);
        assert_eq!(grid.height_tiles(), 2);
        assert!(grid[TileCoord::new(2, 0)].collidable);
        assert!(grid[TileCoord::new(0, 1)].collidable);
        assert!(!grid[TileCoord::new(1, 1)].collidable);
        assert_eq!(grid[TileCoord::new(2, 0)].sprite, WALL_SPRITE);
        assert_eq!(grid[TileCoord::new(0, 0)].sprite, FLOOR_SPRITE);
    }

    #[test]
    fn test_layout_errors() {
        assert_eq!(
            TileGrid::from_layout("...\n..", 10, 10),
            Err(GridError::RaggedLayout { row: 1, expected: 3, found: 2 })
        );
        assert_eq!(
            TileGrid::from_layout("..x", 10, 10),
            Err(GridError::UnknownTile { found: 'x', row: 0, column: 2 })
        );
    }

    #[test]
    fn test_generate_deterministic() {
        let a = TileGrid::generate(40, 40, 48, 48, 50, 10).unwrap();
        let b = TileGrid::generate(40, 40, 48, 48, 50, 10).unwrap();
        assert_eq!(a, b);

        assert!(!a[TileCoord::new(0, 0)].collidable);
        let walls = a.tiles().filter(|t| t.collidable).count();
        assert!(walls > 80 && walls < 250, "~1 in 10 walls expected, got {}", walls);

        let c = TileGrid::generate(40, 40, 48, 48, 51, 10).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_generate_without_walls() {
        let grid = TileGrid::generate(5, 5, 48, 48, 7, 0).unwrap();
        assert!(grid.tiles().all(|t| !t.collidable));
    }

    #[test]
    fn test_tile_at_point() {
        let grid = open_grid();
        assert_eq!(grid.coord_at_point(47, 48), Some(TileCoord::new(0, 1)));
        assert_eq!(grid.coord_at_point(-1, 0), None);
        assert_eq!(grid.coord_at_point(480, 0), None);
        assert_eq!(grid.tile_at_point(100, 100).unwrap().bounds, Rect::new(96, 96, 48, 48));
    }

    #[test]
    fn test_center_in_tile() {
        let grid = open_grid();
        let mut player = PlayerEntity::with_default_size(SpriteId(2));
        grid.center_in_tile(TileCoord::new(0, 0), &mut player).unwrap();
        assert_eq!(player.bounds(), Rect::new(8, 2, 32, 44));

        grid.center_in_tile(TileCoord::new(1, 2), &mut player).unwrap();
        assert_eq!(player.bounds(), Rect::new(56, 98, 32, 44));

        assert!(grid.center_in_tile(TileCoord::new(11, 0), &mut player).is_err());
    }

    #[test]
    fn test_neighborhood_picks_largest_overlap() {
        let grid = open_grid();
        // Mostly inside tile (2, 2), spilling into (3, 2)
        let query = Rect::new(100, 100, 32, 32);
        let hood = grid.neighborhood(&query).unwrap();
        assert_eq!(hood.center_coord(), TileCoord::new(2, 2));
        assert_eq!(hood.center().unwrap().bounds, Rect::new(96, 96, 48, 48));
        assert_eq!(hood.get(-1, -1).unwrap().bounds, Rect::new(48, 48, 48, 48));
        assert_eq!(hood.get(1, 1).unwrap().bounds, Rect::new(144, 144, 48, 48));
        assert_eq!(hood.tiles().count(), 9);

        // Mostly inside (3, 2)
        let query = Rect::new(130, 100, 32, 32);
        let hood = grid.neighborhood(&query).unwrap();
        assert_eq!(hood.center_coord(), TileCoord::new(3, 2));
    }

    #[test]
    fn test_neighborhood_first_corner_wins_ties() {
        let grid = open_grid();
        // Split evenly between (0, 0) and (1, 0)
        let query = Rect::new(32, 8, 32, 32);
        let hood = grid.neighborhood(&query).unwrap();
        assert_eq!(hood.center_coord(), TileCoord::new(0, 0));
    }

    #[test]
    fn test_neighborhood_at_grid_edge() {
        let grid = open_grid();
        let hood = grid.neighborhood(&Rect::new(0, 0, 32, 32)).unwrap();
        assert_eq!(hood.center_coord(), TileCoord::new(0, 0));
        assert!(hood.get(-1, 0).is_none());
        assert!(hood.get(0, -1).is_none());
        assert!(hood.get(1, 1).is_some());
        assert_eq!(hood.tiles().count(), 4);
        assert!(hood.get(2, 0).is_none());
    }

    #[test]
    fn test_neighborhood_rejects_bad_queries() {
        let grid = open_grid();
        assert_eq!(
            grid.neighborhood(&Rect::new(0, 0, 49, 10)),
            Err(GridError::OversizedQuery { width: 49, height: 10 })
        );
        assert_eq!(
            grid.neighborhood(&Rect::new(-100, -100, 20, 20)),
            Err(GridError::OutsideGrid)
        );
    }

    #[test]
    fn test_neighborhood_partly_outside() {
        let grid = open_grid();
        // Top-left corner outside the grid, top-right inside (0, 0)
        let hood = grid.neighborhood(&Rect::new(-10, 5, 32, 32)).unwrap();
        assert_eq!(hood.center_coord(), TileCoord::new(0, 0));
    }
}
