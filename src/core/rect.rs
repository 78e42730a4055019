//! Axis-Aligned Rectangle
//!
//! Integer pixel rectangle. `right` and `bottom` are exclusive edges
//! (`x + width`, `y + height`).

use serde::{Serialize, Deserialize};

use super::vec2::Vec2;

/// Axis-aligned rectangle in stage pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Left edge (inclusive).
    #[inline]
    pub const fn left(&self) -> i32 {
        self.x
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Top edge (inclusive).
    #[inline]
    pub const fn top(&self) -> i32 {
        self.y
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Top-left corner as a vector.
    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::from_ints(self.x, self.y)
    }

    /// Center point, using integer halving of the size.
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::from_ints(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Inclusive overlap test: rectangles sharing only an edge still touch.
    pub fn touches(&self, other: &Rect) -> bool {
        !(self.top() > other.bottom()
            || self.bottom() < other.top()
            || self.left() > other.right()
            || self.right() < other.left())
    }

    /// Strict overlap test: rectangles must share a positive area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    /// Area of the overlap between two rectangles (0 when disjoint).
    pub fn intersection_area(&self, other: &Rect) -> i32 {
        let x = self.left().max(other.left());
        let y = self.top().max(other.top());
        let width = self.right().min(other.right()) - x;
        let height = self.bottom().min(other.bottom()) - y;
        if width <= 0 || height <= 0 {
            return 0;
        }
        width * height
    }
}
