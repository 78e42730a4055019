//! Direction Codec
//!
//! Maps a movement vector to a 16-way direction bitmask, the bitmask to one of
//! four facings, and the bitmask to a per-tick moving velocity.
//!
//! ## Flag Layout
//!
//! ```text
//! bit  7           6           5          4          3          2          1        0
//!     HARD_RIGHT  SOFT_RIGHT  HARD_DOWN  SOFT_DOWN  HARD_LEFT  SOFT_LEFT  HARD_UP  SOFT_UP
//! ```
//!
//! At most one vertical and one horizontal flag are set by [`vector_to_flags`].

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;

/// Lower bound (degrees) of the true-diagonal band.
pub const DIAGONAL_LOWER_DEGREES: f64 = 25.0;

/// Upper bound (degrees) of the true-diagonal band.
pub const DIAGONAL_UPPER_DEGREES: f64 = 55.0;

/// Pixels per tick on a HARD axis.
pub const MAX_SPEED: f32 = 4.0;

/// Pixels per tick on a SOFT axis.
pub const HALF_SPEED: f32 = 2.0;

/// Pixels per tick on each axis when both axes are HARD.
pub const CORNER_SPEED: f32 = 3.0;

// =============================================================================
// DIRECTION FLAGS
// =============================================================================

/// 8-bit direction mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DirectionFlags(pub u8);

impl DirectionFlags {
    /// No movement input.
    pub const STOPPED: Self = Self(0);
    /// Half speed up.
    pub const SOFT_UP: Self = Self(1);
    /// Full speed up.
    pub const HARD_UP: Self = Self(2);
    /// Half speed left.
    pub const SOFT_LEFT: Self = Self(4);
    /// Full speed left.
    pub const HARD_LEFT: Self = Self(8);
    /// Half speed down.
    pub const SOFT_DOWN: Self = Self(16);
    /// Full speed down.
    pub const HARD_DOWN: Self = Self(32);
    /// Half speed right.
    pub const SOFT_RIGHT: Self = Self(64);
    /// Full speed right.
    pub const HARD_RIGHT: Self = Self(128);

    /// Vertical flags (up/down, soft/hard).
    pub const VERTICAL: Self = Self(1 | 2 | 16 | 32);

    /// Horizontal flags (left/right, soft/hard).
    pub const HORIZONTAL: Self = Self(4 | 8 | 64 | 128);

    const NAMES: [(Self, &'static str); 8] = [
        (Self::HARD_UP, "HARD_UP"),
        (Self::HARD_DOWN, "HARD_DOWN"),
        (Self::HARD_LEFT, "HARD_LEFT"),
        (Self::HARD_RIGHT, "HARD_RIGHT"),
        (Self::SOFT_UP, "SOFT_UP"),
        (Self::SOFT_DOWN, "SOFT_DOWN"),
        (Self::SOFT_LEFT, "SOFT_LEFT"),
        (Self::SOFT_RIGHT, "SOFT_RIGHT"),
    ];

    /// Raw mask byte.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from a raw mask byte.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Check if every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Check if any bit of `other` is set.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Check for the STOPPED mask.
    #[inline]
    pub const fn is_stopped(self) -> bool {
        self.0 == 0
    }

    /// Only the vertical component of the mask.
    #[inline]
    pub const fn vertical(self) -> Self {
        Self(self.0 & Self::VERTICAL.0)
    }

    /// Only the horizontal component of the mask.
    #[inline]
    pub const fn horizontal(self) -> Self {
        Self(self.0 & Self::HORIZONTAL.0)
    }
}

impl BitOr for DirectionFlags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirectionFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DirectionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_stopped() {
            return f.write_str("STOPPED");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DirectionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectionFlags({:#04x} {})", self.0, self)
    }
}

// =============================================================================
// FACING
// =============================================================================

/// Compass direction an entity visually faces.
///
/// The discriminants are the wire byte values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Facing {
    /// Facing up the screen
    North = 0,
    /// Facing down the screen (initial facing)
    #[default]
    South = 1,
    /// Reported for HARD_LEFT movement
    East = 2,
    /// Reported for HARD_RIGHT movement
    West = 3,
}

impl Facing {
    /// Wire byte for this facing.
    #[inline]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Facing from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Facing> {
        match byte {
            0 => Some(Facing::North),
            1 => Some(Facing::South),
            2 => Some(Facing::East),
            3 => Some(Facing::West),
            _ => None,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Classify a movement vector into direction flags.
///
/// +Y is down. A zero (or non-finite) vector yields STOPPED.
pub fn vector_to_flags(direction: Vec2) -> DirectionFlags {
    let dir = direction.normalize();
    if dir.is_zero() {
        return DirectionFlags::STOPPED;
    }

    let (down, up) = (DirectionFlags::HARD_DOWN, DirectionFlags::HARD_UP);
    let (soft_down, soft_up) = (DirectionFlags::SOFT_DOWN, DirectionFlags::SOFT_UP);
    let (right, left) = (DirectionFlags::HARD_RIGHT, DirectionFlags::HARD_LEFT);
    let (soft_right, soft_left) = (DirectionFlags::SOFT_RIGHT, DirectionFlags::SOFT_LEFT);

    let vertical = if dir.y > 0.0 {
        Some((down, soft_down))
    } else if dir.y < 0.0 {
        Some((up, soft_up))
    } else {
        None
    };
    let horizontal = if dir.x > 0.0 {
        Some((right, soft_right))
    } else if dir.x < 0.0 {
        Some((left, soft_left))
    } else {
        None
    };

    match (vertical, horizontal) {
        (Some((hard_v, soft_v)), Some((hard_h, soft_h))) => {
            let abs_y = dir.y.abs() as f64;
            let abs_x = dir.x.abs() as f64;
            let angle = (abs_y / abs_x).atan().to_degrees();

            if (DIAGONAL_LOWER_DEGREES..=DIAGONAL_UPPER_DEGREES).contains(&angle) {
                hard_v | hard_h
            } else if abs_y > abs_x {
                hard_v | soft_h
            } else {
                soft_v | hard_h
            }
        }
        (Some((hard_v, _)), None) => hard_v,
        (None, Some((hard_h, _))) => hard_h,
        (None, None) => DirectionFlags::STOPPED,
    }
}

/// Pick the facing for a direction mask.
///
/// Priority: HARD_LEFT → East, HARD_UP → North, HARD_RIGHT → West, else South.
/// The left/right compass mapping is intentionally inverted; sprite selection
/// downstream is written against it.
pub fn facing_from_flags(flags: DirectionFlags) -> Facing {
    if flags.intersects(DirectionFlags::HARD_LEFT) {
        Facing::East
    } else if flags.intersects(DirectionFlags::HARD_UP) {
        Facing::North
    } else if flags.intersects(DirectionFlags::HARD_RIGHT) {
        Facing::West
    } else {
        Facing::South
    }
}

/// Per-tick velocity for a direction mask.
///
/// HARD axes move [`MAX_SPEED`], SOFT axes [`HALF_SPEED`]; HARD on both axes
/// moves [`CORNER_SPEED`] on each.
pub fn moving_velocity(flags: DirectionFlags) -> Vec2 {
    if flags.is_stopped() {
        return Vec2::ZERO;
    }

    let mut x = 0.0;
    let mut y = 0.0;

    // Later checks win when a malformed mask sets several flags per axis
    if flags.intersects(DirectionFlags::HARD_DOWN) { y = MAX_SPEED; }
    if flags.intersects(DirectionFlags::SOFT_DOWN) { y = HALF_SPEED; }
    if flags.intersects(DirectionFlags::HARD_UP) { y = -MAX_SPEED; }
    if flags.intersects(DirectionFlags::SOFT_UP) { y = -HALF_SPEED; }
    if flags.intersects(DirectionFlags::HARD_RIGHT) { x = MAX_SPEED; }
    if flags.intersects(DirectionFlags::SOFT_RIGHT) { x = HALF_SPEED; }
    if flags.intersects(DirectionFlags::HARD_LEFT) { x = -MAX_SPEED; }
    if flags.intersects(DirectionFlags::SOFT_LEFT) { x = -HALF_SPEED; }

    if x.abs() == MAX_SPEED && y.abs() == MAX_SPEED {
        x = CORNER_SPEED.copysign(x);
        y = CORNER_SPEED.copysign(y);
    }

    Vec2::new(x, y)
}

// =============================================================================
// TESTS
// =============================================================================
