//! Half-Precision Floats
//!
//! IEEE 754 binary16 conversion for the packed position on the wire.
//!
//! ## Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: binary16                                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][EEEEE][MMMMMMMMMM]                                     │
//! │   │  5 bit    10 bit                                        │
//! │   └─ Sign    exponent (bias 15), mantissa                   │
//! │                                                             │
//! │  Integers are exact up to 2048, spacing 2 up to 4096,       │
//! │  largest finite value 65504.                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A packed vector holds `x` in bits 0..16 and `y` in bits 16..32.

use super::vec2::Vec2;

/// Positive infinity in binary16.
pub const HALF_INFINITY: u16 = 0x7c00;

/// Canonical quiet NaN in binary16.
pub const HALF_NAN: u16 = 0x7e00;

/// Largest finite binary16 value.
pub const HALF_MAX: f32 = 65504.0;

/// Convert an `f32` to binary16 bits, rounding to nearest, ties to even.
pub fn f32_to_half(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mant = bits & 0x007f_ffff;

    if exp == 0xff {
        return if mant == 0 { sign | HALF_INFINITY } else { sign | HALF_NAN };
    }

    let half_exp = exp - 127 + 15;

    if half_exp >= 0x1f {
        // Overflow
        return sign | HALF_INFINITY;
    }

    if half_exp <= 0 {
        // Subnormal (or underflow to signed zero)
        if half_exp < -10 {
            return sign;
        }
        let full = mant | 0x0080_0000;
        let shift = (14 - half_exp) as u32;
        let half_mant = full >> shift;
        let round_bit = 1u32 << (shift - 1);
        let rem = full & ((1u32 << shift) - 1);
        let mut h = half_mant;
        if rem > round_bit || (rem == round_bit && (half_mant & 1) == 1) {
            h += 1;
        }
        return sign | h as u16;
    }

    let mut h = ((half_exp as u32) << 10) | (mant >> 13);
    let rem = mant & 0x1fff;
    // A carry out of the mantissa bumps the exponent, up to infinity
    if rem > 0x1000 || (rem == 0x1000 && (h & 1) == 1) {
        h += 1;
    }
    sign | h as u16
}

/// Convert binary16 bits to `f32` (exact).
pub fn half_to_f32(half: u16) -> f32 {
    let sign = ((half & 0x8000) as u32) << 16;
    let exp = ((half >> 10) & 0x1f) as u32;
    let mant = (half & 0x03ff) as u32;

    match exp {
        0 => {
            if mant == 0 {
                f32::from_bits(sign)
            } else {
                let magnitude = mant as f32 / 16_777_216.0; // mant * 2^-24
                if sign != 0 { -magnitude } else { magnitude }
            }
        }
        0x1f => f32::from_bits(sign | 0x7f80_0000 | (mant << 13)),
        _ => f32::from_bits(sign | ((exp + 112) << 23) | (mant << 13)),
    }
}

/// Pack a vector into two binary16 values: `x` low, `y` high.
#[inline]
pub fn pack_half2(v: Vec2) -> u32 {
    (f32_to_half(v.x) as u32) | ((f32_to_half(v.y) as u32) << 16)
}

/// Unpack a vector packed with [`pack_half2`].
#[inline]
pub fn unpack_half2(packed: u32) -> Vec2 {
    Vec2::new(
        half_to_f32((packed & 0xffff) as u16),
        half_to_f32((packed >> 16) as u16),
    )
}
