//! Maze Layout RNG
//!
//! Xorshift128+ seeded through SplitMix64. Every peer that builds a maze from
//! the same seed gets the same wall layout, on any platform.

/// Seeded Xorshift128+ generator.
///
/// # Example
///
/// ```
/// use maze_sync::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(50);
/// let mut b = DeterministicRng::new(50);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterministicRng {
    s0: u64,
    s1: u64,
}

impl DeterministicRng {
    /// Seed the generator.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let s0 = splitmix64(&mut s);
        let s1 = splitmix64(&mut s);
        // All-zero state would only ever produce zeros
        if s0 == 0 && s1 == 0 {
            return Self { s0: 1, s1: 1 };
        }
        Self { s0, s1 }
    }

    /// Next 64 random bits.
    pub fn next_u64(&mut self) -> u64 {
        let (s0, mut s1) = (self.s0, self.s1);
        let out = s0.wrapping_add(s1);
        s1 ^= s0;
        self.s0 = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.s1 = s1.rotate_left(37);
        out
    }

    /// Uniform-ish value in `[0, bound)`; 0 when `bound` is 0.
    pub fn below(&mut self, bound: u32) -> u32 {
        match bound {
            0 => 0,
            n => (self.next_u64() % u64::from(n)) as u32,
        }
    }

    /// Roll a 1-in-`n` chance. `n == 0` never hits.
    pub fn one_in(&mut self, n: u32) -> bool {
        n != 0 && self.below(n) == 0
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
