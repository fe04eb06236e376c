// Random number streams for collision sampling.
//
// Every stochastic decision in the crate draws from a `RandomStream`. The
// production stream is a 64-bit LCG with a full 2^64 period; the fake stream
// replays a scripted sequence so tests can drive exact sampling paths.

use rand::{RngCore, SeedableRng};

use crate::error::{CollisionError, Result};

/// LCG multiplier (SPRNG lcg64)
const LCG_MULT: u64 = 2862933555777941757;
/// LCG additive constant. Odd, so together with `LCG_MULT % 4 == 1` the
/// generator reaches its full period of 2^64.
const LCG_ADD: u64 = 3037000493;
/// 2^-53, maps the top 53 bits of the state onto [0, 1)
const INV_2_POW_53: f64 = 1.1102230246251565e-16;

/// Number of draws before an `LcgStream` repeats (2^64).
pub const LCG_PERIOD: u128 = 1 << 64;

/// Source of uniform deviates in [0, 1).
pub trait RandomStream {
    /// Return the next deviate and advance the stream.
    fn next(&mut self) -> f64;
}

/// Production stream: x_{n+1} = (a * x_n + c) mod 2^64.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LcgStream {
    seed: u64,
}

impl LcgStream {
    /// Create a new stream with the given seed
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Stream for one particle history: the base stream advanced by
    /// `history * stride` draws. Histories that consume fewer than `stride`
    /// numbers never overlap.
    pub fn for_history(seed: u64, history: u64, stride: u64) -> Self {
        let mut stream = Self::new(seed);
        stream.skip_ahead(history.wrapping_mul(stride));
        stream
    }

    /// Reseed the stream (for reuse across histories)
    #[inline]
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Current internal state.
    pub fn state(&self) -> u64 {
        self.seed
    }

    /// Advance the stream by `n` draws in O(log n) steps.
    ///
    /// Uses F. Brown, "Random Number Generation with Arbitrary Stride" (1994):
    /// the composed map after `n` steps is again affine, so its coefficients
    /// are built by repeated squaring.
    pub fn skip_ahead(&mut self, mut n: u64) {
        let mut g = LCG_MULT;
        let mut c = LCG_ADD;
        let mut g_new: u64 = 1;
        let mut c_new: u64 = 0;

        while n > 0 {
            if n & 1 == 1 {
                g_new = g_new.wrapping_mul(g);
                c_new = c_new.wrapping_mul(g).wrapping_add(c);
            }
            c = g.wrapping_add(1).wrapping_mul(c);
            g = g.wrapping_mul(g);
            n >>= 1;
        }

        self.seed = g_new.wrapping_mul(self.seed).wrapping_add(c_new);
    }

    #[inline(always)]
    fn advance(&mut self) -> u64 {
        self.seed = LCG_MULT.wrapping_mul(self.seed).wrapping_add(LCG_ADD);
        self.seed
    }
}

impl RandomStream for LcgStream {
    #[inline(always)]
    fn next(&mut self) -> f64 {
        (self.advance() >> 11) as f64 * INV_2_POW_53
    }
}

impl SeedableRng for LcgStream {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            seed: u64::from_le_bytes(seed),
        }
    }
}

impl RngCore for LcgStream {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        self.advance()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut left = dest;
        while left.len() >= 8 {
            let bytes = self.next_u64().to_le_bytes();
            left[..8].copy_from_slice(&bytes);
            left = &mut left[8..];
        }
        if !left.is_empty() {
            let bytes = self.next_u64().to_le_bytes();
            left.copy_from_slice(&bytes[..left.len()]);
        }
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Scripted stream that replays a fixed sequence cyclically.
#[derive(Clone, Debug)]
pub struct FakeStream {
    values: Vec<f64>,
    position: usize,
}

impl FakeStream {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(CollisionError::Domain(
                "fake stream needs at least one value".to_string(),
            ));
        }
        if let Some(bad) = values.iter().find(|v| !(0.0..1.0).contains(*v)) {
            return Err(CollisionError::Domain(format!(
                "fake stream value {} outside [0, 1)",
                bad
            )));
        }
        Ok(Self {
            values,
            position: 0,
        })
    }

    /// Number of values in one cycle.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl RandomStream for FakeStream {
    fn next(&mut self) -> f64 {
        let value = self.values[self.position];
        self.position = (self.position + 1) % self.values.len();
        value
    }
}
