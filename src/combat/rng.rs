//! Fast PRNG for combat simulation. Uses SplitMix64 for throughput and good statistical quality.
//! Deterministic: same seed produces the same sequence. Not cryptographically secure.
//!
//! Every stochastic roll (hit, crit, damage variance, skill trigger, random targeting) draws from
//! an explicit [Rng] handle owned by the caller, so each battle run owns its own stream.

const SPLITMIX64_GOLDEN: u64 = 0x9e3779b97f4a7c15;
const SPLITMIX64_M1: u64 = 0xbf58476d1ce4e5b9;
const SPLITMIX64_M2: u64 = 0x94d049bb133111eb;

/// 2^-53, maps the top 53 bits of a draw onto [0, 1).
const UNIT_F64_SCALE: f64 = 1.0 / (1u64 << 53) as f64;

#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seeds from OS entropy. Falls back to a time-derived seed when the OS source is unavailable.
    pub fn from_entropy() -> Self {
        Self::new(entropy_seed())
    }

    /// Independent stream for run `index` of a batch seeded with `base_seed`.
    pub fn for_run(base_seed: u64, index: u64) -> Self {
        Self::new(derive_seed(base_seed, index))
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(SPLITMIX64_GOLDEN);
        mix(self.state)
    }

    /// Uniform draw in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * UNIT_F64_SCALE
    }

    /// Uniform draw in [low, high).
    #[inline]
    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Uniform index in [0, len). Returns 0 when `len` is 0.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_f64() * len as f64) as usize).min(len - 1)
    }
}

#[inline]
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(SPLITMIX64_M1);
    z = (z ^ (z >> 27)).wrapping_mul(SPLITMIX64_M2);
    z ^ (z >> 31)
}

/// Scrambles `(base_seed, index)` so neighbouring run indices get unrelated streams.
pub fn derive_seed(base_seed: u64, index: u64) -> u64 {
    mix(base_seed ^ mix(index.wrapping_add(SPLITMIX64_GOLDEN)))
}

pub fn entropy_seed() -> u64 {
    let mut buf = [0u8; 8];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(err) => {
            tracing::warn!(%err, "os entropy unavailable, seeding from clock");
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            mix(nanos)
        }
    }
}
