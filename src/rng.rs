//! Per-thread RNG (spec.md §4.3).
//!
//! Never shared between threads: each worker thread owns one `Rng`, seeded
//! once from the realtime clock, the process id, and the thread's own
//! identity, then stepped with a splitmix64-style generator. Draws are
//! turned into `f64` in `[0, 1)` from the top 53 bits, which is exactly
//! enough precision to round-trip through an `f64` mantissa.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// A thread-local, non-cryptographic RNG. `Send` but deliberately not
/// `Sync`-shared in practice — construct one per worker thread.
pub struct Rng {
    state: u64,
}

fn splitmix64_mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn thread_id_u64() -> u64 {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

impl Rng {
    /// Seed directly from a 64-bit value. `0` is remapped away from the
    /// generator's zero fixed point.
    pub fn from_seed(seed: u64) -> Self {
        let state = if seed == 0 { GOLDEN_GAMMA } else { seed };
        Self { state }
    }

    /// Seed by mixing the realtime clock, the process id, and this
    /// thread's identifier, per spec.md §4.3.
    pub fn from_entropy() -> Self {
        let clock = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let pid = std::process::id() as u64;
        let tid = thread_id_u64();
        let mixed = splitmix64_mix(clock)
            ^ splitmix64_mix(pid.wrapping_mul(GOLDEN_GAMMA))
            ^ splitmix64_mix(tid.wrapping_mul(GOLDEN_GAMMA.wrapping_mul(3)));
        Self::from_seed(mixed)
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        splitmix64_mix(self.state)
    }

    /// A uniform draw in `[0, 1)` built from the top 53 bits of a 64-bit
    /// draw — the mantissa width of an `f64`.
    pub fn next_f64(&mut self) -> f64 {
        let top53 = self.next_u64() >> 11;
        (top53 as f64) * (1.0 / (1u64 << 53) as f64)
    }
}
