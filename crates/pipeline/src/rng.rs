//! Seedable random source for order derivation.
//!
//! Every random draw in a run comes from one generator seeded from a single
//! `u64`. The seed is either configured or drawn once from OS entropy and
//! logged, so any run can be replayed.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Deterministic generator for a single run.
#[derive(Debug, Clone)]
pub struct SeededRng {
    seed: u64,
    inner: Pcg64Mcg,
}

impl SeededRng {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Seed from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }

    /// Use `seed` when given, otherwise draw one from OS entropy.
    #[must_use]
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }

    /// The seed this generator started from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Roll a float in [0.0, 1.0).
    #[allow(clippy::cast_precision_loss)]
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1_u64 << 53) as f64)
    }
}
