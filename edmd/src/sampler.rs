//! The random-number front the core consumes: a uniform sampler and a
//! standard-normal sampler over a seeded, serializable generator. The
//! generator state travels with snapshots so resumed runs replay
//! byte-identically.

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Injected randomness for thermostats, DSMC operators and Andersen
/// walls.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Sampler {
    rng: Pcg64,
}

impl Sampler {
    /// Builds a sampler from a seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Uniform sample on `[0, 1)`.
    pub fn uniform01(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Standard-normal sample.
    pub fn standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Uniform index in `0..n`.
    ///
    /// # Panics
    ///
    /// Panics when `n` is zero.
    pub fn index(&mut self, n: usize) -> usize {
        assert!(n > 0, "cannot draw from an empty range");
        self.rng.gen_range(0..n)
    }

    /// Bernoulli trial with probability `p`.
    pub fn below(&mut self, p: f64) -> bool {
        self.uniform01() < p
    }

    /// Exponentially distributed waiting time with the given mean.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        -mean * (1.0 - self.uniform01()).ln()
    }
}
