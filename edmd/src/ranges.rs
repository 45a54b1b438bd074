//! Membership filters: which particles an event source owns, and which
//! unordered pairs an interaction governs.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A set of particle ids.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum ParticleRange {
    /// Every particle.
    All,
    /// The half-open id span `[start, end)`.
    Span {
        /// First id in the range.
        start: usize,
        /// One past the last id.
        end: usize,
    },
    /// An explicit id list.
    List(Vec<usize>),
}

impl ParticleRange {
    /// Whether `id` belongs to the range.
    #[must_use]
    pub fn contains(&self, id: usize, n_particles: usize) -> bool {
        match self {
            Self::All => id < n_particles,
            Self::Span { start, end } => (*start..*end).contains(&id),
            Self::List(ids) => ids.contains(&id),
        }
    }

    /// The member ids, materialized.
    #[must_use]
    pub fn ids(&self, n_particles: usize) -> Vec<usize> {
        match self {
            Self::All => (0..n_particles).collect(),
            Self::Span { start, end } => (*start..*end).collect(),
            Self::List(ids) => ids.clone(),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self, n_particles: usize) -> usize {
        match self {
            Self::All => n_particles,
            Self::Span { start, end } => end.saturating_sub(*start),
            Self::List(ids) => ids.len(),
        }
    }

    /// True when the range is empty.
    #[must_use]
    pub fn is_empty(&self, n_particles: usize) -> bool {
        self.len(n_particles) == 0
    }
}

/// A set of unordered particle pairs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum PairRange {
    /// All pairs.
    All,
    /// Exactly one pair.
    Single(usize, usize),
    /// Pairs within one id span (intra-molecular).
    Within {
        /// First id of the span.
        start: usize,
        /// One past the last id.
        end: usize,
    },
    /// Adjacent pairs along chains: ids `start..end` partitioned into
    /// chains of the given length; `(i, i+1)` within a chain are bonded.
    ChainBonds {
        /// First id of the chain block.
        start: usize,
        /// One past the last id.
        end: usize,
        /// Particles per chain.
        chain_length: usize,
    },
    /// An explicit pair list.
    List(Vec<(usize, usize)>),
}

impl PairRange {
    /// Whether the unordered pair `{i, j}` belongs to the range.
    #[must_use]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        match self {
            Self::All => true,
            Self::Single(a, b) => {
                let (a, b) = if a < b { (*a, *b) } else { (*b, *a) };
                (lo, hi) == (a, b)
            }
            Self::Within { start, end } => lo >= *start && hi < *end,
            Self::ChainBonds { start, end, chain_length } => {
                hi == lo + 1
                    && lo >= *start
                    && hi < *end
                    && (lo - start) % chain_length != chain_length - 1
            }
            Self::List(pairs) => pairs
                .iter()
                .any(|&(a, b)| (a.min(b), a.max(b)) == (lo, hi)),
        }
    }

    /// Materializes every pair in the range. Only bond-style ranges can
    /// enumerate without a particle count; `All`/`Within` take it.
    #[must_use]
    pub fn pairs(&self, n_particles: usize) -> Vec<(usize, usize)> {
        match self {
            Self::All => (0..n_particles).tuple_combinations().collect(),
            Self::Single(a, b) => vec![(*a.min(b), *a.max(b))],
            Self::Within { start, end } => (*start..*end).tuple_combinations().collect(),
            Self::ChainBonds { start, end, chain_length } => (*start..end.saturating_sub(1))
                .filter(|i| (i - start) % chain_length != chain_length - 1)
                .map(|i| (i, i + 1))
                .collect(),
            Self::List(pairs) => pairs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_bonds_skip_chain_boundaries() {
        // Two chains of 3: (0,1), (1,2), (3,4), (4,5) but not (2,3).
        let range = PairRange::ChainBonds { start: 0, end: 6, chain_length: 3 };
        assert!(range.contains(0, 1));
        assert!(range.contains(2, 1));
        assert!(!range.contains(2, 3));
        assert!(range.contains(3, 4));
        assert!(!range.contains(0, 2));
        assert_eq!(range.pairs(6), vec![(0, 1), (1, 2), (3, 4), (4, 5)]);
    }

    #[test]
    fn within_span() {
        let range = PairRange::Within { start: 2, end: 5 };
        assert!(range.contains(2, 4));
        assert!(!range.contains(1, 3));
        assert_eq!(range.pairs(10).len(), 3);
    }

    #[test]
    fn particle_span() {
        let range = ParticleRange::Span { start: 3, end: 6 };
        assert!(range.contains(3, 10));
        assert!(!range.contains(6, 10));
        assert_eq!(range.ids(10), vec![3, 4, 5]);
    }
}
