//! Capture maps: the persistent per-unordered-pair state that makes
//! discontinuous potentials history-dependent. Maintained incrementally
//! by the event rules; recomputed from geometry only at initialization.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Ordered key for an unordered pair.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct PairKey(pub usize, pub usize);

impl PairKey {
    /// Builds the canonical (ascending) key for `{i, j}`.
    ///
    /// # Panics
    ///
    /// Panics if a particle pairs with itself.
    #[must_use]
    pub fn new(i: usize, j: usize) -> Self {
        assert_ne!(i, j, "a particle cannot capture itself");
        if i < j { Self(i, j) } else { Self(j, i) }
    }
}

/// Membership-only capture state, for single-well potentials.
/// Persisted as a list of pairs, not a map.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SingleCaptureMap {
    #[serde(with = "pair_list")]
    map: FxHashSet<PairKey>,
    /// True until a persisted map is loaded; geometry seeding only runs
    /// in that state.
    #[serde(default)]
    pub needs_seed: bool,
}

impl SingleCaptureMap {
    /// An empty map that still wants geometry seeding.
    #[must_use]
    pub fn unseeded() -> Self {
        Self {
            map: FxHashSet::default(),
            needs_seed: true,
        }
    }

    /// Whether the pair is captured.
    #[must_use]
    pub fn is_captured(&self, i: usize, j: usize) -> bool {
        self.map.contains(&PairKey::new(i, j))
    }

    /// Inserts the pair. Inserting a captured pair is an event-rule bug.
    pub fn add(&mut self, i: usize, j: usize) {
        let fresh = self.map.insert(PairKey::new(i, j));
        debug_assert!(fresh, "pair ({i}, {j}) captured twice");
    }

    /// Removes the pair. Removing an uncaptured pair is an event-rule
    /// bug.
    pub fn remove(&mut self, i: usize, j: usize) {
        let existed = self.map.remove(&PairKey::new(i, j));
        debug_assert!(existed, "pair ({i}, {j}) released but never captured");
    }

    /// Seeds the map from geometry: `test(i, j)` decides membership for
    /// every admissible pair. The only O(N^2) pass in the engine.
    pub fn seed(&mut self, pairs: &[(usize, usize)], mut test: impl FnMut(usize, usize) -> bool) {
        if !self.needs_seed {
            return;
        }
        self.map.clear();
        for &(i, j) in pairs {
            if test(i, j) {
                self.map.insert(PairKey::new(i, j));
            }
        }
        self.needs_seed = false;
    }

    /// Number of captured pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the captured pairs.
    pub fn iter(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.map.iter().copied()
    }
}

/// Capture state with an integer well-step index, for stepped
/// potentials. The value counts the steps crossed inward; pairs at step
/// zero are not stored.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MultiCaptureMap {
    #[serde(with = "step_list")]
    map: FxHashMap<PairKey, u32>,
    /// True until a persisted map is loaded.
    #[serde(default)]
    pub needs_seed: bool,
}

impl MultiCaptureMap {
    /// An empty map that still wants geometry seeding.
    #[must_use]
    pub fn unseeded() -> Self {
        Self {
            map: FxHashMap::default(),
            needs_seed: true,
        }
    }

    /// The pair's current step index (zero when outside every step).
    #[must_use]
    pub fn step(&self, i: usize, j: usize) -> u32 {
        self.map.get(&PairKey::new(i, j)).copied().unwrap_or(0)
    }

    /// Whether the pair is inside any step.
    #[must_use]
    pub fn is_captured(&self, i: usize, j: usize) -> bool {
        self.map.contains_key(&PairKey::new(i, j))
    }

    /// Crossing one step inward.
    pub fn increment(&mut self, i: usize, j: usize) {
        *self.map.entry(PairKey::new(i, j)).or_insert(0) += 1;
    }

    /// Crossing one step outward; the entry disappears at step zero.
    pub fn decrement(&mut self, i: usize, j: usize) {
        let key = PairKey::new(i, j);
        match self.map.get_mut(&key) {
            Some(1) => {
                self.map.remove(&key);
            }
            Some(step) => *step -= 1,
            None => debug_assert!(false, "pair ({i}, {j}) stepped out from step 0"),
        }
    }

    /// Seeds the map from geometry: `step_of(i, j)` reports the step the
    /// pair's separation currently falls into.
    pub fn seed(&mut self, pairs: &[(usize, usize)], mut step_of: impl FnMut(usize, usize) -> u32) {
        if !self.needs_seed {
            return;
        }
        self.map.clear();
        for &(i, j) in pairs {
            let step = step_of(i, j);
            if step > 0 {
                self.map.insert(PairKey::new(i, j), step);
            }
        }
        self.needs_seed = false;
    }

    /// Number of captured pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nothing is captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over `(pair, step)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (PairKey, u32)> + '_ {
        self.map.iter().map(|(k, v)| (*k, *v))
    }
}

/// Serializes the capture set as a sorted list of id pairs, the
/// persisted form of the snapshot format.
mod pair_list {
    use super::PairKey;
    use rustc_hash::FxHashSet;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(map: &FxHashSet<PairKey>, ser: S)
        -> Result<S::Ok, S::Error> {
        let mut entries: Vec<(usize, usize)> = map.iter().map(|k| (k.0, k.1)).collect();
        entries.sort_unstable();
        entries.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D)
        -> Result<FxHashSet<PairKey>, D::Error> {
        let entries = Vec::<(usize, usize)>::deserialize(de)?;
        Ok(entries.into_iter().map(|(i, j)| PairKey::new(i, j)).collect())
    }
}

/// Serializes the stepped capture map as a sorted list of
/// `(id1, id2, step)` triples.
mod step_list {
    use super::PairKey;
    use rustc_hash::FxHashMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(map: &FxHashMap<PairKey, u32>, ser: S)
        -> Result<S::Ok, S::Error> {
        let mut entries: Vec<(usize, usize, u32)> =
            map.iter().map(|(k, v)| (k.0, k.1, *v)).collect();
        entries.sort_unstable();
        entries.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D)
        -> Result<FxHashMap<PairKey, u32>, D::Error> {
        let entries = Vec::<(usize, usize, u32)>::deserialize(de)?;
        Ok(entries
            .into_iter()
            .map(|(i, j, step)| (PairKey::new(i, j), step))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_sorted_pair_list() {
        let mut map = SingleCaptureMap::default();
        map.add(5, 2);
        map.add(0, 3);
        let json = serde_json::to_string(&map).unwrap();
        assert!(json.contains("[[0,3],[2,5]]"), "{json}");
        let back: SingleCaptureMap = serde_json::from_str(&json).unwrap();
        assert!(back.is_captured(2, 5));
        assert!(back.is_captured(3, 0));
    }

    #[test]
    fn unordered_keying() {
        let mut map = SingleCaptureMap::default();
        map.add(5, 2);
        assert!(map.is_captured(2, 5));
        assert!(map.is_captured(5, 2));
        map.remove(2, 5);
        assert!(map.is_empty());
    }

    #[test]
    fn seeding_runs_once() {
        let mut map = SingleCaptureMap::unseeded();
        let pairs = vec![(0, 1), (1, 2), (0, 2)];
        map.seed(&pairs, |i, j| i + j < 3);
        assert_eq!(map.len(), 2);

        // A second seed attempt (e.g. after deserializing) is a no-op.
        map.seed(&pairs, |_, _| true);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn multi_capture_steps() {
        let mut map = MultiCaptureMap::default();
        map.increment(0, 1);
        map.increment(1, 0);
        assert_eq!(map.step(0, 1), 2);
        map.decrement(0, 1);
        assert_eq!(map.step(0, 1), 1);
        map.decrement(0, 1);
        assert!(!map.is_captured(0, 1));
        assert!(map.is_empty());
    }
}
