//! Pair event sources. Every interaction filters admissible pairs
//! through a [`PairRange`] and answers "when, and of what kind, is this
//! pair's next event".

mod cubes;
mod dumbbells;
mod hardsphere;
mod lines;
mod roughsphere;
mod softcore;
mod squarebond;
mod squarewell;
mod stepped;

pub use cubes::ParallelCubes;
pub use dumbbells::Dumbbells;
pub use hardsphere::HardSphere;
pub use lines::Lines;
pub use roughsphere::RoughHardSphere;
pub use softcore::SoftCore;
pub use squarebond::SquareBond;
pub use squarewell::SquareWell;
pub use stepped::{Step, Stepped};

use crate::error::Result;
use crate::event::{Event, EventKind, EventSource, NEventData};
use crate::ranges::PairRange;
use crate::simulation::World;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// Contract every pair event source implements.
#[enum_dispatch]
pub trait InteractionKind {
    /// Lookup name from the configuration.
    fn name(&self) -> &str;

    /// Pairs this interaction governs.
    fn range(&self) -> &PairRange;

    /// Largest separation at which this interaction can produce an
    /// event; drives the cell width.
    fn max_interaction_distance(&self, world: &World) -> f64;

    /// The pair's next candidate event. Participants need not be
    /// streamed; prediction works in the common-time frame.
    fn get_event(&self, world: &World, self_id: usize, i: usize, j: usize) -> Event;

    /// Resolves a fired event. Participants are already streamed to the
    /// event time.
    ///
    /// # Errors
    ///
    /// Invariant violations surface here.
    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData>;

    /// Seeds the capture map from geometry over the governed `pairs`.
    /// The only O(N^2) pass, run once at initialization.
    ///
    /// # Errors
    ///
    /// Configuration problems (bad step tables, missing orientation
    /// data) surface here.
    fn initialise(&mut self, world: &World, pairs: &[(usize, usize)]) -> Result<()> {
        let _ = (world, pairs);
        Ok(())
    }

    /// Internal energy held in this interaction's capture state.
    fn internal_energy(&self, world: &World) -> f64 {
        let _ = world;
        0.0
    }

    /// Whether the capture state of `(i, j)` matches the region their
    /// instantaneous separation falls into. Diagnostics and tests.
    fn capture_consistent(&self, world: &World, i: usize, j: usize) -> bool {
        let _ = (world, i, j);
        true
    }
}

/// The closed set of interactions.
#[allow(missing_docs)]
#[enum_dispatch(InteractionKind)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Interaction {
    HardSphere,
    SquareWell,
    SquareBond,
    Stepped,
    SoftCore,
    RoughHardSphere,
    Lines,
    Dumbbells,
    ParallelCubes,
}

/// Builds a pair event for interaction `self_id`.
pub(crate) fn pair_event(self_id: usize, i: usize, j: usize, dt: f64, kind: EventKind)
    -> Event {
    Event {
        particle: i,
        partner: Some(j),
        dt,
        kind,
        source: EventSource::Interaction(self_id),
        counter: 0,
        partner_counter: 0,
    }
}

/// Id of the interaction governing the unordered pair `{i, j}`: the
/// first one whose range admits it.
#[must_use]
pub fn governing(interactions: &[Interaction], i: usize, j: usize) -> Option<usize> {
    interactions
        .iter()
        .position(|interaction| interaction.range().contains(i, j))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Unit;

    #[test]
    fn first_matching_range_governs() {
        let world = crate::config::test_fixtures::two_particle_world(3.0, 1.0);
        let bond = SquareBond::new(
            "bond".into(),
            PairRange::Single(0, 1),
            world.properties.lookup("Diameter", Unit::Length).unwrap(),
            world.properties.lookup("Lambda", Unit::Dimensionless).unwrap(),
            world.properties.lookup("Elasticity", Unit::Dimensionless).unwrap(),
        );
        let spheres = HardSphere::new(
            "bulk".into(),
            PairRange::All,
            world.properties.lookup("Diameter", Unit::Length).unwrap(),
            world.properties.lookup("Elasticity", Unit::Dimensionless).unwrap(),
        );
        let interactions = vec![Interaction::from(bond), Interaction::from(spheres)];

        assert_eq!(governing(&interactions, 1, 0), Some(0));
        assert_eq!(governing(&interactions, 0, 2), Some(1));
    }
}
