//! Parallel hard cubes: contact when the max-norm separation reaches
//! the edge length, impulse along the touching face normal.

use super::{pair_event, InteractionKind};
use crate::dynamics::Liouvillean;
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::properties::PropertyId;
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Axis-aligned parallel cubes.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParallelCubes {
    name: String,
    range: PairRange,
    /// Edge length property.
    diameter: PropertyId,
    elasticity: PropertyId,
}

impl ParallelCubes {
    /// Builds the interaction.
    #[must_use]
    pub fn new(name: String, range: PairRange, diameter: PropertyId,
        elasticity: PropertyId) -> Self {
        Self {
            name,
            range,
            diameter,
            elasticity,
        }
    }
}

impl InteractionKind for ParallelCubes {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn max_interaction_distance(&self, world: &World) -> f64 {
        // The cube diagonal is the worst case for the cell width.
        world.properties.max_value(self.diameter) * 3.0_f64.sqrt()
    }

    fn get_event(&self, world: &World, self_id: usize, i: usize, j: usize) -> Event {
        let pd = world.pair_data(i, j);
        let d = world.properties.pair_avg(self.diameter, i, j);

        match Liouvillean::cube_cube_in_root(&pd, d) {
            Some(dt) => pair_event(self_id, i, j, dt, EventKind::CORE),
            None => pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE),
        }
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let (i, j) = (event.particle, event.partner.unwrap());
        let pd = world.pair_data(i, j);
        let e = world.properties.pair_avg(self.elasticity, i, j);
        let (m1, m2) = (world.mass_of(i), world.mass_of(j));

        let (_, p1, p2) = world.liouvillean_and_pair(i, j);
        let data = Liouvillean::parallel_cube_coll(p1, p2, m1, m2, e, &pd, EventKind::CORE);
        Ok(NEventData::pair(data))
    }
}
