//! The square bond: a hard inner core and an unbreakable outer wall.
//! Bonded ranges enumerate fixed pairs, so no capture map exists.

use super::{pair_event, InteractionKind};
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::properties::PropertyId;
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Square-bonded pairs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SquareBond {
    name: String,
    range: PairRange,
    diameter: PropertyId,
    lambda: PropertyId,
    elasticity: PropertyId,
}

impl SquareBond {
    /// Builds the bond over its fixed pair range.
    #[must_use]
    pub fn new(name: String, range: PairRange, diameter: PropertyId, lambda: PropertyId,
        elasticity: PropertyId) -> Self {
        Self {
            name,
            range,
            diameter,
            lambda,
            elasticity,
        }
    }

    fn geometry(&self, world: &World, i: usize, j: usize) -> (f64, f64) {
        let d = world.properties.pair_avg(self.diameter, i, j);
        let l = world.properties.pair_avg(self.lambda, i, j);
        (d * d, (d * l) * (d * l))
    }
}

impl InteractionKind for SquareBond {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn max_interaction_distance(&self, world: &World) -> f64 {
        world.properties.max_value(self.diameter) * world.properties.max_value(self.lambda)
    }

    fn get_event(&self, world: &World, self_id: usize, i: usize, j: usize) -> Event {
        let pd = world.pair_data(i, j);
        let (d2, ld2) = self.geometry(world, i, j);
        let dynamic = (world.particles[i].is_dynamic(), world.particles[j].is_dynamic());
        let l = &world.liouvillean;

        if let Some(dt) = l.sphere_sphere_in_root(&pd, d2, dynamic.0, dynamic.1, world.time)
        {
            pair_event(self_id, i, j, dt, EventKind::CORE)
        } else if let Some(dt) =
            l.sphere_sphere_out_root(&pd, ld2, dynamic.0, dynamic.1, world.time)
        {
            // The bond's outer wall is an infinite outward well step.
            pair_event(self_id, i, j, dt, EventKind::BOUNCE)
        } else {
            pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE)
        }
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let (i, j) = (event.particle, event.partner.unwrap());
        let (d2, _) = self.geometry(world, i, j);
        let e = world.properties.pair_avg(self.elasticity, i, j);

        if !matches!(event.kind, EventKind::CORE | EventKind::BOUNCE) {
            world.invariant_violation(format!(
                "square bond fired an unexpected {:?} event",
                event.kind
            ))?;
            return Ok(NEventData::default());
        }
        Ok(NEventData::pair(world.resolve_core(i, j, e, d2, event.kind)))
    }
}
