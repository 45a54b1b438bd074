//! Pure hard-core spheres.

use super::{pair_event, InteractionKind};
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::properties::PropertyId;
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Hard spheres: one `CORE` event at the contact diameter.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HardSphere {
    name: String,
    range: PairRange,
    diameter: PropertyId,
    elasticity: PropertyId,
}

impl HardSphere {
    /// Builds the interaction from resolved property handles.
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

impl InteractionKind for HardSphere {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn max_interaction_distance(&self, world: &World) -> f64 {
        world.properties.max_value(self.diameter)
    }

    fn get_event(&self, world: &World, self_id: usize, i: usize, j: usize) -> Event {
        let pd = world.pair_data(i, j);
        let d = world.properties.pair_avg(self.diameter, i, j);
        let dynamic = (world.particles[i].is_dynamic(), world.particles[j].is_dynamic());

        match world.liouvillean.sphere_sphere_in_root(&pd, d * d, dynamic.0, dynamic.1,
            world.time)
        {
            Some(dt) => pair_event(self_id, i, j, dt, EventKind::CORE),
            None => pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE),
        }
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let (i, j) = (event.particle, event.partner.unwrap());
        let d = world.properties.pair_avg(self.diameter, i, j);
        let e = world.properties.pair_avg(self.elasticity, i, j);
        Ok(NEventData::pair(world.resolve_core(i, j, e, d * d, EventKind::CORE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;
    use crate::properties::Unit;
    use float_cmp::assert_approx_eq;

    fn interaction(world: &World) -> HardSphere {
        HardSphere::new(
            "bulk".into(),
            PairRange::All,
            world.properties.lookup("Diameter", Unit::Length).unwrap(),
            world.properties.lookup("Elasticity", Unit::Dimensionless).unwrap(),
        )
    }

    #[test]
    fn head_on_core_event() {
        let world = two_particle_world(3.0, 1.0);
        let hs = interaction(&world);
        let event = hs.get_event(&world, 0, 0, 1);
        assert_eq!(event.kind, EventKind::CORE);
        // Gap of 2 closing at 2.
        assert_approx_eq!(f64, event.dt, 1.0);
    }

    #[test]
    fn core_event_exchanges_and_conserves() {
        let mut world = two_particle_world(1.0, 1.0);
        let mut hs = interaction(&world);
        let event = hs.get_event(&world, 0, 0, 1);
        assert_approx_eq!(f64, event.dt, 0.0);

        let data = hs.run_event(&mut world, &event).unwrap();
        assert_approx_eq!(f64, world.particles[0].velocity.x, -1.0);
        assert_approx_eq!(f64, data.total_delta_ke(), 0.0);
    }
}
