//! Rough hard spheres: hard cores whose contacts also exchange
//! tangential momentum with the surface spin.

use super::{pair_event, InteractionKind};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, NEventData};
use crate::properties::PropertyId;
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Rough spheres. Requires orientation data.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoughHardSphere {
    name: String,
    range: PairRange,
    diameter: PropertyId,
    elasticity: PropertyId,
    tangential_elasticity: PropertyId,
}

impl RoughHardSphere {
    /// Builds the interaction.
    #[must_use]
    pub fn new(name: String, range: PairRange, diameter: PropertyId,
        elasticity: PropertyId, tangential_elasticity: PropertyId) -> Self {
        Self {
            name,
            range,
            diameter,
            elasticity,
            tangential_elasticity,
        }
    }
}

impl InteractionKind for RoughHardSphere {
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
        use crate::dynamics::Liouvillean;

        let (i, j) = (event.particle, event.partner.unwrap());
        let pd = world.pair_data(i, j);
        let d = world.properties.pair_avg(self.diameter, i, j);
        let e = world.properties.pair_avg(self.elasticity, i, j);
        let et = world.properties.pair_avg(self.tangential_elasticity, i, j);
        let (m1, m2) = (world.mass_of(i), world.mass_of(j));
        let inertia = world.inertia_of(i);

        let orientations = world.orientations.as_mut().ok_or_else(|| {
            Error::Configuration("rough spheres need orientation data".into())
        })?;
        let (lo, hi) = (i.min(j), i.max(j));
        let (head, tail) = orientations.split_at_mut(hi);
        let (o_lo, o_hi) = (&mut head[lo], &mut tail[0]);
        let (o1, o2) = if i < j { (o_lo, o_hi) } else { (o_hi, o_lo) };

        let (head, tail) = world.particles.split_at_mut(hi);
        let (p_lo, p_hi) = (&mut head[lo], &mut tail[0]);
        let (p1, p2) = if i < j { (p_lo, p_hi) } else { (p_hi, p_lo) };

        let data =
            Liouvillean::rough_spheres_coll(p1, p2, o1, o2, m1, m2, inertia, e, et, d * d,
                &pd);
        world.last_collision = Some((i, j, world.time));
        Ok(NEventData::pair(data))
    }

    fn initialise(&mut self, world: &World, _pairs: &[(usize, usize)]) -> Result<()> {
        if world.orientations.is_none() {
            return Err(Error::Configuration(format!(
                "rough hard spheres {:?} need orientation data",
                self.name
            )));
        }
        Ok(())
    }
}
