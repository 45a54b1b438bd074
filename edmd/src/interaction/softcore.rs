//! The soft core: a single penetrable step at the diameter. One shell
//! of a stepped potential, kept as its own interaction because the
//! capture map is membership-only.

use super::{pair_event, InteractionKind};
use crate::capture::SingleCaptureMap;
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::properties::PropertyId;
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Penetrable spheres.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SoftCore {
    name: String,
    range: PairRange,
    diameter: PropertyId,
    well_depth: PropertyId,
    captures: SingleCaptureMap,
}

impl SoftCore {
    /// Builds the interaction.
    #[must_use]
    pub fn new(name: String, range: PairRange, diameter: PropertyId,
        well_depth: PropertyId, captures: Option<SingleCaptureMap>) -> Self {
        Self {
            name,
            range,
            diameter,
            well_depth,
            captures: captures.unwrap_or_else(SingleCaptureMap::unseeded),
        }
    }

    fn d2(&self, world: &World, i: usize, j: usize) -> f64 {
        let d = world.properties.pair_avg(self.diameter, i, j);
        d * d
    }

    /// The capture map, for tests and diagnostics.
    #[must_use]
    pub fn captures(&self) -> &SingleCaptureMap {
        &self.captures
    }
}

impl InteractionKind for SoftCore {
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
        let d2 = self.d2(world, i, j);
        let dynamic = (world.particles[i].is_dynamic(), world.particles[j].is_dynamic());
        let l = &world.liouvillean;

        if self.captures.is_captured(i, j) {
            match l.sphere_sphere_out_root(&pd, d2, dynamic.0, dynamic.1, world.time) {
                Some(dt) => pair_event(self_id, i, j, dt, EventKind::WELL_OUT),
                None => pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE),
            }
        } else {
            match l.sphere_sphere_in_root(&pd, d2, dynamic.0, dynamic.1, world.time) {
                Some(dt) => pair_event(self_id, i, j, dt, EventKind::WELL_IN),
                None => pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE),
            }
        }
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let (i, j) = (event.particle, event.partner.unwrap());
        let d2 = self.d2(world, i, j);
        let wd = world.properties.pair_avg(self.well_depth, i, j);

        let data = match event.kind {
            EventKind::WELL_IN => {
                let data = world.resolve_well(i, j, wd, d2);
                if data.kind != EventKind::BOUNCE {
                    self.captures.add(i, j);
                }
                data
            }
            EventKind::WELL_OUT => {
                let data = world.resolve_well(i, j, -wd, d2);
                if data.kind != EventKind::BOUNCE {
                    self.captures.remove(i, j);
                }
                data
            }
            kind => {
                world.invariant_violation(format!(
                    "soft core fired an unexpected {kind:?} event"
                ))?;
                return Ok(NEventData::default());
            }
        };
        Ok(NEventData::pair(data))
    }

    fn initialise(&mut self, world: &World, pairs: &[(usize, usize)]) -> Result<()> {
        let mut captures = std::mem::take(&mut self.captures);
        captures.seed(pairs, |i, j| world.pair_data(i, j).r2 <= self.d2(world, i, j));
        self.captures = captures;
        Ok(())
    }

    fn internal_energy(&self, world: &World) -> f64 {
        -self
            .captures
            .iter()
            .map(|key| world.properties.pair_avg(self.well_depth, key.0, key.1))
            .sum::<f64>()
    }

    fn capture_consistent(&self, world: &World, i: usize, j: usize) -> bool {
        let inside = world.pair_data(i, j).r2 <= self.d2(world, i, j);
        self.captures.is_captured(i, j) == inside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;
    use crate::properties::Unit;
    use float_cmp::assert_approx_eq;

    fn interaction(world: &World) -> SoftCore {
        SoftCore::new(
            "core".into(),
            PairRange::All,
            world.properties.lookup("Diameter", Unit::Length).unwrap(),
            world.properties.lookup("WellDepth", Unit::Energy).unwrap(),
            None,
        )
    }

    #[test]
    fn fast_pair_penetrates_the_core() {
        let mut world = two_particle_world(2.0, 2.0);
        let mut sc = interaction(&world);
        sc.initialise(&world, &[(0, 1)]).unwrap();

        let event = sc.get_event(&world, 0, 0, 1);
        assert_eq!(event.kind, EventKind::WELL_IN);

        world.time += event.dt;
        world.update_pair(0, 1);
        let data = sc.run_event(&mut world, &event).unwrap();
        // WellDepth +1: entering the core releases energy here, so the
        // pair passes through and is captured.
        assert_ne!(data.pairs[0].kind, EventKind::BOUNCE);
        assert!(sc.captures().is_captured(0, 1));
        assert!(sc.capture_consistent(&world, 0, 1));
    }
}
