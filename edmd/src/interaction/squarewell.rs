//! The square well: a hard core at the inner diameter surrounded by an
//! attractive well out to `lambda * diameter`.

use super::{pair_event, InteractionKind};
use crate::capture::SingleCaptureMap;
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::properties::PropertyId;
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Square-well spheres with a single-capture map.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SquareWell {
    name: String,
    range: PairRange,
    diameter: PropertyId,
    lambda: PropertyId,
    well_depth: PropertyId,
    elasticity: PropertyId,
    captures: SingleCaptureMap,
}

impl SquareWell {
    /// Builds the interaction; the capture map seeds from geometry at
    /// initialization unless a persisted one is supplied.
    #[must_use]
    pub fn new(name: String, range: PairRange, diameter: PropertyId, lambda: PropertyId,
        well_depth: PropertyId, elasticity: PropertyId, captures: Option<SingleCaptureMap>)
        -> Self {
        Self {
            name,
            range,
            diameter,
            lambda,
            well_depth,
            elasticity,
            captures: captures.unwrap_or_else(SingleCaptureMap::unseeded),
        }
    }

    fn geometry(&self, world: &World, i: usize, j: usize) -> (f64, f64) {
        let d = world.properties.pair_avg(self.diameter, i, j);
        let l = world.properties.pair_avg(self.lambda, i, j);
        (d * d, (d * l) * (d * l))
    }

    /// Whether the pair currently sits inside the well radius.
    fn capture_test(&self, world: &World, i: usize, j: usize) -> bool {
        let (_, ld2) = self.geometry(world, i, j);
        let pd = world.pair_data(i, j);
        pd.r2 <= ld2
    }

    /// The capture map, for tests and diagnostics.
    #[must_use]
    pub fn captures(&self) -> &SingleCaptureMap {
        &self.captures
    }
}

impl InteractionKind for SquareWell {
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

        if self.captures.is_captured(i, j) {
            let mut event = pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE);
            if let Some(dt) =
                l.sphere_sphere_in_root(&pd, d2, dynamic.0, dynamic.1, world.time)
            {
                event = pair_event(self_id, i, j, dt, EventKind::CORE);
            }
            if let Some(dt) =
                l.sphere_sphere_out_root(&pd, ld2, dynamic.0, dynamic.1, world.time)
            {
                if dt < event.dt {
                    event = pair_event(self_id, i, j, dt, EventKind::WELL_OUT);
                }
            }
            event
        } else if let Some(dt) =
            l.sphere_sphere_in_root(&pd, ld2, dynamic.0, dynamic.1, world.time)
        {
            pair_event(self_id, i, j, dt, EventKind::WELL_IN)
        } else {
            pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE)
        }
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let (i, j) = (event.particle, event.partner.unwrap());
        let (d2, ld2) = self.geometry(world, i, j);
        let e = world.properties.pair_avg(self.elasticity, i, j);
        let wd = world.properties.pair_avg(self.well_depth, i, j);

        let data = match event.kind {
            EventKind::CORE => world.resolve_core(i, j, e, d2, EventKind::CORE),
            EventKind::WELL_IN => {
                let data = world.resolve_well(i, j, wd, ld2);
                if data.kind != EventKind::BOUNCE {
                    self.captures.add(i, j);
                }
                data
            }
            EventKind::WELL_OUT => {
                let data = world.resolve_well(i, j, -wd, ld2);
                if data.kind != EventKind::BOUNCE {
                    self.captures.remove(i, j);
                }
                data
            }
            kind => {
                world.invariant_violation(format!(
                    "square well fired an unexpected {kind:?} event"
                ))?;
                return Ok(NEventData::default());
            }
        };
        Ok(NEventData::pair(data))
    }

    fn initialise(&mut self, world: &World, pairs: &[(usize, usize)]) -> Result<()> {
        let mut captures = std::mem::take(&mut self.captures);
        captures.seed(pairs, |i, j| self.capture_test(world, i, j));
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
        self.captures.is_captured(i, j) == self.capture_test(world, i, j)
    }
}
