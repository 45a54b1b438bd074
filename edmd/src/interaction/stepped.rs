//! Stepped radial potentials: a ladder of shells, each crossing a
//! `WELL_IN`/`WELL_OUT` event with the step-height difference as the
//! energy change. The multi-capture map tracks how many shells inward
//! each pair currently sits.

use super::{pair_event, InteractionKind};
use crate::capture::MultiCaptureMap;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, NEventData};
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// One shell of the potential: within `radius` the pair holds `energy`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Step {
    /// Shell radius.
    pub radius: f64,
    /// Potential energy inside this shell (and outside the next one).
    pub energy: f64,
}

/// A stepped potential with a multi-capture map.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Stepped {
    name: String,
    range: PairRange,
    /// Shells sorted by descending radius; index 0 is the outermost.
    steps: Vec<Step>,
    captures: MultiCaptureMap,
}

impl Stepped {
    /// Builds the potential. Steps are sorted outermost-first here.
    #[must_use]
    pub fn new(name: String, range: PairRange, mut steps: Vec<Step>,
        captures: Option<MultiCaptureMap>) -> Self {
        steps.sort_by(|a, b| b.radius.total_cmp(&a.radius));
        Self {
            name,
            range,
            steps,
            captures: captures.unwrap_or_else(MultiCaptureMap::unseeded),
        }
    }

    /// Shell index the separation `r` falls into: the number of shell
    /// radii greater than `r`.
    fn step_of(&self, r: f64) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let step = self.steps.iter().take_while(|s| r <= s.radius).count() as u32;
        step
    }

    /// Energy of the region at `step` shells inward (zero outside).
    fn region_energy(&self, step: u32) -> f64 {
        if step == 0 {
            0.0
        } else {
            self.steps[step as usize - 1].energy
        }
    }

    /// The capture map, for tests and diagnostics.
    #[must_use]
    pub fn captures(&self) -> &MultiCaptureMap {
        &self.captures
    }
}

impl InteractionKind for Stepped {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn max_interaction_distance(&self, _world: &World) -> f64 {
        self.steps.first().map_or(0.0, |s| s.radius)
    }

    fn get_event(&self, world: &World, self_id: usize, i: usize, j: usize) -> Event {
        let pd = world.pair_data(i, j);
        let dynamic = (world.particles[i].is_dynamic(), world.particles[j].is_dynamic());
        let l = &world.liouvillean;
        let step = self.captures.step(i, j) as usize;

        if step == 0 {
            let d = self.steps[0].radius;
            return match l.sphere_sphere_in_root(&pd, d * d, dynamic.0, dynamic.1,
                world.time)
            {
                Some(dt) => pair_event(self_id, i, j, dt, EventKind::WELL_IN),
                None => pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE),
            };
        }

        let mut event = pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE);

        // An inner shell to cross, unless already at the innermost.
        if step < self.steps.len() {
            let d = self.steps[step].radius;
            if let Some(dt) =
                l.sphere_sphere_in_root(&pd, d * d, dynamic.0, dynamic.1, world.time)
            {
                event = pair_event(self_id, i, j, dt, EventKind::WELL_IN);
            }
        }

        // The outward crossing of the shell we are inside.
        let d = self.steps[step - 1].radius;
        if let Some(dt) = l.sphere_sphere_out_root(&pd, d * d, dynamic.0, dynamic.1,
            world.time)
        {
            if dt < event.dt {
                event = pair_event(self_id, i, j, dt, EventKind::WELL_OUT);
            }
        }

        event
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let (i, j) = (event.particle, event.partner.unwrap());
        let step = self.captures.step(i, j);

        let data = match event.kind {
            EventKind::WELL_IN => {
                // Crossing shell `step` inward: the region energy rises
                // by the step difference, kinetic energy falls by it.
                let crossing = &self.steps[step as usize];
                let delta_u = crossing.energy - self.region_energy(step);
                let data =
                    world.resolve_well(i, j, -delta_u, crossing.radius * crossing.radius);
                if data.kind != EventKind::BOUNCE {
                    self.captures.increment(i, j);
                }
                data
            }
            EventKind::WELL_OUT => {
                let crossing = &self.steps[step as usize - 1];
                let delta_u = self.region_energy(step - 1) - crossing.energy;
                let data =
                    world.resolve_well(i, j, -delta_u, crossing.radius * crossing.radius);
                if data.kind != EventKind::BOUNCE {
                    self.captures.decrement(i, j);
                }
                data
            }
            kind => {
                world.invariant_violation(format!(
                    "stepped potential fired an unexpected {kind:?} event"
                ))?;
                return Ok(NEventData::default());
            }
        };
        Ok(NEventData::pair(data))
    }

    fn initialise(&mut self, world: &World, pairs: &[(usize, usize)]) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::Configuration(format!(
                "stepped potential {:?} has no steps",
                self.name
            )));
        }
        let mut captures = std::mem::take(&mut self.captures);
        captures.seed(pairs, |i, j| {
            let pd = world.pair_data(i, j);
            self.step_of(pd.r2.sqrt())
        });
        self.captures = captures;
        Ok(())
    }

    fn internal_energy(&self, _world: &World) -> f64 {
        self.captures
            .iter()
            .map(|(_, step)| self.region_energy(step))
            .sum()
    }

    fn capture_consistent(&self, world: &World, i: usize, j: usize) -> bool {
        let pd = world.pair_data(i, j);
        self.captures.step(i, j) == self.step_of(pd.r2.sqrt())
    }
}
