//! Dumbbells: two spheres on the ends of a rigid rod. The bounding
//! sphere of `length + diameter` acts as a virtual well, like the rods.

use super::{pair_event, InteractionKind};
use crate::capture::SingleCaptureMap;
use crate::dynamics::{self, Liouvillean};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, NEventData};
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Hard dumbbells of a common geometry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dumbbells {
    name: String,
    range: PairRange,
    length: f64,
    diameter: f64,
    elasticity: f64,
    captures: SingleCaptureMap,
}

impl Dumbbells {
    /// Builds the interaction.
    #[must_use]
    pub fn new(name: String, range: PairRange, length: f64, diameter: f64,
        elasticity: f64, captures: Option<SingleCaptureMap>) -> Self {
        Self {
            name,
            range,
            length,
            diameter,
            elasticity,
            captures: captures.unwrap_or_else(SingleCaptureMap::unseeded),
        }
    }

    fn bound(&self) -> f64 {
        self.length + self.diameter
    }

    /// The capture map, for tests and diagnostics.
    #[must_use]
    pub fn captures(&self) -> &SingleCaptureMap {
        &self.captures
    }
}

impl InteractionKind for Dumbbells {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn max_interaction_distance(&self, _world: &World) -> f64 {
        self.bound()
    }

    fn get_event(&self, world: &World, self_id: usize, i: usize, j: usize) -> Event {
        let pd = world.pair_data(i, j);
        let b2 = self.bound() * self.bound();
        let dynamic = (world.particles[i].is_dynamic(), world.particles[j].is_dynamic());
        let orientations = world.orientations.as_ref().expect("checked at initialise");

        if self.captures.is_captured(i, j) {
            let t_high = world
                .liouvillean
                .sphere_sphere_out_root(&pd, b2, dynamic.0, dynamic.1, world.time)
                .unwrap_or(f64::INFINITY);

            let o1 = world.liouvillean.orientation_at(&orientations[i],
                world.particles[i].peculiar_time, world.time);
            let o2 = world.liouvillean.orientation_at(&orientations[j],
                world.particles[j].peculiar_time, world.time);

            let skip = world.last_collision.is_some_and(|(a, b, t)| {
                t == world.time && ((a, b) == (i, j) || (a, b) == (j, i))
            });
            if let Some(dt) = dynamics::dumbbell_root(&pd, &o1, &o2, self.length,
                self.diameter, t_high, skip)
            {
                return pair_event(self_id, i, j, dt, EventKind::CORE);
            }
            pair_event(self_id, i, j, t_high, EventKind::WELL_OUT)
        } else if let Some(dt) = world.liouvillean.sphere_sphere_in_root(&pd, b2,
            dynamic.0, dynamic.1, world.time)
        {
            pair_event(self_id, i, j, dt, EventKind::WELL_IN)
        } else {
            pair_event(self_id, i, j, f64::INFINITY, EventKind::NONE)
        }
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let (i, j) = (event.particle, event.partner.unwrap());
        match event.kind {
            EventKind::CORE => {
                let pd = world.pair_data(i, j);
                let mass = world.mass_of(i);
                let time = world.time;

                let orientations = world.orientations.as_mut().unwrap();
                let (lo, hi) = (i.min(j), i.max(j));
                let (head, tail) = orientations.split_at_mut(hi);
                let (o_lo, o_hi) = (&mut head[lo], &mut tail[0]);
                let (o1, o2) = if i < j { (o_lo, o_hi) } else { (o_hi, o_lo) };

                let (s1, s2) =
                    dynamics::dumbbell_contact_branch(&pd, o1, o2, self.length,
                        self.diameter);

                let (head, tail) = world.particles.split_at_mut(hi);
                let (p_lo, p_hi) = (&mut head[lo], &mut tail[0]);
                let (p1, p2) = if i < j { (p_lo, p_hi) } else { (p_hi, p_lo) };

                let data = Liouvillean::run_dumbbell_coll(p1, p2, o1, o2, s1, s2, mass,
                    self.length, self.diameter, &pd);
                world.last_collision = Some((i, j, time));
                Ok(NEventData::pair(data))
            }
            EventKind::WELL_IN => {
                self.captures.add(i, j);
                Ok(NEventData::default())
            }
            EventKind::WELL_OUT => {
                self.captures.remove(i, j);
                Ok(NEventData::default())
            }
            kind => {
                world.invariant_violation(format!(
                    "dumbbells fired an unexpected {kind:?} event"
                ))?;
                Ok(NEventData::default())
            }
        }
    }

    fn initialise(&mut self, world: &World, pairs: &[(usize, usize)]) -> Result<()> {
        if world.orientations.is_none() {
            return Err(Error::Configuration(format!(
                "dumbbells {:?} need orientation data",
                self.name
            )));
        }
        if !world.liouvillean.supports_shapes() {
            return Err(Error::Configuration(format!(
                "dumbbells {:?} require a ballistic flow",
                self.name
            )));
        }
        let b2 = self.bound() * self.bound();
        let mut captures = std::mem::take(&mut self.captures);
        captures.seed(pairs, |i, j| world.pair_data(i, j).r2 <= b2);
        self.captures = captures;
        Ok(())
    }

    fn capture_consistent(&self, world: &World, i: usize, j: usize) -> bool {
        let inside = world.pair_data(i, j).r2 <= self.bound() * self.bound();
        self.captures.is_captured(i, j) == inside
    }
}
