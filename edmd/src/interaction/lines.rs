//! Thin rotating rods. The bounding sphere of the rod length acts as a
//! virtual well: entering it registers the pair in the capture map (no
//! impulse), and while registered the rod-rod root search runs inside
//! the window where the bounding spheres overlap.

use super::{pair_event, InteractionKind};
use crate::capture::SingleCaptureMap;
use crate::dynamics::{self, Liouvillean};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, NEventData};
use crate::ranges::PairRange;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Hard rods of a common length.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Lines {
    name: String,
    range: PairRange,
    length: f64,
    elasticity: f64,
    captures: SingleCaptureMap,
}

impl Lines {
    /// Builds the interaction.
    #[must_use]
    pub fn new(name: String, range: PairRange, length: f64, elasticity: f64,
        captures: Option<SingleCaptureMap>) -> Self {
        Self {
            name,
            range,
            length,
            elasticity,
            captures: captures.unwrap_or_else(SingleCaptureMap::unseeded),
        }
    }

    /// Whether this pair resolved a contact at this exact instant; the
    /// root search must skip that root.
    fn just_collided(world: &World, i: usize, j: usize) -> bool {
        world.last_collision.is_some_and(|(a, b, t)| {
            t == world.time && ((a, b) == (i, j) || (a, b) == (j, i))
        })
    }

    /// The capture map, for tests and diagnostics.
    #[must_use]
    pub fn captures(&self) -> &SingleCaptureMap {
        &self.captures
    }
}

impl InteractionKind for Lines {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &PairRange {
        &self.range
    }

    fn max_interaction_distance(&self, _world: &World) -> f64 {
        self.length
    }

    fn get_event(&self, world: &World, self_id: usize, i: usize, j: usize) -> Event {
        let pd = world.pair_data(i, j);
        let l2 = self.length * self.length;
        let dynamic = (world.particles[i].is_dynamic(), world.particles[j].is_dynamic());
        let orientations = world.orientations.as_ref().expect("checked at initialise");

        if self.captures.is_captured(i, j) {
            // The upper limit of the rod search is the exit of the
            // bounding spheres (possibly never).
            let t_high = world
                .liouvillean
                .sphere_sphere_out_root(&pd, l2, dynamic.0, dynamic.1, world.time)
                .unwrap_or(f64::INFINITY);

            let o1 = world.liouvillean.orientation_at(&orientations[i],
                world.particles[i].peculiar_time, world.time);
            let o2 = world.liouvillean.orientation_at(&orientations[j],
                world.particles[j].peculiar_time, world.time);

            if let Some(dt) = dynamics::line_line_root(&pd, &o1, &o2, self.length, t_high,
                Self::just_collided(world, i, j))
            {
                return pair_event(self_id, i, j, dt, EventKind::CORE);
            }
            pair_event(self_id, i, j, t_high, EventKind::WELL_OUT)
        } else if let Some(dt) =
            world.liouvillean.sphere_sphere_in_root(&pd, l2, dynamic.0, dynamic.1,
                world.time)
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
                let inertia = world.inertia_of(i);
                let time = world.time;

                let orientations = world.orientations.as_mut().unwrap();
                let (lo, hi) = (i.min(j), i.max(j));
                let (head, tail) = orientations.split_at_mut(hi);
                let (o_lo, o_hi) = (&mut head[lo], &mut tail[0]);
                let (o1, o2) = if i < j { (o_lo, o_hi) } else { (o_hi, o_lo) };

                let (head, tail) = world.particles.split_at_mut(hi);
                let (p_lo, p_hi) = (&mut head[lo], &mut tail[0]);
                let (p1, p2) = if i < j { (p_lo, p_hi) } else { (p_hi, p_lo) };

                let data = Liouvillean::run_line_line_coll(p1, p2, o1, o2, mass, inertia,
                    self.elasticity, self.length, &pd);
                world.last_collision = Some((i, j, time));
                Ok(NEventData::pair(data))
            }
            EventKind::WELL_IN => {
                // A virtual capture: no impulse, only bookkeeping.
                self.captures.add(i, j);
                Ok(NEventData::default())
            }
            EventKind::WELL_OUT => {
                self.captures.remove(i, j);
                Ok(NEventData::default())
            }
            kind => {
                world.invariant_violation(format!(
                    "lines fired an unexpected {kind:?} event"
                ))?;
                Ok(NEventData::default())
            }
        }
    }

    fn initialise(&mut self, world: &World, pairs: &[(usize, usize)]) -> Result<()> {
        if world.orientations.is_none() {
            return Err(Error::Configuration(format!(
                "lines {:?} need orientation data",
                self.name
            )));
        }
        if !world.liouvillean.supports_shapes() {
            return Err(Error::Configuration(format!(
                "lines {:?} require a ballistic flow",
                self.name
            )));
        }
        let l2 = self.length * self.length;
        let mut captures = std::mem::take(&mut self.captures);
        captures.seed(pairs, |i, j| world.pair_data(i, j).r2 <= l2);
        self.captures = captures;
        Ok(())
    }

    fn capture_consistent(&self, world: &World, i: usize, j: usize) -> bool {
        let inside = world.pair_data(i, j).r2 <= self.length * self.length;
        self.captures.is_captured(i, j) == inside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;
    use crate::particle::Orientation;
    use crate::vector::Vec3;
    use float_cmp::assert_approx_eq;

    fn rod_world() -> World {
        let mut world = two_particle_world(3.0, 1.0);
        world.orientations = Some(vec![
            Orientation::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.1, 0.0, 0.0)),
            Orientation::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.1, 0.0)),
        ]);
        world
    }

    #[test]
    fn bounding_sphere_capture_then_core() {
        let mut world = rod_world();
        let mut lines = Lines::new("rods".into(), PairRange::All, 1.0, 1.0, None);
        lines.initialise(&world, &[(0, 1)]).unwrap();

        let event = lines.get_event(&world, 0, 0, 1);
        assert_eq!(event.kind, EventKind::WELL_IN);
        // Bounding spheres of radius L touch at separation 1.
        assert_approx_eq!(f64, event.dt, 1.0);

        world.time += event.dt;
        world.update_pair(0, 1);
        let data = lines.run_event(&mut world, &event).unwrap();
        // Virtual event: no velocity change.
        assert!(data.particles.is_empty() && data.pairs.is_empty());
        assert!(lines.captures().is_captured(0, 1));

        // Inside the bounding sphere the next event is a rod contact or
        // the exit, never NONE.
        let event = lines.get_event(&world, 0, 0, 1);
        assert!(matches!(event.kind, EventKind::CORE | EventKind::WELL_OUT));
    }

    #[test]
    fn crossed_rods_collide_and_conserve_energy() {
        let mut world = rod_world();
        // Perpendicular rods approaching along z at small separation.
        world.particles[0].position = Vec3::new(0.0, 0.0, 0.0);
        world.particles[1].position = Vec3::new(0.0, 0.0, 0.4);
        world.particles[0].velocity = Vec3::new(0.0, 0.0, 1.0);
        world.particles[1].velocity = Vec3::new(0.0, 0.0, -1.0);

        let mut lines = Lines::new("rods".into(), PairRange::All, 1.0, 1.0, None);
        lines.initialise(&world, &[(0, 1)]).unwrap();
        assert!(lines.captures().is_captured(0, 1));

        let event = lines.get_event(&world, 0, 0, 1);
        assert_eq!(event.kind, EventKind::CORE);
        assert_approx_eq!(f64, event.dt, 0.2, epsilon = 1e-6);

        world.time += event.dt;
        world.update_pair(0, 1);
        let data = lines.run_event(&mut world, &event).unwrap();
        assert_approx_eq!(f64, data.total_delta_ke(), 0.0, epsilon = 1e-10);
        // The rods now separate.
        assert!(world.particles[0].velocity.z < 1.0);
    }
}
