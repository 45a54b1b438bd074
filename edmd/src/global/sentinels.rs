//! Prediction-horizon sentinels. These virtual events never change the
//! physics; they force re-prediction before a particle can outrun the
//! assumptions of the minimum-image pair predictions, and pin down the
//! turning points of parabolic flight.

use super::{global_event, GlobalKind, GlobalOutcome};
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::interaction::Interaction;
use crate::local::Local;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Forces a re-prediction before a particle could have travelled
/// further than half the primary image minus the interaction reach.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PbcSentinel {
    name: String,
    /// Interaction reach subtracted from the half image.
    max_interaction_distance: f64,
}

impl PbcSentinel {
    /// Builds the sentinel.
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            max_interaction_distance: 0.0,
        }
    }
}

impl GlobalKind for PbcSentinel {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event {
        let (_, vel) = world.folded_state(particle);
        let dt = world.liouvillean.pbc_sentinel_time(
            vel,
            world.boundary.primary_image * 0.5,
            self.max_interaction_distance,
            world.particles[particle].is_dynamic(),
        );
        global_event(self_id, particle, dt, EventKind::VIRTUAL)
    }

    fn run_event(&mut self, world: &mut World, _scheduler: &mut Scheduler,
        _interactions: &[Interaction], _locals: &[Local], event: &Event)
        -> Result<GlobalOutcome> {
        world.update_particle(event.particle);
        // No state change: just re-predict everything for the particle.
        Ok((NEventData::default(), vec![event.particle]))
    }

    fn initialise(&mut self, _world: &mut World, _locals: &[Local], _self_id: usize,
        max_interaction_distance: f64) -> Result<()> {
        self.max_interaction_distance = max_interaction_distance;
        Ok(())
    }
}

/// Fires at each turning point of parabolic flight and zeroes the
/// turning velocity component exactly, so numerical drift around the
/// apex cannot corrupt the cell-transit predictions.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParabolaSentinel {
    name: String,
}

impl ParabolaSentinel {
    /// Builds the sentinel.
    #[must_use]
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl GlobalKind for ParabolaSentinel {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event {
        let (_, vel) = world.folded_state(particle);
        let dt = world
            .liouvillean
            .parabola_sentinel_time(vel, world.particles[particle].is_dynamic());
        global_event(self_id, particle, dt, EventKind::VIRTUAL)
    }

    fn run_event(&mut self, world: &mut World, _scheduler: &mut Scheduler,
        _interactions: &[Interaction], _locals: &[Local], event: &Event)
        -> Result<GlobalOutcome> {
        world.update_particle(event.particle);
        let (liouvillean, particles) = (&world.liouvillean, &mut world.particles);
        liouvillean.enforce_parabola(&mut particles[event.particle]);
        Ok((NEventData::default(), vec![event.particle]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;
    use crate::dynamics::Liouvillean;
    use crate::vector::Vec3;
    use float_cmp::assert_approx_eq;

    #[test]
    fn parabola_sentinel_pins_the_apex() {
        let mut world = two_particle_world(3.0, 0.0);
        world.liouvillean = Liouvillean::NewtonianGravity {
            gravity: Vec3::new(0.0, -1.0, 0.0),
            elastic_v: 0.0,
            tc: None,
            tc_last: Vec::new(),
        };
        world.particles[0].velocity = Vec3::new(0.3, 2.0, 0.0);

        let sentinel = ParabolaSentinel::new("parabola".into());
        let event = sentinel.get_event(&world, 0, 0);
        assert_eq!(event.kind, EventKind::VIRTUAL);
        assert_approx_eq!(f64, event.dt, 2.0);

        let mut sentinel = sentinel;
        world.time += event.dt;
        let mut scheduler = Scheduler::new(world.particles.len());
        let (_, updates) = sentinel
            .run_event(&mut world, &mut scheduler, &[], &[], &event)
            .unwrap();
        assert_eq!(updates, vec![0]);
        assert_eq!(world.particles[0].velocity.y, 0.0);
        assert_approx_eq!(f64, world.particles[0].velocity.x, 0.3);
    }

    #[test]
    fn pbc_sentinel_bounds_fast_particles() {
        let mut world = two_particle_world(3.0, 0.0);
        world.particles[0].velocity = Vec3::new(10.0, 0.0, 0.0);

        let mut sentinel = PbcSentinel::new("pbc".into());
        sentinel.initialise(&mut world, &[], 0, 1.0).unwrap();
        let event = sentinel.get_event(&world, 0, 0);
        // (50 - 1) / 10.
        assert_approx_eq!(f64, event.dt, 4.9);
    }
}
