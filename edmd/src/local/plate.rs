//! The oscillating plate: a wall of finite mass whose face moves
//! sinusoidally along its normal. Resolutions optionally recoil the
//! plate, folding the momentum transfer into its amplitude and phase.

use super::{local_event, plane_in_cell, LocalKind};
use crate::dynamics::Liouvillean;
use crate::error::Result;
use crate::event::{Event, EventKind, NEventData};
use crate::ranges::ParticleRange;
use crate::simulation::World;
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// An oscillating plate local. `delta` and `time_shift` are live state:
/// they change when the plate recoils, and persist in snapshots.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OscillatingPlate {
    name: String,
    range: ParticleRange,
    /// Rest position of the plate centre.
    pub origin: Vec3,
    /// Unit normal of the plate faces.
    pub normal: Vec3,
    /// Current oscillation amplitude.
    pub delta: f64,
    /// Angular frequency.
    pub omega: f64,
    /// Half-thickness: the faces sit at `±sigma` around the oscillating
    /// centre.
    pub sigma: f64,
    /// Current phase offset; the face position is
    /// `delta * cos(omega * (t + time_shift))`.
    pub time_shift: f64,
    /// Plate mass.
    pub mass: f64,
    /// Elasticity of contacts.
    pub elasticity: f64,
    /// A strong plate has effectively infinite mass and never recoils.
    pub strong: bool,
    /// Fraction of the maximum wall speed below which contacts resolve
    /// elastically (and the fake-collision repair engages).
    pub recoil_fraction: f64,
    /// Particle that fired this plate's previous event, whose root must
    /// not be rediscovered.
    #[serde(default)]
    pub last_particle: Option<usize>,
}

impl OscillatingPlate {
    /// Builds a plate at full amplitude with zero phase.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(name: String, range: ParticleRange, origin: Vec3, normal: Vec3, delta: f64,
        omega: f64, sigma: f64, mass: f64, elasticity: f64, strong: bool) -> Self {
        Self {
            name,
            range,
            origin,
            normal: normal.normalized(),
            delta,
            omega,
            sigma,
            time_shift: 0.0,
            mass,
            elasticity,
            strong,
            recoil_fraction: 0.002,
            last_particle: None,
        }
    }
}

impl LocalKind for OscillatingPlate {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> &ParticleRange {
        &self.range
    }

    fn is_in_cell(&self, origin: Vec3, width: Vec3) -> bool {
        // The swept slab has half-width sigma + delta around the rest
        // plane.
        let mut widened = width;
        let reach = self.sigma + self.delta.abs();
        widened += Vec3::new(
            2.0 * reach * self.normal.x.abs(),
            2.0 * reach * self.normal.y.abs(),
            2.0 * reach * self.normal.z.abs(),
        );
        let shifted = origin
            - Vec3::new(
                reach * self.normal.x.abs(),
                reach * self.normal.y.abs(),
                reach * self.normal.z.abs(),
            );
        plane_in_cell(shifted, widened, self.origin, self.normal)
    }

    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event {
        let (pos, vel) = world.folded_state(particle);
        let rel = pos - self.origin;
        let last = self.last_particle == Some(particle);

        match Liouvillean::point_plate_collision(rel, vel, self.normal, self.delta,
            self.omega, self.sigma, world.time + self.time_shift, last,
            self.recoil_fraction)
        {
            Some((_, dt)) => local_event(self_id, particle, dt, EventKind::WALL),
            None => local_event(self_id, particle, f64::INFINITY, EventKind::NONE),
        }
    }

    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData> {
        let id = event.particle;
        let mass = world.mass_of(id);
        let sys_time = world.time;

        let data = Liouvillean::run_oscillating_plate(
            &mut world.particles[id],
            mass,
            self.normal,
            &mut self.delta,
            self.omega,
            self.sigma,
            self.mass,
            self.elasticity,
            &mut self.time_shift,
            self.strong,
            sys_time,
            self.recoil_fraction,
        );
        self.last_particle = Some(id);
        Ok(NEventData::single(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;

    fn plate() -> OscillatingPlate {
        OscillatingPlate::new(
            "shaker".into(),
            ParticleRange::All,
            Vec3::zero(),
            Vec3::new(1.0, 0.0, 0.0),
            0.3,
            2.0,
            0.5,
            10.0,
            1.0,
            false,
        )
    }

    /// A particle between the faces, rising towards the upper one. The
    /// faces sit at `0.3 cos(2t) +- 0.5`.
    fn confined_world() -> World {
        let mut world = two_particle_world(3.0, 0.0);
        world.particles[0].position = Vec3::new(0.2, 0.0, 0.0);
        world.particles[0].velocity = Vec3::new(1.0, 0.0, 0.0);
        world
    }

    #[test]
    fn confined_particle_gets_an_event() {
        let world = confined_world();
        let p = plate();
        let event = p.get_event(&world, 0, 0);
        assert_eq!(event.kind, EventKind::WALL);
        assert!(event.dt.is_finite());
        // The upper face never moves below 0.2 nor above 0.8.
        assert!(event.dt > 0.0);
        assert!(event.dt <= 0.8 / 1.0 + 1e-9);
    }

    #[test]
    fn strong_plate_reflects_without_recoil() {
        let mut world = confined_world();
        let mut p = plate();
        p.strong = true;
        let (delta0, shift0) = (p.delta, p.time_shift);

        let event = p.get_event(&world, 0, 0);
        world.time += event.dt;
        world.update_particle(0);
        p.run_event(&mut world, &event).unwrap();

        // Reflected back down into the gap.
        assert!(world.particles[0].velocity.x < 1.0);
        assert_eq!(p.delta, delta0);
        assert_eq!(p.time_shift, shift0);
        assert_eq!(p.last_particle, Some(0));
    }

    #[test]
    fn weak_plate_recoils() {
        let mut world = confined_world();
        let mut p = plate();
        let delta0 = p.delta;

        let event = p.get_event(&world, 0, 0);
        world.time += event.dt;
        world.update_particle(0);
        p.run_event(&mut world, &event).unwrap();

        assert!(world.particles[0].velocity.x < 1.0);
        // The momentum transfer changed the plate's oscillation state.
        assert!(p.delta != delta0 || p.time_shift != 0.0);
    }
}
