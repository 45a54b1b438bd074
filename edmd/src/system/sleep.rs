//! The sleep system: particles that have stopped moving (slow, settled,
//! and recently stationary) are marked non-dynamic with zero velocity,
//! removing their chattering contacts from the queue. Candidates are
//! collected while events resolve and applied in one zero-delay batch.

use super::{SystemDirective, SystemKind};
use crate::error::Result;
use crate::event::{EventKind, NEventData, ParticleEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::particle::StateFlags;
use crate::ranges::ParticleRange;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The sleep/wake system.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Sleep {
    name: String,
    range: ParticleRange,
    /// Speed along gravity below which a particle may sleep.
    pub sleep_velocity: f64,
    /// Maximum drift since the last event for a sleep candidate.
    pub sleep_distance: f64,
    /// Maximum time since the last event for a sleep candidate.
    pub sleep_time: f64,
    /// Position and time of each particle's last event.
    #[serde(default)]
    last_data: Vec<(Vec3, f64)>,
    /// Pending velocity corrections: zero to sleep, the stored impulse
    /// to correct, any nonzero marker to wake.
    #[serde(default)]
    state_change: BTreeMap<usize, Vec3>,
}

impl Sleep {
    /// Builds the system. The distance and time windows default to the
    /// small fractions of the simulation units the model expects.
    #[must_use]
    pub fn new(name: String, range: ParticleRange, sleep_velocity: f64) -> Self {
        Self {
            name,
            range,
            sleep_velocity,
            sleep_distance: 0.01,
            sleep_time: 1e-4,
            last_data: Vec::new(),
            state_change: BTreeMap::new(),
        }
    }

    fn sleep_condition(&self, world: &World, id: usize, extra_velocity: Vec3) -> bool {
        let Some(g) = world.liouvillean.gravity() else {
            return false;
        };
        let gnrm = g.nrm();
        if gnrm == 0.0 {
            return false;
        }

        let (last_pos, last_time) = self.last_data[id];
        let mut drift = world.particles[id].position - last_pos;
        world.boundary.apply(&mut drift);

        drift.nrm() < self.sleep_distance
            && world.time - last_time < self.sleep_time
            && (world.particles[id].velocity + extra_velocity).dot(&(g / gnrm))
                < self.sleep_velocity
    }
}

impl SystemKind for Sleep {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_fire(&self) -> f64 {
        if self.state_change.is_empty() {
            f64::INFINITY
        } else {
            // Fires before anything else in the queue.
            f64::NEG_INFINITY
        }
    }

    fn stream(&mut self, _dt: f64) {}

    fn run_event(&mut self, world: &mut World, scheduler: &mut Scheduler,
        interactions: &[Interaction], locals: &[Local], globals: &[Global])
        -> Result<(NEventData, SystemDirective)> {
        let mut data = NEventData::default();
        let changes = std::mem::take(&mut self.state_change);

        for (&id, &correction) in &changes {
            world.update_particle(id);

            let asleep = correction == Vec3::zero();
            let kind = match (asleep, world.particles[id].is_dynamic()) {
                (true, true) => EventKind::SLEEP,
                (true, false) => EventKind::RESLEEP,
                (false, true) => EventKind::CORRECT,
                (false, false) => EventKind::WAKEUP,
            };

            let old = world.particles[id].velocity;
            match kind {
                EventKind::SLEEP => {
                    world.particles[id].state.remove(StateFlags::DYNAMIC);
                    world.particles[id].velocity = Vec3::zero();
                }
                EventKind::RESLEEP => {
                    world.particles[id].velocity = Vec3::zero();
                }
                EventKind::CORRECT => {
                    world.particles[id].velocity += correction;
                    world.particles[id].state.insert(StateFlags::DYNAMIC);
                }
                EventKind::WAKEUP => {
                    world.particles[id].state.insert(StateFlags::DYNAMIC);
                }
                _ => unreachable!(),
            }

            let mass = world.mass_of(id);
            let mass = if mass.is_finite() { mass } else { 0.0 };
            data.particles.push(ParticleEventData::new(id, kind, old,
                world.particles[id].velocity, mass));
        }

        for record in &data.particles {
            scheduler.full_update(world, interactions, locals, globals, record.particle);
        }

        Ok((data, SystemDirective::None))
    }

    fn initialise(&mut self, world: &mut World, _interactions: &[Interaction],
        _globals: &[Global], _self_id: usize) {
        self.last_data = world
            .particles
            .iter()
            .map(|p| (p.position, f64::NEG_INFINITY))
            .collect();
    }

    fn particles_updated(&mut self, world: &World, data: &NEventData) {
        let n = world.particles.len();

        for pair in &data.pairs {
            let (id1, id2) = (pair.particle1.particle, pair.particle2.particle);
            let p1 = &world.particles[id1];
            let p2 = &world.particles[id2];

            // Only mixed dynamic/static contacts with a ranged member
            // are sleep candidates.
            if !self.range.contains(id1, n) && !self.range.contains(id2, n) {
                continue;
            }
            if p1.is_dynamic() == p2.is_dynamic() {
                continue;
            }

            let (dynamic, static_p) = if p1.is_dynamic() { (id1, id2) } else { (id2, id1) };

            if !self.range.contains(static_p, n) {
                // Colliding with a fixed object: the dynamic particle
                // may settle onto it.
                if self.sleep_condition(world, dynamic, Vec3::zero()) {
                    self.state_change.insert(dynamic, Vec3::zero());
                }
                continue;
            }
            if !self.range.contains(dynamic, n) {
                continue;
            }

            if self.sleep_condition(world, static_p, Vec3::zero()) {
                // The static particle stays asleep; the dynamic one
                // receives the momentum it would have transferred.
                let mass_ratio = world.mass_of(static_p) / world.mass_of(dynamic);
                let correction = -world.particles[static_p].velocity * mass_ratio;
                self.state_change.insert(static_p, Vec3::zero());
                self.state_change.insert(dynamic, correction);

                if self.sleep_condition(world, dynamic, correction) {
                    self.state_change.insert(dynamic, Vec3::zero());
                    continue;
                }

                // A vanishing transferred impulse means the pair is
                // chattering; sleep the dynamic one too.
                if pair.impulse.nrm() / world.mass_of(dynamic) < self.sleep_velocity {
                    self.state_change.insert(dynamic, Vec3::zero());
                }
                continue;
            }

            // Otherwise the contact wakes the sleeping particle.
            self.state_change.insert(static_p, Vec3::new(1.0, 1.0, 1.0));
        }

        for pair in &data.pairs {
            for id in [pair.particle1.particle, pair.particle2.particle] {
                self.last_data[id] = (world.particles[id].position, world.time);
            }
        }
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::SLEEP
    }
}
