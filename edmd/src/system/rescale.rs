//! Velocity rescaling: every `frequency` events the kinetic temperature
//! is reset to the target, and the cumulative scale factor is kept so
//! simulation time maps back to real (un-scaled) time.

use super::{SystemDirective, SystemKind};
use crate::dynamics::Liouvillean;
use crate::error::Result;
use crate::event::{EventKind, NEventData, ParticleEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// The velocity rescaler.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Rescale {
    name: String,
    /// Rescale every this many events.
    pub frequency: u64,
    /// Target kinetic temperature.
    pub temperature: f64,
    /// Cumulative log of the applied temperature ratios.
    pub scale_factor: f64,
    /// Real (un-scaled) time accumulated so far.
    pub real_time: f64,
    last_time: f64,
    dt: f64,
}

impl Rescale {
    /// Builds the rescaler.
    #[must_use]
    pub fn new(name: String, frequency: u64, temperature: f64) -> Self {
        Self {
            name,
            frequency,
            temperature,
            scale_factor: 0.0,
            real_time: 0.0,
            last_time: 0.0,
            dt: f64::INFINITY,
        }
    }

    /// Maps the current simulation time to real time through the
    /// accumulated scale factor.
    #[must_use]
    pub fn real_time_at(&self, sim_time: f64) -> f64 {
        self.real_time + (sim_time - self.last_time) / (0.5 * self.scale_factor).exp()
    }
}

impl SystemKind for Rescale {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_fire(&self) -> f64 {
        self.dt
    }

    fn stream(&mut self, dt: f64) {
        self.dt -= dt;
    }

    fn run_event(&mut self, world: &mut World, _scheduler: &mut Scheduler,
        _interactions: &[Interaction], _locals: &[Local], _globals: &[Global])
        -> Result<(NEventData, SystemDirective)> {
        self.dt = f64::INFINITY;

        let current = world.kinetic_temperature();
        if current <= 0.0 {
            return Ok((NEventData::default(), SystemDirective::None));
        }
        let ratio = current / self.temperature;
        let factor = 1.0 / ratio.sqrt();
        log::info!("rescaling kinetic temperature {current:.6} -> {}", self.temperature);

        let old: Vec<_> = world.particles.iter().map(|p| p.velocity).collect();
        {
            let (particles, orientations) =
                (&mut world.particles, world.orientations.as_mut());
            Liouvillean::rescale_velocities(particles, orientations, factor);
        }

        self.real_time += (world.time - self.last_time) / (0.5 * self.scale_factor).exp();
        self.last_time = world.time;
        self.scale_factor += ratio.ln();

        let mut data = NEventData::default();
        for (id, old_velocity) in old.into_iter().enumerate() {
            let mass = world.mass_of(id);
            let mass = if mass.is_finite() { mass } else { 0.0 };
            data.particles.push(ParticleEventData::new(id, EventKind::RESCALE,
                old_velocity, world.particles[id].velocity, mass));
        }

        Ok((data, SystemDirective::RebuildScheduler))
    }

    fn particles_updated(&mut self, world: &World, _data: &NEventData) {
        if self.frequency > 0 && world.event_count % self.frequency == 0 {
            self.dt = 0.0;
        }
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::RESCALE
    }
}
