//! The Andersen thermostat: at exponentially distributed intervals a
//! random particle's velocity is resampled from a Maxwell-Boltzmann at
//! the target temperature.

use super::{SystemDirective, SystemKind};
use crate::error::Result;
use crate::event::{EventKind, NEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::dynamics::Liouvillean;
use crate::ranges::ParticleRange;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// The thermostat ("ghost collider").
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AndersenThermostat {
    name: String,
    range: ParticleRange,
    /// Mean time between kicks; divided by the particle count at
    /// initialization so the configured value is per-system.
    pub mean_free_time: f64,
    /// Target temperature.
    pub temperature: f64,
    /// Self-tuning: adjust the mean free time so thermostat events are
    /// `set_point` of all events.
    pub tune: bool,
    /// Fraction of events the thermostat should account for when tuning.
    pub set_point: f64,
    /// Tune every this many thermostat events.
    pub set_frequency: u64,
    dt: f64,
    #[serde(default)]
    kicks: u64,
    #[serde(default)]
    last_event_count: u64,
}

impl AndersenThermostat {
    /// Builds the thermostat.
    #[must_use]
    pub fn new(name: String, range: ParticleRange, mean_free_time: f64, temperature: f64)
        -> Self {
        Self {
            name,
            range,
            mean_free_time,
            temperature,
            tune: false,
            set_point: 0.05,
            set_frequency: 100,
            dt: f64::INFINITY,
            kicks: 0,
            last_event_count: 0,
        }
    }
}

impl SystemKind for AndersenThermostat {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_fire(&self) -> f64 {
        self.dt
    }

    fn stream(&mut self, dt: f64) {
        self.dt -= dt;
    }

    fn run_event(&mut self, world: &mut World, scheduler: &mut Scheduler,
        interactions: &[Interaction], locals: &[Local], globals: &[Global])
        -> Result<(NEventData, SystemDirective)> {
        self.kicks += 1;

        if self.tune && self.kicks > self.set_frequency {
            #[allow(clippy::cast_precision_loss)]
            {
                self.mean_free_time *= self.kicks as f64
                    / ((world.event_count - self.last_event_count) as f64
                        * self.set_point);
            }
            self.last_event_count = world.event_count;
            self.kicks = 0;
        }

        self.dt = world.sampler.exponential(self.mean_free_time);

        let ids = self.range.ids(world.particles.len());
        let id = ids[world.sampler.index(ids.len())];

        world.update_particle(id);
        let mass = world.mass_of(id);
        let sqrt_t = self.temperature.sqrt();
        let data = {
            let (particles, sampler) = (&mut world.particles, &mut world.sampler);
            Liouvillean::random_gaussian_event(&mut particles[id], sqrt_t, mass, sampler)
        };

        scheduler.full_update(world, interactions, locals, globals, id);

        Ok((NEventData::single(data), SystemDirective::None))
    }

    fn initialise(&mut self, world: &mut World, _interactions: &[Interaction],
        _globals: &[Global], _self_id: usize) {
        #[allow(clippy::cast_precision_loss)]
        {
            self.mean_free_time /= world.particles.len() as f64;
        }
        self.dt = world.sampler.exponential(self.mean_free_time);
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::GAUSSIAN
    }
}
