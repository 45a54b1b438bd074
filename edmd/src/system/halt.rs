//! Ends the run at an absolute simulation time.

use super::{SystemDirective, SystemKind};
use crate::error::Result;
use crate::event::{EventKind, NEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Stops the simulation when its countdown expires.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Halt {
    name: String,
    dt: f64,
    #[serde(default)]
    halted: bool,
}

impl Halt {
    /// Builds a halt `dt` from now.
    #[must_use]
    pub fn new(name: String, dt: f64) -> Self {
        Self {
            name,
            dt,
            halted: false,
        }
    }
}

impl SystemKind for Halt {
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
        log::info!("halting at t = {}", world.time);
        self.halted = true;
        self.dt = f64::INFINITY;
        Ok((NEventData::default(), SystemDirective::None))
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::NONE
    }

    fn halted(&self) -> bool {
        self.halted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;

    #[test]
    fn halts_when_the_countdown_expires() {
        let mut world = two_particle_world(3.0, 0.0);
        let mut halt = Halt::new("halt".into(), 5.0);
        halt.stream(4.0);
        assert!(!halt.halted());
        assert_eq!(halt.time_to_fire(), 1.0);

        let mut scheduler = Scheduler::new(2);
        halt.run_event(&mut world, &mut scheduler, &[], &[], &[]).unwrap();
        assert!(halt.halted());
    }
}
