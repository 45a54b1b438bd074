//! Periodic scheduler maintenance: a full queue rebuild at a fixed
//! period, flushing any accumulated stale entries and numerical drift in
//! the predictions.

use super::{SystemDirective, SystemKind};
use crate::error::Result;
use crate::event::{EventKind, NEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Rebuilds the queue every `period` of simulation time.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SchedulerMaintainer {
    name: String,
    /// Rebuild period.
    pub period: f64,
    dt: f64,
}

impl SchedulerMaintainer {
    /// Builds the maintainer.
    #[must_use]
    pub fn new(name: String, period: f64) -> Self {
        Self {
            name,
            period,
            dt: period,
        }
    }
}

impl SystemKind for SchedulerMaintainer {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_to_fire(&self) -> f64 {
        self.dt
    }

    fn stream(&mut self, dt: f64) {
        self.dt -= dt;
    }

    fn run_event(&mut self, _world: &mut World, _scheduler: &mut Scheduler,
        _interactions: &[Interaction], _locals: &[Local], _globals: &[Global])
        -> Result<(NEventData, SystemDirective)> {
        self.dt = self.period;
        Ok((NEventData::default(), SystemDirective::RebuildScheduler))
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::VIRTUAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;

    #[test]
    fn requests_periodic_rebuilds() {
        let mut world = two_particle_world(3.0, 0.0);
        let mut maintainer = SchedulerMaintainer::new("maintainer".into(), 2.5);
        maintainer.stream(2.5);
        assert_eq!(maintainer.time_to_fire(), 0.0);

        let mut scheduler = Scheduler::new(2);
        let (_, directive) = maintainer
            .run_event(&mut world, &mut scheduler, &[], &[], &[])
            .unwrap();
        assert_eq!(directive, SystemDirective::RebuildScheduler);
        assert_eq!(maintainer.time_to_fire(), 2.5);
    }
}
