//! Cell maintenance under the compression flow: diameters grow linearly
//! in time, so the cell list is re-sized just before any grown diameter
//! exceeds the width it supports.

use super::{SystemDirective, SystemKind};
use crate::error::Result;
use crate::event::{EventKind, NEventData};
use crate::global::{find_cells, Global};
use crate::interaction::{Interaction, InteractionKind};
use crate::local::Local;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use serde::{Deserialize, Serialize};

/// Reinitialises the cell list when the growing diameters approach the
/// supported cell width.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CompressionCellFix {
    name: String,
    /// Ungrown (t = 0) maximum interaction distance.
    base_distance: f64,
    dt: f64,
}

impl CompressionCellFix {
    /// Builds the system.
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            base_distance: 0.0,
            dt: f64::INFINITY,
        }
    }

    /// Countdown until `base * (1 + rate t)` reaches `supported`.
    fn overflow_countdown(&self, world: &World, supported: f64) -> f64 {
        let rate = world.liouvillean.growth_rate();
        if rate <= 0.0 || self.base_distance <= 0.0 || !supported.is_finite() {
            return f64::INFINITY;
        }
        let overflow_time = (supported / self.base_distance - 1.0) / rate;
        (overflow_time - world.time).max(0.0)
    }
}

impl SystemKind for CompressionCellFix {
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
        log::info!("compression fix: re-sizing the cell list at t = {}", world.time);
        // The loop performs the rebuild and calls back `cells_rebuilt`
        // to schedule the next overflow.
        self.dt = f64::INFINITY;
        Ok((NEventData::default(), SystemDirective::RebuildCells))
    }

    fn initialise(&mut self, world: &mut World, interactions: &[Interaction],
        globals: &[Global], _self_id: usize) {
        self.base_distance = interactions
            .iter()
            .map(|i| i.max_interaction_distance(world))
            .fold(0.0, f64::max);

        let supported = find_cells(globals)
            .map_or(f64::INFINITY, crate::global::Cells::max_supported_interaction_length);
        self.dt = self.overflow_countdown(world, supported);
    }

    fn cells_rebuilt(&mut self, world: &World, supported: f64, base_distance: f64) {
        self.base_distance = base_distance;
        self.dt = self.overflow_countdown(world, supported);
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::VIRTUAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;
    use crate::dynamics::Liouvillean;
    use float_cmp::assert_approx_eq;

    #[test]
    fn countdown_tracks_the_growth_rate() {
        let mut world = two_particle_world(3.0, 0.0);
        world.liouvillean = Liouvillean::Compression { growth_rate: 0.1 };

        let mut fix = CompressionCellFix::new("fix".into());
        fix.base_distance = 1.0;
        // Supported width 2: overflow when 1 + 0.1 t = 2, t = 10.
        assert_approx_eq!(f64, fix.overflow_countdown(&world, 2.0), 10.0);

        world.time = 4.0;
        assert_approx_eq!(f64, fix.overflow_countdown(&world, 2.0), 6.0);
    }

    #[test]
    fn inert_without_compression() {
        let world = two_particle_world(3.0, 0.0);
        let mut fix = CompressionCellFix::new("fix".into());
        fix.base_distance = 1.0;
        assert_eq!(fix.overflow_countdown(&world, 2.0), f64::INFINITY);
    }
}
