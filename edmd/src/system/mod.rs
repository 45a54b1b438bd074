//! Process-wide event sources. Systems own countdown fire times rather
//! than per-particle deltas: `stream` decrements the countdown as global
//! time advances and the loop fires whichever system reaches zero before
//! the queue head.

mod andersen;
mod compression_fix;
mod dsmc;
mod halt;
mod maintainer;
mod rescale;
mod ring_dsmc;
mod sleep;
mod umbrella;

pub use andersen::AndersenThermostat;
pub use compression_fix::CompressionCellFix;
pub use dsmc::DsmcSpheres;
pub use halt::Halt;
pub use maintainer::SchedulerMaintainer;
pub use rescale::Rescale;
pub use ring_dsmc::RingDsmc;
pub use sleep::Sleep;
pub use umbrella::Umbrella;

use crate::error::Result;
use crate::event::{EventKind, NEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// Follow-up work a fired system asks of the loop, performed after the
/// system's own borrow ends.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SystemDirective {
    /// Nothing further.
    #[default]
    None,
    /// Drop and re-predict the whole queue.
    RebuildScheduler,
    /// Re-size the cell list (growing diameters under compression),
    /// then rebuild the queue.
    RebuildCells,
}

/// Contract every system implements.
#[enum_dispatch]
pub trait SystemKind {
    /// Lookup name from the configuration.
    fn name(&self) -> &str;

    /// Countdown until this system fires.
    fn time_to_fire(&self) -> f64;

    /// Advances the countdown by the elapsed time.
    fn stream(&mut self, dt: f64);

    /// Fires the system.
    ///
    /// # Errors
    ///
    /// Invariant violations surface here.
    fn run_event(&mut self, world: &mut World, scheduler: &mut Scheduler,
        interactions: &[Interaction], locals: &[Local], globals: &[Global])
        -> Result<(NEventData, SystemDirective)>;

    /// One-time setup. Interactions and globals are already initialised
    /// when this runs.
    fn initialise(&mut self, world: &mut World, interactions: &[Interaction],
        globals: &[Global], self_id: usize) {
        let _ = (world, interactions, globals, self_id);
    }

    /// Called after the loop re-sizes the cell list, with the new
    /// supported interaction length and the ungrown base distance.
    fn cells_rebuilt(&mut self, world: &World, supported: f64, base_distance: f64) {
        let _ = (world, supported, base_distance);
    }

    /// Called after every event with its change set; systems watching
    /// the run (sleep, umbrella, rescale) reschedule themselves here.
    fn particles_updated(&mut self, world: &World, data: &NEventData) {
        let _ = (world, data);
    }

    /// The event tag this system stamps on the output stream.
    fn kind_tag(&self) -> EventKind;

    /// Whether this system has ended the run.
    fn halted(&self) -> bool {
        false
    }
}

/// The closed set of systems.
#[allow(missing_docs)]
#[enum_dispatch(SystemKind)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum System {
    AndersenThermostat,
    DsmcSpheres,
    RingDsmc,
    Rescale,
    Umbrella,
    Sleep,
    CompressionCellFix,
    Halt,
    SchedulerMaintainer,
}
