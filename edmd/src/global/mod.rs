//! System-wide single-particle event sources: the cell neighbour list
//! and the sentinels that bound prediction horizons.

mod cells;
mod sentinels;

pub use cells::Cells;
pub use sentinels::{ParabolaSentinel, PbcSentinel};

use crate::error::Result;
use crate::event::{Event, EventKind, EventSource, NEventData};
use crate::interaction::Interaction;
use crate::local::Local;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// What a fired global asks the loop to do afterwards: virtual events
/// carry no physical change, but some force a full re-prediction of
/// their particle.
pub type GlobalOutcome = (NEventData, Vec<usize>);

/// Contract every global implements.
#[enum_dispatch]
pub trait GlobalKind {
    /// Lookup name from the configuration.
    fn name(&self) -> &str;

    /// The particle's next event from this global.
    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event;

    /// Resolves a fired event: updates bookkeeping, pushes follow-up
    /// events, and reports particles needing a full update.
    ///
    /// # Errors
    ///
    /// Invariant violations surface here.
    fn run_event(&mut self, world: &mut World, scheduler: &mut Scheduler,
        interactions: &[Interaction], locals: &[Local], event: &Event)
        -> Result<GlobalOutcome>;

    /// One-time setup; the cell list builds its lattice here.
    ///
    /// # Errors
    ///
    /// Capacity problems (too few cells) surface here.
    fn initialise(&mut self, world: &mut World, locals: &[Local], self_id: usize,
        max_interaction_distance: f64) -> Result<()> {
        let _ = (world, locals, self_id, max_interaction_distance);
        Ok(())
    }

    /// Downcast to the cell list, for neighbourhood queries.
    fn as_cells(&self) -> Option<&Cells> {
        None
    }

    /// Mutable downcast to the cell list.
    fn as_cells_mut(&mut self) -> Option<&mut Cells> {
        None
    }
}

/// The closed set of globals.
#[allow(missing_docs)]
#[enum_dispatch(GlobalKind)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Global {
    Cells,
    PbcSentinel,
    ParabolaSentinel,
}

/// Builds a global (virtual) event.
pub(crate) fn global_event(self_id: usize, particle: usize, dt: f64, kind: EventKind)
    -> Event {
    Event {
        particle,
        partner: None,
        dt,
        kind,
        source: EventSource::Global(self_id),
        counter: 0,
        partner_counter: 0,
    }
}

/// Finds the cell list among the globals, if one is configured.
#[must_use]
pub fn find_cells(globals: &[Global]) -> Option<&Cells> {
    globals.iter().find_map(GlobalKind::as_cells)
}
