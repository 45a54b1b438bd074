//! Localized single-particle event sources. A local attaches to a
//! particle range and a spatial extent; the cell list discovers at
//! initialization which cells it touches, and particles only test
//! against the locals of their own cell.

mod plate;
mod walls;

pub use plate::OscillatingPlate;
pub use walls::{AndersenWall, CylinderWall, Wall};

use crate::error::Result;
use crate::event::{Event, EventKind, EventSource, NEventData};
use crate::ranges::ParticleRange;
use crate::simulation::World;
use crate::vector::Vec3;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// Contract every local implements.
#[enum_dispatch]
pub trait LocalKind {
    /// Lookup name from the configuration.
    fn name(&self) -> &str;

    /// Particles this local can fire on.
    fn range(&self) -> &ParticleRange;

    /// Whether any part of the local lies inside the axis-aligned cell
    /// at `origin` with extents `width`.
    fn is_in_cell(&self, origin: Vec3, width: Vec3) -> bool;

    /// The particle's next event against this local.
    fn get_event(&self, world: &World, self_id: usize, particle: usize) -> Event;

    /// Resolves a fired event; the particle is streamed to the event
    /// time.
    ///
    /// # Errors
    ///
    /// Invariant violations surface here.
    fn run_event(&mut self, world: &mut World, event: &Event) -> Result<NEventData>;
}

/// The closed set of locals.
#[allow(missing_docs)]
#[enum_dispatch(LocalKind)]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Local {
    Wall,
    AndersenWall,
    CylinderWall,
    OscillatingPlate,
}

/// Builds a local event.
pub(crate) fn local_event(self_id: usize, particle: usize, dt: f64, kind: EventKind)
    -> Event {
    Event {
        particle,
        partner: None,
        dt,
        kind,
        source: EventSource::Local(self_id),
        counter: 0,
        partner_counter: 0,
    }
}

/// A plane's slab test against a cell: distance of the cell centre to
/// the plane along its normal, compared with the cell half-diagonal
/// projection. Shared by the wall-like locals.
pub(crate) fn plane_in_cell(origin: Vec3, width: Vec3, point: Vec3, normal: Vec3) -> bool {
    let center = origin + width * 0.5;
    let dist = (center - point).dot(&normal);
    let reach = 0.5
        * (width.x * normal.x.abs() + width.y * normal.y.abs() + width.z * normal.z.abs());
    dist.abs() <= reach
}
