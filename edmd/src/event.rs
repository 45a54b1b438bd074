//! Event kinds, candidate events and the per-event change records passed
//! to observers.

use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// Tags identifying what happened at an event. The names are part of the
/// output format and must not be renamed.
#[allow(missing_docs, non_camel_case_types)]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EventKind {
    NONE,
    CELL,
    GLOBAL,
    INTERACTION,
    WALL,
    GAUSSIAN,
    CORE,
    WELL_IN,
    WELL_OUT,
    BOUNCE,
    NON_EVENT,
    WELL_KEUP,
    WELL_KEDOWN,
    VIRTUAL,
    SLEEP,
    WAKEUP,
    RESLEEP,
    CORRECT,
    RESCALE,
    UMBRELLA,
    DSMC,
}

/// Which event source produced a candidate event.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EventSource {
    /// A pair interaction, by id.
    Interaction(usize),
    /// A local, by id.
    Local(usize),
    /// A global, by id.
    Global(usize),
    /// A system, by id.
    System(usize),
}

/// A candidate event for one particle (or pair). `dt` is a delta from the
/// particle's peculiar time; the scheduler adds the peculiar time to form
/// the absolute sort key. The generation counters captured at predict
/// time implement lazy invalidation.
#[derive(Clone, Copy, Debug)]
pub struct Event {
    /// Primary particle.
    pub particle: usize,
    /// Partner for interaction events.
    pub partner: Option<usize>,
    /// Time until the event, in the primary particle's frame.
    pub dt: f64,
    /// What kind of contact this is predicted to be.
    pub kind: EventKind,
    /// Who predicted it.
    pub source: EventSource,
    /// Primary particle's generation counter at predict time.
    pub counter: u32,
    /// Partner's generation counter at predict time.
    pub partner_counter: u32,
}

impl Event {
    /// A "no event" placeholder at infinite time.
    #[must_use]
    pub fn none(particle: usize, source: EventSource) -> Self {
        Self {
            particle,
            partner: None,
            dt: f64::INFINITY,
            kind: EventKind::NONE,
            source,
            counter: 0,
            partner_counter: 0,
        }
    }

    /// True when the event will never fire.
    #[must_use]
    pub fn is_none(&self) -> bool {
        !self.dt.is_finite() || self.kind == EventKind::NONE
    }
}

/// Change record for a single particle: velocities before and after, and
/// the kinetic/internal energy deltas.
#[derive(Clone, Copy, Debug)]
pub struct ParticleEventData {
    /// Affected particle.
    pub particle: usize,
    /// Event kind after resolution (may differ from the prediction, e.g.
    /// a failed well crossing becomes `BOUNCE`).
    pub kind: EventKind,
    /// Velocity before the impulse.
    pub old_velocity: Vec3,
    /// Velocity after the impulse.
    pub new_velocity: Vec3,
    /// Kinetic energy change.
    pub delta_ke: f64,
    /// Internal (potential) energy change.
    pub delta_u: f64,
}

impl ParticleEventData {
    /// Builds a record from before/after velocities and the mass.
    #[must_use]
    pub fn new(particle: usize, kind: EventKind, old_velocity: Vec3, new_velocity: Vec3,
        mass: f64) -> Self {
        Self {
            particle,
            kind,
            old_velocity,
            new_velocity,
            delta_ke: 0.5 * mass * (new_velocity.nrm2() - old_velocity.nrm2()),
            delta_u: 0.0,
        }
    }
}

/// Change record for a pair event.
#[derive(Clone, Copy, Debug)]
pub struct PairEventData {
    /// First particle's record.
    pub particle1: ParticleEventData,
    /// Second particle's record.
    pub particle2: ParticleEventData,
    /// Separation at contact (minimum image).
    pub rij: Vec3,
    /// Relative velocity before the impulse.
    pub vij_old: Vec3,
    /// `rij . vij` before the impulse.
    pub rvdot: f64,
    /// Momentum transferred from particle 2 to particle 1.
    pub impulse: Vec3,
    /// Resolved event kind.
    pub kind: EventKind,
}

impl PairEventData {
    /// Net kinetic energy change of this pair event.
    #[must_use]
    pub fn total_delta_ke(&self) -> f64 {
        self.particle1.delta_ke + self.particle2.delta_ke
    }
}

/// The full change set of one executed event: any number of one-particle
/// and pair changes. This is what observers receive.
#[derive(Clone, Debug, Default)]
pub struct NEventData {
    /// Single-particle changes.
    pub particles: Vec<ParticleEventData>,
    /// Pair changes.
    pub pairs: Vec<PairEventData>,
}

impl NEventData {
    /// Change set holding one single-particle record.
    #[must_use]
    pub fn single(data: ParticleEventData) -> Self {
        Self {
            particles: vec![data],
            pairs: Vec::new(),
        }
    }

    /// Change set holding one pair record.
    #[must_use]
    pub fn pair(data: PairEventData) -> Self {
        Self {
            particles: Vec::new(),
            pairs: vec![data],
        }
    }

    /// Ids of every particle touched by this event.
    pub fn affected(&self) -> impl Iterator<Item = usize> + '_ {
        self.particles
            .iter()
            .map(|p| p.particle)
            .chain(self.pairs.iter().flat_map(|p| {
                [p.particle1.particle, p.particle2.particle]
            }))
    }

    /// Net kinetic energy change of the whole event.
    #[must_use]
    pub fn total_delta_ke(&self) -> f64 {
        self.particles.iter().map(|p| p.delta_ke).sum::<f64>()
            + self
                .pairs
                .iter()
                .map(|p| p.particle1.delta_ke + p.particle2.delta_ke)
                .sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_ke_from_velocities() {
        let data = ParticleEventData::new(
            0,
            EventKind::WALL,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            2.0,
        );
        // 0.5 * 2 * (1 - 4)
        assert_eq!(data.delta_ke, -3.0);
    }

    #[test]
    fn none_event_never_fires() {
        let ev = Event::none(3, EventSource::Interaction(0));
        assert!(ev.is_none());
    }
}
