//! Per-event observers. The scheduler fires every registered observer
//! after each event with the event descriptor and its full change set;
//! output writers subscribe here.

use crate::event::{Event, EventKind, NEventData};
use crate::simulation::World;
use serde::Serialize;
use std::collections::BTreeMap;

/// An event observer.
pub trait EventObserver {
    /// Called after every executed event.
    fn event_update(&mut self, world: &World, event: &Event, data: &NEventData);
}

/// The observer list owned by the simulation.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Box<dyn EventObserver>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ObserverRegistry {
    /// Registers an observer.
    pub fn register(&mut self, observer: Box<dyn EventObserver>) {
        self.observers.push(observer);
    }

    /// Fans an event out to every observer.
    pub fn notify(&mut self, world: &World, event: &Event, data: &NEventData) {
        for observer in &mut self.observers {
            observer.event_update(world, event, data);
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// True when no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// The accumulated statistics of a run: per-kind event counts and the
/// energy bookkeeping behind the output document.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunStats {
    /// Executed events per kind tag.
    pub events_by_kind: BTreeMap<String, u64>,
    /// Net kinetic energy change booked through events.
    pub total_delta_ke: f64,
    /// Net internal energy change booked through events.
    pub total_delta_u: f64,
    /// Momentum transferred through pair impulses, by magnitude.
    pub total_impulse: f64,
}

impl EventObserver for RunStats {
    fn event_update(&mut self, _world: &World, event: &Event, data: &NEventData) {
        if event.kind != EventKind::NONE {
            *self
                .events_by_kind
                .entry(format!("{:?}", event.kind))
                .or_insert(0) += 1;
        }

        self.total_delta_ke += data.total_delta_ke();
        for record in &data.particles {
            self.total_delta_u += record.delta_u;
        }
        for pair in &data.pairs {
            self.total_delta_u += pair.particle1.delta_u + pair.particle2.delta_u;
            self.total_impulse += pair.impulse.nrm();
        }
    }
}

/// A shared-cell wrapper so the caller can keep reading the stats while
/// the registry owns the observer.
pub type SharedStats = std::rc::Rc<std::cell::RefCell<RunStats>>;

/// An adaptor registering a shared [`RunStats`].
pub struct SharedStatsObserver(pub SharedStats);

impl EventObserver for SharedStatsObserver {
    fn event_update(&mut self, world: &World, event: &Event, data: &NEventData) {
        self.0.borrow_mut().event_update(world, event, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::two_particle_world;
    use crate::event::EventSource;

    #[test]
    fn stats_count_event_kinds() {
        let world = two_particle_world(3.0, 1.0);
        let mut registry = ObserverRegistry::default();
        let stats: SharedStats = SharedStats::default();
        registry.register(Box::new(SharedStatsObserver(stats.clone())));

        let event = Event {
            particle: 0,
            partner: Some(1),
            dt: 0.0,
            kind: EventKind::CORE,
            source: EventSource::Interaction(0),
            counter: 0,
            partner_counter: 0,
        };
        registry.notify(&world, &event, &NEventData::default());
        registry.notify(&world, &event, &NEventData::default());

        assert_eq!(stats.borrow().events_by_kind.get("CORE"), Some(&2));
    }
}
