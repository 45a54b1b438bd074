//! The event queue: a min-heap keyed on absolute fire time with
//! per-particle generation counters for lazy invalidation. Deleting the
//! events of a changed particle is a counter bump; stale entries are
//! discarded when they surface.

use crate::event::Event;
use crate::global::{find_cells, Global, GlobalKind};
use crate::interaction::{governing, Interaction, InteractionKind};
use crate::local::{Local, LocalKind};
use crate::simulation::World;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One queue entry: the absolute fire time, a tie-breaking sequence
/// number and the event payload with its captured counters.
#[derive(Clone, Debug)]
struct QueueEntry {
    time: f64,
    seq: u64,
    event: Event,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ties break by particle id, then insertion order. Reversed so
        // the std max-heap pops the earliest entry.
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.event.particle.cmp(&other.event.particle))
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

/// The scheduler's queue and bookkeeping.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<QueueEntry>,
    counters: Vec<u32>,
    seq: u64,
    interaction_rejections: u64,
    local_rejections: u64,
}

impl Scheduler {
    /// Builds an empty scheduler for `n_particles`.
    #[must_use]
    pub fn new(n_particles: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            counters: vec![0; n_particles],
            seq: 0,
            interaction_rejections: 0,
            local_rejections: 0,
        }
    }

    /// Current generation counter of a particle.
    #[must_use]
    pub fn counter(&self, particle: usize) -> u32 {
        self.counters[particle]
    }

    /// Invalidates every queued event owned by `particle`.
    pub fn bump(&mut self, particle: usize) {
        self.counters[particle] = self.counters[particle].wrapping_add(1);
    }

    /// Events re-predicted and discarded at fire time because their
    /// interaction no longer agreed.
    #[must_use]
    pub fn interaction_rejections(&self) -> u64 {
        self.interaction_rejections
    }

    /// As above, for locals.
    #[must_use]
    pub fn local_rejections(&self) -> u64 {
        self.local_rejections
    }

    pub(crate) fn count_interaction_rejection(&mut self) {
        self.interaction_rejections += 1;
    }

    pub(crate) fn count_local_rejection(&mut self) {
        self.local_rejections += 1;
    }

    /// Number of live entries (including stale ones not yet discarded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when no entries are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn is_valid(&self, event: &Event) -> bool {
        if self.counters[event.particle] != event.counter {
            return false;
        }
        match event.partner {
            Some(partner) => self.counters[partner] == event.partner_counter,
            None => true,
        }
    }

    /// Queues an event predicted at the current system time. The
    /// participants' generation counters are captured here.
    pub fn push(&mut self, world: &World, mut event: Event) {
        if event.is_none() {
            return;
        }
        if event.dt < -1e-9 {
            log::warn!(
                "event for particle {} scheduled {} in the past",
                event.particle,
                -event.dt
            );
        }

        event.counter = self.counters[event.particle];
        if let Some(partner) = event.partner {
            event.partner_counter = self.counters[partner];
        }

        self.seq += 1;
        self.heap.push(QueueEntry {
            time: world.time + event.dt.max(0.0),
            seq: self.seq,
            event,
        });
    }

    /// Fire time of the earliest valid entry, discarding stale ones.
    pub fn next_valid_time(&mut self, _world: &World) -> Option<f64> {
        while let Some(top) = self.heap.peek() {
            if self.is_valid(&top.event) {
                return Some(top.time);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops the earliest valid entry.
    pub fn pop_valid(&mut self, world: &World) -> Option<Event> {
        self.next_valid_time(world)?;
        self.heap.pop().map(|entry| entry.event)
    }

    /// Queues the next event of the governed pair `{i, j}`, if any
    /// interaction claims it.
    pub fn add_pair_event(&mut self, world: &World, interactions: &[Interaction], i: usize,
        j: usize) {
        if let Some(id) = governing(interactions, i, j) {
            let event = interactions[id].get_event(world, id, i, j);
            self.push(world, event);
        }
    }

    /// Queues the particle's next event against local `lid`, respecting
    /// the local's particle range.
    pub fn add_local_event(&mut self, world: &World, locals: &[Local], particle: usize,
        lid: usize) {
        let local = &locals[lid];
        if local.range().contains(particle, world.particles.len()) {
            let event = local.get_event(world, lid, particle);
            self.push(world, event);
        }
    }

    /// Queues every candidate event of `particle`: all globals, the
    /// locals of its cell, and pair events against its neighbourhood
    /// (every other particle when no cell list is configured).
    pub fn add_events(&mut self, world: &World, interactions: &[Interaction],
        locals: &[Local], globals: &[Global], particle: usize) {
        for (gid, global) in globals.iter().enumerate() {
            let event = global.get_event(world, gid, particle);
            self.push(world, event);
        }

        if let Some(cells) = find_cells(globals) {
            for &lid in cells.locals_of(particle) {
                self.add_local_event(world, locals, particle, lid);
            }
            cells.neighborhood(particle, |other| {
                self.add_pair_event(world, interactions, particle, other);
            });
        } else {
            // The dumb scheduler: every local, every pair.
            for lid in 0..locals.len() {
                self.add_local_event(world, locals, particle, lid);
            }
            for other in 0..world.particles.len() {
                if other != particle {
                    self.add_pair_event(world, interactions, particle, other);
                }
            }
        }
    }

    /// Streams the particle to now, invalidates its queued events and
    /// re-predicts them.
    pub fn full_update(&mut self, world: &mut World, interactions: &[Interaction],
        locals: &[Local], globals: &[Global], particle: usize) {
        world.update_particle(particle);
        self.bump(particle);
        self.add_events(world, interactions, locals, globals, particle);
    }

    /// Drops every queued entry and re-predicts the whole system.
    pub fn rebuild(&mut self, world: &mut World, interactions: &[Interaction],
        locals: &[Local], globals: &[Global]) {
        self.heap.clear();
        for particle in 0..world.particles.len() {
            self.full_update(world, interactions, locals, globals, particle);
        }
    }
}
