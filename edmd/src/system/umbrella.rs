//! Umbrella sampling: a discretized harmonic bias `a (r - b)^2` on the
//! separation of two particle groups, realized as well steps of height
//! `del_u` crossed by multibody well events.

use super::{SystemDirective, SystemKind};
use crate::dynamics::{Liouvillean, PairData};
use crate::error::Result;
use crate::event::{EventKind, NEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::ranges::ParticleRange;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// The umbrella potential system.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Umbrella {
    name: String,
    range1: ParticleRange,
    range2: ParticleRange,
    /// Stiffness of the bias.
    pub a: f64,
    /// Centre of the bias.
    pub b: f64,
    /// Energy discretization step.
    pub del_u: f64,
    /// Current discrete level; negative inside `b`, positive outside.
    pub level: i64,
    level_set: bool,
    level_center: i64,
    dt: f64,
    next_kind: EventKind,
}

impl Umbrella {
    /// Builds the system; the level is measured from geometry at
    /// initialization unless persisted.
    #[must_use]
    pub fn new(name: String, range1: ParticleRange, range2: ParticleRange, a: f64,
        b: f64, del_u: f64, level: Option<i64>) -> Self {
        Self {
            name,
            range1,
            range2,
            a,
            b,
            del_u,
            level: level.unwrap_or(0),
            level_set: level.is_some(),
            level_center: 0,
            dt: f64::INFINITY,
            next_kind: EventKind::NONE,
        }
    }

    /// Centre-of-mass pair data of the two groups.
    fn com_pair_data(&self, world: &World) -> PairData {
        let com = |range: &ParticleRange| {
            let ids = range.ids(world.particles.len());
            let mut pos = Vec3::zero();
            let mut vel = Vec3::zero();
            let mut total = 0.0;
            for id in ids {
                let (p, v) = world.liouvillean.particle_at(&world.particles[id],
                    world.time);
                let mass = world.mass_of(id);
                pos += p * mass;
                vel += v * mass;
                total += mass;
            }
            (pos / total, vel / total)
        };

        let (pos1, vel1) = com(&self.range1);
        let (pos2, vel2) = com(&self.range2);
        let mut rij = pos1 - pos2;
        let mut vij = vel1 - vel2;
        world.boundary.apply_with_velocity(&mut rij, &mut vij);
        PairData::new(rij, vij)
    }

    /// Recomputes the countdown to the next step crossing from the
    /// current level's shell radii.
    fn recalculate(&mut self, world: &World) {
        let pd = self.com_pair_data(world);
        self.dt = f64::INFINITY;
        self.next_kind = EventKind::NONE;

        #[allow(clippy::cast_precision_loss)]
        let level = self.level as f64;

        if self.level == self.level_center {
            // The innermost step spans r = 0: only an escape exists.
            let mut r_max = self.b - (level.abs() * self.del_u / self.a).sqrt();
            if self.b == 0.0 {
                r_max = self.b + ((level + 1.0) * self.del_u / self.a).sqrt();
            }
            if let Some(dt) = world.liouvillean.sphere_sphere_out_root(&pd,
                r_max * r_max, true, true, world.time)
            {
                self.dt = dt;
                self.next_kind = EventKind::WELL_OUT;
            }
            return;
        }

        let (r_min, r_max) = if self.level == 0 {
            // Sitting on the minimum of the bias.
            (
                self.b - (self.del_u / self.a).sqrt(),
                self.b + (self.del_u / self.a).sqrt(),
            )
        } else if self.level < 0 {
            (
                self.b - ((-level + 1.0) * self.del_u / self.a).sqrt(),
                self.b - (-level * self.del_u / self.a).sqrt(),
            )
        } else {
            (
                self.b + (level * self.del_u / self.a).sqrt(),
                self.b + ((level + 1.0) * self.del_u / self.a).sqrt(),
            )
        };

        if let Some(dt) = world.liouvillean.sphere_sphere_in_root(&pd, r_min * r_min,
            true, true, world.time)
        {
            self.dt = dt;
            self.next_kind = EventKind::WELL_IN;
        } else if let Some(dt) = world.liouvillean.sphere_sphere_out_root(&pd,
            r_max * r_max, true, true, world.time)
        {
            self.dt = dt;
            self.next_kind = EventKind::WELL_OUT;
        }
    }

    fn members(&self, world: &World) -> (Vec<usize>, Vec<usize>) {
        (
            self.range1.ids(world.particles.len()),
            self.range2.ids(world.particles.len()),
        )
    }
}

impl SystemKind for Umbrella {
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
        let (ids1, ids2) = self.members(world);
        for &id in ids1.iter().chain(&ids2) {
            world.update_particle(id);
        }

        // Does kinetic energy fall crossing this step? Stepping away
        // from the level centre climbs the bias.
        let (ke_down, new_level) = if self.level == 0 {
            (true, if self.next_kind == EventKind::WELL_OUT { 1 } else { -1 })
        } else if self.next_kind == EventKind::WELL_OUT {
            (self.level > 0, self.level + 1)
        } else {
            (self.level < 0, self.level - 1)
        };

        let delta_ke = if ke_down { -self.del_u } else { self.del_u };

        let masses: Vec<f64> = (0..world.particles.len())
            .map(|id| world.mass_of(id))
            .collect();
        let boundary = world.boundary;
        let mut kind = EventKind::NONE;
        let data = Liouvillean::multibody_well_event(
            &mut world.particles,
            &masses,
            &ids1,
            &ids2,
            delta_ke,
            |r, v| boundary.apply_with_velocity(r, v),
            &mut kind,
        );

        if kind != EventKind::BOUNCE {
            self.level = new_level;
        }

        for &id in ids1.iter().chain(&ids2) {
            scheduler.full_update(world, interactions, locals, globals, id);
        }
        self.recalculate(world);

        Ok((data, SystemDirective::None))
    }

    fn initialise(&mut self, world: &mut World, _interactions: &[Interaction],
        _globals: &[Global], _self_id: usize) {
        #[allow(clippy::cast_possible_truncation)]
        {
            self.level_center = (-self.a * self.b * self.b / self.del_u) as i64;
        }

        if !self.level_set {
            let pd = self.com_pair_data(world);
            let r = pd.r2.sqrt();
            #[allow(clippy::cast_possible_truncation)]
            let mut level = (self.a * (r - self.b) * (r - self.b) / self.del_u) as i64;
            if r < self.b {
                level = -level;
            }
            self.level = level;
            self.level_set = true;
        }

        self.recalculate(world);
    }

    fn particles_updated(&mut self, world: &World, data: &NEventData) {
        let n = world.particles.len();
        let touched = data.affected().any(|id| {
            self.range1.contains(id, n) || self.range2.contains(id, n)
        });
        if touched {
            self.recalculate(world);
        }
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::UMBRELLA
    }
}
