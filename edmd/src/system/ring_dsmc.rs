//! The ring-polymer DSMC operator: a T(1,2) operator over adjacent
//! partners in a sequence range and a T(1,3) operator over non-adjacent
//! ones, run in the same step.

use super::{SystemDirective, SystemKind};
use crate::dynamics::Liouvillean;
use crate::error::Result;
use crate::event::{EventKind, NEventData};
use crate::global::Global;
use crate::interaction::Interaction;
use crate::local::Local;
use crate::ranges::ParticleRange;
use crate::scheduler::Scheduler;
use crate::simulation::World;
use crate::vector::{Vec3, NDIM};
use serde::{Deserialize, Serialize};

/// The paired DSMC operators.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RingDsmc {
    name: String,
    /// Sequence range; consecutive id pairs `(2k, 2k+1)` are partners.
    range: ParticleRange,
    /// Operator time step.
    pub tstep: f64,
    /// Enhancement factor of the T(1,2) operator.
    pub chi12: f64,
    /// Enhancement factor of the T(1,3) operator.
    pub chi13: f64,
    /// Artificial contact diameter.
    pub diameter: f64,
    /// Elasticity of accepted collisions.
    pub elasticity: f64,
    /// Running maxima of the acceptance probabilities.
    pub max_prob12: f64,
    /// As above for T(1,3).
    pub max_prob13: f64,
    factor12: f64,
    factor13: f64,
    /// Accepted T(1,2) collisions.
    pub n12: u64,
    /// Accepted T(1,3) collisions.
    pub n13: u64,
    dt: f64,
}

impl RingDsmc {
    /// Builds the operator pair.
    #[must_use]
    pub fn new(name: String, range: ParticleRange, tstep: f64, chi12: f64, chi13: f64,
        diameter: f64, elasticity: f64) -> Self {
        Self {
            name,
            range,
            tstep,
            chi12,
            chi13,
            diameter,
            elasticity,
            max_prob12: 0.0,
            max_prob13: 0.0,
            factor12: 0.0,
            factor13: 0.0,
            n12: 0,
            n13: 0,
            dt: f64::INFINITY,
        }
    }

    fn random_contact(&self, world: &mut World) -> Vec3 {
        let mut rij = Vec3::zero();
        for dim in 0..NDIM {
            rij[dim] = world.sampler.standard_normal();
        }
        rij * (self.diameter / rij.nrm())
    }

    fn candidate_count(world: &mut World, expectation: f64) -> u64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut n = expectation.trunc() as u64;
        if world.sampler.below(expectation.fract()) {
            n += 1;
        }
        n
    }

    #[allow(clippy::too_many_arguments)]
    fn collide(&mut self, world: &mut World, scheduler: &mut Scheduler,
        interactions: &[Interaction], locals: &[Local], globals: &[Global], p1: usize,
        p2: usize, pair_op: bool, result: &mut NEventData) {
        world.update_pair(p1, p2);
        let rij = self.random_contact(world);

        let max_prob = if pair_op { &mut self.max_prob12 } else { &mut self.max_prob13 };
        let factor = if pair_op { self.factor12 } else { self.factor13 };
        let accepted = {
            let (particles, sampler, liouvillean) =
                (&world.particles, &mut world.sampler, &world.liouvillean);
            liouvillean.dsmc_spheres_test(&particles[p1], &particles[p2], rij, max_prob,
                factor, sampler)
        };

        if let Some(pd) = accepted {
            if pair_op {
                self.n12 += 1;
            } else {
                self.n13 += 1;
            }
            let (m1, m2) = (world.mass_of(p1), world.mass_of(p2));
            let data = {
                let (_, part1, part2) = world.liouvillean_and_pair(p1, p2);
                Liouvillean::dsmc_spheres_run(part1, part2, m1, m2, self.elasticity, &pd)
            };
            scheduler.full_update(world, interactions, locals, globals, p1);
            scheduler.full_update(world, interactions, locals, globals, p2);
            result.pairs.push(data);
        }
    }
}

impl SystemKind for RingDsmc {
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
        self.dt = self.tstep;
        let ids = self.range.ids(world.particles.len());
        let mut result = NEventData::default();

        // T(1,2): partners are the consecutive pairs of the sequence.
        #[allow(clippy::cast_precision_loss)]
        let n12 = Self::candidate_count(world, self.max_prob12 * ids.len() as f64);
        for _ in 0..n12 {
            let pair = world.sampler.index(ids.len() / 2);
            let (p1, p2) = (ids[2 * pair], ids[2 * pair + 1]);
            self.collide(world, scheduler, interactions, locals, globals, p1, p2, true,
                &mut result);
        }

        // T(1,3): any non-partner pair.
        #[allow(clippy::cast_precision_loss)]
        let n13 = Self::candidate_count(world, self.max_prob13 * ids.len() as f64);
        for _ in 0..n13 {
            let first = world.sampler.index(ids.len());
            let partner = first ^ 1;
            let mut second = world.sampler.index(ids.len());
            while second == first || second == partner {
                second = world.sampler.index(ids.len());
            }
            self.collide(world, scheduler, interactions, locals, globals, ids[first],
                ids[second], false, &mut result);
        }

        Ok((result, SystemDirective::None))
    }

    fn initialise(&mut self, world: &mut World, _interactions: &[Interaction],
        _globals: &[Global], _self_id: usize) {
        let ids = self.range.ids(world.particles.len());
        assert!(ids.len() % 2 == 0,
            "the ring DSMC range must hold a whole number of partner pairs");

        self.dt = self.tstep;
        let volume = world.boundary.primary_image.x
            * world.boundary.primary_image.y
            * world.boundary.primary_image.z;
        #[allow(clippy::cast_precision_loss)]
        {
            let base = ids.len() as f64 * self.diameter * std::f64::consts::PI
                * self.tstep / volume;
            self.factor12 = base * self.chi12;
            self.factor13 = base * self.chi13;
        }

        if self.max_prob12 == 0.0 {
            for _ in 0..1000 {
                let pair = world.sampler.index(ids.len() / 2);
                let (p1, p2) = (ids[2 * pair], ids[2 * pair + 1]);
                let rij = self.random_contact(world);
                let (particles, sampler, liouvillean) =
                    (&world.particles, &mut world.sampler, &world.liouvillean);
                liouvillean.dsmc_spheres_test(&particles[p1], &particles[p2], rij,
                    &mut self.max_prob12, self.factor12, sampler);
            }
        }
        if self.max_prob13 == 0.0 {
            for _ in 0..1000 {
                let first = world.sampler.index(ids.len());
                let partner = first ^ 1;
                let mut second = world.sampler.index(ids.len());
                while second == first || second == partner {
                    second = world.sampler.index(ids.len());
                }
                let rij = self.random_contact(world);
                let (particles, sampler, liouvillean) =
                    (&world.particles, &mut world.sampler, &world.liouvillean);
                liouvillean.dsmc_spheres_test(&particles[ids[first]],
                    &particles[ids[second]], rij, &mut self.max_prob13, self.factor13,
                    sampler);
            }
        }
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::DSMC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::n_particle_world;

    #[test]
    fn both_operators_run() {
        let mut world = n_particle_world(8);
        for id in 0..8 {
            world.particles[id].velocity = Vec3::new(
                world.sampler.standard_normal(),
                world.sampler.standard_normal(),
                world.sampler.standard_normal(),
            );
        }

        let mut ring =
            RingDsmc::new("ring".into(), ParticleRange::All, 0.5, 1.0, 1.0, 1.0, 1.0);
        ring.initialise(&mut world, &[], &[], 0);

        let mut scheduler = Scheduler::new(8);
        for _ in 0..50 {
            ring.run_event(&mut world, &mut scheduler, &[], &[], &[]).unwrap();
        }
        // With these densities some collisions of each kind occurred.
        assert!(ring.n12 + ring.n13 > 0);
    }
}
