//! The DSMC collision operator: at a fixed time step, a self-calibrated
//! number of candidate pairs is drawn and stochastically collided at an
//! artificial contact separation.

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

/// A DSMC sphere operator over two particle ranges.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DsmcSpheres {
    name: String,
    range1: ParticleRange,
    range2: ParticleRange,
    /// Operator time step.
    pub tstep: f64,
    /// Pair correlation enhancement factor.
    pub chi: f64,
    /// Artificial contact diameter.
    pub diameter: f64,
    /// Elasticity of accepted collisions.
    pub elasticity: f64,
    /// Running maximum acceptance probability; self-calibrating.
    pub max_prob: f64,
    factor: f64,
    dt: f64,
}

impl DsmcSpheres {
    /// Builds the operator.
    #[must_use]
    pub fn new(name: String, range1: ParticleRange, range2: ParticleRange, tstep: f64,
        chi: f64, diameter: f64, elasticity: f64) -> Self {
        Self {
            name,
            range1,
            range2,
            tstep,
            chi,
            diameter,
            elasticity,
            max_prob: 0.0,
            factor: 0.0,
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

    fn draw_pair(&self, world: &mut World, ids1: &[usize], ids2: &[usize])
        -> (usize, usize) {
        let p1 = ids1[world.sampler.index(ids1.len())];
        let mut p2 = ids2[world.sampler.index(ids2.len())];
        while p2 == p1 {
            p2 = ids2[world.sampler.index(ids2.len())];
        }
        (p1, p2)
    }
}

impl SystemKind for DsmcSpheres {
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

        let ids1 = self.range1.ids(world.particles.len());
        let ids2 = self.range2.ids(world.particles.len());

        // Expected number of candidates, with the fractional part drawn
        // as a Bernoulli trial.
        #[allow(clippy::cast_precision_loss)]
        let expectation = 0.5 * self.max_prob * ids1.len() as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut n_max = expectation.trunc() as u64;
        if world.sampler.below(expectation.fract()) {
            n_max += 1;
        }

        let mut result = NEventData::default();
        for _ in 0..n_max {
            let (p1, p2) = self.draw_pair(world, &ids1, &ids2);
            world.update_pair(p1, p2);

            let rij = self.random_contact(world);
            let accepted = {
                let (particles, sampler, liouvillean) =
                    (&world.particles, &mut world.sampler, &world.liouvillean);
                liouvillean.dsmc_spheres_test(&particles[p1], &particles[p2], rij,
                    &mut self.max_prob, self.factor, sampler)
            };

            if let Some(pd) = accepted {
                let (m1, m2) = (world.mass_of(p1), world.mass_of(p2));
                let data = {
                    let (_, part1, part2) = world.liouvillean_and_pair(p1, p2);
                    Liouvillean::dsmc_spheres_run(part1, part2, m1, m2, self.elasticity,
                        &pd)
                };
                scheduler.full_update(world, interactions, locals, globals, p1);
                scheduler.full_update(world, interactions, locals, globals, p2);
                result.pairs.push(data);
            }
        }

        Ok((result, SystemDirective::None))
    }

    fn initialise(&mut self, world: &mut World, _interactions: &[Interaction],
        _globals: &[Global], _self_id: usize) {
        self.dt = self.tstep;

        let ids1 = self.range1.ids(world.particles.len());
        let ids2 = self.range2.ids(world.particles.len());
        #[allow(clippy::cast_precision_loss)]
        {
            let volume = world.boundary.primary_image.x
                * world.boundary.primary_image.y
                * world.boundary.primary_image.z;
            self.factor = 4.0 * ids2.len() as f64 * self.diameter * std::f64::consts::PI
                * self.chi * self.tstep
                / volume;
        }

        // Calibrate the maximum acceptance probability with a quick
        // sampling pass when none was persisted.
        if self.max_prob == 0.0 {
            for _ in 0..1000 {
                let (p1, p2) = self.draw_pair(world, &ids1, &ids2);
                let rij = self.random_contact(world);
                let (particles, sampler, liouvillean) =
                    (&world.particles, &mut world.sampler, &world.liouvillean);
                liouvillean.dsmc_spheres_test(&particles[p1], &particles[p2], rij,
                    &mut self.max_prob, self.factor, sampler);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let pairs_per_step = 0.5 * ids1.len() as f64 * self.max_prob;
        if pairs_per_step < 2.0 {
            log::warn!("DSMC {}: low collision probability ({pairs_per_step:.3} \
                 candidate pairs per step)", self.name);
        }
    }

    fn kind_tag(&self) -> EventKind {
        EventKind::DSMC
    }
}
