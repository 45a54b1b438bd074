//! Impulse resolvers. Each takes particles already streamed to the event
//! time, applies the momentum transfer appropriate to the active flow and
//! returns the change records the observers consume.

use super::{Liouvillean, PairData};
use crate::event::{EventKind, NEventData, PairEventData, ParticleEventData};
use crate::particle::{Orientation, Particle};
use crate::sampler::Sampler;
use crate::vector::{Vec3, NDIM};

/// Outcome of a well-boundary crossing attempt.
fn well_kind(delta_ke: f64) -> EventKind {
    if delta_ke < 0.0 {
        EventKind::WELL_KEDOWN
    } else {
        EventKind::WELL_KEUP
    }
}

impl Liouvillean {
    /// Elasticity actually used for a contact under gravity: contacts
    /// slower than `elastic_v` along the normal (or along gravity when a
    /// static particle is involved), and particles inside their tc
    /// window, resolve elastically.
    fn effective_elasticity(&mut self, e: f64, pd: &PairData, p1: &Particle, p2: &Particle,
        sys_time: f64) -> f64 {
        let Self::NewtonianGravity { gravity, elastic_v, tc, tc_last } = self else {
            return e;
        };
        let mut e = e;

        if *elastic_v > 0.0 {
            let vnrm = (pd.rvdot / pd.rij.nrm()).abs();
            if vnrm < *elastic_v {
                e = 1.0;
            }
            if !p1.is_dynamic() || !p2.is_dynamic() {
                let gnrm = gravity.nrm();
                if gnrm > 0.0 && (pd.vij.dot(gravity) / gnrm).abs() < *elastic_v {
                    e = 1.0;
                }
            }
        }

        if let Some(tc) = *tc {
            if tc_last.len() <= p1.id.max(p2.id) {
                tc_last.resize(p1.id.max(p2.id) + 1, f64::NEG_INFINITY);
            }
            if sys_time - tc_last[p1.id] < tc || sys_time - tc_last[p2.id] < tc {
                e = 1.0;
            }
            tc_last[p1.id] = sys_time;
            tc_last[p2.id] = sys_time;
        }

        e
    }

    /// Elastic/inelastic impulse between two smooth spheres at contact.
    /// Mass policies: an infinite (zero-property) mass reflects the
    /// finite partner; two infinite masses collide as equal unit masses
    /// but the recorded momentum transfer is zeroed.
    #[allow(clippy::too_many_arguments)]
    pub fn smooth_spheres_coll(&mut self, p1: &mut Particle, p2: &mut Particle, m1: f64,
        m2: f64, e: f64, d2: f64, pd: &PairData, kind: EventKind, sys_time: f64)
        -> PairEventData {
        let e = self.effective_elasticity(e, pd, p1, p2, sys_time);

        // Compression grows the contact radially between the prediction
        // and the impulse.
        let growth = self.growth_rate() * (d2 * pd.r2).sqrt();

        let old1 = p1.velocity;
        let old2 = p2.velocity;
        let mut m1 = m1;
        let mut m2 = m2;

        let impulse;
        if m1 == f64::INFINITY && m2 != f64::INFINITY {
            impulse = pd.rij * ((1.0 + e) * m2 * (pd.rvdot - growth) / pd.r2);
            p2.velocity += impulse / m2;
        } else if m2 == f64::INFINITY && m1 != f64::INFINITY {
            impulse = pd.rij * ((1.0 + e) * m1 * (pd.rvdot - growth) / pd.r2);
            p1.velocity -= impulse / m1;
        } else {
            let inf_inf = m1 == f64::INFINITY && m2 == f64::INFINITY;
            if inf_inf {
                m1 = 1.0;
                m2 = 1.0;
            }
            let mu = m1 * m2 / (m1 + m2);
            let dp = pd.rij * ((1.0 + e) * mu * (pd.rvdot - growth) / pd.r2);
            p1.velocity -= dp / m1;
            p2.velocity += dp / m2;
            // Infinite pairs transfer no recordable momentum.
            impulse = if inf_inf { Vec3::zero() } else { dp };
        }

        PairEventData {
            particle1: ParticleEventData::new(p1.id, kind, old1, p1.velocity,
                if m1.is_finite() { m1 } else { 0.0 }),
            particle2: ParticleEventData::new(p2.id, kind, old2, p2.velocity,
                if m2.is_finite() { m2 } else { 0.0 }),
            rij: pd.rij,
            vij_old: pd.vij,
            rvdot: pd.rvdot,
            impulse,
            kind,
        }
    }

    /// Crossing of a well boundary with energy step `delta_ke` (positive
    /// when kinetic energy increases). Insufficient kinetic energy turns
    /// the crossing into a `BOUNCE`; exactly zero step is a `NON_EVENT`.
    #[allow(clippy::too_many_arguments)]
    pub fn sphere_well_event(&self, p1: &mut Particle, p2: &mut Particle, m1: f64, m2: f64,
        delta_ke: f64, d2: f64, pd: &PairData, internal_energy: f64) -> PairEventData {
        let mu = m1 * m2 / (m1 + m2);
        let old1 = p1.velocity;
        let old2 = p2.velocity;

        // The multicanonical flow biases the step by the deformation at
        // the entry and exit internal energies.
        let effective_dke = match self {
            Self::NewtonianMC { energy_step, deformation } => {
                let key = |u: f64| {
                    let v = u / energy_step;
                    // Round half away from zero, matching the table keys.
                    #[allow(clippy::cast_possible_truncation)]
                    let k = (v + 0.5 - f64::from(i8::from(v < 0.0))) as i64;
                    k
                };
                let mut dke = delta_ke;
                if let Some(shift) = deformation.get(&key(internal_energy)) {
                    dke -= shift;
                }
                if let Some(shift) = deformation.get(&key(internal_energy - delta_ke)) {
                    dke -= shift;
                }
                dke
            }
            _ => delta_ke,
        };

        let growth = self.growth_rate() * d2.sqrt();
        let (kind, impulse);

        if self.growth_rate() != 0.0 {
            // Compression resolves along the unit separation.
            let urij = pd.rij / pd.rij.nrm();
            let rvdot = urij.dot(&pd.vij);
            let sqrt_arg = (rvdot - growth).powi(2) + 2.0 * effective_dke / mu;
            if effective_dke < 0.0 && sqrt_arg < 0.0 {
                kind = EventKind::BOUNCE;
                impulse = urij * (2.0 * mu * (rvdot - growth));
            } else if effective_dke == 0.0 {
                kind = EventKind::NON_EVENT;
                impulse = Vec3::zero();
            } else {
                kind = well_kind(effective_dke);
                impulse = if rvdot < 0.0 {
                    urij * (2.0 * effective_dke / (growth + sqrt_arg.sqrt() - rvdot))
                } else {
                    urij * (-2.0 * effective_dke / (rvdot + sqrt_arg.sqrt()))
                };
            }
        } else {
            let sqrt_arg = pd.rvdot * pd.rvdot + 2.0 * pd.r2 * effective_dke / mu;
            if effective_dke < 0.0 && sqrt_arg < 0.0 {
                kind = EventKind::BOUNCE;
                impulse = pd.rij * (2.0 * mu * pd.rvdot / pd.r2);
            } else if effective_dke == 0.0 {
                kind = EventKind::NON_EVENT;
                impulse = Vec3::zero();
            } else {
                kind = well_kind(effective_dke);
                impulse = if pd.rvdot < 0.0 {
                    pd.rij * (2.0 * effective_dke / (sqrt_arg.sqrt() - pd.rvdot))
                } else {
                    pd.rij * (-2.0 * effective_dke / (pd.rvdot + sqrt_arg.sqrt()))
                };
            }
        }

        p1.velocity -= impulse / m1;
        p2.velocity += impulse / m2;

        let mut data1 = ParticleEventData::new(p1.id, kind, old1, p1.velocity, m1);
        let mut data2 = ParticleEventData::new(p2.id, kind, old2, p2.velocity, m2);
        if matches!(kind, EventKind::WELL_KEUP | EventKind::WELL_KEDOWN) {
            // The potential energy moves opposite to the kinetic step,
            // half booked on each participant.
            data1.delta_u = -0.5 * delta_ke;
            data2.delta_u = -0.5 * delta_ke;
        }

        PairEventData {
            particle1: data1,
            particle2: data2,
            rij: pd.rij,
            vij_old: pd.vij,
            rvdot: pd.rvdot,
            impulse,
            kind,
        }
    }

    /// Contact of two parallel axis-aligned cubes: the impulse acts along
    /// the axis of largest overlap-facing separation.
    #[allow(clippy::too_many_arguments)]
    pub fn parallel_cube_coll(p1: &mut Particle, p2: &mut Particle, m1: f64, m2: f64,
        e: f64, pd: &PairData, kind: EventKind) -> PairEventData {
        let mut dim = 0;
        for i in 1..NDIM {
            if pd.rij[dim].abs() < pd.rij[i].abs() {
                dim = i;
            }
        }

        let mu = m1 * m2 / (m1 + m2);
        let mut collvec = Vec3::zero();
        collvec[dim] = if pd.rij[dim] < 0.0 { -1.0 } else { 1.0 };

        let impulse = collvec * ((1.0 + e) * mu * collvec.dot(&pd.vij));

        let old1 = p1.velocity;
        let old2 = p2.velocity;
        p1.velocity -= impulse / m1;
        p2.velocity += impulse / m2;

        PairEventData {
            particle1: ParticleEventData::new(p1.id, kind, old1, p1.velocity, m1),
            particle2: ParticleEventData::new(p2.id, kind, old2, p2.velocity, m2),
            rij: pd.rij,
            vij_old: pd.vij,
            rvdot: pd.rvdot,
            impulse,
            kind,
        }
    }

    /// Resamples a particle's velocity from a Maxwell-Boltzmann at the
    /// temperature `sqrt_t^2` (the Andersen thermostat kick).
    pub fn random_gaussian_event(p: &mut Particle, sqrt_t: f64, mass: f64,
        sampler: &mut Sampler) -> ParticleEventData {
        let old = p.velocity;
        let factor = sqrt_t / mass.sqrt();
        for dim in 0..NDIM {
            p.velocity[dim] = sampler.standard_normal() * factor;
        }
        ParticleEventData::new(p.id, EventKind::GAUSSIAN, old, p.velocity, mass)
    }

    /// Specular wall reflection with elasticity `e`.
    pub fn run_wall_collision(p: &mut Particle, normal: Vec3, e: f64, mass: f64)
        -> ParticleEventData {
        let old = p.velocity;
        p.velocity -= normal * ((1.0 + e) * normal.dot(&p.velocity));
        ParticleEventData::new(p.id, EventKind::WALL, old, p.velocity, mass)
    }

    /// Thermalizing wall: tangential components resample from a Gaussian
    /// at `sqrt_t`, the outgoing normal component from the flux-weighted
    /// (Rayleigh) distribution.
    pub fn run_andersen_wall(p: &mut Particle, normal: Vec3, sqrt_t: f64, mass: f64,
        sampler: &mut Sampler) -> ParticleEventData {
        let old = p.velocity;
        let factor = sqrt_t / mass.sqrt();
        for dim in 0..NDIM {
            p.velocity[dim] = sampler.standard_normal() * factor;
        }
        let outgoing = sqrt_t * (-2.0 * (1.0 - sampler.uniform01()).ln() / mass).sqrt();
        p.velocity += normal * (outgoing - p.velocity.dot(&normal));
        ParticleEventData::new(p.id, EventKind::WALL, old, p.velocity, mass)
    }

    /// Reflection off a cylindrical wall: specular along the radial
    /// direction at the contact point.
    pub fn run_cylinder_collision(p: &mut Particle, origin: Vec3, axis: Vec3, e: f64,
        mass: f64) -> ParticleEventData {
        let mut radial = origin - p.position;
        radial -= axis * radial.dot(&axis);
        let radial = radial.normalized();

        let old = p.velocity;
        p.velocity -= radial * ((1.0 + e) * radial.dot(&p.velocity));
        ParticleEventData::new(p.id, EventKind::WALL, old, p.velocity, mass)
    }

    /// Rough-sphere contact: the normal impulse of the smooth case plus a
    /// tangential impulse exchanging translational and rotational motion
    /// with tangential elasticity `et`.
    #[allow(clippy::too_many_arguments)]
    pub fn rough_spheres_coll(p1: &mut Particle, p2: &mut Particle,
        o1: &mut Orientation, o2: &mut Orientation, m1: f64, m2: f64, inertia: f64,
        e: f64, et: f64, d2: f64, pd: &PairData) -> PairEventData {
        let mu = m1 * m2 / (m1 + m2);
        let mut impulse = pd.rij * ((1.0 + e) * mu * pd.rvdot / pd.r2);

        let eijn = pd.rij / pd.rij.nrm();
        let surface = (o1.angular_velocity + o2.angular_velocity).cross(&eijn)
            * (0.5 * d2.sqrt());
        let gij = pd.vij - surface;
        let gijt = eijn.cross(&gij).cross(&eijn);

        let jbar = inertia / (m1 * d2 * 0.25);
        impulse += gijt * (jbar * (1.0 - et) / (2.0 * (jbar + 1.0)));

        let ke1_before = 0.5 * m1 * p1.velocity.nrm2()
            + 0.5 * inertia * o1.angular_velocity.nrm2();
        let ke2_before = 0.5 * m2 * p2.velocity.nrm2()
            + 0.5 * inertia * o2.angular_velocity.nrm2();

        let old1 = p1.velocity;
        let old2 = p2.velocity;
        p1.velocity -= impulse / m1;
        p2.velocity += impulse / m2;

        let spin = eijn.cross(&gijt) * ((1.0 - et) / (d2.sqrt() * (jbar + 1.0)));
        o1.angular_velocity += spin;
        o2.angular_velocity += spin;

        let mut data1 =
            ParticleEventData::new(p1.id, EventKind::CORE, old1, p1.velocity, m1);
        data1.delta_ke = 0.5 * m1 * p1.velocity.nrm2()
            + 0.5 * inertia * o1.angular_velocity.nrm2()
            - ke1_before;
        let mut data2 =
            ParticleEventData::new(p2.id, EventKind::CORE, old2, p2.velocity, m2);
        data2.delta_ke = 0.5 * m2 * p2.velocity.nrm2()
            + 0.5 * inertia * o2.angular_velocity.nrm2()
            - ke2_before;

        PairEventData {
            particle1: data1,
            particle2: data2,
            rij: pd.rij,
            vij_old: pd.vij,
            rvdot: pd.rvdot,
            impulse,
            kind: EventKind::CORE,
        }
    }

    /// Rough wall: specular normal reflection plus tangential/rotational
    /// exchange, as the rough-sphere rule against an infinite mass.
    #[allow(clippy::too_many_arguments)]
    pub fn run_rough_wall(p: &mut Particle, o: &mut Orientation, normal: Vec3, e: f64,
        et: f64, radius: f64, mass: f64, inertia: f64) -> ParticleEventData {
        let jbar = inertia / (mass * radius * radius);
        let gij = p.velocity - o.angular_velocity.cross(&normal) * radius;
        let gijt = normal.cross(&gij).cross(&normal);

        let ke_before =
            0.5 * mass * p.velocity.nrm2() + 0.5 * inertia * o.angular_velocity.nrm2();

        let old = p.velocity;
        p.velocity -= normal * ((1.0 + e) * normal.dot(&p.velocity))
            + gijt * (jbar * (1.0 - et) / (jbar + 1.0));
        o.angular_velocity +=
            normal.cross(&gijt) * ((1.0 - et) / (radius * (jbar + 1.0)));

        let mut data = ParticleEventData::new(p.id, EventKind::WALL, old, p.velocity, mass);
        data.delta_ke = 0.5 * mass * p.velocity.nrm2()
            + 0.5 * inertia * o.angular_velocity.nrm2()
            - ke_before;
        data
    }

    /// Contact of two thin rods: impulse along the common perpendicular
    /// at the crossing points, exchanging translation and rotation.
    #[allow(clippy::too_many_arguments)]
    pub fn run_line_line_coll(p1: &mut Particle, p2: &mut Particle, o1: &mut Orientation,
        o2: &mut Orientation, mass: f64, inertia: f64, e: f64, length: f64, pd: &PairData)
        -> PairEventData {
        let shape = super::shapes::LinesShape::new(
            pd.rij,
            pd.vij,
            o1.angular_velocity,
            o2.angular_velocity,
            o1.director,
            o2.director,
            length,
        );

        let u_perp = shape.u1().cross(&shape.u2()).normalized();
        let (cp1, cp2) = shape.collision_points();

        // Relative velocity of the contact points.
        let vr = pd.vij + shape.w1().cross(&shape.u1()) * cp1
            - shape.w2().cross(&shape.u2()) * cp2;

        let impulse = u_perp
            * (vr.dot(&u_perp) * (1.0 + e)
                / (2.0 / mass + (cp1 * cp1 + cp2 * cp2) / inertia));

        let ke1_before =
            0.5 * mass * p1.velocity.nrm2() + 0.5 * inertia * o1.angular_velocity.nrm2();
        let ke2_before =
            0.5 * mass * p2.velocity.nrm2() + 0.5 * inertia * o2.angular_velocity.nrm2();

        let old1 = p1.velocity;
        let old2 = p2.velocity;
        p1.velocity -= impulse / mass;
        p2.velocity += impulse / mass;
        o1.angular_velocity -= shape.u1().cross(&impulse) * (cp1 / inertia);
        o2.angular_velocity += shape.u2().cross(&impulse) * (cp2 / inertia);

        let mut data1 = ParticleEventData::new(p1.id, EventKind::CORE, old1, p1.velocity, mass);
        data1.delta_ke = 0.5 * mass * p1.velocity.nrm2()
            + 0.5 * inertia * o1.angular_velocity.nrm2()
            - ke1_before;
        let mut data2 = ParticleEventData::new(p2.id, EventKind::CORE, old2, p2.velocity, mass);
        data2.delta_ke = 0.5 * mass * p2.velocity.nrm2()
            + 0.5 * inertia * o2.angular_velocity.nrm2()
            - ke2_before;

        PairEventData {
            particle1: data1,
            particle2: data2,
            rij: pd.rij,
            vij_old: pd.vij,
            rvdot: pd.rvdot,
            impulse,
            kind: EventKind::CORE,
        }
    }

    /// Contact of two dumbbells on the branch selected by the sign pair
    /// `(s1, s2)` of the directors. Impulse along the line of sphere
    /// centers, with the full rigid-body response of both bodies.
    #[allow(clippy::too_many_arguments)]
    pub fn run_dumbbell_coll(p1: &mut Particle, p2: &mut Particle, o1: &mut Orientation,
        o2: &mut Orientation, s1: f64, s2: f64, mass: f64, length: f64, diameter: f64,
        pd: &PairData) -> PairEventData {
        let u1 = (o1.director * s1).normalized();
        let u2 = (o2.director * s2).normalized();

        let rhat = (pd.rij + u1 * (0.5 * length) - u2 * (0.5 * length)).normalized();

        let contact_vel1 = p1.velocity
            + o1.angular_velocity.cross(&((u1 * length + rhat * diameter) * 0.5));
        let contact_vel2 = p2.velocity
            + o2.angular_velocity.cross(&((u2 * length - rhat * diameter) * 0.5));
        let contact_vel = contact_vel1 - contact_vel2;

        // Body-frame diagonal inertia of a dumbbell: axial and the two
        // transverse components.
        let i_axial = 0.2 * mass * diameter * diameter;
        let i_trans = i_axial + 0.5 * mass * length * length;

        let lever1 = (u1 * (0.5 * length) + rhat * (0.5 * diameter)).cross(&rhat);
        let lever2 = (u2 * (0.5 * length) - rhat * (0.5 * diameter)).cross(&rhat);

        let inv_inertia = |n: Vec3, u: Vec3| {
            let a = (rhat - u * rhat.dot(&u)).normalized();
            let b = a.cross(&u).normalized();
            u * (n.dot(&u) / i_axial) + a * (n.dot(&a) / i_trans) + b * (n.dot(&b) / i_trans)
        };

        let de1 = lever1.dot(&inv_inertia(lever1, u1));
        let de2 = lever2.dot(&inv_inertia(lever2, u2));

        let a = 1.0 / (2.0 * mass) + 0.5 * (de1 + de2);
        let b = contact_vel.dot(&rhat);
        let s = b / a;
        let impulse = rhat * s;

        let ke1_before =
            0.5 * mass * p1.velocity.nrm2() + 0.5 * i_trans * o1.angular_velocity.nrm2();
        let ke2_before =
            0.5 * mass * p2.velocity.nrm2() + 0.5 * i_trans * o2.angular_velocity.nrm2();

        let old1 = p1.velocity;
        let old2 = p2.velocity;
        // Each dumbbell carries the mass of both its spheres.
        p1.velocity -= impulse / (2.0 * mass);
        p2.velocity += impulse / (2.0 * mass);
        o1.angular_velocity -= inv_inertia(lever1, u1) * s;
        o2.angular_velocity += inv_inertia(lever2, u2) * s;

        let mut data1 = ParticleEventData::new(p1.id, EventKind::CORE, old1, p1.velocity,
            2.0 * mass);
        data1.delta_ke = 0.5 * mass * p1.velocity.nrm2()
            + 0.5 * i_trans * o1.angular_velocity.nrm2()
            - ke1_before;
        let mut data2 = ParticleEventData::new(p2.id, EventKind::CORE, old2, p2.velocity,
            2.0 * mass);
        data2.delta_ke = 0.5 * mass * p2.velocity.nrm2()
            + 0.5 * i_trans * o2.angular_velocity.nrm2()
            - ke2_before;

        PairEventData {
            particle1: data1,
            particle2: data2,
            rij: pd.rij,
            vij_old: pd.vij,
            rvdot: pd.rvdot,
            impulse,
            kind: EventKind::CORE,
        }
    }

    /// Reflection off a triangle feature: specular against the feature
    /// normal the predictor reported.
    pub fn run_triangle_collision(p: &mut Particle, normal: Vec3, e: f64, mass: f64)
        -> ParticleEventData {
        Self::run_wall_collision(p, normal, e, mass)
    }

    /// DSMC candidate acceptance: tests an artificial pair at separation
    /// `rij` against the collision kernel, updating the running maximum
    /// acceptance probability.
    pub fn dsmc_spheres_test(&self, p1: &Particle, p2: &Particle, rij: Vec3,
        max_prob: &mut f64, factor: f64, sampler: &mut Sampler) -> Option<PairData> {
        let mut vij = p1.velocity - p2.velocity;
        if let Self::Sllod { shear_rate } = self {
            vij.x -= shear_rate * rij.y;
        }
        let pd = PairData::new(rij, vij);
        if pd.rvdot > 0.0 {
            return None;
        }

        let prob = factor * -pd.rvdot;
        if prob > *max_prob {
            *max_prob = prob;
        }

        (prob > sampler.uniform01() * *max_prob).then_some(pd)
    }

    /// Resolves an accepted DSMC candidate with the smooth-sphere rule at
    /// the artificial separation.
    pub fn dsmc_spheres_run(p1: &mut Particle, p2: &mut Particle, m1: f64, m2: f64, e: f64,
        pd: &PairData) -> PairEventData {
        let mu = m1 * m2 / (m1 + m2);
        let impulse = pd.rij * ((1.0 + e) * mu * pd.rvdot / pd.r2);

        let old1 = p1.velocity;
        let old2 = p2.velocity;
        p1.velocity -= impulse / m1;
        p2.velocity += impulse / m2;

        PairEventData {
            particle1: ParticleEventData::new(p1.id, EventKind::CORE, old1, p1.velocity, m1),
            particle2: ParticleEventData::new(p2.id, EventKind::CORE, old2, p2.velocity, m2),
            rij: pd.rij,
            vij_old: pd.vij,
            rvdot: pd.rvdot,
            impulse,
            kind: EventKind::CORE,
        }
    }

    /// Well event between the centres of mass of two particle groups (the
    /// umbrella potential machinery). Each group receives the impulse
    /// distributed over its members.
    #[allow(clippy::too_many_arguments)]
    pub fn multibody_well_event(particles: &mut [Particle], masses: &[f64],
        range1: &[usize], range2: &[usize], delta_ke: f64,
        fold: impl Fn(&mut Vec3, &mut Vec3), kind_out: &mut EventKind) -> NEventData {
        let mut com = |range: &[usize]| {
            let mut vel = Vec3::zero();
            let mut pos = Vec3::zero();
            let mut total = 0.0;
            for &id in range {
                let mut p_pos = particles[id].position;
                let mut p_vel = particles[id].velocity;
                fold(&mut p_pos, &mut p_vel);
                total += masses[id];
                vel += p_vel * masses[id];
                pos += p_pos * masses[id];
            }
            (pos / total, vel / total, total)
        };

        let (pos1, vel1, mass1) = com(range1);
        let (pos2, vel2, mass2) = com(range2);

        let mut rij = pos1 - pos2;
        let mut vij = vel1 - vel2;
        fold(&mut rij, &mut vij);
        let rvdot = rij.dot(&vij);
        let r2 = rij.nrm2();
        let mu = mass1 * mass2 / (mass1 + mass2);

        let sqrt_arg = rvdot * rvdot + 2.0 * r2 * delta_ke / mu;
        let impulse;
        if delta_ke < 0.0 && sqrt_arg < 0.0 {
            *kind_out = EventKind::BOUNCE;
            impulse = rij * (2.0 * mu * rvdot / r2);
        } else {
            *kind_out = well_kind(delta_ke);
            impulse = if rvdot < 0.0 {
                rij * (2.0 * delta_ke / (sqrt_arg.sqrt() - rvdot))
            } else {
                rij * (-2.0 * delta_ke / (rvdot + sqrt_arg.sqrt()))
            };
        }

        let mut result = NEventData::default();
        for &id in range1 {
            let old = particles[id].velocity;
            particles[id].velocity -= impulse / mass1;
            result.particles.push(ParticleEventData::new(id, *kind_out, old,
                particles[id].velocity, masses[id]));
        }
        for &id in range2 {
            let old = particles[id].velocity;
            particles[id].velocity += impulse / mass2;
            result.particles.push(ParticleEventData::new(id, *kind_out, old,
                particles[id].velocity, masses[id]));
        }
        result
    }

    /// Rescales every velocity by `factor`.
    pub fn rescale_velocities(particles: &mut [Particle],
        orientations: Option<&mut Vec<Orientation>>, factor: f64) {
        for p in particles.iter_mut() {
            p.velocity *= factor;
        }
        if let Some(orientations) = orientations {
            for o in orientations.iter_mut() {
                o.angular_velocity *= factor;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn pair(sep: f64, speed: f64) -> (Particle, Particle, PairData) {
        let p1 = Particle::new(0, Vec3::zero(), Vec3::new(speed, 0.0, 0.0));
        let p2 = Particle::new(1, Vec3::new(sep, 0.0, 0.0), Vec3::new(-speed, 0.0, 0.0));
        let pd = PairData::new(
            p1.position - p2.position,
            p1.velocity - p2.velocity,
        );
        (p1, p2, pd)
    }

    #[test]
    fn elastic_head_on_exchanges_velocities() {
        let mut l = Liouvillean::Newtonian;
        let (mut p1, mut p2, pd) = pair(1.0, 1.0);
        let data = l.smooth_spheres_coll(&mut p1, &mut p2, 1.0, 1.0, 1.0, 1.0, &pd,
            EventKind::CORE, 0.0);

        assert_approx_eq!(f64, p1.velocity.x, -1.0);
        assert_approx_eq!(f64, p2.velocity.x, 1.0);
        assert_approx_eq!(f64, data.particle1.delta_ke + data.particle2.delta_ke, 0.0);
    }

    #[test]
    fn momentum_conserved_for_unequal_masses() {
        let mut l = Liouvillean::Newtonian;
        let (mut p1, mut p2, pd) = pair(1.0, 1.0);
        let before = p1.velocity * 2.0 + p2.velocity * 3.0;
        l.smooth_spheres_coll(&mut p1, &mut p2, 2.0, 3.0, 0.9, 1.0, &pd, EventKind::CORE,
            0.0);
        let after = p1.velocity * 2.0 + p2.velocity * 3.0;
        assert_approx_eq!(f64, (after - before).nrm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn infinite_mass_reflects_partner() {
        let mut l = Liouvillean::Newtonian;
        let (mut p1, mut p2, pd) = pair(1.0, 1.0);
        l.smooth_spheres_coll(&mut p1, &mut p2, f64::INFINITY, 1.0, 1.0, 1.0, &pd,
            EventKind::CORE, 0.0);
        // The infinite particle is unmoved; the partner reflects in its
        // frame: -1 relative becomes +1, i.e. +3 in the lab.
        assert_approx_eq!(f64, p1.velocity.x, 1.0);
        assert_approx_eq!(f64, p2.velocity.x, 3.0);
    }

    #[test]
    fn infinite_pair_zeroes_recorded_impulse() {
        let mut l = Liouvillean::Newtonian;
        let (mut p1, mut p2, pd) = pair(1.0, 1.0);
        let data = l.smooth_spheres_coll(&mut p1, &mut p2, f64::INFINITY, f64::INFINITY,
            1.0, 1.0, &pd, EventKind::CORE, 0.0);
        assert_eq!(data.impulse, Vec3::zero());
        // Collided as equal unit masses regardless.
        assert_approx_eq!(f64, p1.velocity.x, -1.0);
    }

    #[test]
    fn elastic_v_floor_forces_elastic() {
        let mut l = Liouvillean::NewtonianGravity {
            gravity: Vec3::new(0.0, -1.0, 0.0),
            elastic_v: 0.5,
            tc: None,
            tc_last: Vec::new(),
        };
        let (mut p1, mut p2, pd) = pair(1.0, 0.1);
        l.smooth_spheres_coll(&mut p1, &mut p2, 1.0, 1.0, 0.5, 1.0, &pd, EventKind::CORE,
            0.0);
        // With e forced to 1 the head-on speeds exchange exactly.
        assert_approx_eq!(f64, p1.velocity.x, -0.1);
        assert_approx_eq!(f64, p2.velocity.x, 0.1);
    }

    #[test]
    fn tc_model_makes_rapid_recollisions_elastic() {
        let mut l = Liouvillean::NewtonianGravity {
            gravity: Vec3::new(0.0, -1.0, 0.0),
            elastic_v: 0.0,
            tc: Some(1.0),
            tc_last: Vec::new(),
        };
        let (mut p1, mut p2, pd) = pair(1.0, 1.0);
        // First contact is inelastic.
        l.smooth_spheres_coll(&mut p1, &mut p2, 1.0, 1.0, 0.5, 1.0, &pd, EventKind::CORE,
            5.0);
        assert_approx_eq!(f64, p1.velocity.x, -0.5);

        // A second contact within tc goes elastic.
        let (mut p1, mut p2, pd) = pair(1.0, 1.0);
        l.smooth_spheres_coll(&mut p1, &mut p2, 1.0, 1.0, 0.5, 1.0, &pd, EventKind::CORE,
            5.5);
        assert_approx_eq!(f64, p1.velocity.x, -1.0);
    }

    #[test]
    fn well_entry_accelerates() {
        let l = Liouvillean::Newtonian;
        let (mut p1, mut p2, pd) = pair(1.5, 0.5);
        let data = l.sphere_well_event(&mut p1, &mut p2, 1.0, 1.0, 1.0, 2.25, &pd, 0.0);
        assert_eq!(data.kind, EventKind::WELL_KEUP);
        assert_approx_eq!(f64, data.total_delta_ke(), 1.0, epsilon = 1e-12);
        // Still approaching after capture, faster.
        assert!(p1.velocity.x > 0.5);
        assert_approx_eq!(f64, data.particle1.delta_u, -0.5);
    }

    #[test]
    fn well_exit_without_energy_bounces() {
        let l = Liouvillean::Newtonian;
        // Receding slowly: kinetic energy along the line is mu/2 * vr^2 =
        // 0.01, below the well depth 1.
        let p1v = Vec3::new(-0.1, 0.0, 0.0);
        let mut p1 = Particle::new(0, Vec3::zero(), p1v);
        let mut p2 = Particle::new(1, Vec3::new(1.5, 0.0, 0.0), -p1v);
        let pd = PairData::new(p1.position - p2.position, p1.velocity - p2.velocity);
        let data = l.sphere_well_event(&mut p1, &mut p2, 1.0, 1.0, -1.0, 2.25, &pd, 0.0);
        assert_eq!(data.kind, EventKind::BOUNCE);
        // Elastic reflection of the relative motion.
        assert_approx_eq!(f64, p1.velocity.x, 0.1, epsilon = 1e-12);
        assert_approx_eq!(f64, data.total_delta_ke(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_depth_well_is_a_non_event() {
        let l = Liouvillean::Newtonian;
        let (mut p1, mut p2, pd) = pair(1.5, 0.5);
        let data = l.sphere_well_event(&mut p1, &mut p2, 1.0, 1.0, 0.0, 2.25, &pd, 0.0);
        assert_eq!(data.kind, EventKind::NON_EVENT);
        assert_approx_eq!(f64, p1.velocity.x, 0.5);
    }

    #[test]
    fn wall_reflection_damps_normal_component() {
        let mut p = Particle::new(0, Vec3::zero(), Vec3::new(1.0, -2.0, 0.0));
        Liouvillean::run_wall_collision(&mut p, Vec3::new(0.0, 1.0, 0.0), 0.9, 1.0);
        assert_approx_eq!(f64, p.velocity.y, 1.8);
        assert_approx_eq!(f64, p.velocity.x, 1.0);
    }

    #[test]
    fn andersen_wall_sends_particle_outward() {
        let mut sampler = Sampler::from_seed(3);
        for _ in 0..100 {
            let mut p = Particle::new(0, Vec3::zero(), Vec3::new(0.3, -1.0, 0.0));
            Liouvillean::run_andersen_wall(&mut p, Vec3::new(0.0, 1.0, 0.0), 1.0, 1.0,
                &mut sampler);
            assert!(p.velocity.y > 0.0);
        }
    }

    #[test]
    fn gaussian_event_has_zero_mean_energy_scale() {
        let mut sampler = Sampler::from_seed(9);
        let mut total = 0.0;
        let n = 2000;
        for _ in 0..n {
            let mut p = Particle::new(0, Vec3::zero(), Vec3::zero());
            Liouvillean::random_gaussian_event(&mut p, 1.0, 1.0, &mut sampler);
            total += 0.5 * p.velocity.nrm2();
        }
        // Equipartition: <KE> = 3/2 kT.
        let mean = total / f64::from(n);
        assert!((mean - 1.5).abs() < 0.1);
    }

    #[test]
    fn rough_spheres_conserve_energy_when_fully_elastic() {
        let (mut p1, mut p2, pd) = pair(1.0, 1.0);
        let mut o1 = Orientation::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0));
        let mut o2 = Orientation::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        // e = 1, et = 1 is the smooth elastic limit of the rough-sphere
        // model: the tangential impulse vanishes.
        let data = Liouvillean::rough_spheres_coll(&mut p1, &mut p2, &mut o1, &mut o2,
            1.0, 1.0, 0.1, 1.0, 1.0, 1.0, &pd);
        assert_approx_eq!(f64, data.particle1.delta_ke + data.particle2.delta_ke, 0.0,
            epsilon = 1e-12);
    }

    #[test]
    fn dsmc_rejects_receding_pairs() {
        let l = Liouvillean::Newtonian;
        let mut sampler = Sampler::from_seed(1);
        let p1 = Particle::new(0, Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));
        let p2 = Particle::new(1, Vec3::zero(), Vec3::new(-1.0, 0.0, 0.0));
        let mut max_prob = 0.1;
        // rij along +x with p1 moving +x: receding.
        assert!(l
            .dsmc_spheres_test(&p1, &p2, Vec3::new(1.0, 0.0, 0.0), &mut max_prob, 1.0,
                &mut sampler)
            .is_none());
    }

    #[test]
    fn multibody_well_bounce_reflects_groups() {
        let mut particles = vec![
            Particle::new(0, Vec3::zero(), Vec3::new(0.1, 0.0, 0.0)),
            Particle::new(1, Vec3::new(2.0, 0.0, 0.0), Vec3::new(-0.1, 0.0, 0.0)),
        ];
        let masses = vec![1.0, 1.0];
        let mut kind = EventKind::NONE;
        let data = Liouvillean::multibody_well_event(&mut particles, &masses, &[0], &[1],
            -5.0, |_, _| {}, &mut kind);
        assert_eq!(kind, EventKind::BOUNCE);
        assert_eq!(data.particles.len(), 2);
        assert_approx_eq!(f64, particles[0].velocity.x, -0.1, epsilon = 1e-12);
    }
}
