//! The Liouvillean: the equation of motion between events, and every
//! geometric predictor/resolver consistent with it. Predictors return
//! time deltas in the frame of the streamed participants; resolvers apply
//! impulses that conserve the invariants of the active flow.

pub mod math;
mod resolve;
pub mod shapes;

use crate::boundary::Boundary;
use crate::dynamics::math::{cubic_solve, quad_solve_both};
use crate::particle::{Orientation, Particle};
use crate::vector::{Vec3, NDIM};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative coordinates of a particle pair at a common time, folded into
/// the primary image. The precomputed scalars are the ones every
/// quadratic predictor needs.
#[derive(Clone, Copy, Debug)]
pub struct PairData {
    /// Minimum-image separation.
    pub rij: Vec3,
    /// Relative velocity (with the boundary and flow corrections applied).
    pub vij: Vec3,
    /// `rij . rij`.
    pub r2: f64,
    /// `vij . vij`.
    pub v2: f64,
    /// `rij . vij`; negative means approaching.
    pub rvdot: f64,
}

impl PairData {
    /// Builds pair data from already-folded relative coordinates.
    #[must_use]
    pub fn new(rij: Vec3, vij: Vec3) -> Self {
        Self {
            rij,
            vij,
            r2: rij.nrm2(),
            v2: vij.nrm2(),
            rvdot: rij.dot(&vij),
        }
    }
}

/// The multicanonical potential deformation: a map from energy-step index
/// to a potential shift, persisted with the snapshot.
pub type DeformationTable = BTreeMap<i64, f64>;

/// The flow between events.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Liouvillean {
    /// Free streaming.
    Newtonian,
    /// Free streaming plus constant acceleration for `DYNAMIC` particles.
    NewtonianGravity {
        /// Gravitational acceleration.
        gravity: Vec3,
        /// Contacts with normal speed below this resolve elastically, to
        /// prevent inelastic collapse.
        elastic_v: f64,
        /// The tc model: a particle that collided within the last `tc`
        /// resolves its next contact elastically.
        tc: Option<f64>,
        /// Last collision time per particle, for the tc model.
        #[serde(default)]
        tc_last: Vec<f64>,
    },
    /// Free streaming while all diameters grow linearly at `growth_rate`.
    Compression {
        /// Relative diameter growth rate.
        growth_rate: f64,
    },
    /// Free streaming in a uniformly shearing frame: `v_x` picks up
    /// `shear_rate * v_y` per unit time.
    Sllod {
        /// Applied shear rate.
        shear_rate: f64,
    },
    /// Newtonian flow with a multicanonical bias applied to well events.
    NewtonianMC {
        /// Width of one energy bin of the deformation table.
        energy_step: f64,
        /// Potential deformation per energy bin.
        deformation: DeformationTable,
    },
}

impl Liouvillean {
    /// True when this flow accelerates `DYNAMIC` particles.
    #[must_use]
    pub fn gravity(&self) -> Option<Vec3> {
        match self {
            Self::NewtonianGravity { gravity, .. } => Some(*gravity),
            _ => None,
        }
    }

    /// The diameter growth rate, zero outside compression.
    #[must_use]
    pub fn growth_rate(&self) -> f64 {
        match self {
            Self::Compression { growth_rate } => *growth_rate,
            _ => 0.0,
        }
    }

    /// Whether predictors that only exist for ballistic flight (lines,
    /// dumbbells, plates, triangles) are available under this flow.
    #[must_use]
    pub fn supports_shapes(&self) -> bool {
        matches!(self, Self::Newtonian | Self::NewtonianMC { .. })
    }

    /// Advances a particle (and its orientation, if any) by `dt` in
    /// place. The peculiar time advances with it.
    pub fn stream_particle(&self, p: &mut Particle, orientation: Option<&mut Orientation>,
        dt: f64) {
        match self {
            Self::Newtonian | Self::NewtonianMC { .. } | Self::Compression { .. } => {
                p.position += p.velocity * dt;
            }
            Self::NewtonianGravity { gravity, .. } => {
                if p.is_dynamic() {
                    p.position += (p.velocity + *gravity * (0.5 * dt)) * dt;
                    p.velocity += *gravity * dt;
                } else {
                    p.position += p.velocity * dt;
                }
            }
            Self::Sllod { shear_rate } => {
                if p.is_dynamic() {
                    p.position.x += (p.velocity.x + 0.5 * shear_rate * p.velocity.y * dt) * dt;
                    p.position.y += p.velocity.y * dt;
                    p.position.z += p.velocity.z * dt;
                    p.velocity.x += shear_rate * p.velocity.y * dt;
                } else {
                    p.position += p.velocity * dt;
                }
            }
        }
        p.peculiar_time += dt;

        if let Some(o) = orientation {
            o.director = o.director.rodrigues(o.angular_velocity * dt);
        }
    }

    /// Position and velocity of `p` advanced to absolute time `t` without
    /// committing the stream.
    #[must_use]
    pub fn particle_at(&self, p: &Particle, t: f64) -> (Vec3, Vec3) {
        let mut copy = *p;
        self.stream_particle(&mut copy, None, t - p.peculiar_time);
        (copy.position, copy.velocity)
    }

    /// Orientation of a particle advanced to absolute time `t`.
    #[must_use]
    pub fn orientation_at(&self, o: &Orientation, pec_time: f64, t: f64) -> Orientation {
        Orientation {
            director: o.director.rodrigues(o.angular_velocity * (t - pec_time)),
            angular_velocity: o.angular_velocity,
        }
    }

    /// Folded pair data for two particles at absolute time `t`.
    #[must_use]
    pub fn pair_data(&self, p1: &Particle, p2: &Particle, boundary: &Boundary, t: f64)
        -> PairData {
        let (r1, v1) = self.particle_at(p1, t);
        let (r2, v2) = self.particle_at(p2, t);
        let mut rij = r1 - r2;
        let mut vij = v1 - v2;
        boundary.apply_with_velocity(&mut rij, &mut vij);
        if let Self::Sllod { shear_rate } = self {
            // The streaming shear contributes to the relative velocity.
            vij.x -= shear_rate * rij.y;
        }
        PairData::new(rij, vij)
    }

    /// Smallest `dt > 0` at which the pair separation reaches `d^2` from
    /// outside, or a zero-time event when already overlapping and
    /// approaching. Overlapping-but-receding pairs yield no event here;
    /// the three-root gravity case schedules the local maximum instead.
    #[must_use]
    pub fn sphere_sphere_in_root(&self, pd: &PairData, d2: f64, p1_dynamic: bool,
        p2_dynamic: bool, sys_time: f64) -> Option<f64> {
        match self {
            Self::NewtonianGravity { gravity, .. } if p1_dynamic != p2_dynamic => {
                let gij = if p2_dynamic { -*gravity } else { *gravity };
                gravity_sphere_in_root(pd, d2, gij)
            }
            Self::Compression { growth_rate } => {
                compression_in_root(pd, d2, *growth_rate, sys_time)
            }
            _ => newtonian_sphere_in_root(pd, d2),
        }
    }

    /// Smallest `dt > 0` at which the pair separation reaches `d^2` going
    /// outward.
    #[must_use]
    pub fn sphere_sphere_out_root(&self, pd: &PairData, d2: f64, p1_dynamic: bool,
        p2_dynamic: bool, sys_time: f64) -> Option<f64> {
        match self {
            Self::NewtonianGravity { gravity, .. } if p1_dynamic != p2_dynamic => {
                let gij = if p2_dynamic { -*gravity } else { *gravity };
                gravity_sphere_out_root(pd, d2, gij)
            }
            Self::Compression { growth_rate } => {
                compression_out_root(pd, d2, *growth_rate, sys_time)
            }
            _ => newtonian_sphere_out_root(pd, d2),
        }
    }

    /// Whether the pair currently overlaps the diameter `d^2`.
    #[must_use]
    pub fn sphere_overlap(&self, pd: &PairData, d2: f64, sys_time: f64) -> bool {
        let effective = match self {
            Self::Compression { growth_rate } => {
                let growth = 1.0 + growth_rate * sys_time;
                d2 * growth * growth
            }
            _ => d2,
        };
        pd.r2 < effective
    }

    /// Earliest contact of two axis-aligned cubes of edge `2 d` (max-norm
    /// separation `d`). To approach, the largest component of `rij` must
    /// shrink.
    #[must_use]
    pub fn cube_cube_in_root(pd: &PairData, d: f64) -> Option<f64> {
        let mut large = 0;
        for dim in 1..NDIM {
            if pd.rij[dim].abs() > pd.rij[large].abs() {
                large = dim;
            }
        }
        if pd.rij[large] * pd.vij[large] >= 0.0 {
            return None;
        }

        let mut t_in_max = f64::NEG_INFINITY;
        let mut t_out_min = f64::INFINITY;
        for dim in 0..NDIM {
            let t1 = -(pd.rij[dim] + d) / pd.vij[dim];
            let t2 = -(pd.rij[dim] - d) / pd.vij[dim];
            let (t_in, t_out) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
            t_in_max = t_in_max.max(t_in);
            t_out_min = t_out_min.min(t_out);
        }

        (t_in_max < t_out_min).then_some(t_in_max)
    }

    /// Whether two cubes currently overlap.
    #[must_use]
    pub fn cube_overlap(pd: &PairData, d: f64) -> bool {
        (0..NDIM).all(|dim| pd.rij[dim].abs() < d)
    }

    /// Time until a particle at `pos`/`vel` (already folded) crosses the
    /// plane through `wall_loc` with normal `wall_norm`, moving toward it.
    #[must_use]
    pub fn wall_collision(&self, pos: Vec3, vel: Vec3, wall_loc: Vec3, wall_norm: Vec3,
        dynamic: bool) -> f64 {
        let rdot = (pos - wall_loc).dot(&wall_norm);
        let vdot = vel.dot(&wall_norm);

        if let Self::NewtonianGravity { gravity, .. } = self {
            let adot = if dynamic { wall_norm.dot(gravity) } else { 0.0 };
            if adot != 0.0 {
                let arg = vdot * vdot - 2.0 * rdot * adot;
                if arg > 0.0 {
                    let t = -(vdot + vdot.signum() * arg.sqrt());
                    let x1 = t / adot;
                    let x2 = 2.0 * rdot / t;
                    // Arcing under the plate takes the earlier root,
                    // arcing over it the later one.
                    return if adot > 0.0 { x1.min(x2) } else { x1.max(x2) };
                }
                return f64::INFINITY;
            }
        }

        if vdot < 0.0 {
            // A slightly penetrated particle yields a small negative
            // delta and fires immediately.
            -rdot / vdot
        } else {
            f64::INFINITY
        }
    }

    /// Time until a particle hits a cylindrical wall of the given radius
    /// around the axis through `wall_loc` along `wall_norm`, from inside.
    #[must_use]
    pub fn cylinder_collision(pos: Vec3, vel: Vec3, wall_loc: Vec3, wall_norm: Vec3,
        radius: f64) -> f64 {
        let mut rij = pos - wall_loc;
        rij -= wall_norm * rij.dot(&wall_norm);
        let mut v = vel;
        v -= wall_norm * v.dot(&wall_norm);

        let b = v.dot(&rij);
        let a = v.nrm2();
        let c = rij.nrm2() - radius * radius;

        let arg = b * b - a * c;
        if arg < 0.0 || a == 0.0 {
            return f64::INFINITY;
        }
        let t = (arg.sqrt() - b) / a;
        if t.is_nan() { f64::INFINITY } else { t }
    }

    /// Time for a particle to leave the cell `[0, width]^3` it currently
    /// occupies, `rel_pos` being its position relative to the cell origin.
    #[must_use]
    pub fn square_cell_transit(&self, rel_pos: Vec3, vel: Vec3, width: Vec3, dynamic: bool)
        -> f64 {
        let mut ret = f64::INFINITY;
        for dim in 0..NDIM {
            if let Some(t) = self.cell_axis_exit(rel_pos, vel, width, dynamic, dim) {
                ret = ret.min(t.0);
            }
        }
        ret
    }

    /// As [`Self::square_cell_transit`], also reporting the exit face as a
    /// signed one-based dimension index (negative for the low face).
    #[must_use]
    pub fn square_cell_transit_dir(&self, rel_pos: Vec3, vel: Vec3, width: Vec3,
        dynamic: bool) -> (f64, i32) {
        let mut ret = (f64::INFINITY, 0);
        for dim in 0..NDIM {
            if let Some((t, face)) = self.cell_axis_exit(rel_pos, vel, width, dynamic, dim) {
                if t < ret.0 {
                    ret = (t, face);
                }
            }
        }
        ret
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn cell_axis_exit(&self, rel_pos: Vec3, vel: Vec3, width: Vec3, dynamic: bool,
        dim: usize) -> Option<(f64, i32)> {
        let idim = dim as i32 + 1;
        let g = self.gravity().unwrap_or_default();

        if g[dim] != 0.0 && dynamic {
            // First the boundary "uphill" of gravity, which may never be
            // reached, then the downhill one which always is.
            let r_up = if g[dim] < 0.0 {
                rel_pos[dim] - width[dim]
            } else {
                rel_pos[dim]
            };
            let upper = parabola_boundary_roots(r_up, vel[dim], g[dim]);

            let r_down = if g[dim] < 0.0 {
                rel_pos[dim]
            } else {
                rel_pos[dim] - width[dim]
            };
            let lower = parabola_boundary_roots(r_down, vel[dim], g[dim]);

            let moving_uphill = (g[dim] < 0.0) == (vel[dim] > 0.0);
            if moving_uphill {
                if let Some((up1, _)) = upper {
                    let face = if g[dim] < 0.0 { idim } else { -idim };
                    return Some((up1, face));
                }
            }
            let (_, low2) = lower?;
            let face = if g[dim] < 0.0 { -idim } else { idim };
            Some((low2, face))
        } else {
            if vel[dim] == 0.0 {
                return None;
            }
            let t = if vel[dim] < 0.0 {
                -rel_pos[dim] / vel[dim]
            } else {
                (width[dim] - rel_pos[dim]) / vel[dim]
            };
            let face = if vel[dim] < 0.0 { -idim } else { idim };
            Some((t, face))
        }
    }

    /// Upper bound on the time before this particle could have moved
    /// further than `half_image - l_max` in any dimension, after which
    /// its predictions must be refreshed.
    #[must_use]
    pub fn pbc_sentinel_time(&self, vel: Vec3, half_image: Vec3, l_max: f64, dynamic: bool)
        -> f64 {
        let mut ret = f64::INFINITY;
        let g = self.gravity().unwrap_or_default();
        for dim in 0..NDIM {
            let reach = half_image[dim] - l_max;
            if g[dim] != 0.0 && dynamic {
                for sign in [1.0, -1.0] {
                    if let Some((r1, r2)) =
                        quad_solve_both(sign * reach, vel[dim], 0.5 * g[dim])
                    {
                        if r1 > 0.0 {
                            ret = ret.min(r1);
                        }
                        if r2 > 0.0 {
                            ret = ret.min(r2);
                        }
                    }
                }
            } else {
                ret = ret.min(reach / vel[dim].abs());
            }
        }
        ret
    }

    /// Time of the particle's next turning point in a gravity dimension,
    /// or infinity when the flow never turns it around.
    #[must_use]
    pub fn parabola_sentinel_time(&self, vel: Vec3, dynamic: bool) -> f64 {
        let Some(g) = self.gravity() else {
            return f64::INFINITY;
        };
        if !dynamic {
            return f64::INFINITY;
        }
        let mut time = f64::INFINITY;
        for dim in 0..NDIM {
            if g[dim] != 0.0 {
                let t = -vel[dim] / g[dim];
                if t > 0.0 && t < time {
                    time = t;
                }
            }
        }
        time
    }

    /// Forces the velocity component of the nearest turning point to
    /// exactly zero. Fired by the parabola sentinel so numerical drift
    /// around a turnaround cannot corrupt the cell transits.
    pub fn enforce_parabola(&self, p: &mut Particle) {
        let Some(g) = self.gravity() else { return };
        let mut best = (f64::INFINITY, NDIM);
        for dim in 0..NDIM {
            if g[dim] != 0.0 {
                let t = (-p.velocity[dim] / g[dim]).abs();
                if t < best.0 {
                    best = (t, dim);
                }
            }
        }
        if best.1 < NDIM {
            p.velocity[best.1] = 0.0;
        }
    }

    /// Predicts the next contact between a point particle and an
    /// oscillating plate, searching both faces with the Frenkel hunter.
    ///
    /// `pos` is the particle position relative to the plate centre, `t`
    /// the plate's phase time. `last_part` marks the particle that fired
    /// the previous plate event, whose just-resolved root must be
    /// skipped. Returns `(forced, dt)`: a forced result schedules an
    /// immediate or fake collision to recover from a penetration the
    /// bracketing could not resolve (the fake-collision window is
    /// `recoil_fraction` of the maximum wall speed).
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn point_plate_collision(pos: Vec3, vel: Vec3, nhat: Vec3, delta: f64, omega: f64,
        sigma: f64, t: f64, last_part: bool, recoil_fraction: f64) -> Option<(bool, f64)> {
        use shapes::{frenkel_root_search, OscillatingPlateShape, Shape};

        let surface_offset = pos.dot(&nhat);
        let surface_vel = vel.dot(&nhat);
        let mut t_high = if surface_vel > 0.0 {
            (sigma + delta - surface_offset) / surface_vel
        } else {
            -(sigma + delta + surface_offset) / surface_vel
        };

        let mut upper = OscillatingPlateShape::new(vel, nhat, pos, t, delta, omega, sigma);

        // A particle found past the face is clamped back onto it; a rare
        // event that repairs small numerical penetrations.
        if upper.f() > 0.0 {
            upper.fix_f_sign(false);
        }

        let mut t_low1 = 0.0;
        let mut t_low2 = 0.0;
        if last_part {
            // Shift the lower bound so the just-resolved root is not
            // rediscovered.
            let shift = (2.0 * upper.df()).abs() / upper.d2f_max();
            if -upper.f() < upper.f_flip() {
                t_low1 = shift;
            } else {
                t_low2 = shift;
            }
        }

        // Collisions exactly at the end of the interval need headroom.
        t_high *= 1.01;

        let tol = 1e-12 * sigma;
        let root1 = frenkel_root_search(&upper, tol, t_low1, t_high);

        let mut lower = upper.clone();
        lower.flip_sigma();
        if lower.f() < 0.0 {
            lower.fix_f_sign(true);
        }
        let root2 = frenkel_root_search(&lower, tol, t_low2, t_high);

        let penetrating = (surface_offset - lower.wall_position()).abs() > sigma;
        if penetrating
            || (root1.is_none() && root2.is_none())
            || (t_low1 > t_high && t_low2 > t_high)
        {
            if lower.test_root() {
                // Escaping: collide immediately.
                return Some((true, 0.0));
            }
            // Approaching but unresolved: schedule a fake collision just
            // before the earliest real root, giving the overlap repair
            // another chance.
            let current = root1
                .into_iter()
                .chain(root2)
                .fold(f64::INFINITY, f64::min);
            let mut fake = (surface_vel - lower.wall_velocity()).abs();
            fake += lower.max_wall_velocity() * recoil_fraction;
            fake /= lower.d2f_max();
            if fake < current {
                return Some((true, fake));
            }
        }

        match (root1, root2) {
            (Some(r1), Some(r2)) => Some((false, r1.min(r2))),
            (Some(r), None) | (None, Some(r)) => Some((false, r)),
            (None, None) => None,
        }
    }

    /// Resolves a particle/plate contact: transfers momentum to the
    /// particle against the plate's effective mass and, unless the plate
    /// is `strong` (infinitely massive), recoils the plate by updating
    /// its amplitude and phase coherently.
    #[allow(clippy::too_many_arguments)]
    pub fn run_oscillating_plate(p: &mut Particle, p_mass: f64, nhat: Vec3, delta: &mut f64,
        omega: f64, sigma: f64, plate_mass: f64, e: f64, t: &mut f64, strong: bool,
        sys_time: f64, recoil_fraction: f64) -> crate::event::ParticleEventData {
        use crate::event::{EventKind, ParticleEventData};
        use shapes::{OscillatingPlateShape, Shape};

        let shape = OscillatingPlateShape::new(p.velocity, nhat, p.position,
            *t + sys_time, *delta, omega, sigma);

        let old = p.velocity;
        if !shape.test_root() {
            // The particle is pulling on the plate; nothing to resolve.
            log::warn!("particle {} is pulling on the oscillating plate", p.id);
            return ParticleEventData::new(p.id, EventKind::WALL, old, old, p_mass);
        }

        let mu = (p_mass * plate_mass) / (p_mass + plate_mass);
        let wall_vel = nhat * shape.wall_velocity();
        let mut inelas = e;
        let mut rvdot = (p.velocity - wall_vel).dot(&nhat);

        // Slow contacts go elastic to avoid inelastic collapse against
        // the plate; crawling ones get a minimum recoil speed.
        if (rvdot / shape.max_wall_velocity()).abs() < recoil_fraction {
            inelas = 1.0;
            if (rvdot / shape.max_wall_velocity()).abs() < 0.5 * recoil_fraction {
                rvdot = rvdot.signum() * shape.max_wall_velocity() * 0.01;
            }
        }

        let impulse = nhat * (mu * (1.0 + inelas) * rvdot);
        p.velocity -= impulse / p_mass;

        let data = ParticleEventData::new(p.id, EventKind::WALL, old, p.velocity, p_mass);

        if strong {
            return data;
        }

        // Recoil the plate: fold the momentum transfer into a new
        // amplitude and phase with the same face position now.
        let two_pi = 2.0 * std::f64::consts::PI;
        let numerator = -nhat.dot(&(impulse / plate_mass + wall_vel));
        let reduced = sys_time - two_pi * (sys_time * omega / two_pi).trunc() / omega;
        let denominator = omega * *delta * (omega * (reduced + *t)).cos();

        let new_t = numerator.atan2(denominator) / omega - sys_time;
        *delta *= (omega * (sys_time + *t)).cos() / (omega * (sys_time + new_t)).cos();
        *t = new_t - two_pi * (new_t * omega / two_pi).trunc() / omega;

        data
    }

    /// Kinetic energy of a particle, including the rotational part when
    /// orientation data exists.
    #[must_use]
    pub fn kinetic_energy(p: &Particle, mass: f64, orientation: Option<&Orientation>,
        inertia: f64) -> f64 {
        let translational = 0.5 * mass * p.velocity.nrm2();
        match orientation {
            Some(o) => translational + 0.5 * inertia * o.angular_velocity.nrm2(),
            None => translational,
        }
    }
}

/// Earliest physical rod-rod contact within `[0, t_high]`, under
/// ballistic flight. `skip_current` shifts the bracket past a root that
/// was resolved this instant, so it is not rediscovered.
#[must_use]
pub fn line_line_root(pd: &PairData, o1: &Orientation,
    o2: &Orientation, length: f64, t_high: f64, skip_current: bool)
    -> Option<f64> {
    use shapes::{frenkel_root_search, LinesShape, Shape};

    let shape = LinesShape::new(
        pd.rij,
        pd.vij,
        o1.angular_velocity,
        o2.angular_velocity,
        o1.director,
        o2.director,
        length,
    );

    let mut t_low = 0.0;
    let mut t_high = t_high;
    if skip_current {
        t_low += (2.0 * shape.df()).abs() / shape.d2f_max();
    }

    // The swept discs bound where the rods can cross at all.
    let (window_low, window_high) = shape.disc_intersection_window();
    if window_low > t_low {
        t_low = window_low;
    }
    if window_high < t_high {
        t_high = window_high;
    }

    frenkel_root_search(&shape, length * 1e-10, t_low, t_high)
}

/// Earliest contact over the four orientation-sign branches of a
/// dumbbell pair within `[0, t_high]`.
#[must_use]
pub fn dumbbell_root(pd: &PairData, o1: &Orientation,
    o2: &Orientation, length: f64, diameter: f64, t_high: f64,
    skip_current: bool) -> Option<f64> {
    use shapes::{frenkel_root_search, DumbbellsShape, Shape};

    let mut best: Option<f64> = None;
    for (s1, s2) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
        let shape = DumbbellsShape::new(
            pd.rij,
            pd.vij,
            o1.angular_velocity,
            o2.angular_velocity,
            o1.director * s1,
            o2.director * s2,
            length,
            diameter,
        );

        let mut t_low = 0.0;
        if skip_current {
            t_low += (2.0 * shape.df()).abs() / shape.d2f_max();
        }

        if let Some(root) = frenkel_root_search(&shape, length * 1e-16, t_low, t_high) {
            if best.map_or(true, |b| root < b) {
                best = Some(root);
            }
        }
    }
    best
}

/// Selects the dumbbell orientation branch actually in contact, by the
/// sphere pair closest to the contact diameter.
#[must_use]
pub fn dumbbell_contact_branch(pd: &PairData, o1: &Orientation,
    o2: &Orientation, length: f64, diameter: f64) -> (f64, f64) {
    let mut best = (f64::INFINITY, (1.0, 1.0));
    for (s1, s2) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
        let sep = (pd.rij + o1.director * (s1 * 0.5 * length)
            - o2.director * (s2 * 0.5 * length))
            .nrm();
        let miss = (sep - diameter).abs();
        if miss < best.0 {
            best = (miss, (s1, s2));
        }
    }
    best.1
}

/// Roots of `r + v t + g t^2 / 2 = 0` in ascending order.
fn parabola_boundary_roots(r: f64, v: f64, g: f64) -> Option<(f64, f64)> {
    let arg = v * v - 2.0 * r * g;
    if arg < 0.0 {
        return None;
    }
    let t = -(v + v.signum() * arg.sqrt());
    let (r1, r2) = (t / g, 2.0 * r / t);
    Some(if r1 <= r2 { (r1, r2) } else { (r2, r1) })
}

fn newtonian_sphere_in_root(pd: &PairData, d2: f64) -> Option<f64> {
    if pd.rvdot >= 0.0 {
        return None;
    }
    if pd.r2 < d2 {
        // Overlapping and approaching: collide now. Receding overlaps
        // escape on their own under ballistic flight.
        return Some(0.0);
    }
    let arg = pd.rvdot * pd.rvdot - pd.v2 * (pd.r2 - d2);
    // The more numerically stable form of the quadratic formula.
    (arg > 0.0).then(|| (d2 - pd.r2) / (pd.rvdot - arg.sqrt()))
}

fn newtonian_sphere_out_root(pd: &PairData, d2: f64) -> Option<f64> {
    let arg = pd.rvdot * pd.rvdot - pd.v2 * (pd.r2 - d2);
    if arg < 0.0 || pd.v2 == 0.0 {
        // Not moving apart.
        return None;
    }
    let dt = (arg.sqrt() - pd.rvdot) / pd.v2;
    dt.is_finite().then_some(dt)
}

fn compression_in_root(pd: &PairData, d2: f64, gamma: f64, sys_time: f64) -> Option<f64> {
    let b = pd.rvdot - d2 * (gamma * gamma * sys_time + gamma);
    if b >= 0.0 {
        return None;
    }
    let a = pd.v2 - gamma * gamma * d2;
    let c = pd.r2 - d2 * (1.0 + gamma * sys_time * (2.0 + gamma * sys_time));
    let arg = b * b - a * c;
    (arg > 0.0).then(|| c / (arg.sqrt() - b))
}

fn compression_out_root(pd: &PairData, d2: f64, gamma: f64, sys_time: f64) -> Option<f64> {
    let a = pd.v2 - gamma * gamma * d2;
    let b = pd.rvdot - d2 * (gamma * gamma * sys_time + gamma);
    let c = d2 * (1.0 + gamma * sys_time * (2.0 + gamma * sys_time)) - pd.r2;
    let arg = b * b + a * c;
    if arg > 0.0 && a > 0.0 {
        Some(if b < 0.0 {
            (arg.sqrt() - b) / a
        } else {
            c / (arg.sqrt() + b)
        })
    } else {
        None
    }
}

/// Separation-squared quartic for one dynamic and one static particle:
/// `F(t) = |rij + vij t + gij t^2 / 2|^2 - d^2`.
fn gravity_quartic(pd: &PairData, d2: f64, gij: Vec3) -> [f64; 5] {
    [
        0.25 * gij.nrm2(),
        gij.dot(&pd.vij),
        pd.v2 + gij.dot(&pd.rij),
        2.0 * pd.rvdot,
        pd.r2 - d2,
    ]
}

fn eval_quartic(c: &[f64; 5], t: f64) -> f64 {
    (((c[0] * t + c[1]) * t + c[2]) * t + c[3]) * t + c[4]
}

/// Ascending real critical points of the quartic (roots of its cubic
/// derivative): a minimum, or minimum/maximum/minimum.
fn quartic_turning_points(c: &[f64; 5]) -> Vec<f64> {
    cubic_solve(
        c[1] * 3.0 / (4.0 * c[0]),
        c[2] * 2.0 / (4.0 * c[0]),
        c[3] / (4.0 * c[0]),
    )
}

fn bisect_quartic(c: &[f64; 5], low: f64, high: f64, tol: f64) -> f64 {
    math::bisect_root(|t| eval_quartic(c, t), low, high, tol)
}

/// The overlapped-and-approaching / three-root dynamics of spec rule 2,
/// exactly as the mixed-dynamics gravity case demands them.
fn gravity_sphere_in_root(pd: &PairData, d2: f64, gij: Vec3) -> Option<f64> {
    let c = gravity_quartic(pd, d2, gij);
    if c[0] == 0.0 {
        return newtonian_sphere_in_root(pd, d2);
    }
    let tol = 1e-16 * d2.sqrt();
    let roots = quartic_turning_points(&c);

    if eval_quartic(&c, 0.0) <= 0.0 {
        // Overlapping now.
        if pd.rvdot < 0.0 {
            // Approaching: instantaneous collision.
            return Some(0.0);
        }
        // Receding past the only minimum: the pair escapes for good.
        if roots.len() == 1 {
            return None;
        }
        // Receding, with a maximum and a further minimum ahead. A
        // maximum in the past means we are past the second minimum too.
        if roots[1] < 0.0 {
            return None;
        }
        if eval_quartic(&c, roots[1]) > 0.0 {
            // We escape at the maximum; check for re-entry afterwards.
            if eval_quartic(&c, roots[2]) < 0.0 {
                return Some(bisect_quartic(&c, roots[1], roots[2], tol).max(0.0));
            }
            return None;
        }
        // Still overlapped at the local maximum: schedule the maximum
        // itself, the furthest the pair gets before approaching again.
        return Some(roots[1]);
    }

    // Separated: check the first minimum, then (past the maximum) the
    // second one.
    if roots[0] >= 0.0 && eval_quartic(&c, roots[0]) <= 0.0 {
        return Some(bisect_quartic(&c, 0.0, roots[0], tol).max(0.0));
    }
    if roots.len() > 1
        && roots[2] > 0.0
        && eval_quartic(&c, roots[2]) < 0.0
        && eval_quartic(&c, roots[1].max(0.0)) >= 0.0
    {
        return Some(bisect_quartic(&c, roots[1].max(0.0), roots[2], tol).max(0.0));
    }

    None
}

/// First upward crossing of the quartic from inside, for well exits of
/// mixed-dynamics pairs.
fn gravity_sphere_out_root(pd: &PairData, d2: f64, gij: Vec3) -> Option<f64> {
    let c = gravity_quartic(pd, d2, gij);
    if c[0] == 0.0 {
        return newtonian_sphere_out_root(pd, d2);
    }
    let tol = 1e-16 * d2.sqrt();

    if eval_quartic(&c, 0.0) >= 0.0 {
        return Some(0.0);
    }

    // Scan the intervals delimited by the turning points; beyond the last
    // one F grows without bound, so a crossing always exists there.
    let mut low = 0.0;
    for point in quartic_turning_points(&c) {
        if point <= low {
            continue;
        }
        if eval_quartic(&c, point) >= 0.0 {
            return Some(bisect_quartic(&c, low, point, tol));
        }
        low = point;
    }

    let mut high = low.max(1.0);
    while eval_quartic(&c, high) < 0.0 {
        high *= 2.0;
    }
    Some(bisect_quartic(&c, low, high, tol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn head_on(sep: f64, speed: f64) -> PairData {
        PairData::new(Vec3::new(sep, 0.0, 0.0), Vec3::new(-speed, 0.0, 0.0))
    }

    #[test]
    fn newtonian_core_time() {
        let l = Liouvillean::Newtonian;
        // Separation 2, closing speed 2, diameter 1: contact at t = 0.5.
        let dt = l
            .sphere_sphere_in_root(&head_on(2.0, 2.0), 1.0, true, true, 0.0)
            .unwrap();
        assert_approx_eq!(f64, dt, 0.5);
    }

    #[test]
    fn receding_pair_has_no_core() {
        let l = Liouvillean::Newtonian;
        let pd = PairData::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(l.sphere_sphere_in_root(&pd, 1.0, true, true, 0.0).is_none());
    }

    #[test]
    fn overlapping_approaching_fires_now() {
        let l = Liouvillean::Newtonian;
        let dt = l
            .sphere_sphere_in_root(&head_on(0.5, 1.0), 1.0, true, true, 0.0)
            .unwrap();
        assert_eq!(dt, 0.0);
    }

    #[test]
    fn well_exit_time() {
        let l = Liouvillean::Newtonian;
        // Inside a well of radius 1.5 at separation 1, receding at 1.
        let pd = PairData::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let dt = l
            .sphere_sphere_out_root(&pd, 2.25, true, true, 0.0)
            .unwrap();
        assert_approx_eq!(f64, dt, 0.5);
    }

    #[test]
    fn glancing_miss() {
        let l = Liouvillean::Newtonian;
        // Passing at impact parameter 2 with diameter 1: no contact.
        let pd = PairData::new(Vec3::new(5.0, 2.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!(l.sphere_sphere_in_root(&pd, 1.0, true, true, 0.0).is_none());
    }

    #[test]
    fn gravity_free_fall_onto_static_sphere() {
        let g = Vec3::new(0.0, -1.0, 0.0);
        let l = Liouvillean::NewtonianGravity {
            gravity: g,
            elastic_v: 0.0,
            tc: None,
            tc_last: Vec::new(),
        };
        // Dynamic particle at rest 3 above a static one, unit diameters:
        // falls 2 under g=1, so t = 2.
        let pd = PairData::new(Vec3::new(0.0, 3.0, 0.0), Vec3::zero());
        let dt = l.sphere_sphere_in_root(&pd, 1.0, true, false, 0.0).unwrap();
        assert_approx_eq!(f64, dt, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn gravity_thrown_upward_misses_then_falls_back() {
        let g = Vec3::new(0.0, -1.0, 0.0);
        let l = Liouvillean::NewtonianGravity {
            gravity: g,
            elastic_v: 0.0,
            tc: None,
            tc_last: Vec::new(),
        };
        // Dynamic particle 2 above a static one, drifting sideways: the
        // arc keeps it further than contact at both separation minima.
        let pd = PairData::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(l.sphere_sphere_in_root(&pd, 1.0, true, false, 0.0).is_none());

        // Thrown straight up instead, it recedes, turns, and falls back
        // onto the static particle: gap(t) = 2 + t - t^2/2 = 1 at
        // t = 1 + sqrt(3).
        let pd = PairData::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let dt = l.sphere_sphere_in_root(&pd, 1.0, true, false, 0.0).unwrap();
        assert_approx_eq!(f64, dt, 1.0 + 3.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn compression_contact_comes_early() {
        let l = Liouvillean::Compression { growth_rate: 0.1 };
        let newtonian = Liouvillean::Newtonian;
        let pd = head_on(2.0, 1.0);
        let dt_c = l.sphere_sphere_in_root(&pd, 1.0, true, true, 0.0).unwrap();
        let dt_n = newtonian
            .sphere_sphere_in_root(&pd, 1.0, true, true, 0.0)
            .unwrap();
        assert!(dt_c < dt_n);
    }

    #[test]
    fn cube_contact() {
        // Cubes of half-edge 0.5 closing head-on from max-norm gap 2.
        let pd = head_on(2.0, 1.0);
        let dt = Liouvillean::cube_cube_in_root(&pd, 0.5).unwrap();
        assert_approx_eq!(f64, dt, 1.5);
    }

    #[test]
    fn wall_times() {
        let l = Liouvillean::Newtonian;
        let t = l.wall_collision(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -2.0, 0.0),
            Vec3::zero(),
            Vec3::new(0.0, 1.0, 0.0),
            true,
        );
        assert_approx_eq!(f64, t, 2.5);
    }

    #[test]
    fn gravity_wall_free_fall() {
        let l = Liouvillean::NewtonianGravity {
            gravity: Vec3::new(0.0, -1.0, 0.0),
            elastic_v: 0.0,
            tc: None,
            tc_last: Vec::new(),
        };
        // ES4 geometry: drop from rest at height 5 onto the floor.
        let t = l.wall_collision(
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::zero(),
            Vec3::zero(),
            Vec3::new(0.0, 1.0, 0.0),
            true,
        );
        assert_approx_eq!(f64, t, 10.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn cell_transit_straight() {
        let l = Liouvillean::Newtonian;
        let (t, dir) = l.square_cell_transit_dir(
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            true,
        );
        assert_approx_eq!(f64, t, 0.5);
        assert_eq!(dir, 1);

        // The faceless form agrees.
        let plain = l.square_cell_transit(
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            true,
        );
        assert_approx_eq!(f64, plain, t);
    }

    #[test]
    fn cell_transit_under_gravity_turns_back() {
        let l = Liouvillean::NewtonianGravity {
            gravity: Vec3::new(0.0, -1.0, 0.0),
            elastic_v: 0.0,
            tc: None,
            tc_last: Vec::new(),
        };
        // Rising at 0.5 from the middle of a unit cell: apex at
        // 0.5 + 0.125 < 1, so the particle exits the bottom face.
        let (t, dir) = l.square_cell_transit_dir(
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            true,
        );
        assert_eq!(dir, -2);
        // 0.5 + 0.5 t - t^2/2 = 0 => t = (1 + sqrt(5))/2.
        assert_approx_eq!(f64, t, (1.0 + 5.0_f64.sqrt()) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn parabola_sentinel() {
        let l = Liouvillean::NewtonianGravity {
            gravity: Vec3::new(0.0, -2.0, 0.0),
            elastic_v: 0.0,
            tc: None,
            tc_last: Vec::new(),
        };
        let t = l.parabola_sentinel_time(Vec3::new(1.0, 3.0, 0.0), true);
        assert_approx_eq!(f64, t, 1.5);
        assert_eq!(
            l.parabola_sentinel_time(Vec3::new(1.0, -3.0, 0.0), true),
            f64::INFINITY
        );
    }

    #[test]
    fn enforce_parabola_zeroes_the_turning_component() {
        let l = Liouvillean::NewtonianGravity {
            gravity: Vec3::new(0.0, -1.0, 0.0),
            elastic_v: 0.0,
            tc: None,
            tc_last: Vec::new(),
        };
        let mut p = Particle::new(0, Vec3::zero(), Vec3::new(0.7, 1e-13, 0.0));
        l.enforce_parabola(&mut p);
        assert_eq!(p.velocity.y, 0.0);
        assert_eq!(p.velocity.x, 0.7);
    }

    #[test]
    fn streaming_advances_peculiar_time() {
        let l = Liouvillean::Newtonian;
        let mut p = Particle::new(0, Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));
        l.stream_particle(&mut p, None, 2.0);
        assert_approx_eq!(f64, p.position.x, 2.0);
        assert_approx_eq!(f64, p.peculiar_time, 2.0);
    }

    #[test]
    fn sllod_shears_the_velocity() {
        let l = Liouvillean::Sllod { shear_rate: 1.0 };
        let mut p = Particle::new(0, Vec3::zero(), Vec3::new(0.0, 1.0, 0.0));
        l.stream_particle(&mut p, None, 1.0);
        assert_approx_eq!(f64, p.velocity.x, 1.0);
        assert_approx_eq!(f64, p.position.x, 0.5);
    }
}
