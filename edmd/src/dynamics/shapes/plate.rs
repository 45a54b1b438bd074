//! Contact function between a point particle and an oscillating plate.
//! The plate face sits at `sigma + delta cos(omega t)` along its normal;
//! `f` is the particle's signed height above that face.

use super::Shape;
use crate::vector::Vec3;

/// State of a particle/plate encounter along the plate normal.
#[derive(Clone, Debug)]
pub struct OscillatingPlateShape {
    vp: Vec3,
    nhat: Vec3,
    rp: Vec3,
    t: f64,
    delta: f64,
    omega: f64,
    sigma: f64,
}

impl OscillatingPlateShape {
    /// Builds the contact function. `rp` is the particle position
    /// relative to the plate rest position, `t` the plate's phase time.
    #[must_use]
    pub fn new(vp: Vec3, nhat: Vec3, rp: Vec3, t: f64, delta: f64, omega: f64, sigma: f64)
        -> Self {
        Self {
            vp,
            nhat,
            rp,
            t,
            delta,
            omega,
            sigma,
        }
    }

    /// Plate face position along the normal.
    #[must_use]
    pub fn wall_position(&self) -> f64 {
        self.delta * (self.omega * self.t).cos()
    }

    /// Plate velocity along the normal.
    #[must_use]
    pub fn wall_velocity(&self) -> f64 {
        -self.delta * self.omega * (self.omega * self.t).sin()
    }

    /// Largest speed the plate ever reaches.
    #[must_use]
    pub fn max_wall_velocity(&self) -> f64 {
        (self.delta * self.omega).abs()
    }

    /// Signed particle height above the *other* face of the plate. Used
    /// to decide which face a penetrating particle should be clamped to.
    #[must_use]
    pub fn f_flip(&self) -> f64 {
        self.rp.dot(&self.nhat) - self.wall_position() + self.sigma
    }

    /// Mirrors the contact function to the opposite face.
    pub fn flip_sigma(&mut self) {
        self.sigma = -self.sigma;
    }

    /// Clamps a penetrating particle back onto the face. `below` selects
    /// which sign of `f` the caller needs restored. This is the local
    /// repair for the transient numerical error of a particle found
    /// inside the plate.
    pub fn fix_f_sign(&mut self, below: bool) {
        let normal_component = self.rp.dot(&self.nhat);
        self.rp -= self.nhat * normal_component;
        self.rp += self.nhat * (self.wall_position() + self.sigma);
        for loops in 1..=1000 {
            if if below { self.f() >= 0.0 } else { self.f() <= 0.0 } {
                break;
            }
            self.rp -= self.nhat * (f64::from(loops) * f64::EPSILON * self.sigma);
        }
    }

    /// Particle velocity along the normal.
    #[must_use]
    pub fn particle_velocity(&self) -> f64 {
        self.vp.dot(&self.nhat)
    }
}

impl Shape for OscillatingPlateShape {
    fn stream(&mut self, dt: f64) {
        self.t += dt;
        self.rp += self.vp * dt;
    }

    fn f(&self) -> f64 {
        self.rp.dot(&self.nhat) - (self.sigma + self.wall_position())
    }

    fn df(&self) -> f64 {
        self.vp.dot(&self.nhat) - self.wall_velocity()
    }

    fn df_max(&self) -> f64 {
        self.vp.dot(&self.nhat).abs() + self.max_wall_velocity()
    }

    fn d2f(&self) -> f64 {
        self.delta * self.omega * self.omega * (self.omega * self.t).cos()
    }

    fn d2f_max(&self) -> f64 {
        (self.delta * self.omega * self.omega).abs()
    }

    fn test_root(&self) -> bool {
        // Approaching the face from the side the particle is on.
        self.df() * (self.rp.dot(&self.nhat) - self.wall_position()) > 0.0
    }
}
