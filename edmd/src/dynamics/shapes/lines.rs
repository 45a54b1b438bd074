//! Contact function for two thin rotating rods. `f` is the scalar triple
//! product `(u1 x u2) . r12`, which vanishes whenever the two infinite
//! carrier lines are coplanar; `test_root` restricts hits to the rod
//! lengths and the disc intersection window brackets where contact is
//! geometrically possible at all.

use super::Shape;
use crate::vector::Vec3;

/// State of a rod-rod encounter, streamed in the relative frame.
#[derive(Clone, Debug)]
pub struct LinesShape {
    w1: Vec3,
    w2: Vec3,
    u1: Vec3,
    u2: Vec3,
    w12: Vec3,
    r12: Vec3,
    v12: Vec3,
    length: f64,
}

impl LinesShape {
    /// Builds the contact function from the relative state and both rods'
    /// directors and angular velocities.
    #[must_use]
    pub fn new(r12: Vec3, v12: Vec3, w1: Vec3, w2: Vec3, u1: Vec3, u2: Vec3, length: f64)
        -> Self {
        Self {
            w1,
            w2,
            u1,
            u2,
            w12: w1 - w2,
            r12,
            v12,
            length,
        }
    }

    /// Signed positions of the closest-approach points along each rod.
    #[must_use]
    pub fn collision_points(&self) -> (f64, f64) {
        let r_u1 = self.r12.dot(&self.u1);
        let r_u2 = self.r12.dot(&self.u2);
        let u1_u2 = self.u1.dot(&self.u2);
        let det = 1.0 - u1_u2 * u1_u2;

        (
            -(r_u1 - r_u2 * u1_u2) / det,
            (r_u2 - r_u1 * u1_u2) / det,
        )
    }

    /// Time window inside which the discs swept by the two rods can
    /// intersect; outside it no contact is possible and the root search
    /// can skip the rest of the interval.
    #[must_use]
    pub fn disc_intersection_window(&self) -> (f64, f64) {
        let a_hat = self.w1.normalized();
        let cos_w = self.w1.dot(&self.w2) / (self.w1.nrm() * self.w2.nrm());
        let half_width = 0.5 * self.length * (1.0 - cos_w * cos_w).max(0.0).sqrt();

        let offset = -self.r12.dot(&a_hat);
        let rate = self.v12.dot(&a_hat);
        let (mut lo, mut hi) = ((offset - half_width) / rate, (offset + half_width) / rate);
        if hi < lo {
            std::mem::swap(&mut lo, &mut hi);
        }
        (lo, hi)
    }

    /// Current director of rod 1.
    #[must_use]
    pub fn u1(&self) -> Vec3 {
        self.u1
    }

    /// Current director of rod 2.
    #[must_use]
    pub fn u2(&self) -> Vec3 {
        self.u2
    }

    /// Angular velocity of rod 1.
    #[must_use]
    pub fn w1(&self) -> Vec3 {
        self.w1
    }

    /// Angular velocity of rod 2.
    #[must_use]
    pub fn w2(&self) -> Vec3 {
        self.w2
    }

    /// Current relative velocity.
    #[must_use]
    pub fn v12(&self) -> Vec3 {
        self.v12
    }
}

impl Shape for LinesShape {
    fn stream(&mut self, dt: f64) {
        self.u1 = self.u1.rodrigues(self.w1 * dt);
        self.u2 = self.u2.rodrigues(self.w2 * dt);
        self.r12 += self.v12 * dt;
    }

    fn f(&self) -> f64 {
        self.u1.cross(&self.u2).dot(&self.r12)
    }

    fn df(&self) -> f64 {
        self.u1.dot(&self.r12) * self.w12.dot(&self.u2)
            + self.u2.dot(&self.r12) * self.w12.dot(&self.u1)
            - self.w12.dot(&self.r12) * self.u1.dot(&self.u2)
            + self.u1.cross(&self.u2).dot(&self.v12)
    }

    fn df_max(&self) -> f64 {
        self.length * self.w12.nrm() + self.v12.nrm()
    }

    fn d2f(&self) -> f64 {
        let w1xw2 = self.w1.cross(&self.w2);
        2.0 * (self.u1.dot(&self.v12) * self.w12.dot(&self.u2)
            + self.u2.dot(&self.v12) * self.w12.dot(&self.u1)
            - self.u1.dot(&self.u2) * self.w12.dot(&self.v12))
            - self.w12.dot(&self.r12) * self.w12.dot(&self.u1.cross(&self.u2))
            + self.u1.dot(&self.r12) * self.u2.dot(&w1xw2)
            + self.u2.dot(&self.r12) * self.u1.dot(&w1xw2)
            + self.w12.dot(&self.u1) * self.r12.dot(&self.w2.cross(&self.u2))
            + self.w12.dot(&self.u2) * self.r12.dot(&self.w1.cross(&self.u1))
    }

    fn d2f_max(&self) -> f64 {
        self.w12.nrm()
            * (2.0 * self.v12.nrm() + self.length * (self.w1.nrm() + self.w2.nrm()))
    }

    fn test_root(&self) -> bool {
        let (cp1, cp2) = self.collision_points();
        let half = 0.5 * self.length;
        cp1.abs() <= half && cp2.abs() <= half
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::shapes::frenkel_root_search;
    use float_cmp::assert_approx_eq;

    #[test]
    fn coplanar_rods_have_zero_f() {
        let shape = LinesShape::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::zero(),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            1.0,
        );
        assert_approx_eq!(f64, shape.f(), 0.0);
    }

    #[test]
    fn crossed_rods_collide_when_planes_touch() {
        // Two rods perpendicular to each other and to the approach axis,
        // closing at unit speed from separation 1: planes meet at t = 1.
        let shape = LinesShape::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(0.0, 0.1, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            1.0,
        );
        let root = frenkel_root_search(&shape, 1e-12, 0.0, 2.0).unwrap();
        assert_approx_eq!(f64, root, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn distant_crossing_is_rejected() {
        // Same geometry but offset along the rods far beyond their
        // length: the planes still cross, the rods never touch.
        let shape = LinesShape::new(
            Vec3::new(5.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(0.0, 0.1, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            1.0,
        );
        let mut at_root = shape.clone();
        at_root.stream(1.0);
        assert!(!at_root.test_root());
    }
}
