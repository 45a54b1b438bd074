//! Boundary conditions: folding separations and positions into the
//! primary image, plus the Lees-Edwards sliding-brick shear variant.

use crate::vector::{Vec3, NDIM};
use serde::{Deserialize, Serialize};

/// Which folding rule is active.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum BoundaryKind {
    /// No folding at all (isolated system).
    None,
    /// Rectangular periodic, minimum image in every dimension.
    Periodic,
    /// Lees-Edwards shearing in the y dimension: images above and below
    /// the primary cell slide in x at `shear_rate * y_extent`.
    LeesEdwards {
        /// Rate of shear across one box length in y.
        shear_rate: f64,
    },
    /// Periodic everywhere except x. Diagnostic variant for walled
    /// systems; energy-conservation tests involving wall leaks fail with
    /// it by construction.
    PeriodicExceptX,
    /// Periodic in x only. Diagnostic variant, same caveat as above.
    PeriodicXOnly,
}

/// Boundary conditions over a given primary image.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Boundary {
    /// Extents of the primary simulation image.
    pub primary_image: Vec3,
    /// Folding rule.
    pub kind: BoundaryKind,
    /// Accumulated slide of the neighbouring y images against the primary
    /// one. Persisted so a resumed run folds identically.
    pub slide: f64,
}

fn fold(r: &mut Vec3, image: Vec3) {
    for n in 0..NDIM {
        r[n] -= image[n] * (r[n] / image[n]).round();
    }
}

impl Boundary {
    /// Builds boundary conditions for the primary image.
    #[must_use]
    pub fn new(primary_image: Vec3, kind: BoundaryKind) -> Self {
        Self {
            primary_image,
            kind,
            slide: 0.0,
        }
    }

    /// Boundary wall velocity of the image one box up in y, relative to
    /// the primary image. Zero unless shearing.
    #[must_use]
    pub fn image_velocity(&self) -> f64 {
        match self.kind {
            BoundaryKind::LeesEdwards { shear_rate } => shear_rate * self.primary_image.y,
            _ => 0.0,
        }
    }

    /// Advances the accumulated Lees-Edwards slide by `dt`.
    pub fn update(&mut self, dt: f64) {
        if let BoundaryKind::LeesEdwards { .. } = self.kind {
            self.slide += self.image_velocity() * dt;
            self.slide -= self.primary_image.x * (self.slide / self.primary_image.x).round();
        }
    }

    /// Folds a separation (or absolute position; the primary image is
    /// centred on the origin) into the primary image.
    pub fn apply(&self, r: &mut Vec3) {
        let image = self.primary_image;
        match self.kind {
            BoundaryKind::None => {}
            BoundaryKind::Periodic => fold(r, image),
            BoundaryKind::LeesEdwards { .. } => {
                let wraps = (r.y / image.y).round();
                r.x -= wraps * self.slide;
                fold(r, image);
            }
            BoundaryKind::PeriodicExceptX => {
                let x = r.x;
                fold(r, image);
                r.x = x;
            }
            BoundaryKind::PeriodicXOnly => {
                let (y, z) = (r.y, r.z);
                fold(r, image);
                r.y = y;
                r.z = z;
            }
        }
    }

    /// Folds a separation and applies the matching velocity correction.
    /// Only the shearing variant touches the velocity: a wrap in y adds
    /// the relative wall velocity to x.
    pub fn apply_with_velocity(&self, r: &mut Vec3, v: &mut Vec3) {
        if let BoundaryKind::LeesEdwards { .. } = self.kind {
            let wraps = (r.y / self.primary_image.y).round();
            v.x -= wraps * self.image_velocity();
        }
        self.apply(r);
    }
}
