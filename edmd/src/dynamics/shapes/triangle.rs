//! Sphere-triangle contact prediction. A sphere of radius `dist` can
//! touch a triangle on a face, an edge or a vertex; the resolver needs to
//! know which feature fired because the reflection normal differs.

use crate::vector::Vec3;

/// The triangle feature a predicted contact lands on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TriangleRegion {
    /// The interior of the face.
    Face,
    /// Vertex A.
    A,
    /// Vertex B.
    B,
    /// Vertex C.
    C,
    /// Edge from A to B.
    Ab,
    /// Edge from A to C.
    Ac,
    /// Edge from B to C.
    Bc,
}

fn vertex_root(rel: Vec3, vel: Vec3, dist: f64) -> Option<f64> {
    let rvdot = rel.dot(&vel);
    if rvdot >= 0.0 {
        return None;
    }
    let arg = rvdot * rvdot - vel.nrm2() * (rel.nrm2() - dist * dist);
    (arg > 0.0).then(|| (dist * dist - rel.nrm2()) / (rvdot - arg.sqrt()))
}

fn edge_root(rel: Vec3, vel: Vec3, edge: Vec3, dist: f64) -> Option<f64> {
    // Work in the plane perpendicular to the edge.
    let ehat = edge.normalized();
    let rel_p = rel - ehat * rel.dot(&ehat);
    let vel_p = vel - ehat * vel.dot(&ehat);

    let dt = vertex_root(rel_p, vel_p, dist)?;

    // Contact point must project onto the segment.
    let along = (rel + vel * dt).dot(&ehat);
    (along >= 0.0 && along <= edge.nrm()).then_some(dt)
}

fn face_root(rel: Vec3, vel: Vec3, ab: Vec3, ac: Vec3, dist: f64) -> Option<f64> {
    let normal = ab.cross(&ac).normalized();
    // Offset the plane towards the sphere side.
    let side = if rel.dot(&normal) < 0.0 { -1.0 } else { 1.0 };
    let offset = rel.dot(&normal) * side - dist;
    let rate = vel.dot(&normal) * side;

    if rate >= 0.0 {
        return None;
    }
    let dt = -offset / rate;
    if dt < 0.0 {
        return None;
    }

    // Barycentric inside test at the contact point.
    let hit = rel + vel * dt - normal * (dist * side);
    let d00 = ab.dot(&ab);
    let d01 = ab.dot(&ac);
    let d11 = ac.dot(&ac);
    let d20 = hit.dot(&ab);
    let d21 = hit.dot(&ac);
    let denom = d00 * d11 - d01 * d01;
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;

    (v >= 0.0 && w >= 0.0 && v + w <= 1.0).then_some(dt)
}

/// Earliest contact of a ballistically moving sphere center `pos`,
/// velocity `vel`, with the triangle `(a, b, c)` at contact distance
/// `dist`. Returns the time and the feature struck.
#[must_use]
pub fn sphere_triangle_root(pos: Vec3, vel: Vec3, a: Vec3, b: Vec3, c: Vec3, dist: f64)
    -> Option<(f64, TriangleRegion)> {
    let ab = b - a;
    let ac = c - a;
    let bc = c - b;

    let mut best: Option<(f64, TriangleRegion)> = None;
    let mut consider = |root: Option<f64>, region: TriangleRegion| {
        if let Some(dt) = root {
            if dt >= 0.0 && best.map_or(true, |(t, _)| dt < t) {
                best = Some((dt, region));
            }
        }
    };

    consider(face_root(pos - a, vel, ab, ac, dist), TriangleRegion::Face);
    consider(edge_root(pos - a, vel, ab, dist), TriangleRegion::Ab);
    consider(edge_root(pos - a, vel, ac, dist), TriangleRegion::Ac);
    consider(edge_root(pos - b, vel, bc, dist), TriangleRegion::Bc);
    consider(vertex_root(pos - a, vel, dist), TriangleRegion::A);
    consider(vertex_root(pos - b, vel, dist), TriangleRegion::B);
    consider(vertex_root(pos - c, vel, dist), TriangleRegion::C);

    best
}

/// Outward normal of the struck feature at the contact time, used by the
/// resolver to reflect the velocity.
#[must_use]
pub fn region_normal(pos: Vec3, a: Vec3, b: Vec3, c: Vec3, region: TriangleRegion) -> Vec3 {
    let perp = |rel: Vec3, edge: Vec3| {
        let ehat = edge.normalized();
        (rel - ehat * rel.dot(&ehat)).normalized()
    };
    match region {
        TriangleRegion::Face => {
            let n = (b - a).cross(&(c - a)).normalized();
            if (pos - a).dot(&n) < 0.0 { -n } else { n }
        }
        TriangleRegion::A => (pos - a).normalized(),
        TriangleRegion::B => (pos - b).normalized(),
        TriangleRegion::C => (pos - c).normalized(),
        TriangleRegion::Ab => perp(pos - a, b - a),
        TriangleRegion::Ac => perp(pos - a, c - a),
        TriangleRegion::Bc => perp(pos - b, c - b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn triangle() -> (Vec3, Vec3, Vec3) {
        (
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        )
    }

    #[test]
    fn face_hit_over_the_interior() {
        let (a, b, c) = triangle();
        let (dt, region) = sphere_triangle_root(
            Vec3::new(0.5, 0.5, 3.0),
            Vec3::new(0.0, 0.0, -1.0),
            a,
            b,
            c,
            0.5,
        )
        .unwrap();
        assert_eq!(region, TriangleRegion::Face);
        assert_approx_eq!(f64, dt, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn vertex_hit_outside_the_face() {
        let (a, b, c) = triangle();
        // Dropping straight down well outside the triangle beside vertex
        // B: only the vertex sphere can fire.
        let (dt, region) = sphere_triangle_root(
            Vec3::new(2.3, 0.0, 3.0),
            Vec3::new(0.0, 0.0, -1.0),
            a,
            b,
            c,
            0.5,
        )
        .unwrap();
        assert_eq!(region, TriangleRegion::B);
        // Contact when sqrt(0.3^2 + z^2) = 0.5 => z = 0.4.
        assert_approx_eq!(f64, dt, 2.6, epsilon = 1e-12);
    }

    #[test]
    fn edge_hit_beyond_the_rim() {
        let (a, b, c) = triangle();
        let (dt, region) = sphere_triangle_root(
            Vec3::new(1.0, -0.3, 3.0),
            Vec3::new(0.0, 0.0, -1.0),
            a,
            b,
            c,
            0.5,
        )
        .unwrap();
        assert_eq!(region, TriangleRegion::Ab);
        // Contact when sqrt(0.3^2 + z^2) = 0.5 around the AB line.
        assert_approx_eq!(f64, dt, 2.6, epsilon = 1e-12);
    }

    #[test]
    fn receding_sphere_never_hits() {
        let (a, b, c) = triangle();
        assert!(sphere_triangle_root(
            Vec3::new(0.5, 0.5, 3.0),
            Vec3::new(0.0, 0.0, 1.0),
            a,
            b,
            c,
            0.5,
        )
        .is_none());
    }

    #[test]
    fn face_normal_points_at_the_sphere() {
        let (a, b, c) = triangle();
        let n = region_normal(Vec3::new(0.5, 0.5, -2.0), a, b, c, TriangleRegion::Face);
        assert_approx_eq!(f64, n.z, -1.0);
    }
}
