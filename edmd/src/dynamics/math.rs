//! Scalar root finding: numerically stable quadratics, real cubic roots
//! and bisection refinement. These are the primitives under every
//! polynomial event predictor.

/// Which root of a quadratic the caller wants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RootSelector {
    /// Smallest root greater than zero.
    SmallestPositive,
    /// Negative root closest to zero.
    SmallestNegative,
    /// Real root of smallest magnitude.
    SmallestEither,
}

/// Solves `c + b t + a t^2 = 0` and returns the selected real root.
/// Uses the `q = -(b + sign(b) sqrt(disc)) / 2` formulation so the
/// subtraction of nearly equal quantities is avoided.
#[must_use]
pub fn quad_solve(c: f64, b: f64, a: f64, selector: RootSelector) -> Option<f64> {
    if a == 0.0 {
        if b == 0.0 {
            return None;
        }
        let root = -c / b;
        return match selector {
            RootSelector::SmallestPositive => (root > 0.0).then_some(root),
            RootSelector::SmallestNegative => (root < 0.0).then_some(root),
            RootSelector::SmallestEither => Some(root),
        };
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let q = if b < 0.0 {
        -0.5 * (b - disc.sqrt())
    } else {
        -0.5 * (b + disc.sqrt())
    };

    let (r1, r2) = if q == 0.0 { (0.0, 0.0) } else { (q / a, c / q) };

    match selector {
        RootSelector::SmallestPositive => match (r1 > 0.0, r2 > 0.0) {
            (true, true) => Some(r1.min(r2)),
            (true, false) => Some(r1),
            (false, true) => Some(r2),
            (false, false) => None,
        },
        RootSelector::SmallestNegative => match (r1 < 0.0, r2 < 0.0) {
            (true, true) => Some(r1.max(r2)),
            (true, false) => Some(r1),
            (false, true) => Some(r2),
            (false, false) => None,
        },
        RootSelector::SmallestEither => {
            Some(if r1.abs() < r2.abs() { r1 } else { r2 })
        }
    }
}

/// Solves `c + b t + a t^2 = 0`, returning both real roots in ascending
/// order.
#[must_use]
pub fn quad_solve_both(c: f64, b: f64, a: f64) -> Option<(f64, f64)> {
    if a == 0.0 {
        if b == 0.0 {
            return None;
        }
        let r = -c / b;
        return Some((r, r));
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let q = if b < 0.0 {
        -0.5 * (b - disc.sqrt())
    } else {
        -0.5 * (b + disc.sqrt())
    };
    let (r1, r2) = if q == 0.0 { (0.0, 0.0) } else { (q / a, c / q) };
    Some(if r1 <= r2 { (r1, r2) } else { (r2, r1) })
}

/// Real roots of the normalized cubic `t^3 + p t^2 + q t + r = 0`,
/// ascending. One or three roots (a double root is reported twice).
#[must_use]
pub fn cubic_solve(p: f64, q: f64, r: f64) -> Vec<f64> {
    // Depressed form t = s - p/3: s^3 + a s + b = 0.
    let a = q - p * p / 3.0;
    let b = 2.0 * p * p * p / 27.0 - p * q / 3.0 + r;
    let shift = -p / 3.0;

    let disc = b * b / 4.0 + a * a * a / 27.0;

    let mut roots = if disc > 0.0 {
        // One real root, Cardano.
        let sd = disc.sqrt();
        let u = (-b / 2.0 + sd).cbrt();
        let v = (-b / 2.0 - sd).cbrt();
        vec![u + v + shift]
    } else if a == 0.0 && b == 0.0 {
        vec![shift, shift, shift]
    } else {
        // Three real roots, trigonometric method.
        let m = 2.0 * (-a / 3.0).sqrt();
        let theta = (3.0 * b / (a * m)).clamp(-1.0, 1.0).acos() / 3.0;
        let tau = 2.0 * std::f64::consts::PI / 3.0;
        vec![
            m * theta.cos() + shift,
            m * (theta - tau).cos() + shift,
            m * (theta + tau).cos() + shift,
        ]
    };

    roots.sort_by(f64::total_cmp);
    roots
}

/// Refines a bracketed sign change of `f` on `[low, high]` down to
/// `tol` by bisection. The caller guarantees `f(low)` and `f(high)`
/// differ in sign.
#[must_use]
pub fn bisect_root(f: impl Fn(f64) -> f64, mut low: f64, mut high: f64, tol: f64) -> f64 {
    let f_low = f(low);
    for _ in 0..200 {
        let mid = 0.5 * (low + high);
        if high - low < tol {
            return mid;
        }
        if (f(mid) > 0.0) == (f_low > 0.0) {
            low = mid;
        } else {
            high = mid;
        }
    }
    0.5 * (low + high)
}
