//! The Frenkel-Maguire root search: a bracketed Newton iteration that
//! uses a bound on `|F''|` to shrink the bracket without ever stepping
//! over a sign change.

use super::Shape;
use crate::dynamics::math::{quad_solve, RootSelector};

const WINDOW_SHRINKS: usize = 1000;
const NEWTON_STEPS: usize = 1000;

/// Hunts the earliest root of `shape.f()` inside `[t_low, t_high]`.
///
/// Alternates working from either end of the bracket. At each end the
/// quadratic model `f + f' dt + f''_max dt^2 / 2` (with the bound's sign
/// chosen against `f`) yields a step that provably cannot skip a root,
/// which is used to advance that end; the true local quadratic model
/// seeds a Newton iteration from the same point. Converged when the
/// Newton step falls below `tol / df_max`.
///
/// Returns `None` when the bracket empties or the iteration caps are
/// exhausted (a degenerate search reports "no root" rather than looping).
pub fn quad_root_hunter<S: Shape>(shape: &S, tol: f64, t_low: &mut f64, t_high: &mut f64)
    -> Option<f64> {
    let timescale = tol / shape.df_max();
    let mut forward = false;

    for _ in 0..WINDOW_SHRINKS {
        if *t_low >= *t_high {
            return None;
        }

        // Always try again from the other side; an unbounded window can
        // only be worked from below.
        forward = !forward || !t_high.is_finite();
        let mut working_time = if forward { *t_low } else { *t_high };

        let mut local = shape.clone();
        local.stream(working_time);

        let delta_t = {
            let f0 = local.f();
            let f1 = local.df();
            let half_f2 = 0.5 * local.d2f();
            let mut half_f2_max = 0.5 * local.d2f_max();
            if f0 > 0.0 {
                half_f2_max = -half_f2_max;
            }

            // Enhance this end of the bracket; if the guaranteed-root-free
            // step has no solution the bracket holds no root at all.
            let selector = if forward {
                RootSelector::SmallestPositive
            } else {
                RootSelector::SmallestNegative
            };
            let enhancer = quad_solve(f0, f1, half_f2_max, selector)?;
            if forward {
                *t_low += enhancer;
            } else {
                *t_high += enhancer;
            }

            match quad_solve(f0, f1, half_f2, RootSelector::SmallestPositive) {
                Some(dt) => dt,
                None => continue,
            }
        };

        if working_time + delta_t > *t_high || working_time + delta_t < *t_low {
            continue;
        }

        let mut delta_t = delta_t;
        for _ in 0..NEWTON_STEPS {
            working_time += delta_t;
            if working_time > *t_high || working_time < *t_low {
                break;
            }

            local.stream(delta_t);

            match quad_solve(local.f(), local.df(), 0.5 * local.d2f(),
                RootSelector::SmallestEither)
            {
                Some(dt) => delta_t = dt,
                None => break,
            }

            if delta_t.abs() < timescale {
                return Some(working_time + delta_t);
            }
        }
    }

    None
}

/// Finds the earliest *physical* root in `[t_low, t_high]`: hunts roots
/// of `f` and discards those the shape rejects (a line crossing outside
/// the rod length, say), restarting past the rejected root by the
/// guaranteed step `|2 f'| / f''_max`.
pub fn frenkel_root_search<S: Shape>(shape: &S, tol: f64, mut t_low: f64, mut t_high: f64)
    -> Option<f64> {
    for _ in 0..100 {
        let root = quad_root_hunter(shape, tol, &mut t_low, &mut t_high)?;

        let mut at_root = shape.clone();
        at_root.stream(root);
        if at_root.test_root() {
            return Some(root);
        }

        // Not a physical contact: skip past this root and hunt again.
        // Degenerate (flat) shapes yield a zero skip; force progress so
        // the same root cannot be rediscovered forever.
        let mut skip = (2.0 * at_root.df()).abs() / at_root.d2f_max();
        if !skip.is_finite() || skip == 0.0 {
            skip = tol.max(f64::EPSILON * root.abs()).max(f64::MIN_POSITIVE);
        }
        t_low = root + skip;
        if t_low > t_high {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A ball on a line approaching the origin: f(t) = r + v t, with
    /// exact derivative data. Root at -r/v.
    #[derive(Clone)]
    struct Linear {
        r: f64,
        v: f64,
    }

    impl Shape for Linear {
        fn stream(&mut self, dt: f64) {
            self.r += self.v * dt;
        }
        fn f(&self) -> f64 {
            self.r
        }
        fn df(&self) -> f64 {
            self.v
        }
        fn df_max(&self) -> f64 {
            self.v.abs()
        }
        fn d2f(&self) -> f64 {
            0.0
        }
        fn d2f_max(&self) -> f64 {
            1e-10
        }
        fn test_root(&self) -> bool {
            true
        }
    }

    /// Oscillation around zero: f(t) = cos(t) - 0.5, first root at pi/3.
    #[derive(Clone)]
    struct Cosine {
        t: f64,
    }

    impl Shape for Cosine {
        fn stream(&mut self, dt: f64) {
            self.t += dt;
        }
        fn f(&self) -> f64 {
            self.t.cos() - 0.5
        }
        fn df(&self) -> f64 {
            -self.t.sin()
        }
        fn df_max(&self) -> f64 {
            1.0
        }
        fn d2f(&self) -> f64 {
            -self.t.cos()
        }
        fn d2f_max(&self) -> f64 {
            1.0
        }
        fn test_root(&self) -> bool {
            true
        }
    }

    #[test]
    fn linear_root() {
        let shape = Linear { r: 2.0, v: -1.0 };
        let root = frenkel_root_search(&shape, 1e-10, 0.0, 10.0).unwrap();
        assert!((root - 2.0).abs() < 1e-8);
    }

    #[test]
    fn cosine_first_root() {
        let shape = Cosine { t: 0.0 };
        let root = frenkel_root_search(&shape, 1e-12, 0.0, 6.0).unwrap();
        assert!((root - std::f64::consts::FRAC_PI_3).abs() < 1e-8);
    }

    #[test]
    fn empty_bracket_reports_no_root() {
        let shape = Linear { r: 2.0, v: 1.0 };
        assert!(frenkel_root_search(&shape, 1e-10, 0.0, 10.0).is_none());
    }
}
