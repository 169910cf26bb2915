//! Bounded bisection for monotonic objectives
//!
//! Shared by the guard-band, calibration-interval, and t-quantile solvers.
//! Every search stops after `max_iterations` evaluations and reports whether
//! it reached its acceptance criterion.

use serde::Serialize;

/// Bisection settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bisection {
    /// Largest accepted |f(x) - target|
    pub tolerance: f64,

    /// Maximum number of midpoint evaluations
    pub max_iterations: usize,
}

impl Default for Bisection {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

/// Outcome of a bounded search
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Solution {
    /// Best argument found
    pub value: f64,

    /// f(value) - target
    pub residual: f64,

    /// Midpoint evaluations spent
    pub iterations: usize,

    /// Whether the acceptance criterion was met
    pub converged: bool,
}

impl Bisection {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Find x in `[lo, hi]` with `|f(x) - target| <= tolerance`
    ///
    /// `f` may be increasing or decreasing on the bracket. If the target is
    /// not bracketed the closer endpoint is returned unconverged.
    pub fn solve<F>(&self, f: F, lo: f64, hi: f64, target: f64) -> Solution
    where
        F: FnMut(f64) -> f64,
    {
        let tolerance = self.tolerance;
        self.search(f, lo, hi, target, |y| (y - target).abs() <= tolerance, |_| true)
    }

    /// Find x in `[lo, hi]` with `f(x)` inside `[low_target, high_target]`
    ///
    /// The search aims at the middle of the window and accepts any point
    /// inside it. An unconverged search returns the closest point with
    /// `f(x) <= high_target` when one was evaluated.
    pub fn solve_within<F>(&self, f: F, lo: f64, hi: f64, low_target: f64, high_target: f64) -> Solution
    where
        F: FnMut(f64) -> f64,
    {
        let target = (low_target + high_target) / 2.0;
        self.search(
            f,
            lo,
            hi,
            target,
            |y| y >= low_target && y <= high_target,
            |y| y <= high_target,
        )
    }

    fn search<F, A, P>(&self, mut f: F, mut lo: f64, mut hi: f64, target: f64, accept: A, feasible: P) -> Solution
    where
        F: FnMut(f64) -> f64,
        A: Fn(f64) -> bool,
        P: Fn(f64) -> bool,
    {
        // feasible points win over infeasible ones, then the smaller residual
        let better = |candidate: f64, incumbent: f64| {
            match (feasible(candidate + target), feasible(incumbent + target)) {
                (true, false) => true,
                (false, true) => false,
                _ => candidate.abs() < incumbent.abs(),
            }
        };

        let g_lo = f(lo) - target;
        let g_hi = f(hi) - target;

        let mut best = if better(g_hi, g_lo) { (hi, g_hi) } else { (lo, g_lo) };

        if accept(g_lo + target) {
            return Self::finish((lo, g_lo), 0, true);
        }
        if accept(g_hi + target) {
            return Self::finish((hi, g_hi), 0, true);
        }
        if !(g_lo.is_finite() && g_hi.is_finite()) || g_lo.signum() == g_hi.signum() {
            return Self::finish(best, 0, false);
        }

        let increasing = g_lo < 0.0;
        for i in 1..=self.max_iterations {
            let mid = (lo + hi) / 2.0;
            let g_mid = f(mid) - target;

            if better(g_mid, best.1) {
                best = (mid, g_mid);
            }
            if accept(g_mid + target) {
                return Self::finish((mid, g_mid), i, true);
            }
            if g_mid.is_nan() {
                return Self::finish(best, i, false);
            }

            if (g_mid < 0.0) == increasing {
                lo = mid;
            } else {
                hi = mid;
            }

            // bracket collapsed to adjacent floats
            if (hi - lo).abs() <= f64::EPSILON * mid.abs().max(1.0) {
                return Self::finish(best, i, false);
            }
        }

        Self::finish(best, self.max_iterations, false)
    }

    fn finish(point: (f64, f64), iterations: usize, converged: bool) -> Solution {
        Solution {
            value: point.0,
            residual: point.1,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_increasing() {
        let s = Bisection::default().solve(|x| x * x, 0.0, 2.0, 2.0);
        assert!(s.converged);
        assert!((s.value - 2.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_solve_decreasing() {
        let s = Bisection::default().solve(|x| 1.0 - x, 0.0, 1.0, 0.25);
        assert!(s.converged);
        assert!((s.value - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_unbracketed_target_is_flagged() {
        let s = Bisection::default().solve(|x| x, 0.0, 1.0, 5.0);
        assert!(!s.converged);
        assert_eq!(s.value, 1.0);
        assert_eq!(s.iterations, 0);
    }

    #[test]
    fn test_iteration_budget_is_respected() {
        let s = Bisection::new(1e-15, 5).solve(|x| x * x, 0.0, 2.0, 2.0);
        assert!(!s.converged);
        assert_eq!(s.iterations, 5);
        assert!((s.value - 2.0_f64.sqrt()).abs() < 0.1);
    }

    #[test]
    fn test_solve_within_window() {
        let s = Bisection::default().solve_within(|x| x, 0.0, 1.0, 0.3, 0.31);
        assert!(s.converged);
        assert!(s.value >= 0.3 && s.value <= 0.31);
    }

    #[test]
    fn test_unconverged_window_prefers_points_below_high_target() {
        // midpoints 0.5, 0.25, 0.125: 0.25 is closer to 0.205 but above 0.21
        let s = Bisection::new(1e-10, 3).solve_within(|x| x, 0.0, 1.0, 0.2, 0.21);
        assert!(!s.converged);
        assert_eq!(s.iterations, 3);
        assert_eq!(s.value, 0.125);
    }

    #[test]
    fn test_endpoint_already_accepted() {
        let s = Bisection::default().solve(|x| x, 0.0, 1.0, 1.0);
        assert!(s.converged);
        assert_eq!(s.value, 1.0);
        assert_eq!(s.iterations, 0);
    }
}
