//! Guard-banded acceptance limits
//!
//! The acceptance region is scaled by a multiplier `m` in `[0, 1]` toward
//! the nominal (or average, for thresholds) until the PFA falls inside
//! `[target - 1e-5, target]`. For targets at or below `1e-5` the window's
//! lower edge is half the target, so a collapsed region (PFA 0) never
//! counts as a solution.

use serde::Serialize;

use super::limits::{RiskType, Tolerance};
use super::pfa::{pfa_core, uut_std};
use super::RiskInputs;
use crate::core::solver::{Bisection, Solution};
use crate::core::stats::{inverse_normal, normal_cdf};

/// Width of the accepted PFA window below the target
pub const PFA_WINDOW: f64 = 1e-5;

/// A solved guard-band limit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GuardBand {
    /// Absolute acceptance limit
    pub limit: f64,
    /// Fraction of the original half-span kept; absent for thresholds with
    /// no known average
    pub multiplier: Option<f64>,
    pub converged: bool,
    pub iterations: usize,
}

/// Ratio of guard-banded to original half-spans
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GuardBandRatio {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// The single figure to report: the upper side, or the lower side for
    /// lower thresholds
    pub reported: f64,
}

fn acceptance(tol: &Tolerance, m: f64) -> (f64, f64) {
    match tol.kind {
        RiskType::TwoSided => (tol.low * m, tol.high * m),
        RiskType::LowerThreshold => (tol.average - (tol.average - tol.low) * m, tol.high),
        RiskType::UpperThreshold => (tol.low, (tol.high - tol.average) * m + tol.average),
        _ => (tol.low, tol.high),
    }
}

/// Reliability of the observed population at the tolerance limits
fn observed_end_of_period(tol: &Tolerance, u_uut: f64, u_cal: f64) -> f64 {
    let u_dev = u_uut.hypot(u_cal);
    match tol.kind {
        RiskType::TwoSided => normal_cdf(tol.high / u_dev) - normal_cdf(tol.low / u_dev),
        RiskType::LowerThreshold => normal_cdf((tol.average - tol.low) / u_dev),
        _ => normal_cdf((tol.high - tol.average) / u_dev),
    }
}

fn solve_multiplier(tol: &Tolerance, u_uut: f64, u_cal: f64, target: f64, solver: &Bisection) -> Solution {
    let reop = observed_end_of_period(tol, u_uut, u_cal);
    let pfa_at = |m: f64| {
        let (a_low, a_high) = acceptance(tol, m);
        match uut_std(tol, reop, u_cal, a_low, a_high) {
            Some(u) if u > 0.0 => pfa_core(tol, u, u_cal, a_low, a_high).map_or(0.0, |t| t.total),
            _ => 0.0,
        }
    };

    let unbanded = pfa_at(1.0);
    if unbanded <= target {
        return Solution {
            value: 1.0,
            residual: unbanded - target,
            iterations: 0,
            converged: true,
        };
    }
    let low_target = (target - PFA_WINDOW).max(target / 2.0);
    solver.solve_within(pfa_at, 0.0, 1.0, low_target, target)
}

fn banded(tol: &Tolerance, inputs: &RiskInputs, reliability: f64, target: f64, solver: &Bisection) -> Option<Solution> {
    let u_uut = uut_std(tol, reliability, inputs.u_cal, tol.low, tol.high)?;
    if u_uut <= 0.0 {
        return None;
    }
    Some(solve_multiplier(tol, u_uut, inputs.u_cal, target, solver))
}

fn alternate(limit: f64) -> GuardBand {
    GuardBand {
        limit,
        multiplier: None,
        converged: true,
        iterations: 0,
    }
}

fn from_solution(limit: f64, s: Solution) -> GuardBand {
    GuardBand {
        limit,
        multiplier: Some(s.value),
        converged: s.converged,
        iterations: s.iterations,
    }
}

/// Guard-banded lower acceptance limit for a PFA of at most `target_pfa`
pub fn guard_band_low(
    inputs: &RiskInputs,
    reliability: f64,
    target_pfa: f64,
    solver: &Bisection,
) -> Option<GuardBand> {
    let tol = inputs.tolerance()?;
    match tol.kind {
        RiskType::TwoSided => {
            let s = banded(&tol, inputs, reliability, target_pfa, solver)?;
            Some(from_solution(tol.nominal + tol.low * s.value, s))
        }
        RiskType::LowerThreshold => {
            let s = banded(&tol, inputs, reliability, target_pfa, solver)?;
            Some(from_solution(tol.average - (tol.average - tol.low) * s.value, s))
        }
        RiskType::AltLowerThreshold => Some(alternate(tol.low - inverse_normal(target_pfa) * inputs.u_cal)),
        _ => None,
    }
}

/// Guard-banded upper acceptance limit for a PFA of at most `target_pfa`
pub fn guard_band_up(
    inputs: &RiskInputs,
    reliability: f64,
    target_pfa: f64,
    solver: &Bisection,
) -> Option<GuardBand> {
    let tol = inputs.tolerance()?;
    match tol.kind {
        RiskType::TwoSided => {
            let s = banded(&tol, inputs, reliability, target_pfa, solver)?;
            Some(from_solution(tol.nominal + tol.high * s.value, s))
        }
        RiskType::UpperThreshold => {
            let s = banded(&tol, inputs, reliability, target_pfa, solver)?;
            Some(from_solution((tol.high - tol.average) * s.value + tol.average, s))
        }
        RiskType::AltUpperThreshold => Some(alternate(tol.high + inverse_normal(target_pfa) * inputs.u_cal)),
        _ => None,
    }
}

/// Guard-banded half-span as a fraction of the original one
///
/// `None` when no guard band is set, or for thresholds without an average.
pub fn guard_band_multiplier(
    nominal: Option<f64>,
    average: Option<f64>,
    low: Option<f64>,
    high: Option<f64>,
    gb_low: Option<f64>,
    gb_high: Option<f64>,
) -> Option<GuardBandRatio> {
    if gb_low.unwrap_or(0.0) == 0.0 && gb_high.unwrap_or(0.0) == 0.0 {
        return None;
    }
    let tol = Tolerance::classify(nominal, average, low, high)?;
    let ratio = |band: Option<f64>, center: f64, limit: f64| {
        let span = (limit - center).abs();
        band.filter(|_| span > 0.0).map(|b| (b - center).abs() / span)
    };

    let (lower, upper) = match tol.kind {
        RiskType::TwoSided => (
            ratio(gb_low, tol.nominal, tol.nominal + tol.low),
            ratio(gb_high, tol.nominal, tol.nominal + tol.high),
        ),
        RiskType::UpperThreshold => (None, ratio(gb_high, tol.average, tol.high)),
        RiskType::LowerThreshold => (ratio(gb_low, tol.average, tol.low), None),
        _ => return None,
    };

    let reported = upper.or(lower)?;
    Some(GuardBandRatio { lower, upper, reported })
}
