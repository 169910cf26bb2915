//! Calibration interval forecasts
//!
//! Reliability decays exponentially with time, so an interval `t` observed at
//! reliability `R_obs` scales to `t' = t * ln(R') / ln(R_obs)` for a target
//! end-of-period reliability `R'`.

use serde::Serialize;

use super::limits::Tolerance;
use super::pfa::{observed_reliability, pfa_at, predicted_reliability, TurCorrection};
use super::RiskInputs;
use crate::core::solver::Bisection;

/// PFA tolerance of the reliability search
pub const PFA_TOLERANCE: f64 = 1e-5;

const MAX_RELIABILITY: f64 = 1.0 - 1e-12;

/// Policy inputs of an interval forecast, as fractions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalInputs {
    /// End-of-period reliability target
    pub required_reliability: f64,
    /// Reliability observed (or assumed) over the current interval
    pub observed_reliability: f64,
    /// Current interval, in any time unit
    pub interval: f64,
    /// Set when the test fell short of the required TUR
    pub correction: Option<TurCorrection>,
}

/// `[primary, observed, predicted]` of one forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalForecast {
    /// The forecast itself: an interval, or a reliability for
    /// [`cal_reliability`]
    pub primary: f64,
    pub observed: f64,
    pub predicted: f64,
    pub converged: bool,
    pub iterations: usize,
}

fn observed(tol: &Tolerance, u_cal: f64, iv: &IntervalInputs) -> Option<f64> {
    match iv.correction {
        Some(TurCorrection { tur, required }) if required > 0.0 => {
            observed_reliability(tol, u_cal * tur / required, iv.observed_reliability, u_cal)
        }
        _ => Some(iv.observed_reliability),
    }
}

fn scaled(interval: f64, predicted: f64, observed: f64) -> Option<f64> {
    let t = predicted.ln() / observed.ln() * interval;
    t.is_finite().then_some(t)
}

/// Reliability needed so the PFA meets `required_pfa`, starting from the
/// observed reliability; never below the required reliability
fn predicted_for_pfa(
    inputs: &RiskInputs,
    iv: &IntervalInputs,
    required_pfa: f64,
    solver: &Bisection,
) -> Option<IntervalForecast> {
    let tol = inputs.tolerance()?;
    if tol.kind.is_alternate() {
        return None;
    }
    let u_cal = inputs.u_cal;
    let obs = observed(&tol, u_cal, iv)?;
    let current = pfa_at(&tol, obs, u_cal)?;

    if current <= required_pfa {
        return Some(IntervalForecast {
            primary: iv.required_reliability,
            observed: obs,
            predicted: iv.required_reliability,
            converged: true,
            iterations: 0,
        });
    }

    let search = Bisection {
        tolerance: PFA_TOLERANCE,
        ..*solver
    };
    let s = search.solve(
        |r| pfa_at(&tol, r, u_cal).unwrap_or(0.0),
        obs,
        MAX_RELIABILITY,
        required_pfa,
    );
    let predicted = s.value.max(iv.required_reliability);
    Some(IntervalForecast {
        primary: predicted,
        observed: obs,
        predicted,
        converged: s.converged,
        iterations: s.iterations,
    })
}

/// Interval that keeps the PFA at or below `required_pfa`
pub fn cal_interval(
    inputs: &RiskInputs,
    iv: &IntervalInputs,
    required_pfa: f64,
    solver: &Bisection,
) -> Option<IntervalForecast> {
    let forecast = predicted_for_pfa(inputs, iv, required_pfa, solver)?;
    Some(IntervalForecast {
        primary: scaled(iv.interval, forecast.predicted, forecast.observed)?,
        ..forecast
    })
}

/// End-of-period reliability that keeps the PFA at or below `required_pfa`
pub fn cal_reliability(
    inputs: &RiskInputs,
    iv: &IntervalInputs,
    required_pfa: f64,
    solver: &Bisection,
) -> Option<IntervalForecast> {
    predicted_for_pfa(inputs, iv, required_pfa, solver)
}

/// Interval when accepting inside the guard band `(gb_low, gb_high)`
///
/// `None` without a guard band, for alternate thresholds, or when the
/// forecast is not a positive interval.
pub fn cal_interval_with_guard_band(
    inputs: &RiskInputs,
    iv: &IntervalInputs,
    gb_low: Option<f64>,
    gb_high: Option<f64>,
) -> Option<IntervalForecast> {
    let (low, high) = (gb_low.unwrap_or(0.0), gb_high.unwrap_or(0.0));
    if low == 0.0 && high == 0.0 {
        return None;
    }
    let tol = inputs.tolerance()?;
    if tol.kind.is_alternate() {
        return None;
    }
    let obs = observed(&tol, inputs.u_cal, iv)?;
    let (a_low, a_high) = tol.acceptance(low, high);
    let predicted = predicted_reliability(&tol, inputs.u_cal, iv.required_reliability, a_low, a_high)?;
    let primary = scaled(iv.interval, predicted, obs).filter(|t| *t > 0.0)?;

    Some(IntervalForecast {
        primary,
        observed: obs,
        predicted,
        converged: true,
        iterations: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(u_cal: f64) -> RiskInputs {
        RiskInputs {
            nominal: Some(10.0),
            average: None,
            low: Some(9.0),
            high: Some(11.0),
            u_cal,
        }
    }

    fn policy() -> IntervalInputs {
        IntervalInputs {
            required_reliability: 0.9,
            observed_reliability: 0.85,
            interval: 12.0,
            correction: None,
        }
    }

    #[test]
    fn test_met_pfa_scales_to_required_reliability() {
        let f = cal_interval(&inputs(0.2), &policy(), 0.05, &Bisection::default()).unwrap();
        let expected = 0.9_f64.ln() / 0.85_f64.ln() * 12.0;
        assert!((f.primary - expected).abs() < 1e-9);
        assert_eq!(f.observed, 0.85);
        assert_eq!(f.predicted, 0.9);
        assert!(f.converged);
    }

    #[test]
    fn test_strict_pfa_shortens_interval() {
        let f = cal_interval(&inputs(0.2), &policy(), 0.01, &Bisection::default()).unwrap();
        assert!(f.converged);
        assert!((f.predicted - 0.9418).abs() < 1e-3);
        assert!(f.primary < 12.0);
        assert!((f.primary - f.predicted.ln() / 0.85_f64.ln() * 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_reliability_forecast() {
        let iv = policy();
        let rel = cal_reliability(&inputs(0.2), &iv, 0.01, &Bisection::default()).unwrap();
        let int = cal_interval(&inputs(0.2), &iv, 0.01, &Bisection::default()).unwrap();
        assert_eq!(rel.primary, rel.predicted);
        assert_eq!(rel.predicted, int.predicted);
    }

    #[test]
    fn test_guard_banded_interval() {
        let f = cal_interval_with_guard_band(&inputs(0.2), &policy(), Some(9.2), Some(10.8)).unwrap();
        assert!((f.predicted - 0.9602).abs() < 1e-3);
        assert!((f.primary - 3.0).abs() < 0.01);
        assert!(cal_interval_with_guard_band(&inputs(0.2), &policy(), None, None).is_none());
    }

    #[test]
    fn test_alternate_threshold_has_no_forecast() {
        let one_sided = RiskInputs {
            nominal: Some(5.0),
            average: None,
            low: None,
            high: Some(6.0),
            u_cal: 0.1,
        };
        assert!(cal_interval(&one_sided, &policy(), 0.02, &Bisection::default()).is_none());
        assert!(cal_interval_with_guard_band(&one_sided, &policy(), None, Some(5.8)).is_none());
    }
}
