//! Sampling cross-check of the analytic PFA and PFR

use rand::Rng;
use serde::Serialize;

use super::limits::RiskType;
use super::pfa::{population, TurCorrection};
use super::RiskInputs;

/// Monte Carlo estimate of the decision risks
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonteCarloResult {
    /// Number of simulated calibrations
    pub samples: usize,
    /// Fraction accepted while truly out of tolerance
    pub pfa: f64,
    /// Fraction rejected while truly in tolerance
    pub pfr: f64,
    /// Binomial standard error of `pfa`
    pub pfa_std_error: f64,
    /// Binomial standard error of `pfr`
    pub pfr_std_error: f64,
}

fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // Box-Muller; 1 - u keeps the log argument in (0, 1]
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0_f64 * u1.ln()).sqrt() * (2.0_f64 * std::f64::consts::PI * u2).cos()
}

/// Simulate `samples` calibrations at the tolerance limits
///
/// The UUT population and measurement spread are the ones [`super::pfa`]
/// uses, so the estimates converge to the analytic values. `None` where the
/// analytic PFA is undefined, or for zero samples.
pub fn simulate<R: Rng>(
    inputs: &RiskInputs,
    reliability: f64,
    correction: Option<TurCorrection>,
    samples: usize,
    rng: &mut R,
) -> Option<MonteCarloResult> {
    if samples == 0 {
        return None;
    }
    let (tol, u_uut) = population(inputs, reliability, correction)?;
    let u_cal = inputs.u_cal;

    let center = match tol.kind {
        RiskType::TwoSided => 0.0,
        RiskType::UpperThreshold | RiskType::LowerThreshold => tol.average,
        _ => return None,
    };
    let in_tolerance = |x: f64| match tol.kind {
        RiskType::UpperThreshold => x <= tol.high,
        RiskType::LowerThreshold => x >= tol.low,
        _ => x >= tol.low && x <= tol.high,
    };

    let (mut false_accepts, mut false_rejects) = (0usize, 0usize);
    for _ in 0..samples {
        let truth = center + u_uut * standard_normal(rng);
        let observed = truth + u_cal * standard_normal(rng);
        match (in_tolerance(truth), in_tolerance(observed)) {
            (false, true) => false_accepts += 1,
            (true, false) => false_rejects += 1,
            _ => {}
        }
    }

    let n = samples as f64;
    let pfa = false_accepts as f64 / n;
    let pfr = false_rejects as f64 / n;
    Some(MonteCarloResult {
        samples,
        pfa,
        pfr,
        pfa_std_error: (pfa * (1.0 - pfa) / n).sqrt(),
        pfr_std_error: (pfr * (1.0 - pfr) / n).sqrt(),
    })
}
