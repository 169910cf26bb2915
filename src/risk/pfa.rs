//! Probability of false accept and false reject
//!
//! The UUT's true deviation is normal with a standard deviation back-solved
//! from its reliability (the fraction in tolerance); the measurement adds an
//! independent normal error of `u_cal`. With `u_dev = sqrt(u_uut² + u_cal²)`
//! the true and measured values correlate with `ρ = u_uut / u_dev`, and each
//! risk is a pair of bivariate-normal rectangle integrals.

use serde::Serialize;

use super::limits::{RiskType, Tolerance};
use super::RiskInputs;
use crate::core::stats::{bivariate_normal_cdf, inverse_normal, normal_cdf};

/// A risk and its decomposition, as fractions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskTerms {
    pub total: f64,
    /// Contribution below the lower limit
    pub lower: f64,
    /// Contribution above the upper limit
    pub upper: f64,
    /// Standard deviation of the UUT population
    pub u_uut: f64,
    /// Standard deviation of the observed values
    pub u_dev: f64,
    /// Correlation between true and observed values
    pub correlation: f64,
}

/// Reliability correction for a test that did not meet the required TUR
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TurCorrection {
    /// TUR actually achieved
    pub tur: f64,
    /// TUR the reliability target assumes
    pub required: f64,
}

fn uut_from_deviation(u_dev: f64, u_cal: f64) -> f64 {
    let variance = u_dev * u_dev - u_cal * u_cal;
    if variance <= 0.0 || variance.is_nan() {
        0.0
    } else {
        variance.sqrt()
    }
}

/// UUT standard deviation for symmetric limits holding fraction `r`
pub fn uut_unc(r: f64, u_cal: f64, low: f64, high: f64) -> f64 {
    let mid = (high + low) / 2.0;
    let u_dev = (high - mid).abs() / inverse_normal((1.0 + r) / 2.0);
    uut_from_deviation(u_dev, u_cal)
}

/// UUT standard deviation below a lower limit
pub fn uut_unc_ll(r: f64, u_cal: f64, average: f64, low: f64) -> f64 {
    let (average, low) = if low > average { (low, average) } else { (average, low) };
    let u_dev = (low - average) / inverse_normal(1.0 - r);
    uut_from_deviation(u_dev, u_cal)
}

/// UUT standard deviation above an upper limit
pub fn uut_unc_ul(r: f64, u_cal: f64, average: f64, high: f64) -> f64 {
    let (average, high) = if high < average { (high, average) } else { (average, high) };
    let u_dev = (high - average) / inverse_normal(r);
    uut_from_deviation(u_dev, u_cal)
}

/// UUT standard deviation for the tolerance shape, from limits `(low, high)`
pub(crate) fn uut_std(tol: &Tolerance, r: f64, u_cal: f64, low: f64, high: f64) -> Option<f64> {
    match tol.kind {
        RiskType::TwoSided => Some(uut_unc(r, u_cal, low, high)),
        RiskType::UpperThreshold => Some(uut_unc_ul(r, u_cal, tol.average, high)),
        RiskType::LowerThreshold => Some(uut_unc_ll(r, u_cal, tol.average, low)),
        _ => None,
    }
}

fn terms(total: f64, lower: f64, upper: f64, u_uut: f64, u_cal: f64) -> RiskTerms {
    let u_dev = u_uut.hypot(u_cal);
    RiskTerms {
        total,
        lower,
        upper,
        u_uut,
        u_dev,
        correlation: u_uut / u_dev,
    }
}

/// PFA with the tolerance's limits as the spec region and `(a_low, a_high)`
/// as the acceptance region
pub(crate) fn pfa_core(tol: &Tolerance, u_uut: f64, u_cal: f64, a_low: f64, a_high: f64) -> Option<RiskTerms> {
    let u_dev = u_uut.hypot(u_cal);
    let rho = u_uut / u_dev;
    let phi2 = |a: f64, b: f64| bivariate_normal_cdf(a, b, rho);

    match tol.kind {
        RiskType::TwoSided => {
            let (l, u) = (tol.low, tol.high);
            let lower = phi2(l / u_uut, a_high / u_dev) - phi2(l / u_uut, a_low / u_dev);
            let upper = phi2(-u / u_uut, -a_low / u_dev) - phi2(-u / u_uut, -a_high / u_dev);
            Some(terms(lower + upper, lower, upper, u_uut, u_cal))
        }
        RiskType::UpperThreshold => {
            let z = (tol.high - tol.average) / u_uut;
            let total = 1.0 - normal_cdf(z) - phi2(-z, -(a_high - tol.average) / u_dev);
            Some(terms(total, 0.0, total, u_uut, u_cal))
        }
        RiskType::LowerThreshold => {
            let z = (tol.low - tol.average) / u_uut;
            let total = normal_cdf(z) - phi2(z, (a_low - tol.average) / u_dev);
            Some(terms(total, total, 0.0, u_uut, u_cal))
        }
        _ => None,
    }
}

/// PFR: true value in tolerance, observed value outside `(a_low, a_high)`
pub(crate) fn pfr_core(tol: &Tolerance, u_uut: f64, u_cal: f64, a_low: f64, a_high: f64) -> Option<RiskTerms> {
    let u_dev = u_uut.hypot(u_cal);
    let rho = u_uut / u_dev;
    let phi2 = |a: f64, b: f64| bivariate_normal_cdf(a, b, rho);

    match tol.kind {
        RiskType::TwoSided => {
            let (l, u) = (tol.low, tol.high);
            let lower = phi2(u / u_uut, a_low / u_dev) - phi2(l / u_uut, a_low / u_dev);
            let upper = phi2(-l / u_uut, -a_high / u_dev) - phi2(-u / u_uut, -a_high / u_dev);
            Some(terms(lower + upper, lower, upper, u_uut, u_cal))
        }
        RiskType::UpperThreshold => {
            let z = (tol.high - tol.average) / u_uut;
            let total = normal_cdf(z) - phi2(z, (a_high - tol.average) / u_dev);
            Some(terms(total, 0.0, total, u_uut, u_cal))
        }
        RiskType::LowerThreshold => {
            let z = (tol.low - tol.average) / u_uut;
            let total = 1.0 - normal_cdf(z) - phi2(-z, -(a_low - tol.average) / u_dev);
            Some(terms(total, total, 0.0, u_uut, u_cal))
        }
        _ => None,
    }
}

/// Fraction of observed values inside the tolerance when the UUT population
/// is sized for reliability `r` over `(low, high)` with a standard of
/// `cal_unc`, and measured with `meas_unc`
fn reliability_at(tol: &Tolerance, cal_unc: f64, r: f64, meas_unc: f64, low: f64, high: f64) -> Option<f64> {
    let bias = uut_std(tol, r, cal_unc, low, high)?;
    let dev = meas_unc.hypot(bias);
    let value = match tol.kind {
        RiskType::TwoSided => normal_cdf(tol.high / dev) - normal_cdf(tol.low / dev),
        RiskType::UpperThreshold => normal_cdf((tol.high - tol.average) / dev),
        RiskType::LowerThreshold => 1.0 - normal_cdf((tol.low - tol.average) / dev),
        _ => return None,
    };
    Some(value)
}

/// Reliability observed with a standard of uncertainty `cal_unc`
pub fn observed_reliability(tol: &Tolerance, cal_unc: f64, r: f64, meas_unc: f64) -> Option<f64> {
    reliability_at(tol, cal_unc, r, meas_unc, tol.low, tol.high)
}

/// Reliability predicted when accepting inside the guard band
/// `(gb_low, gb_high)`, given in the tolerance's frame
pub fn predicted_reliability(tol: &Tolerance, u_cal: f64, r: f64, gb_low: f64, gb_high: f64) -> Option<f64> {
    reliability_at(tol, u_cal, r, u_cal, gb_low, gb_high)
}

/// Reliability as seen through the standard the target assumes
///
/// A test at `tur` below `required` used a standard `tur / required` times
/// better than the one the reliability was stated for.
pub(crate) fn corrected_reliability(tol: &Tolerance, r: f64, u_cal: f64, correction: Option<TurCorrection>) -> f64 {
    let Some(TurCorrection { tur, required }) = correction else {
        return r;
    };
    if required <= 0.0 || tol.kind.is_alternate() {
        return r;
    }
    let cal_unc = u_cal * tur / required;
    observed_reliability(tol, cal_unc, r, u_cal).unwrap_or(r)
}

/// PFA at the tolerance limits for reliability `r`; `None` when the UUT
/// population has no spread left after removing `u_cal`
pub(crate) fn pfa_at(tol: &Tolerance, r: f64, u_cal: f64) -> Option<f64> {
    let u_uut = uut_std(tol, r, u_cal, tol.low, tol.high)?;
    if u_uut <= 0.0 {
        return None;
    }
    pfa_core(tol, u_uut, u_cal, tol.low, tol.high).map(|t| t.total)
}

pub(crate) fn population(inputs: &RiskInputs, reliability: f64, correction: Option<TurCorrection>) -> Option<(Tolerance, f64)> {
    let tol = inputs.tolerance()?;
    let r = corrected_reliability(&tol, reliability, inputs.u_cal, correction);
    let u_uut = uut_std(&tol, r, inputs.u_cal, tol.low, tol.high)?;
    if u_uut <= 0.0 || u_uut <= inputs.u_cal / 10.0 {
        return None;
    }
    Some((tol, u_uut))
}

/// Probability of false accept at the tolerance limits
///
/// `None` for alternate thresholds, or when the UUT spread is at most a
/// tenth of `u_cal`.
pub fn pfa(inputs: &RiskInputs, reliability: f64, correction: Option<TurCorrection>) -> Option<RiskTerms> {
    let (tol, u_uut) = population(inputs, reliability, correction)?;
    pfa_core(&tol, u_uut, inputs.u_cal, tol.low, tol.high)
}

/// Probability of false reject at the tolerance limits
pub fn pfr(inputs: &RiskInputs, reliability: f64, correction: Option<TurCorrection>) -> Option<RiskTerms> {
    let (tol, u_uut) = population(inputs, reliability, correction)?;
    pfr_core(&tol, u_uut, inputs.u_cal, tol.low, tol.high)
}

fn guard_band_frame(inputs: &RiskInputs, gb_low: Option<f64>, gb_high: Option<f64>) -> Option<(Tolerance, f64, f64)> {
    let (low, high) = (gb_low.unwrap_or(0.0), gb_high.unwrap_or(0.0));
    if low == 0.0 && high == 0.0 {
        return None;
    }
    let tol = inputs.tolerance()?;
    let (a_low, a_high) = tol.acceptance(low, high);
    Some((tol, a_low, a_high))
}

/// PFA when accepting inside absolute guard-band limits
pub fn pfa_with_guard_band(
    inputs: &RiskInputs,
    reliability: f64,
    gb_low: Option<f64>,
    gb_high: Option<f64>,
) -> Option<RiskTerms> {
    let (tol, a_low, a_high) = guard_band_frame(inputs, gb_low, gb_high)?;
    let u_cal = inputs.u_cal;

    match tol.kind {
        RiskType::AltUpperThreshold => {
            let p = normal_cdf((a_high - tol.high) / u_cal);
            Some(terms(p, 0.0, p, 0.0, u_cal))
        }
        RiskType::AltLowerThreshold => {
            let p = normal_cdf((tol.low - a_low) / u_cal);
            Some(terms(p, p, 0.0, 0.0, u_cal))
        }
        _ => {
            let u_uut = uut_std(&tol, reliability, u_cal, a_low, a_high)?;
            if u_uut <= 0.0 {
                return None;
            }
            pfa_core(&tol, u_uut, u_cal, a_low, a_high)
        }
    }
}

/// PFR when accepting inside absolute guard-band limits
pub fn pfr_with_guard_band(
    inputs: &RiskInputs,
    reliability: f64,
    gb_low: Option<f64>,
    gb_high: Option<f64>,
) -> Option<RiskTerms> {
    let (tol, a_low, a_high) = guard_band_frame(inputs, gb_low, gb_high)?;
    let u_uut = uut_std(&tol, reliability, inputs.u_cal, a_low, a_high)?;
    if u_uut <= 0.0 {
        return None;
    }
    pfr_core(&tol, u_uut, inputs.u_cal, a_low, a_high)
}
