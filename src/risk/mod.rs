//! Conformance decision risk
//!
//! Every function works in the UUT's native unit and takes its policy values
//! as fractions. Quantities that cannot be computed for the given limits come
//! back as `None`; only malformed input to [`RiskReport::evaluate`] is an
//! error.

pub mod guardband;
pub mod interval;
pub mod limits;
pub mod monte_carlo;
pub mod pfa;
pub mod quantize;
pub mod ratios;
pub mod report;

pub use guardband::{guard_band_low, guard_band_multiplier, guard_band_up, GuardBand, GuardBandRatio};
pub use interval::{cal_interval, cal_interval_with_guard_band, cal_reliability, IntervalForecast, IntervalInputs};
pub use limits::{RiskType, Tolerance};
pub use monte_carlo::{simulate, MonteCarloResult};
pub use pfa::{
    observed_reliability, pfa, pfa_with_guard_band, pfr, pfr_with_guard_band, predicted_reliability, uut_unc,
    uut_unc_ll, uut_unc_ul, RiskTerms, TurCorrection,
};
pub use quantize::{res_down, res_up};
pub use ratios::{calc_tar, calc_tur};
pub use report::{GuardBandReport, RiskReport, TarContribution};

use miette::Diagnostic;
use thiserror::Error;

/// Limits and measurement uncertainty of one decision
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RiskInputs {
    pub nominal: Option<f64>,
    /// Process average; required for the non-alternate thresholds
    pub average: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    /// Standard uncertainty of the measurement
    pub u_cal: f64,
}

impl RiskInputs {
    /// Classified limits, `None` for unusable limits or a negative `u_cal`
    pub fn tolerance(&self) -> Option<Tolerance> {
        if !(self.u_cal.is_finite() && self.u_cal >= 0.0) {
            return None;
        }
        Tolerance::classify(self.nominal, self.average, self.low, self.high)
    }
}

/// Risk report failures
#[derive(Debug, Error, Diagnostic)]
pub enum RiskError {
    #[error("UUT nominal value is missing")]
    #[diagnostic(code(calrisk::risk::missing_nominal))]
    MissingNominal,

    #[error("Unit '{0}' is not registered or has no SI conversion")]
    #[diagnostic(code(calrisk::risk::unknown_unit), help("Run `calrisk units` to list supported units"))]
    UnknownUnit(String),

    #[error("No acceptance limits: the UUT tolerance is empty and no riskLimits are set")]
    #[diagnostic(
        code(calrisk::risk::missing_limits),
        help("Add a UUT tolerance or set riskLimits.low / riskLimits.high")
    )]
    MissingLimits,

    #[error("Lower limit {low} is not below upper limit {high}")]
    #[diagnostic(code(calrisk::risk::invalid_limits))]
    InvalidLimits { low: f64, high: f64 },

    #[error("Reliability {0} % must lie strictly between 0 and 100")]
    #[diagnostic(code(calrisk::risk::invalid_reliability))]
    InvalidReliability(f64),

    #[error("Required PFA {0} % must lie strictly between 0 and 100")]
    #[diagnostic(code(calrisk::risk::invalid_pfa))]
    InvalidPfa(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_uncertainty_is_rejected() {
        let inputs = RiskInputs {
            nominal: Some(1.0),
            low: Some(0.0),
            high: Some(2.0),
            u_cal: -0.1,
            ..Default::default()
        };
        assert!(inputs.tolerance().is_none());
        assert!(RiskInputs { u_cal: 0.1, ..inputs }.tolerance().is_some());
    }
}
