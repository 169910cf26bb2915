//! Full conformance-risk report of a test point

use serde::Serialize;

use super::guardband::{guard_band_low, guard_band_multiplier, guard_band_up, GuardBand, GuardBandRatio};
use super::interval::{cal_interval, cal_interval_with_guard_band, cal_reliability, IntervalForecast, IntervalInputs};
use super::limits::{RiskType, Tolerance};
use super::pfa::{pfa, pfa_with_guard_band, pfr, pfr_with_guard_band, RiskTerms, TurCorrection};
use super::quantize::{res_down, res_up};
use super::ratios::{calc_tar, calc_tur};
use super::{RiskError, RiskInputs};
use crate::analysis::breakdown::{absolute_limits, deviation_limits, tolerance_terms};
use crate::analysis::UncertaintyResult;
use crate::core::solver::Bisection;
use crate::core::units::UnitSystem;
use crate::entities::{MeasurementPoint, RiskRequirements, TestPoint, ToleranceSpec};

/// One specification term's share of a TAR span, in the UUT unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TarContribution {
    pub name: String,
    pub span: f64,
}

/// Guard band and the risks when accepting inside it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuardBandReport {
    /// Solved lower limit before quantization
    pub low: Option<GuardBand>,
    /// Solved upper limit before quantization
    pub high: Option<GuardBand>,
    /// Lower acceptance limit on the UUT's resolution grid
    pub low_limit: Option<f64>,
    /// Upper acceptance limit on the UUT's resolution grid
    pub high_limit: Option<f64>,
    pub ratio: Option<GuardBandRatio>,
    pub pfa: Option<RiskTerms>,
    pub pfr: Option<RiskTerms>,
    pub interval: Option<IntervalForecast>,
}

/// Everything the risk panel shows for one test point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub unit: String,
    pub nominal: f64,
    pub risk_type: RiskType,
    /// Absolute tolerance limits
    pub low: Option<f64>,
    pub high: Option<f64>,
    /// Combined standard uncertainty in `unit`
    pub u_cal: f64,
    /// Expanded uncertainty in `unit`
    pub expanded: f64,
    pub tur: Option<f64>,
    pub tar: Option<f64>,
    /// Summed deviations of the standards' specifications, in `unit`
    pub tmde_low: f64,
    pub tmde_high: f64,
    pub uut_breakdown: Vec<TarContribution>,
    pub tmde_breakdown: Vec<TarContribution>,
    pub pfa: Option<RiskTerms>,
    pub pfr: Option<RiskTerms>,
    pub guard_band: GuardBandReport,
    /// Interval keeping the PFA at the required level
    pub interval: Option<IntervalForecast>,
    /// End-of-period reliability keeping the PFA at the required level
    pub reliability_forecast: Option<IntervalForecast>,
    pub requirements: RiskRequirements,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

fn fraction(percent: f64) -> Option<f64> {
    let f = percent / 100.0;
    (f > 0.0 && f < 1.0).then_some(f)
}

fn contributions(spec: &ToleranceSpec, point: &MeasurementPoint, scale: f64, name: &str) -> Vec<TarContribution> {
    tolerance_terms(spec, point)
        .into_iter()
        .filter_map(|term| {
            let span = (term.absolute_high? - term.absolute_low?) * scale;
            Some(TarContribution {
                name: format!("{} - {}", name, term.kind.label()),
                span,
            })
        })
        .collect()
}

/// Standards' TAR span in the UUT unit: `(low, high, breakdown, notes)`
fn tmde_span(point: &TestPoint, uut_to_si: f64) -> (f64, f64, Vec<TarContribution>, Vec<String>) {
    let (mut low, mut high) = (0.0, 0.0);
    let mut breakdown = Vec::new();
    let mut notes = Vec::new();

    for tmde in &point.tmde_tolerances {
        let Some((_, unit)) = tmde.measurement_point.nominal() else {
            notes.push(format!("{}: no measurement point, left out of the TAR", tmde.name()));
            continue;
        };
        let Some(tmde_unit) = UnitSystem::lookup(unit) else {
            notes.push(format!("{}: unknown unit '{}', left out of the TAR", tmde.name(), unit));
            continue;
        };
        let scale = tmde_unit.to_si / uut_to_si * tmde.quantity();
        if let Some((l, h)) = deviation_limits(&tmde.tolerance, &tmde.measurement_point) {
            low += l * scale;
            high += h * scale;
        }
        breakdown.extend(contributions(&tmde.tolerance, &tmde.measurement_point, scale, tmde.name()));
    }
    (low, high, breakdown, notes)
}

impl RiskReport {
    /// Evaluate the risk of a test point against its uncertainty budget
    ///
    /// Limits come from `riskLimits` when either side is set, otherwise from
    /// the UUT tolerance. Quantities that cannot be computed for these limits
    /// are left empty.
    pub fn evaluate(
        point: &TestPoint,
        requirements: &RiskRequirements,
        uncertainty: &UncertaintyResult,
        solver: &Bisection,
    ) -> Result<Self, RiskError> {
        let (nominal, unit) = point.uut_nominal.nominal().ok_or(RiskError::MissingNominal)?;
        let to_si = UnitSystem::lookup(unit)
            .map(|u| u.to_si)
            .ok_or_else(|| RiskError::UnknownUnit(unit.to_string()))?;

        let (low, high) = match point.risk_limits {
            Some(limits) if limits.low.is_some() || limits.high.is_some() => (limits.low, limits.high),
            _ => absolute_limits(&point.uut_tolerance, &point.uut_nominal)
                .map(|(l, h)| (Some(l), Some(h)))
                .ok_or(RiskError::MissingLimits)?,
        };
        if let (Some(l), Some(h)) = (low, high) {
            if l >= h {
                return Err(RiskError::InvalidLimits { low: l, high: h });
            }
        }
        let risk_type = Tolerance::classify(Some(nominal), None, low, high)
            .map(|t| t.kind)
            .ok_or(RiskError::MissingLimits)?;

        let reliability =
            fraction(requirements.reliability).ok_or(RiskError::InvalidReliability(requirements.reliability))?;
        let required_pfa = fraction(requirements.req_pfa).ok_or(RiskError::InvalidPfa(requirements.req_pfa))?;
        let assumed = requirements.assumed_reliability_fraction();

        let u_cal = uncertainty.combined_absolute_base / to_si;
        let expanded = uncertainty.expanded_absolute_base / to_si;

        let (tmde_low, tmde_high, tmde_breakdown, mut notes) = tmde_span(point, to_si);
        let uut_name = point.uut_tolerance.name.as_deref().unwrap_or("UUT");
        let uut_breakdown = contributions(&point.uut_tolerance, &point.uut_nominal, 1.0, uut_name);

        let tar = calc_tar(Some(nominal), None, low, high, nominal + tmde_low, nominal + tmde_high);
        let tur = calc_tur(Some(nominal), None, low, high, expanded);
        let correction = tur.map(|tur| TurCorrection {
            tur,
            required: requirements.needed_tur,
        });

        let inputs = RiskInputs {
            nominal: Some(nominal),
            average: None,
            low,
            high,
            u_cal,
        };

        let pfa_terms = pfa(&inputs, reliability, correction);
        let pfr_terms = pfr(&inputs, reliability, correction);

        let resolution = point.uut_tolerance.resolution().unwrap_or(0.0);
        let gb_low = guard_band_low(&inputs, reliability, required_pfa, solver);
        let gb_high = guard_band_up(&inputs, reliability, required_pfa, solver);
        for (side, band) in [("lower", gb_low), ("upper", gb_high)] {
            if let Some(band) = band.filter(|b| !b.converged) {
                notes.push(format!(
                    "{} guard band did not converge after {} iterations",
                    side, band.iterations
                ));
            }
        }
        let low_limit = gb_low.map(|b| res_down(b.limit, resolution));
        let high_limit = gb_high.map(|b| res_up(b.limit, resolution));

        let iv = IntervalInputs {
            required_reliability: reliability,
            observed_reliability: assumed,
            interval: requirements.cal_int,
            correction,
        };

        let guard_band = GuardBandReport {
            low: gb_low,
            high: gb_high,
            low_limit,
            high_limit,
            ratio: guard_band_multiplier(Some(nominal), None, low, high, low_limit, high_limit),
            pfa: pfa_with_guard_band(&inputs, reliability, low_limit, high_limit),
            pfr: pfr_with_guard_band(&inputs, reliability, low_limit, high_limit),
            interval: cal_interval_with_guard_band(&inputs, &iv, low_limit, high_limit),
        };

        let interval = cal_interval(&inputs, &iv, required_pfa, solver);
        let reliability_forecast = cal_reliability(&inputs, &iv, required_pfa, solver);
        if let Some(f) = interval.filter(|f| !f.converged) {
            notes.push(format!("interval search did not converge after {} iterations", f.iterations));
        }

        Ok(RiskReport {
            unit: unit.to_string(),
            nominal,
            risk_type,
            low,
            high,
            u_cal,
            expanded,
            tur,
            tar,
            tmde_low,
            tmde_high,
            uut_breakdown,
            tmde_breakdown,
            pfa: pfa_terms,
            pfr: pfr_terms,
            guard_band,
            interval,
            reliability_forecast,
            requirements: *requirements,
            notes,
        })
    }

    /// Whether the TUR reaches the required ratio
    pub fn tur_adequate(&self) -> Option<bool> {
        self.tur.map(|tur| tur >= self.requirements.needed_tur)
    }

    /// Whether the unbanded PFA is within the required PFA
    pub fn pfa_adequate(&self) -> Option<bool> {
        self.pfa.map(|p| p.total <= self.requirements.req_pfa / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::core::expression::Symbolic;
    use crate::entities::{RiskLimits, Tmde, ToleranceComponent};

    fn point(resolution: Option<f64>) -> TestPoint {
        TestPoint {
            uut_nominal: MeasurementPoint::new(10.0, "V"),
            uut_tolerance: ToleranceSpec {
                reading: Some(ToleranceComponent::symmetric(1.0, "%")),
                measuring_resolution: resolution,
                ..Default::default()
            },
            tmde_tolerances: vec![Tmde {
                tolerance: ToleranceSpec {
                    name: Some("Calibrator".to_string()),
                    reading: Some(ToleranceComponent::symmetric(0.1, "%").with_distribution(2.0)),
                    ..Default::default()
                },
                measurement_point: MeasurementPoint::new(10000.0, "mV"),
                quantity: Some(1.0),
                variable_type: None,
            }],
            ..Default::default()
        }
    }

    fn report(point: &TestPoint, requirements: RiskRequirements) -> Result<RiskReport, RiskError> {
        let uncertainty = analyze(point, requirements.confidence_fraction(), &Symbolic)
            .unwrap()
            .unwrap();
        RiskReport::evaluate(point, &requirements, &uncertainty, &Bisection::default())
    }

    #[test]
    fn test_ratios_and_limits() {
        let r = report(&point(None), RiskRequirements::default()).unwrap();
        assert_eq!(r.risk_type, RiskType::TwoSided);
        assert!((r.low.unwrap() - 9.9).abs() < 1e-12);
        assert!((r.high.unwrap() - 10.1).abs() < 1e-12);
        assert!((r.u_cal - 0.005).abs() < 1e-12);
        assert!((r.tar.unwrap() - 10.0).abs() < 1e-9);
        assert!((r.tur.unwrap() - 0.2 / (2.0 * 0.005 * 1.959964)).abs() < 1e-3);
        assert_eq!(r.tur_adequate(), Some(true));
        assert!((r.tmde_high - 0.01).abs() < 1e-12);
        assert_eq!(r.tmde_breakdown.len(), 1);
        assert_eq!(r.tmde_breakdown[0].name, "Calibrator - Reading");
        assert!((r.tmde_breakdown[0].span - 0.02).abs() < 1e-12);
        assert_eq!(r.uut_breakdown[0].name, "UUT - Reading");
        assert!((r.uut_breakdown[0].span - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_adequate_test_keeps_tolerance_limits() {
        let r = report(&point(None), RiskRequirements::default()).unwrap();
        assert_eq!(r.pfa_adequate(), Some(true));
        let low = r.guard_band.low.unwrap();
        assert_eq!(low.multiplier, Some(1.0));
        assert!((r.guard_band.low_limit.unwrap() - 9.9).abs() < 1e-12);
        assert!(r.interval.is_some());
        assert!(r.notes.is_empty());
    }

    #[test]
    fn test_strict_pfa_guard_band_on_resolution_grid() {
        let requirements = RiskRequirements {
            req_pfa: 0.1,
            ..Default::default()
        };
        let r = report(&point(Some(0.001)), requirements).unwrap();
        let raw = r.guard_band.high.unwrap();
        let quantized = r.guard_band.high_limit.unwrap();
        assert!(raw.converged);
        assert!(raw.limit < 10.1);
        assert!(quantized <= raw.limit + 1e-12);
        assert!(((quantized / 0.001).round() - quantized / 0.001).abs() < 1e-6);

        let banded = r.guard_band.pfa.unwrap().total;
        assert!(banded < r.pfa.unwrap().total);
    }

    #[test]
    fn test_one_sided_override() {
        let mut p = point(None);
        p.risk_limits = Some(RiskLimits {
            low: None,
            high: Some(10.05),
        });
        let r = report(&p, RiskRequirements::default()).unwrap();
        assert_eq!(r.risk_type, RiskType::AltUpperThreshold);
        assert!(r.pfa.is_none());
        assert!(r.tur.is_none());
        assert!(r.guard_band.high.unwrap().limit < 10.05);
        assert!(r.guard_band.low.is_none());
    }

    #[test]
    fn test_invalid_policy() {
        let requirements = RiskRequirements {
            reliability: 100.0,
            ..Default::default()
        };
        assert!(matches!(
            report(&point(None), requirements),
            Err(RiskError::InvalidReliability(_))
        ));
    }

    #[test]
    fn test_missing_limits() {
        let mut p = point(None);
        p.uut_tolerance = ToleranceSpec::default();
        assert!(matches!(
            report(&p, RiskRequirements::default()),
            Err(RiskError::MissingLimits)
        ));
    }
}
