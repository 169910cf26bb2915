//! Tolerance breakdown - from a specification to standard uncertainties
//!
//! Each present term of a [`ToleranceSpec`] becomes one [`ToleranceTerm`]:
//! its half-span in the reference unit, the same half-span in ppm of the
//! reference value, and the standard uncertainty after applying the term's
//! distribution divisor. Terms that cannot be evaluated are left out.

use serde::Serialize;

use super::ppm::convert_to_ppm;
use crate::core::units::{ratio_multiplier, UnitSystem};
use crate::entities::{BudgetComponent, ComponentKind, MeasurementPoint, ToleranceComponent, ToleranceSpec};

/// Divisor applied to half the display resolution
pub const RESOLUTION_DIVISOR: f64 = 1.732;

/// One evaluated term of a tolerance specification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToleranceTerm {
    pub kind: ComponentKind,

    /// The term as written, e.g. `±0.01 %`
    pub input: String,

    pub explanation: String,

    /// Half-span in ppm of the reference value
    pub ppm: f64,

    /// Standard uncertainty in ppm
    pub u_i: f64,

    pub divisor: f64,

    pub distribution: String,

    /// Standard uncertainty in `unit_native`
    pub value_native: f64,

    pub unit_native: String,

    /// Absolute limits in the reference unit; `None` for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_low: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_high: Option<f64>,

    pub original_half_span: f64,

    pub original_unit: String,
}

impl ToleranceTerm {
    /// Whether the term defines specification limits (everything but resolution)
    pub fn is_spec(&self) -> bool {
        self.absolute_low.is_some() && self.absolute_high.is_some()
    }
}

/// RSS of the terms of one specification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToleranceUncertainty {
    /// Root-sum-square of all `u_i`, ppm
    pub standard_uncertainty: f64,

    /// Linear sum of the specification half-spans, ppm
    pub total_tolerance_for_tar: f64,

    pub terms: Vec<ToleranceTerm>,
}

/// Evaluate every present term of `spec` at `point`
pub fn tolerance_terms(spec: &ToleranceSpec, point: &MeasurementPoint) -> Vec<ToleranceTerm> {
    let Some((nominal, nominal_unit)) = point.nominal() else {
        return Vec::new();
    };
    let full_scale = spec.range.as_ref().and_then(|r| r.value);

    let mut terms: Vec<ToleranceTerm> = spec
        .linear_terms()
        .filter_map(|(kind, comp)| {
            let basis = match kind {
                ComponentKind::Range => full_scale,
                _ => Some(nominal),
            };
            linear_term(kind, comp, basis, nominal, nominal_unit, full_scale)
        })
        .collect();

    if let Some(term) = spec.db.as_ref().and_then(|db| db_term(db, nominal, nominal_unit)) {
        terms.push(term);
    }
    if let Some(term) = resolution_term(spec, nominal, nominal_unit) {
        terms.push(term);
    }
    terms
}

fn span_text(low: f64, high: f64, unit: &str) -> String {
    if (high + low).abs() < 1e-9 {
        format!("±{} {}", high, unit)
    } else {
        format!("+{}/{} {}", high, low, unit)
    }
}

fn linear_term(
    kind: ComponentKind,
    comp: &ToleranceComponent,
    basis: Option<f64>,
    nominal: f64,
    nominal_unit: &str,
    full_scale: Option<f64>,
) -> Option<ToleranceTerm> {
    let (low, high) = comp.limits()?;
    let half = comp.half_span()?;
    let unit = match comp.unit.trim() {
        "" => nominal_unit,
        u => u,
    };

    let (native, explanation) = match ratio_multiplier(unit) {
        Some(multiplier) => {
            let basis = basis.filter(|b| b.is_finite())?;
            (
                half * multiplier * basis,
                format!("{:.3e} {} of {} {}", half, unit, basis, nominal_unit),
            )
        }
        None => {
            if UnitSystem::quantity(unit) != UnitSystem::quantity(nominal_unit) {
                return None;
            }
            let native = UnitSystem::to_base_unit(half, unit) / UnitSystem::to_base_unit(1.0, nominal_unit);
            (native, format!("{:.3e} {}", half, unit))
        }
    };

    let ppm = convert_to_ppm(native, nominal_unit, nominal, nominal_unit, full_scale).ok()?;
    let divisor = comp.distribution.divisor();

    Some(ToleranceTerm {
        kind,
        input: span_text(low, high, unit),
        explanation,
        ppm: ppm.abs(),
        u_i: (ppm / divisor).abs(),
        divisor,
        distribution: comp.distribution.label(),
        value_native: (native / divisor).abs(),
        unit_native: nominal_unit.to_string(),
        absolute_low: Some(nominal + low / half * native),
        absolute_high: Some(nominal + high / half * native),
        original_half_span: half.abs(),
        original_unit: unit.to_string(),
    })
}

/// dB term: limits are propagated through the logarithm around the nominal level
fn db_term(comp: &ToleranceComponent, nominal: f64, nominal_unit: &str) -> Option<ToleranceTerm> {
    let (low_db, high_db) = comp.limits()?;
    let half = comp.half_span().filter(|h| *h > 0.0)?;
    if nominal <= 0.0 {
        return None;
    }

    let multiplier = comp.db_multiplier();
    let reference = comp.db_reference();
    let nominal_db = multiplier * (nominal / reference).log10();
    let level = |db: f64| reference * 10f64.powf((nominal_db + db) / multiplier);

    let center = level((high_db + low_db) / 2.0);
    let upper = level(high_db);
    let lower = level(low_db);
    let deviation = (upper - center).abs();

    let ppm = convert_to_ppm(deviation, nominal_unit, nominal, nominal_unit, None).ok()?;
    let divisor = comp.distribution.divisor();

    Some(ToleranceTerm {
        kind: ComponentKind::Db,
        input: span_text(low_db, high_db, "dB"),
        explanation: format!("Calculates to a half-span of {:.3e} {}", deviation, nominal_unit),
        ppm: ppm.abs(),
        u_i: (ppm / divisor).abs(),
        divisor,
        distribution: comp.distribution.label(),
        value_native: deviation / divisor,
        unit_native: nominal_unit.to_string(),
        absolute_low: Some(lower),
        absolute_high: Some(upper),
        original_half_span: half,
        original_unit: "dB".to_string(),
    })
}

fn resolution_term(spec: &ToleranceSpec, nominal: f64, nominal_unit: &str) -> Option<ToleranceTerm> {
    let resolution = spec.resolution()?;
    let unit = spec
        .measuring_resolution_unit
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(nominal_unit);
    let half = resolution / 2.0;
    let ppm = convert_to_ppm(half, unit, nominal, nominal_unit, None).ok()?;

    Some(ToleranceTerm {
        kind: ComponentKind::Resolution,
        input: format!("±{} {}", half, unit),
        explanation: "Rectangular distribution over ± half the least significant digit.".to_string(),
        ppm: ppm.abs(),
        u_i: (ppm / RESOLUTION_DIVISOR).abs(),
        divisor: RESOLUTION_DIVISOR,
        distribution: "Rectangular".to_string(),
        value_native: half / RESOLUTION_DIVISOR,
        unit_native: unit.to_string(),
        absolute_low: None,
        absolute_high: None,
        original_half_span: half,
        original_unit: unit.to_string(),
    })
}

/// Budget rows for every present term of `spec`, Type B with infinite DOF
pub fn budget_components(spec: &ToleranceSpec, point: &MeasurementPoint) -> Vec<BudgetComponent> {
    let prefix = spec.prefix();
    tolerance_terms(spec, point)
        .into_iter()
        .map(|term| {
            BudgetComponent::type_b(
                format!("{}_{}", prefix, term.kind.key()),
                format!("{} - {}", prefix, term.kind.label()),
                term.u_i,
                term.distribution,
            )
            .with_native(term.value_native, term.unit_native)
            .with_source(point.to_string())
        })
        .collect()
}

/// Standard uncertainty (RSS), linear tolerance sum and the evaluated terms
pub fn uncertainty_from_tolerance(spec: &ToleranceSpec, point: &MeasurementPoint) -> ToleranceUncertainty {
    let terms = tolerance_terms(spec, point);
    let variance: f64 = terms.iter().map(|t| t.u_i * t.u_i).sum();
    let total_tolerance_for_tar = terms.iter().filter(|t| t.is_spec()).map(|t| t.ppm).sum();

    ToleranceUncertainty {
        standard_uncertainty: variance.sqrt(),
        total_tolerance_for_tar,
        terms,
    }
}

/// Summed signed deviations `(low, high)` of the specification terms,
/// in the reference unit; `None` when there are none
pub fn deviation_limits(spec: &ToleranceSpec, point: &MeasurementPoint) -> Option<(f64, f64)> {
    let (nominal, _) = point.nominal()?;
    let terms = tolerance_terms(spec, point);
    let spec_terms: Vec<&ToleranceTerm> = terms.iter().filter(|t| t.is_spec()).collect();
    if spec_terms.is_empty() {
        return None;
    }

    let (mut low, mut high) = (0.0, 0.0);
    for term in spec_terms {
        if let (Some(l), Some(h)) = (term.absolute_low, term.absolute_high) {
            low += l - nominal;
            high += h - nominal;
        }
    }
    Some((low, high))
}

/// Final absolute `(low, high)` limits of a specification at `point`
pub fn absolute_limits(spec: &ToleranceSpec, point: &MeasurementPoint) -> Option<(f64, f64)> {
    let (nominal, _) = point.nominal()?;
    deviation_limits(spec, point).map(|(low, high)| (nominal + low, nominal + high))
}

/// Render the terms as written: `±1 % + ±0.1 % of FS + ±2 mV`
pub fn tolerance_summary(spec: &ToleranceSpec) -> String {
    let part = |comp: &ToleranceComponent, default_unit: &str| -> Option<String> {
        let (low, high) = comp.limits()?;
        let unit = match comp.unit.trim() {
            "" => default_unit,
            u => u,
        };
        let text = if (high + low).abs() < 1e-9 && high > 0.0 {
            format!("±{} {}", high, unit)
        } else {
            format!("+{}/{} {}", high, low, unit)
        };
        Some(text.trim_end().to_string())
    };

    let mut parts = Vec::new();
    for (kind, comp) in spec.linear_terms() {
        if let Some(text) = part(comp, "") {
            if kind == ComponentKind::Range {
                parts.push(format!("{} of FS", text));
            } else {
                parts.push(text);
            }
        }
    }
    if let Some(text) = spec.db.as_ref().and_then(|db| part(db, "dB")) {
        parts.push(text);
    }

    if parts.is_empty() {
        "Not Set".to_string()
    } else {
        parts.join(" + ")
    }
}

/// Total error band at `point`: `±0.0110 V` or `+0.01 / -0.02 V`
pub fn tolerance_error_summary(spec: &ToleranceSpec, point: &MeasurementPoint) -> String {
    if spec.is_empty() || point.nominal().is_none() {
        return "Not Set".to_string();
    }
    if tolerance_terms(spec, point).is_empty() {
        return "Not Calculated".to_string();
    }
    let Some((low, high)) = deviation_limits(spec, point) else {
        return "N/A".to_string();
    };

    if (high + low).abs() < 1e-9 && high > 0.0 {
        format!("±{} {}", to_precision(high, 3), point.unit)
    } else {
        format!("+{} / {} {}", to_precision(high, 3), to_precision(low, 3), point.unit)
    }
}

/// Format with `digits` significant figures
pub fn to_precision(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let digits = digits.max(1) as i32;
    if value == 0.0 {
        return format!("{:.*}", (digits - 1) as usize, 0.0);
    }
    let exponent = value.abs().log10().floor() as i32;
    let decimals = digits - 1 - exponent;
    if decimals >= 0 {
        format!("{:.*}", decimals as usize, value)
    } else {
        let scale = 10f64.powi(-decimals);
        format!("{:.0}", (value / scale).round() * scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(value: f64, unit: &str) -> MeasurementPoint {
        MeasurementPoint::new(value, unit)
    }

    #[test]
    fn test_reading_percent_rectangular() {
        let spec = ToleranceSpec {
            reading: Some(ToleranceComponent::symmetric(1.0, "%")),
            ..Default::default()
        };
        let result = uncertainty_from_tolerance(&spec, &point(10.0, "V"));
        assert_eq!(result.terms.len(), 1);
        assert!((result.standard_uncertainty - 10_000.0 / 1.732).abs() < 1e-6);
        assert!((result.standard_uncertainty - 5773.67).abs() < 0.01);
        assert!((result.total_tolerance_for_tar - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_reading_and_floor_combine_rss() {
        let spec = ToleranceSpec {
            reading: Some(ToleranceComponent::symmetric(1.0, "%")),
            floor: Some(ToleranceComponent::symmetric(0.1, "V").with_distribution(2.0)),
            ..Default::default()
        };
        let result = uncertainty_from_tolerance(&spec, &point(10.0, "V"));
        let expected = ((10_000.0_f64 / 1.732).powi(2) + (10_000.0_f64 / 2.0).powi(2)).sqrt();
        assert!((result.standard_uncertainty - expected).abs() < 1e-6);
    }

    #[test]
    fn test_range_uses_full_scale() {
        let mut range = ToleranceComponent::symmetric(0.01, "%");
        range.value = Some(100.0);
        let spec = ToleranceSpec {
            range: Some(range),
            ..Default::default()
        };
        let terms = tolerance_terms(&spec, &point(10.0, "V"));
        // 0.01 % of 100 V = 10 mV = 1000 ppm of 10 V
        assert!((terms[0].ppm - 1000.0).abs() < 1e-6);
        assert!((terms[0].absolute_high.unwrap() - 10.01).abs() < 1e-12);
    }

    #[test]
    fn test_range_without_full_scale_is_omitted() {
        let spec = ToleranceSpec {
            range: Some(ToleranceComponent::symmetric(0.01, "%")),
            ..Default::default()
        };
        assert!(tolerance_terms(&spec, &point(10.0, "V")).is_empty());
    }

    #[test]
    fn test_mismatched_unit_is_omitted() {
        let spec = ToleranceSpec {
            floor: Some(ToleranceComponent::symmetric(1.0, "mA")),
            reading: Some(ToleranceComponent::symmetric(1.0, "ppm")),
            ..Default::default()
        };
        let terms = tolerance_terms(&spec, &point(10.0, "V"));
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].kind, ComponentKind::Reading);
    }

    #[test]
    fn test_db_term() {
        let spec = ToleranceSpec {
            db: Some(ToleranceComponent::symmetric(0.1, "dB")),
            ..Default::default()
        };
        let terms = tolerance_terms(&spec, &point(1.0, "V"));
        assert_eq!(terms.len(), 1);
        let expected = 10f64.powf(0.1 / 20.0) - 1.0;
        assert!((terms[0].ppm - expected * 1e6).abs() < 1e-6);
        assert!(terms[0].absolute_high.unwrap() > 1.0);
        assert!(terms[0].absolute_low.unwrap() < 1.0);
    }

    #[test]
    fn test_asymmetric_db_term_centers_on_db_midpoint() {
        let spec = ToleranceSpec {
            db: Some(ToleranceComponent {
                high: Some(0.2),
                low: Some(-0.1),
                unit: "dB".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let terms = tolerance_terms(&spec, &point(1.0, "V"));
        let center = 10f64.powf(0.05 / 20.0);
        let expected = 10f64.powf(0.2 / 20.0) - center;
        assert!((terms[0].ppm - expected * 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_resolution_uses_sqrt3() {
        let spec = ToleranceSpec {
            measuring_resolution: Some(0.001),
            ..Default::default()
        };
        let comps = budget_components(&spec, &point(10.0, "V"));
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].id, "UUT_resolution");
        assert_eq!(comps[0].name, "UUT - Resolution");
        assert!((comps[0].value - 50.0 / 1.732).abs() < 1e-9);
        assert!(comps[0].dof.is_infinite());
    }

    #[test]
    fn test_component_ids_use_prefix() {
        let spec = ToleranceSpec {
            name: Some("Std".into()),
            readings_iv: Some(ToleranceComponent::symmetric(5.0, "ppm")),
            ..Default::default()
        };
        let comps = budget_components(&spec, &point(1.0, "V"));
        assert_eq!(comps[0].id, "Std_readings_iv");
        assert_eq!(comps[0].name, "Std - Readings (IV)");
    }

    #[test]
    fn test_missing_point_gives_nothing() {
        let spec = ToleranceSpec {
            reading: Some(ToleranceComponent::symmetric(1.0, "%")),
            ..Default::default()
        };
        assert!(budget_components(&spec, &MeasurementPoint::default()).is_empty());
    }

    #[test]
    fn test_absolute_limits_sum_asymmetric() {
        let floor = ToleranceComponent {
            high: Some(0.02),
            low: Some(-0.01),
            unit: "V".into(),
            ..Default::default()
        };
        let spec = ToleranceSpec {
            reading: Some(ToleranceComponent::symmetric(0.1, "%")),
            floor: Some(floor),
            measuring_resolution: Some(0.001),
            ..Default::default()
        };
        let (low, high) = absolute_limits(&spec, &point(10.0, "V")).unwrap();
        assert!((high - 10.03).abs() < 1e-9);
        assert!((low - 9.98).abs() < 1e-9);
    }

    #[test]
    fn test_summaries() {
        let mut range = ToleranceComponent::symmetric(0.1, "%");
        range.value = Some(10.0);
        let spec = ToleranceSpec {
            reading: Some(ToleranceComponent::symmetric(1.0, "%")),
            range: Some(range),
            ..Default::default()
        };
        assert_eq!(tolerance_summary(&spec), "±1 % + ±0.1 % of FS");
        assert_eq!(tolerance_summary(&ToleranceSpec::default()), "Not Set");
        assert_eq!(tolerance_error_summary(&spec, &point(10.0, "V")), "±0.110 V");
    }

    #[test]
    fn test_to_precision() {
        assert_eq!(to_precision(0.011, 3), "0.0110");
        assert_eq!(to_precision(123.456, 3), "123");
        assert_eq!(to_precision(-1.5, 2), "-1.5");
        assert_eq!(to_precision(12345.0, 3), "12300");
    }
}
