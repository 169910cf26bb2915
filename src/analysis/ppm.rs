//! Conversions between absolute deviations and parts-per-million
//!
//! ppm is the common currency of the budget: every component is expressed
//! relative to the magnitude of a reference value in SI base units.

use miette::Diagnostic;
use thiserror::Error;

use crate::core::units::{ratio_multiplier, UnitSystem};
use crate::entities::MeasurementPoint;

/// Unit conversion failures
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum ConversionError {
    #[error("Unit mismatch: cannot convert {unit} ({quantity}) to {target} ({target_quantity})")]
    #[diagnostic(
        code(calrisk::conversion::unit_mismatch),
        help("Tolerance terms must use the reference unit's quantity, or a relative unit (%, ppm, ppb)")
    )]
    UnitMismatch {
        unit: String,
        quantity: String,
        target: String,
        target_quantity: String,
    },

    #[error("Unknown unit '{0}'")]
    #[diagnostic(code(calrisk::conversion::unknown_unit), help("Run `calrisk units` to list supported units"))]
    UnknownUnit(String),

    #[error("Reference value is zero; a relative value is undefined")]
    #[diagnostic(code(calrisk::conversion::zero_nominal))]
    ZeroNominal,

    #[error("{what} is not a finite number")]
    #[diagnostic(code(calrisk::conversion::not_finite))]
    NotFinite { what: String },
}

impl ConversionError {
    fn not_finite(what: &str) -> Self {
        ConversionError::NotFinite { what: what.to_string() }
    }

    fn mismatch(unit: &str, target: &str) -> Self {
        let describe = |u: &str| {
            UnitSystem::quantity(u)
                .map(|q| q.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };
        ConversionError::UnitMismatch {
            unit: unit.to_string(),
            quantity: describe(unit),
            target: target.to_string(),
            target_quantity: describe(target),
        }
    }
}

/// A ppm value with the arithmetic that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub ppm: f64,
    pub explanation: String,
}

/// Express `value unit` in ppm of `nominal nominal_unit`
///
/// Relative units convert directly. A zero nominal is replaced by
/// `fallback_reference` (used for full-scale range terms) when one is given.
pub fn convert_to_ppm(
    value: f64,
    unit: &str,
    nominal: f64,
    nominal_unit: &str,
    fallback_reference: Option<f64>,
) -> Result<f64, ConversionError> {
    convert_to_ppm_explained(value, unit, nominal, nominal_unit, fallback_reference).map(|c| c.ppm)
}

/// [`convert_to_ppm`] with a human-readable account of the computation
pub fn convert_to_ppm_explained(
    value: f64,
    unit: &str,
    nominal: f64,
    nominal_unit: &str,
    fallback_reference: Option<f64>,
) -> Result<Conversion, ConversionError> {
    if !value.is_finite() {
        return Err(ConversionError::not_finite("value"));
    }

    if let Some(multiplier) = ratio_multiplier(unit) {
        let ppm = value * multiplier * 1e6;
        return Ok(Conversion {
            ppm,
            explanation: format!("{} {} × {} = {:.2} ppm", value, unit, multiplier * 1e6, ppm),
        });
    }

    let nominal = match fallback_reference {
        Some(reference) if nominal == 0.0 && reference != 0.0 => reference,
        _ => nominal,
    };
    if !nominal.is_finite() {
        return Err(ConversionError::not_finite("nominal"));
    }

    let nominal_quantity =
        UnitSystem::quantity(nominal_unit).ok_or_else(|| ConversionError::UnknownUnit(nominal_unit.to_string()))?;

    // Unregistered value units are taken to be base units already
    if let Some(quantity) = UnitSystem::quantity(unit) {
        if quantity != nominal_quantity {
            return Err(ConversionError::mismatch(unit, nominal_unit));
        }
    }

    let value_base = UnitSystem::to_base_unit(value, unit);
    let nominal_base = UnitSystem::to_base_unit(nominal, nominal_unit).abs();
    if nominal_base == 0.0 {
        return Err(ConversionError::ZeroNominal);
    }

    let ppm = value_base / nominal_base * 1e6;
    if !ppm.is_finite() {
        return Err(ConversionError::not_finite("result"));
    }

    Ok(Conversion {
        ppm,
        explanation: format!(
            "({:.4e}) / {:.4e} × 1,000,000 = {:.2} ppm",
            value_base, nominal_base, ppm
        ),
    })
}

/// Absolute deviation in `target_unit` for `ppm` of `reference`
///
/// `ppm` passes through; `%` and `ppb` rescale. A zero reference is only
/// convertible to a relative unit.
pub fn convert_ppm_to_unit(ppm: f64, target_unit: &str, reference: &MeasurementPoint) -> Result<f64, ConversionError> {
    if !ppm.is_finite() {
        return Err(ConversionError::not_finite("ppm value"));
    }
    if let Some(multiplier) = ratio_multiplier(target_unit) {
        return Ok(ppm * 1e-6 / multiplier);
    }

    let (nominal, nominal_unit) = reference
        .nominal()
        .ok_or_else(|| ConversionError::not_finite("reference value"))?;
    if nominal == 0.0 {
        return Err(ConversionError::ZeroNominal);
    }

    let nominal_quantity =
        UnitSystem::quantity(nominal_unit).ok_or_else(|| ConversionError::UnknownUnit(nominal_unit.to_string()))?;
    let target = UnitSystem::lookup(target_unit).ok_or_else(|| ConversionError::UnknownUnit(target_unit.to_string()))?;
    if target.quantity != nominal_quantity {
        return Err(ConversionError::mismatch(target_unit, nominal_unit));
    }

    let deviation_base = ppm / 1e6 * UnitSystem::to_base_unit(nominal, nominal_unit).abs();
    Ok(deviation_base / target.to_si)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_nominal_independent() {
        for (nominal, unit) in [(10.0, "V"), (0.001, "A"), (-5.0, "Ohm"), (0.0, "Hz")] {
            let ppm = convert_to_ppm(1.0, "%", nominal, unit, None).unwrap();
            assert!((ppm - 10_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_millivolt_of_volt() {
        let ppm = convert_to_ppm(1.0, "mV", 1.0, "V", None).unwrap();
        assert!((ppm - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_mismatched_quantities() {
        let err = convert_to_ppm(1.0, "V", 1.0, "A", None).unwrap_err();
        assert!(matches!(err, ConversionError::UnitMismatch { .. }));
    }

    #[test]
    fn test_zero_nominal_uses_fallback() {
        assert_eq!(convert_to_ppm(1.0, "V", 0.0, "V", None), Err(ConversionError::ZeroNominal));
        let ppm = convert_to_ppm(0.01, "V", 0.0, "V", Some(10.0)).unwrap();
        assert!((ppm - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_nominal_unit() {
        let err = convert_to_ppm(1.0, "V", 1.0, "furlong", None).unwrap_err();
        assert_eq!(err, ConversionError::UnknownUnit("furlong".into()));
    }

    #[test]
    fn test_explanation_mentions_result() {
        let c = convert_to_ppm_explained(2.0, "mV", 10.0, "V", None).unwrap();
        assert!((c.ppm - 200.0).abs() < 1e-9);
        assert!(c.explanation.contains("200.00 ppm"));
    }

    #[test]
    fn test_ppm_to_unit() {
        let point = MeasurementPoint::new(10.0, "V");
        assert!((convert_ppm_to_unit(100.0, "mV", &point).unwrap() - 1.0).abs() < 1e-9);
        assert!((convert_ppm_to_unit(100.0, "%", &point).unwrap() - 0.01).abs() < 1e-12);
        assert_eq!(convert_ppm_to_unit(100.0, "ppm", &point).unwrap(), 100.0);
    }

    #[test]
    fn test_ppm_to_unit_zero_nominal() {
        let point = MeasurementPoint::new(0.0, "V");
        assert!((convert_ppm_to_unit(10_000.0, "%", &point).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(convert_ppm_to_unit(1.0, "V", &point), Err(ConversionError::ZeroNominal));
    }
}
