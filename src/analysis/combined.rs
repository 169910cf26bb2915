//! Combined and expanded uncertainty of a test point
//!
//! Direct mode sums the variance of every budget row in ppm of the UUT
//! nominal. Derived mode is delegated to [`super::derived`].

use serde::Serialize;

use super::breakdown::budget_components;
use super::derived::{combine_derived, DerivedInputs};
use super::manual::manual_component;
use super::ppm::ConversionError;
use super::AnalysisError;
use crate::core::expression::Differentiation;
use crate::core::stats::coverage_factor;
use crate::core::units::UnitSystem;
use crate::entities::{BudgetComponent, Dof, MeasurementPoint, MeasurementType, TestPoint, Tmde, ToleranceSpec};

/// GUM result for one test point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncertaintyResult {
    /// Combined standard uncertainty, ppm of the nominal (absent for a zero nominal)
    pub combined_ppm: Option<f64>,

    /// Combined standard uncertainty in SI base units
    pub combined_absolute_base: f64,

    /// Combined standard uncertainty in the nominal's unit
    pub combined_native: f64,

    /// Derived mode: combined uncertainty of the equation inputs alone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs_native: Option<f64>,

    pub effective_dof: Dof,

    /// Coverage factor
    pub k: f64,

    pub expanded_ppm: Option<f64>,
    pub expanded_absolute_base: f64,
    pub expanded_native: f64,

    /// Coverage probability used for `k`, as a fraction
    pub confidence: f64,

    /// Derived mode: equation value at the input nominals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal_result: Option<f64>,

    pub unit: String,

    pub components: Vec<BudgetComponent>,

    /// Inputs that were skipped, for display
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl UncertaintyResult {
    /// Fill the coverage factor and expanded values from the combined ones
    pub(crate) fn expand(mut self) -> Self {
        self.k = coverage_factor(self.effective_dof.value(), self.confidence);
        self.expanded_ppm = self.combined_ppm.map(|u| u * self.k);
        self.expanded_absolute_base = self.combined_absolute_base * self.k;
        self.expanded_native = self.combined_native * self.k;
        self
    }
}

/// Nominal value, unit and SI scale of the UUT reference point
pub(crate) fn uut_reference(uut: &MeasurementPoint) -> Result<(f64, &str, f64), AnalysisError> {
    let (nominal, unit) = uut
        .nominal()
        .ok_or_else(|| AnalysisError::MissingInput("UUT nominal value or unit".to_string()))?;
    let to_si = UnitSystem::lookup(unit)
        .map(|u| u.to_si)
        .ok_or_else(|| AnalysisError::UnknownUnit(unit.to_string()))?;
    Ok((nominal, unit, to_si))
}

/// Resolution rows of the UUT specification, named after the UUT
pub(crate) fn uut_resolution_rows(spec: &ToleranceSpec, uut: &MeasurementPoint) -> Vec<BudgetComponent> {
    let title = uut.name.as_deref().unwrap_or("UUT");
    budget_components(spec, uut)
        .into_iter()
        .filter(|c| c.id.ends_with("_resolution"))
        .map(|mut c| {
            c.name = format!("{} - Resolution", title);
            c
        })
        .collect()
}

/// Direct-mode budget: UUT resolution, every TMDE term (times its quantity)
/// and the manual rows
///
/// Returns `Ok(None)` when there is nothing to combine.
pub fn combine_direct(
    uut: &MeasurementPoint,
    uut_tolerance: &ToleranceSpec,
    tmdes: &[Tmde],
    manual: Vec<BudgetComponent>,
    confidence: f64,
) -> Result<Option<UncertaintyResult>, AnalysisError> {
    let (nominal, unit, to_si) = uut_reference(uut)?;
    let source = uut.to_string();

    let mut components = uut_resolution_rows(uut_tolerance, uut);
    let mut notes = Vec::new();

    for tmde in tmdes {
        if tmde.measurement_point.nominal().is_none() {
            notes.push(format!("{}: no measurement point, skipped", tmde.name()));
            continue;
        }
        let quantity = tmde.quantity();
        components.extend(
            budget_components(&tmde.tolerance, &tmde.measurement_point)
                .into_iter()
                .map(|mut c| {
                    c.quantity = quantity;
                    c.source = Some(source.clone());
                    c
                }),
        );
    }
    components.extend(manual);

    if components.is_empty() {
        return Ok(None);
    }

    let combined_ppm = components.iter().map(BudgetComponent::variance).sum::<f64>().sqrt();
    let denominator: f64 = components.iter().map(|c| c.dof.ws_term(c.value)).sum();
    let effective_dof = if denominator > 0.0 {
        Dof::new(combined_ppm.powi(4) / denominator)
    } else {
        Dof::Infinite
    };

    let nominal_base = UnitSystem::to_base_unit(nominal, unit).abs();
    if nominal_base == 0.0 {
        return Err(ConversionError::ZeroNominal.into());
    }
    for c in &mut components {
        c.contribution = Some(c.value / 1e6 * nominal_base / to_si);
    }

    let combined_absolute_base = combined_ppm / 1e6 * nominal_base;
    let result = UncertaintyResult {
        combined_ppm: Some(combined_ppm),
        combined_absolute_base,
        combined_native: combined_absolute_base / to_si,
        inputs_native: None,
        effective_dof,
        k: 1.0,
        expanded_ppm: None,
        expanded_absolute_base: 0.0,
        expanded_native: 0.0,
        confidence,
        nominal_result: None,
        unit: unit.to_string(),
        components,
        notes,
    };
    Ok(Some(result.expand()))
}

/// Full budget of a test point in its measurement mode
///
/// `confidence` is a fraction (0.95); manual rows are converted to ppm of
/// the UUT nominal first.
pub fn analyze(
    point: &TestPoint,
    confidence: f64,
    strategy: &dyn Differentiation,
) -> Result<Option<UncertaintyResult>, AnalysisError> {
    let manual = point
        .manual_components
        .iter()
        .enumerate()
        .map(|(i, c)| manual_component(c, i, &point.uut_nominal))
        .collect::<Result<Vec<_>, _>>()?;

    match point.measurement_type {
        MeasurementType::Direct => combine_direct(
            &point.uut_nominal,
            &point.uut_tolerance,
            &point.tmde_tolerances,
            manual,
            confidence,
        ),
        MeasurementType::Derived => {
            let equation = point
                .equation_string
                .as_deref()
                .ok_or_else(|| AnalysisError::MissingInput("equationString".to_string()))?;
            combine_derived(
                DerivedInputs {
                    equation,
                    mappings: &point.variable_mappings,
                    tmdes: &point.tmde_tolerances,
                    uut: &point.uut_nominal,
                    uut_tolerance: &point.uut_tolerance,
                    manual,
                    confidence,
                },
                strategy,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Symbolic;
    use crate::entities::{ComponentType, ToleranceComponent};

    fn tmde(reading_pct: f64, divisor: f64, quantity: f64) -> Tmde {
        Tmde {
            tolerance: ToleranceSpec {
                reading: Some(ToleranceComponent::symmetric(reading_pct, "%").with_distribution(divisor)),
                ..Default::default()
            },
            measurement_point: MeasurementPoint::new(10.0, "V"),
            quantity: Some(quantity),
            variable_type: None,
        }
    }

    #[test]
    fn test_direct_combines_tmde_and_resolution() {
        let uut = MeasurementPoint::new(10.0, "V");
        let spec = ToleranceSpec {
            reading: Some(ToleranceComponent::symmetric(0.1, "%")),
            measuring_resolution: Some(0.001),
            ..Default::default()
        };
        let result = combine_direct(&uut, &spec, &[tmde(0.01, 2.0, 1.0)], Vec::new(), 0.95)
            .unwrap()
            .unwrap();

        // UUT spec terms other than resolution do not enter the budget
        assert_eq!(result.components.len(), 2);
        assert!(result.components.iter().all(|c| !c.base_unit_value));
        let expected = ((50.0_f64 / 1.732).powi(2) + 50.0_f64.powi(2)).sqrt();
        assert!((result.combined_ppm.unwrap() - expected).abs() < 1e-9);
        assert!(result.effective_dof.is_infinite());
        assert!((result.k - 1.959964).abs() < 1e-5);
        assert!((result.combined_native - expected * 1e-5).abs() < 1e-12);
    }

    #[test]
    fn test_quantity_scales_variance() {
        let uut = MeasurementPoint::new(10.0, "V");
        let single = combine_direct(&uut, &ToleranceSpec::default(), &[tmde(0.01, 1.0, 1.0)], Vec::new(), 0.95)
            .unwrap()
            .unwrap();
        let double = combine_direct(&uut, &ToleranceSpec::default(), &[tmde(0.01, 1.0, 2.0)], Vec::new(), 0.95)
            .unwrap()
            .unwrap();
        let ratio = double.combined_ppm.unwrap() / single.combined_ppm.unwrap();
        assert!((ratio - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_welch_satterthwaite() {
        let uut = MeasurementPoint::new(10.0, "V");
        let mut a = BudgetComponent::type_b("a", "A", 10.0, "Normal");
        a.kind = ComponentType::A;
        a.dof = Dof::Finite(4.0);
        let b = BudgetComponent::type_b("b", "B", 10.0, "Rectangular");

        let result = combine_direct(&uut, &ToleranceSpec::default(), &[], vec![a, b], 0.95)
            .unwrap()
            .unwrap();
        // (200)² / (10⁴ / 4) = 16
        assert!((result.effective_dof.value() - 16.0).abs() < 1e-9);
        assert!((result.k - 2.1199).abs() < 1e-3);
    }

    #[test]
    fn test_nothing_to_combine() {
        let uut = MeasurementPoint::new(10.0, "V");
        let result = combine_direct(&uut, &ToleranceSpec::default(), &[], Vec::new(), 0.95).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_missing_nominal_is_an_error() {
        let err = combine_direct(&MeasurementPoint::default(), &ToleranceSpec::default(), &[], Vec::new(), 0.95);
        assert!(matches!(err, Err(AnalysisError::MissingInput(_))));
    }

    #[test]
    fn test_unknown_unit_is_an_error() {
        let uut = MeasurementPoint::new(1.0, "cubits");
        let err = combine_direct(&uut, &ToleranceSpec::default(), &[], Vec::new(), 0.95);
        assert!(matches!(err, Err(AnalysisError::UnknownUnit(_))));
    }

    #[test]
    fn test_analyze_direct_point() {
        let point = TestPoint {
            uut_nominal: MeasurementPoint::new(10.0, "V"),
            tmde_tolerances: vec![tmde(0.01, 1.732, 1.0)],
            ..Default::default()
        };
        let result = analyze(&point, 0.95, &Symbolic).unwrap().unwrap();
        assert!((result.combined_ppm.unwrap() - 100.0 / 1.732).abs() < 1e-9);
        assert!((result.expanded_native - result.combined_native * result.k).abs() < 1e-15);
    }
}
