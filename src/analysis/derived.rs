//! Equation-based (derived) measurements
//!
//! The UUT value is `Y = f(x1..xn)`. Each variable maps to an input type,
//! and every TMDE tagged with that type contributes to the variable's
//! standard uncertainty. Propagation is first order: `u_Y² = Σ (c_i·u_i)²`
//! with `c_i = ∂f/∂x_i` at the nominal inputs.

use std::collections::BTreeMap;

use super::breakdown::{budget_components, uncertainty_from_tolerance};
use super::combined::{uut_reference, uut_resolution_rows, UncertaintyResult};
use super::AnalysisError;
use crate::core::expression::{Differentiation, Equation, Scope};
use crate::core::units::UnitSystem;
use crate::entities::{BudgetComponent, Dof, MeasurementPoint, Tmde, ToleranceSpec};

/// Everything a derived budget is computed from
#[derive(Debug, Clone)]
pub struct DerivedInputs<'a> {
    /// `Y = f(...)` or just the right-hand side
    pub equation: &'a str,
    /// Variable symbol to input type, e.g. `I -> Current`
    pub mappings: &'a BTreeMap<String, String>,
    pub tmdes: &'a [Tmde],
    /// Reference point of the result: its unit is the unit of `Y`
    pub uut: &'a MeasurementPoint,
    pub uut_tolerance: &'a ToleranceSpec,
    /// Manual rows already in ppm of the UUT nominal
    pub manual: Vec<BudgetComponent>,
    pub confidence: f64,
}

/// Accumulated uncertainty of one input type
#[derive(Debug)]
struct TypeInput {
    nominal: f64,
    unit: String,
    variance_native: f64,
    variance_base: f64,
    quantity: f64,
    distribution: String,
}

fn collect_inputs(tmdes: &[Tmde], notes: &mut Vec<String>) -> BTreeMap<String, TypeInput> {
    let mut inputs: BTreeMap<String, TypeInput> = BTreeMap::new();

    for tmde in tmdes {
        let Some(kind) = tmde.variable_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            notes.push(format!("{}: no input type, skipped", tmde.name()));
            continue;
        };
        let Some((nominal, unit)) = tmde.measurement_point.nominal() else {
            notes.push(format!("{}: no measurement point, skipped", tmde.name()));
            continue;
        };

        let u_ppm = uncertainty_from_tolerance(&tmde.tolerance, &tmde.measurement_point).standard_uncertainty;
        let quantity = tmde.quantity();
        let u_native = u_ppm / 1e6 * nominal.abs();
        let u_base = u_ppm / 1e6 * UnitSystem::to_base_unit(nominal, unit).abs();

        let entry = inputs.entry(kind.to_string()).or_insert_with(|| TypeInput {
            nominal,
            unit: unit.to_string(),
            variance_native: 0.0,
            variance_base: 0.0,
            quantity: 0.0,
            distribution: budget_components(&tmde.tolerance, &tmde.measurement_point)
                .first()
                .map(|c| c.distribution.clone())
                .unwrap_or_else(|| "N/A".to_string()),
        });
        entry.variance_native += u_native * u_native * quantity;
        entry.variance_base += u_base * u_base * quantity;
        entry.quantity += quantity;
    }

    inputs
}

/// Derived-mode budget
///
/// Returns `Ok(None)` when variables are mapped but no TMDE is assigned yet.
pub fn combine_derived(
    inputs: DerivedInputs<'_>,
    strategy: &dyn Differentiation,
) -> Result<Option<UncertaintyResult>, AnalysisError> {
    if !inputs.mappings.is_empty() && inputs.tmdes.is_empty() {
        return Ok(None);
    }

    let (uut_nominal, unit, to_si) = uut_reference(inputs.uut)?;
    let equation = Equation::parse(inputs.equation)?;
    let variables = equation.variables();

    for variable in &variables {
        if !inputs.mappings.contains_key(variable) {
            return Err(AnalysisError::MissingMapping {
                variable: variable.clone(),
            });
        }
    }

    let mut notes = Vec::new();
    let by_type = collect_inputs(inputs.tmdes, &mut notes);

    let mut missing: Vec<String> = variables
        .iter()
        .map(|v| inputs.mappings[v].clone())
        .filter(|t| !by_type.contains_key(t))
        .collect();
    missing.sort();
    missing.dedup();
    if !missing.is_empty() {
        return Err(AnalysisError::MissingTmde { types: missing });
    }

    let scope: Scope = variables
        .iter()
        .map(|v| (v.clone(), by_type[&inputs.mappings[v]].nominal))
        .collect();
    let nominal_result = equation.evaluate(&scope)?;

    let mut components = Vec::new();
    let mut inputs_variance = 0.0;

    for variable in &variables {
        let kind = &inputs.mappings[variable];
        let input = &by_type[kind];
        let u_native = input.variance_native.sqrt();

        let ci = equation.sensitivity(variable, &scope, strategy)?;
        let contribution = ci * u_native;
        inputs_variance += contribution * contribution;

        let mut row = BudgetComponent::type_b(
            format!("derived_{}", variable),
            format!("Input: {} ({})", kind, variable),
            input.variance_base.sqrt(),
            input.distribution.clone(),
        )
        .in_base_units()
        .with_native(u_native, input.unit.clone())
        .with_source(format!("{} {}", input.nominal, input.unit));
        row.sensitivity_coefficient = Some(ci);
        row.derivative = Some(equation.expr.derivative(variable).to_string());
        row.contribution = Some(contribution.abs());
        row.quantity = input.quantity;
        components.push(row);
    }

    let inputs_native = inputs_variance.sqrt();
    let mut total_variance = inputs_variance;

    for mut row in inputs.manual {
        let native = row.value / 1e6 * uut_nominal.abs();
        total_variance += native * native;
        row.value = native * to_si;
        row.base_unit_value = true;
        row.value_native = Some(native);
        row.unit_native = Some(unit.to_string());
        row.sensitivity_coefficient = Some(1.0);
        row.contribution = Some(native);
        components.push(row);
    }

    let nominal_base = UnitSystem::to_base_unit(uut_nominal, unit).abs();
    if nominal_base != 0.0 {
        let title = inputs.uut.name.as_deref().unwrap_or("Derived");
        for res in uut_resolution_rows(inputs.uut_tolerance, inputs.uut) {
            let deviation_base = res.value / 1e6 * nominal_base;
            let native = deviation_base / to_si;
            total_variance += native * native;

            let mut row = BudgetComponent::type_b(
                "derived_resolution",
                format!("{} - Resolution", title),
                deviation_base,
                "Rectangular",
            )
            .in_base_units()
            .with_native(native, unit)
            .with_source(inputs.uut.to_string());
            row.sensitivity_coefficient = Some(1.0);
            row.contribution = Some(native);
            components.push(row);
        }
    }

    let combined_native = total_variance.sqrt();
    let combined_absolute_base = combined_native * to_si;
    let combined_ppm = (nominal_base != 0.0).then(|| combined_absolute_base / nominal_base * 1e6);

    let result = UncertaintyResult {
        combined_ppm,
        combined_absolute_base,
        combined_native,
        inputs_native: Some(inputs_native),
        effective_dof: Dof::Infinite,
        k: 1.0,
        expanded_ppm: None,
        expanded_absolute_base: 0.0,
        expanded_native: 0.0,
        confidence: inputs.confidence,
        nominal_result: Some(nominal_result),
        unit: unit.to_string(),
        components,
        notes,
    };
    Ok(Some(result.expand()))
}
