//! User-entered budget rows: Type A, Type B and repeatability

use serde::Serialize;

use super::ppm::convert_to_ppm;
use super::AnalysisError;
use crate::entities::{BudgetComponent, ComponentType, Dof, ManualComponent, MeasurementPoint};

/// Sample statistics of repeated readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Repeatability {
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std_dev: f64,
    pub dof: f64,
    pub count: usize,
}

/// Statistics of two or more readings
pub fn repeatability(readings: &[f64]) -> Option<Repeatability> {
    let n = readings.len();
    if n < 2 {
        return None;
    }
    let mean = readings.iter().sum::<f64>() / n as f64;
    let variance = readings.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

    Some(Repeatability {
        mean,
        std_dev: variance.sqrt(),
        dof: (n - 1) as f64,
        count: n,
    })
}

fn unit_or_ppm(unit: &str) -> &str {
    match unit.trim() {
        "" => "ppm",
        u => u,
    }
}

fn to_uut_ppm(value: f64, unit: &str, uut: &MeasurementPoint) -> Result<f64, AnalysisError> {
    if unit == "ppm" {
        return Ok(value);
    }
    let (nominal, nominal_unit) = uut
        .nominal()
        .ok_or_else(|| AnalysisError::MissingInput("UUT nominal value or unit".to_string()))?;
    Ok(convert_to_ppm(value, unit, nominal, nominal_unit, None)?)
}

/// Convert a manual row into a budget component in ppm of the UUT nominal
pub fn manual_component(
    comp: &ManualComponent,
    index: usize,
    uut: &MeasurementPoint,
) -> Result<BudgetComponent, AnalysisError> {
    let unit = unit_or_ppm(&comp.unit);

    if !comp.readings.is_empty() {
        let stats = repeatability(&comp.readings).ok_or_else(|| {
            AnalysisError::InvalidInput(format!("'{}' needs at least two readings", comp.name))
        })?;
        let ppm = to_uut_ppm(stats.std_dev, unit, uut)?;
        let name = if comp.name.trim().is_empty() {
            "Repeatability"
        } else {
            comp.name.as_str()
        };
        return Ok(BudgetComponent {
            kind: ComponentType::A,
            dof: Dof::new(stats.dof),
            ..BudgetComponent::type_b(format!("repeatability_{}", index), name, ppm.abs(), "Normal")
        }
        .with_native(stats.std_dev, unit)
        .with_source(format!("N={}, Mean={:.5}", stats.count, stats.mean)));
    }

    let value = comp
        .value
        .ok_or_else(|| AnalysisError::MissingInput(format!("value of manual component '{}'", comp.name)))?;
    let name = if comp.name.trim().is_empty() {
        format!("Manual {}", index + 1)
    } else {
        comp.name.clone()
    };

    match comp.kind {
        ComponentType::A => {
            if let Dof::Finite(v) = comp.dof {
                if v < 1.0 {
                    return Err(AnalysisError::InvalidInput(format!(
                        "degrees of freedom of '{}' must be at least 1",
                        name
                    )));
                }
            }
            let ppm = to_uut_ppm(value, unit, uut)?;
            Ok(BudgetComponent {
                kind: ComponentType::A,
                dof: comp.dof,
                ..BudgetComponent::type_b(format!("manual_{}", index), name, ppm.abs(), "Normal")
            }
            .with_native(value.abs(), unit)
            .with_source("Manual"))
        }
        ComponentType::B => {
            let divisor = comp.distribution.divisor();
            let ppm = to_uut_ppm(value, unit, uut)?;
            Ok(BudgetComponent {
                dof: comp.dof,
                ..BudgetComponent::type_b(
                    format!("manual_{}", index),
                    name,
                    (ppm / divisor).abs(),
                    comp.distribution.label(),
                )
            }
            .with_native((value / divisor).abs(), unit)
            .with_source("Manual"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Distribution;

    fn uut() -> MeasurementPoint {
        MeasurementPoint::new(10.0, "V")
    }

    #[test]
    fn test_repeatability_statistics() {
        let stats = repeatability(&[1.0, 2.0, 3.0]).unwrap();
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.std_dev - 1.0).abs() < 1e-12);
        assert_eq!(stats.dof, 2.0);
        assert!(repeatability(&[1.0]).is_none());
    }

    #[test]
    fn test_repeatability_component() {
        let comp = ManualComponent {
            readings: vec![10.001, 10.002, 10.003],
            unit: "V".into(),
            ..Default::default()
        };
        let row = manual_component(&comp, 0, &uut()).unwrap();
        assert_eq!(row.kind, ComponentType::A);
        assert_eq!(row.dof, Dof::Finite(2.0));
        // 1 mV of 10 V
        assert!((row.value - 100.0).abs() < 1e-6);
        assert_eq!(row.name, "Repeatability");
    }

    #[test]
    fn test_type_b_divides_by_distribution() {
        let comp = ManualComponent {
            name: "Thermal EMF".into(),
            kind: ComponentType::B,
            value: Some(2.0),
            unit: "mV".into(),
            distribution: Distribution::new(2.0),
            ..Default::default()
        };
        let row = manual_component(&comp, 1, &uut()).unwrap();
        assert!((row.value - 100.0).abs() < 1e-9);
        assert_eq!(row.distribution, "Normal (95.45%)");
        assert!(row.dof.is_infinite());
    }

    #[test]
    fn test_type_a_in_ppm_needs_no_nominal() {
        let comp = ManualComponent {
            kind: ComponentType::A,
            value: Some(3.5),
            dof: Dof::Finite(9.0),
            ..Default::default()
        };
        let row = manual_component(&comp, 0, &MeasurementPoint::default()).unwrap();
        assert_eq!(row.value, 3.5);
        assert_eq!(row.dof, Dof::Finite(9.0));
    }

    #[test]
    fn test_type_a_rejects_fractional_dof() {
        let comp = ManualComponent {
            kind: ComponentType::A,
            value: Some(1.0),
            dof: Dof::Finite(0.5),
            ..Default::default()
        };
        assert!(matches!(
            manual_component(&comp, 0, &uut()),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mismatched_unit_is_an_error() {
        let comp = ManualComponent {
            value: Some(1.0),
            unit: "A".into(),
            ..Default::default()
        };
        assert!(matches!(
            manual_component(&comp, 0, &uut()),
            Err(AnalysisError::Conversion(_))
        ));
    }
}
