//! Test points and the risk policy applied to them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::budget::{ComponentType, Dof};
use super::tolerance::{Distribution, MeasurementPoint, Tmde, ToleranceSpec};
use super::{number_list, optional_number};

/// How the UUT value is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    /// The standard measures the UUT quantity directly
    #[default]
    Direct,
    /// The UUT value is computed from an equation of several inputs
    Derived,
}

/// Risk policy, with percentages stored as percent (`95` = 95 %)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRequirements {
    pub uncertainty_confidence: f64,
    pub reliability: f64,
    pub cal_int: f64,
    pub meas_rel_calc_assumed: f64,
    #[serde(rename = "neededTUR")]
    pub needed_tur: f64,
    #[serde(rename = "reqPFA")]
    pub req_pfa: f64,
}

impl Default for RiskRequirements {
    fn default() -> Self {
        Self {
            uncertainty_confidence: 95.0,
            reliability: 85.0,
            cal_int: 12.0,
            meas_rel_calc_assumed: 85.0,
            needed_tur: 4.0,
            req_pfa: 2.0,
        }
    }
}

impl RiskRequirements {
    pub fn confidence_fraction(&self) -> f64 {
        self.uncertainty_confidence / 100.0
    }

    pub fn reliability_fraction(&self) -> f64 {
        self.reliability / 100.0
    }

    pub fn assumed_reliability_fraction(&self) -> f64 {
        self.meas_rel_calc_assumed / 100.0
    }

    pub fn pfa_fraction(&self) -> f64 {
        self.req_pfa / 100.0
    }
}

/// Per-test-point overrides of the configured risk policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementOverrides {
    #[serde(default, deserialize_with = "optional_number")]
    pub uncertainty_confidence: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub reliability: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub cal_int: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub meas_rel_calc_assumed: Option<f64>,
    #[serde(default, rename = "neededTUR", deserialize_with = "optional_number")]
    pub needed_tur: Option<f64>,
    #[serde(default, rename = "reqPFA", deserialize_with = "optional_number")]
    pub req_pfa: Option<f64>,
}

impl RequirementOverrides {
    pub fn apply(&self, base: RiskRequirements) -> RiskRequirements {
        RiskRequirements {
            uncertainty_confidence: self.uncertainty_confidence.unwrap_or(base.uncertainty_confidence),
            reliability: self.reliability.unwrap_or(base.reliability),
            cal_int: self.cal_int.unwrap_or(base.cal_int),
            meas_rel_calc_assumed: self.meas_rel_calc_assumed.unwrap_or(base.meas_rel_calc_assumed),
            needed_tur: self.needed_tur.unwrap_or(base.needed_tur),
            req_pfa: self.req_pfa.unwrap_or(base.req_pfa),
        }
    }
}

/// Explicit absolute acceptance limits; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    #[serde(default, rename = "LLow", deserialize_with = "optional_number")]
    pub low: Option<f64>,

    #[serde(default, rename = "LUp", deserialize_with = "optional_number")]
    pub high: Option<f64>,
}

/// A user-entered budget row
///
/// `readings` takes precedence and produces a repeatability row. Otherwise
/// type A rows carry a standard uncertainty in `value`, and type B rows a
/// tolerance limit divided by `distribution`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualComponent {
    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type")]
    pub kind: ComponentType,

    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Unit of `value`/`readings`; empty means ppm
    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub dof: Dof,

    #[serde(default)]
    pub distribution: Distribution,

    #[serde(default, deserialize_with = "number_list", skip_serializing_if = "Vec::is_empty")]
    pub readings: Vec<f64>,
}

/// A calibration test point: the UUT, its standards and policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub measurement_type: MeasurementType,

    #[serde(default)]
    pub uut_nominal: MeasurementPoint,

    #[serde(default)]
    pub uut_tolerance: ToleranceSpec,

    #[serde(default)]
    pub tmde_tolerances: Vec<Tmde>,

    #[serde(default)]
    pub manual_components: Vec<ManualComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equation_string: Option<String>,

    /// Equation symbol to input type
    #[serde(default)]
    pub variable_mappings: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unc_req: Option<RequirementOverrides>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_limits: Option<RiskLimits>,
}

impl TestPoint {
    /// Display title: the name, else the nominal
    pub fn title(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.uut_nominal.to_string(),
        }
    }

    /// Configured policy with this point's overrides applied
    pub fn requirements(&self, base: RiskRequirements) -> RiskRequirements {
        match &self.unc_req {
            Some(overrides) => overrides.apply(base),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_over_base() {
        let overrides = RequirementOverrides {
            reliability: Some(95.0),
            req_pfa: Some(1.0),
            ..Default::default()
        };
        let req = overrides.apply(RiskRequirements::default());
        assert_eq!(req.reliability, 95.0);
        assert_eq!(req.req_pfa, 1.0);
        assert_eq!(req.needed_tur, 4.0);
        assert!((req.pfa_fraction() - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_deserialize_test_point() {
        let yaml = r#"
name: DCV 10 V
measurementType: direct
uutNominal: { value: "10", unit: V }
uutTolerance:
  reading: { high: 0.01, unit: "%" }
  measuringResolution: 0.0001
tmdeTolerances:
  - name: Calibrator
    reading: { high: 0.002, unit: "%", distribution: 2 }
    measurementPoint: { value: 10, unit: V }
manualComponents:
  - name: Repeatability
    readings: [10.0001, 10.0002, "10.0000"]
    unit: V
uncReq:
  reliability: "90"
  neededTUR: 4
riskLimits:
  LLow: 9.999
"#;
        let tp: TestPoint = serde_yml::from_str(yaml).unwrap();
        assert_eq!(tp.title(), "DCV 10 V");
        assert_eq!(tp.measurement_type, MeasurementType::Direct);
        assert_eq!(tp.tmde_tolerances.len(), 1);
        assert_eq!(tp.manual_components[0].readings.len(), 3);
        let req = tp.requirements(RiskRequirements::default());
        assert_eq!(req.reliability, 90.0);
        let limits = tp.risk_limits.unwrap();
        assert_eq!(limits.low, Some(9.999));
        assert_eq!(limits.high, None);
    }

    #[test]
    fn test_title_falls_back_to_nominal() {
        let tp = TestPoint {
            uut_nominal: MeasurementPoint::new(5.0, "A"),
            ..Default::default()
        };
        assert_eq!(tp.title(), "5 A");
    }
}
