//! Record types exchanged with the analysis and risk engines
//!
//! Key names follow the JSON layout written by calibration session tools
//! (`readings_iv`, `measuringResolution`, `variableType`, ...), and numeric
//! fields accept either numbers or numeric strings.

pub mod budget;
pub mod instrument;
pub mod session;
pub mod tolerance;

pub use budget::{BudgetComponent, ComponentType, Dof};
pub use instrument::{Instrument, InstrumentFunction, InstrumentRange};
pub use session::{ManualComponent, MeasurementType, RequirementOverrides, RiskLimits, RiskRequirements, TestPoint};
pub use tolerance::{ComponentKind, Distribution, MeasurementPoint, Tmde, ToleranceComponent, ToleranceSpec};

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn into_number(self) -> Option<f64> {
        match self {
            NumberOrText::Number(n) => Some(n),
            NumberOrText::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse().ok()
                }
            }
        }
    }
}

/// Optional number written as a number, a numeric string, `""` or `null`
///
/// Text that does not parse is treated as absent.
pub(crate) fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(raw.and_then(NumberOrText::into_number).filter(|n| !n.is_nan()))
}

/// List of numbers, each written as a number or numeric string
pub(crate) fn number_list<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<NumberOrText>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(NumberOrText::into_number)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "optional_number")]
        value: Option<f64>,
        #[serde(default, deserialize_with = "number_list")]
        readings: Vec<f64>,
    }

    #[test]
    fn test_optional_number_forms() {
        let p: Probe = serde_json::from_str(r#"{"value": "1.5"}"#).unwrap();
        assert_eq!(p.value, Some(1.5));
        let p: Probe = serde_json::from_str(r#"{"value": 2}"#).unwrap();
        assert_eq!(p.value, Some(2.0));
        let p: Probe = serde_json::from_str(r#"{"value": ""}"#).unwrap();
        assert_eq!(p.value, None);
        let p: Probe = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(p.value, None);
        let p: Probe = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(p.value, None);
    }

    #[test]
    fn test_number_list_skips_blanks() {
        let p: Probe = serde_json::from_str(r#"{"readings": [1, "2", "", 3.5]}"#).unwrap();
        assert_eq!(p.readings, vec![1.0, 2.0, 3.5]);
    }
}
