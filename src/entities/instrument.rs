//! Instrument specification records

use serde::{Deserialize, Serialize};

use super::optional_number;
use super::tolerance::ToleranceSpec;

/// An instrument and its published accuracy specifications
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    #[serde(default)]
    pub manufacturer: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub functions: Vec<InstrumentFunction>,
}

impl Instrument {
    /// `manufacturer model`, or the description when both are blank
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.manufacturer.trim(), self.model.trim());
        let name = name.trim();
        if name.is_empty() {
            self.description.clone()
        } else {
            name.to_string()
        }
    }
}

/// A measurement function (DC Voltage, AC Current, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentFunction {
    #[serde(default)]
    pub name: String,

    /// Unit the range limits are expressed in
    pub unit: String,

    #[serde(default)]
    pub ranges: Vec<InstrumentRange>,
}

/// One range of a function with its tolerance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRange {
    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,

    #[serde(default)]
    pub tolerances: ToleranceSpec,
}

impl InstrumentRange {
    /// Whether `magnitude` lies in `[min, max]`; a missing min is zero
    pub fn contains(&self, magnitude: f64) -> bool {
        let min = self.min.unwrap_or(0.0);
        match self.max {
            Some(max) => magnitude >= min && magnitude <= max,
            None => false,
        }
    }
}
