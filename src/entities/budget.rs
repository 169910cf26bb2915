//! Uncertainty budget rows

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// GUM evaluation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComponentType {
    /// Evaluated statistically from repeated observations
    A,
    /// Evaluated from specifications or judgment
    #[default]
    B,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::A => write!(f, "A"),
            ComponentType::B => write!(f, "B"),
        }
    }
}

/// Degrees of freedom
///
/// Serialized as a number, or the string `"Infinity"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Dof {
    Finite(f64),
    #[default]
    Infinite,
}

impl Dof {
    /// Non-finite or non-positive counts are treated as infinite
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Dof::Finite(value)
        } else {
            Dof::Infinite
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Dof::Finite(v) => v,
            Dof::Infinite => f64::INFINITY,
        }
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Dof::Infinite)
    }

    /// Welch-Satterthwaite denominator term `u⁴/ν` (zero for infinite DOF)
    pub fn ws_term(self, u: f64) -> f64 {
        match self {
            Dof::Finite(v) if u.is_finite() && u != 0.0 => u.powi(4) / v,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dof::Finite(v) => write!(f, "{:.1}", v),
            Dof::Infinite => write!(f, "∞"),
        }
    }
}

impl Serialize for Dof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dof::Finite(v) => serializer.serialize_f64(*v),
            Dof::Infinite => serializer.serialize_str("Infinity"),
        }
    }
}

impl<'de> Deserialize<'de> for Dof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // "Infinity", "inf", "" and null all parse to None or infinity
        let raw = super::optional_number(deserializer)?;
        Ok(raw.map(Dof::new).unwrap_or(Dof::Infinite))
    }
}

/// One row of an uncertainty budget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetComponent {
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub kind: ComponentType,

    /// Standard uncertainty in ppm of the reference point, or in absolute
    /// base units when `base_unit_value` is set
    pub value: f64,

    /// `value` is in SI base units rather than ppm (derived-mode rows)
    #[serde(rename = "isBaseUnitValue")]
    pub base_unit_value: bool,

    /// Standard uncertainty in `unit_native`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_native: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_native: Option<String>,

    pub dof: Dof,

    pub distribution: String,

    #[serde(rename = "sensitivityCoefficient", skip_serializing_if = "Option::is_none")]
    pub sensitivity_coefficient: Option<f64>,

    /// Symbolic partial derivative, for derived-mode inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivative: Option<String>,

    /// Contribution to the combined uncertainty in the result's native unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contribution: Option<f64>,

    pub quantity: f64,

    /// Where the row came from (reference point, "Manual", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl BudgetComponent {
    /// Type B row with infinite DOF
    pub fn type_b(id: impl Into<String>, name: impl Into<String>, value: f64, distribution: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ComponentType::B,
            value,
            base_unit_value: false,
            value_native: None,
            unit_native: None,
            dof: Dof::Infinite,
            distribution: distribution.into(),
            sensitivity_coefficient: None,
            derivative: None,
            contribution: None,
            quantity: 1.0,
            source: None,
        }
    }

    pub fn with_native(mut self, value: f64, unit: impl Into<String>) -> Self {
        self.value_native = Some(value);
        self.unit_native = Some(unit.into());
        self
    }

    /// Mark `value` as an absolute base-unit figure
    pub fn in_base_units(mut self) -> Self {
        self.base_unit_value = true;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Variance weight `u²·quantity`
    pub fn variance(&self) -> f64 {
        self.value * self.value * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dof_serialization() {
        assert_eq!(serde_json::to_string(&Dof::Infinite).unwrap(), "\"Infinity\"");
        assert_eq!(serde_json::to_string(&Dof::Finite(9.0)).unwrap(), "9.0");
    }

    #[test]
    fn test_dof_deserialization() {
        let d: Dof = serde_json::from_str("\"Infinity\"").unwrap();
        assert!(d.is_infinite());
        let d: Dof = serde_json::from_str("4").unwrap();
        assert_eq!(d, Dof::Finite(4.0));
        let d: Dof = serde_json::from_str("0").unwrap();
        assert!(d.is_infinite());
    }

    #[test]
    fn test_ws_term_ignores_infinite() {
        assert_eq!(Dof::Infinite.ws_term(10.0), 0.0);
        assert!((Dof::Finite(2.0).ws_term(2.0) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_variance_uses_quantity() {
        let mut c = BudgetComponent::type_b("x", "X", 3.0, "Rectangular");
        c.quantity = 2.0;
        assert_eq!(c.variance(), 18.0);
    }
}
