//! Tolerance specifications, measurement points and reference standards

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::optional_number;

/// A nominal value with its unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default)]
    pub unit: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MeasurementPoint {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            unit: unit.into(),
            name: None,
        }
    }

    /// Value and unit, when both are present
    pub fn nominal(&self) -> Option<(f64, &str)> {
        let unit = self.unit.trim();
        match self.value {
            Some(v) if v.is_finite() && !unit.is_empty() => Some((v, unit)),
            _ => None,
        }
    }
}

impl fmt::Display for MeasurementPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{} {}", v, self.unit),
            None => write!(f, "? {}", self.unit),
        }
    }
}

/// Coverage divisor of an error distribution
///
/// Deserializes from a number or numeric string; anything unusable becomes
/// the rectangular divisor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution(f64);

const DISTRIBUTIONS: &[(f64, &str)] = &[
    (1.732, "Rectangular"),
    (3.464, "Rectangular (Resolution)"),
    (2.449, "Triangular"),
    (1.414, "U-Shaped"),
    (1.645, "Normal (90%)"),
    (1.960, "Normal (95%)"),
    (2.000, "Normal (95.45%)"),
    (2.576, "Normal (99%)"),
    (3.000, "Normal (99.73%)"),
    (4.179, "Rayleigh"),
    (1.000, "Std. Uncertainty"),
];

impl Distribution {
    pub const RECTANGULAR: Distribution = Distribution(1.732);

    /// Divisor, falling back to rectangular for non-positive input
    pub fn new(divisor: f64) -> Self {
        if divisor.is_finite() && divisor > 0.0 {
            Distribution(divisor)
        } else {
            Self::RECTANGULAR
        }
    }

    pub fn divisor(self) -> f64 {
        self.0
    }

    /// Label from the distribution table, `Custom (k=..)` when unlisted
    pub fn label(self) -> String {
        DISTRIBUTIONS
            .iter()
            .find(|(d, _)| (d - self.0).abs() < 5e-4)
            .map(|(_, label)| (*label).to_string())
            .unwrap_or_else(|| format!("Custom (k={})", self.0))
    }

    /// All tabulated distributions
    pub fn table() -> impl Iterator<Item = (f64, &'static str)> {
        DISTRIBUTIONS.iter().copied()
    }
}

impl Default for Distribution {
    fn default() -> Self {
        Self::RECTANGULAR
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let divisor = optional_number(deserializer)?;
        Ok(divisor.map(Distribution::new).unwrap_or_default())
    }
}

/// One term of a tolerance specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToleranceComponent {
    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,

    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub distribution: Distribution,

    #[serde(default)]
    pub symmetric: bool,

    /// Full-scale value a range term is relative to
    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// dB multiplier (20 for amplitude, 10 for power)
    #[serde(default, deserialize_with = "optional_number", skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,

    /// dB reference level
    #[serde(
        default,
        rename = "ref",
        deserialize_with = "optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<f64>,
}

impl ToleranceComponent {
    /// Symmetric `±high` term
    pub fn symmetric(high: f64, unit: impl Into<String>) -> Self {
        Self {
            high: Some(high),
            low: Some(-high),
            unit: unit.into(),
            symmetric: true,
            ..Default::default()
        }
    }

    pub fn with_distribution(mut self, divisor: f64) -> Self {
        self.distribution = Distribution::new(divisor);
        self
    }

    /// Signed `(low, high)` limits; `low` mirrors `high` when absent or symmetric
    pub fn limits(&self) -> Option<(f64, f64)> {
        if self.high.is_none() && self.low.is_none() {
            return None;
        }
        let high = self.high.unwrap_or(0.0);
        let low = match self.low {
            Some(low) if !self.symmetric => low,
            _ => -high,
        };
        Some((low, high))
    }

    /// Half of the tolerance span, `None` when zero or not finite
    pub fn half_span(&self) -> Option<f64> {
        let (low, high) = self.limits()?;
        let half = (high - low) / 2.0;
        (half.is_finite() && half != 0.0).then_some(half)
    }

    pub fn db_multiplier(&self) -> f64 {
        self.multiplier.filter(|m| *m != 0.0).unwrap_or(20.0)
    }

    pub fn db_reference(&self) -> f64 {
        self.reference.filter(|r| *r != 0.0).unwrap_or(1.0)
    }
}

/// Which term of a specification a component came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Reading,
    ReadingsIv,
    Range,
    Floor,
    Db,
    Resolution,
}

impl ComponentKind {
    /// Key used in tolerance records and component ids
    pub fn key(self) -> &'static str {
        match self {
            ComponentKind::Reading => "reading",
            ComponentKind::ReadingsIv => "readings_iv",
            ComponentKind::Range => "range",
            ComponentKind::Floor => "floor",
            ComponentKind::Db => "db",
            ComponentKind::Resolution => "resolution",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ComponentKind::Reading => "Reading",
            ComponentKind::ReadingsIv => "Readings (IV)",
            ComponentKind::Range => "Range",
            ComponentKind::Floor => "Floor",
            ComponentKind::Db => "dB",
            ComponentKind::Resolution => "Resolution",
        }
    }
}

/// A tolerance specification: every term optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<ToleranceComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readings_iv: Option<ToleranceComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ToleranceComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<ToleranceComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<ToleranceComponent>,

    #[serde(
        default,
        rename = "measuringResolution",
        deserialize_with = "optional_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub measuring_resolution: Option<f64>,

    #[serde(
        default,
        rename = "measuringResolutionUnit",
        skip_serializing_if = "Option::is_none"
    )]
    pub measuring_resolution_unit: Option<String>,
}

impl ToleranceSpec {
    /// Linear terms in evaluation order (dB and resolution excluded)
    pub fn linear_terms(&self) -> impl Iterator<Item = (ComponentKind, &ToleranceComponent)> {
        [
            (ComponentKind::Reading, self.reading.as_ref()),
            (ComponentKind::ReadingsIv, self.readings_iv.as_ref()),
            (ComponentKind::Range, self.range.as_ref()),
            (ComponentKind::Floor, self.floor.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, comp)| comp.map(|c| (kind, c)))
    }

    /// Resolution, if positive
    pub fn resolution(&self) -> Option<f64> {
        self.measuring_resolution.filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Budget row prefix: the spec name, `UUT` when it carries a resolution, else `TMDE`
    pub fn prefix(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ if self.measuring_resolution.is_some() => "UUT",
            _ => "TMDE",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.linear_terms().next().is_none() && self.db.is_none() && self.resolution().is_none()
    }
}

fn default_quantity() -> Option<f64> {
    Some(1.0)
}

/// A reference standard used for the measurement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tmde {
    #[serde(flatten)]
    pub tolerance: ToleranceSpec,

    #[serde(default, rename = "measurementPoint")]
    pub measurement_point: MeasurementPoint,

    /// Number of identical devices used
    #[serde(default = "default_quantity", deserialize_with = "optional_number")]
    pub quantity: Option<f64>,

    /// Input type this standard supplies in a derived measurement
    #[serde(default, rename = "variableType", skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
}

impl Tmde {
    /// Device count, at least one
    pub fn quantity(&self) -> f64 {
        self.quantity
            .filter(|q| q.is_finite() && *q >= 1.0)
            .map(f64::trunc)
            .unwrap_or(1.0)
    }

    pub fn name(&self) -> &str {
        self.tolerance.name.as_deref().unwrap_or("TMDE")
    }
}
