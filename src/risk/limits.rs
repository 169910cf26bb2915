//! Classification of acceptance limits

use serde::Serialize;
use std::fmt;

/// Shape of the tolerance the risk is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    /// Both limits present
    TwoSided,
    /// Only an upper limit, with a known process average
    UpperThreshold,
    /// Only a lower limit, with a known process average
    LowerThreshold,
    /// Only an upper limit and no average: the nominal stands in
    AltUpperThreshold,
    /// Only a lower limit and no average
    AltLowerThreshold,
}

impl RiskType {
    pub fn is_threshold(self) -> bool {
        !matches!(self, RiskType::TwoSided)
    }

    /// Threshold without a process average
    pub fn is_alternate(self) -> bool {
        matches!(self, RiskType::AltUpperThreshold | RiskType::AltLowerThreshold)
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskType::TwoSided => write!(f, "two-sided"),
            RiskType::UpperThreshold => write!(f, "upper threshold"),
            RiskType::LowerThreshold => write!(f, "lower threshold"),
            RiskType::AltUpperThreshold => write!(f, "upper threshold (no average)"),
            RiskType::AltLowerThreshold => write!(f, "lower threshold (no average)"),
        }
    }
}

/// Classified limits
///
/// Two-sided limits are stored relative to `nominal`; threshold limits stay
/// absolute, with the absent side at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub kind: RiskType,
    pub nominal: f64,
    pub average: f64,
    pub low: f64,
    pub high: f64,
}

impl Tolerance {
    /// Classify absolute limits
    ///
    /// Two-sided limits are centered on their midpoint, or on `average` when
    /// it lies strictly inside them. `None` when both limits are missing or
    /// `low >= high`.
    pub fn classify(nominal: Option<f64>, average: Option<f64>, low: Option<f64>, high: Option<f64>) -> Option<Self> {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        let (nominal, average, low, high) = (finite(nominal), finite(average), finite(low), finite(high));

        match (low, high) {
            (None, None) => None,
            (Some(low), Some(high)) => {
                if low >= high {
                    return None;
                }
                let mid = (low + high) / 2.0;
                let center = match average {
                    Some(avg) if avg != mid && avg > low && avg < high => avg,
                    _ => mid,
                };
                Some(Tolerance {
                    kind: RiskType::TwoSided,
                    nominal: center,
                    average: average.unwrap_or(0.0),
                    low: low - center,
                    high: high - center,
                })
            }
            (None, Some(high)) => {
                let nominal = nominal.unwrap_or(high);
                let (kind, average) = match average {
                    Some(avg) => (RiskType::UpperThreshold, avg),
                    None => (RiskType::AltUpperThreshold, nominal),
                };
                Some(Tolerance {
                    kind,
                    nominal,
                    average,
                    low: 0.0,
                    high,
                })
            }
            (Some(low), None) => {
                let nominal = nominal.unwrap_or(low);
                let (kind, average) = match average {
                    Some(avg) => (RiskType::LowerThreshold, avg),
                    None => (RiskType::AltLowerThreshold, nominal),
                };
                Some(Tolerance {
                    kind,
                    nominal,
                    average,
                    low,
                    high: 0.0,
                })
            }
        }
    }

    /// Express absolute acceptance limits in this tolerance's frame
    pub fn acceptance(&self, low: f64, high: f64) -> (f64, f64) {
        match self.kind {
            RiskType::TwoSided => (low - self.nominal, high - self.nominal),
            _ => (low, high),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_sided_is_centered() {
        let tol = Tolerance::classify(Some(10.0), None, Some(9.0), Some(11.0)).unwrap();
        assert_eq!(tol.kind, RiskType::TwoSided);
        assert_eq!(tol.nominal, 10.0);
        assert_eq!((tol.low, tol.high), (-1.0, 1.0));
    }

    #[test]
    fn test_average_inside_limits_recenters() {
        let tol = Tolerance::classify(Some(10.0), Some(10.5), Some(9.0), Some(11.0)).unwrap();
        assert_eq!(tol.nominal, 10.5);
        assert_eq!((tol.low, tol.high), (-1.5, 0.5));

        let outside = Tolerance::classify(Some(10.0), Some(0.0), Some(9.0), Some(11.0)).unwrap();
        assert_eq!(outside.nominal, 10.0);
    }

    #[test]
    fn test_thresholds() {
        let up = Tolerance::classify(Some(5.0), Some(4.0), None, Some(6.0)).unwrap();
        assert_eq!(up.kind, RiskType::UpperThreshold);
        assert_eq!(up.high, 6.0);

        let alt = Tolerance::classify(Some(5.0), None, Some(4.0), None).unwrap();
        assert_eq!(alt.kind, RiskType::AltLowerThreshold);
        assert_eq!(alt.average, 5.0);
        assert!(alt.kind.is_alternate());
    }

    #[test]
    fn test_invalid_limits() {
        assert!(Tolerance::classify(Some(1.0), None, None, None).is_none());
        assert!(Tolerance::classify(Some(1.0), None, Some(2.0), Some(1.0)).is_none());
        assert!(Tolerance::classify(Some(1.0), None, Some(f64::NAN), Some(f64::NAN)).is_none());
    }

    #[test]
    fn test_acceptance_frame() {
        let tol = Tolerance::classify(None, None, Some(9.0), Some(11.0)).unwrap();
        assert_eq!(tol.acceptance(9.5, 10.5), (-0.5, 0.5));
    }
}
