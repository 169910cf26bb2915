//! Test accuracy and test uncertainty ratios

use super::limits::{RiskType, Tolerance};

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Test accuracy ratio: UUT tolerance span over the standard's span
///
/// Thresholds compare the distance from the average to the limit with half
/// the standard's span. `None` for alternate thresholds and degenerate input.
pub fn calc_tar(
    nominal: Option<f64>,
    average: Option<f64>,
    low: Option<f64>,
    high: Option<f64>,
    std_low: f64,
    std_high: f64,
) -> Option<f64> {
    let tol = Tolerance::classify(nominal, average, low, high)?;
    let span = std_high - std_low;
    let ratio = match tol.kind {
        RiskType::TwoSided => (tol.high - tol.low) / span,
        RiskType::LowerThreshold => (tol.average - tol.low) / (span / 2.0),
        RiskType::UpperThreshold => (tol.high - tol.average) / (span / 2.0),
        _ => return None,
    };
    positive(ratio.abs())
}

/// Test uncertainty ratio: tolerance span over twice the expanded uncertainty
pub fn calc_tur(
    nominal: Option<f64>,
    average: Option<f64>,
    low: Option<f64>,
    high: Option<f64>,
    expanded: f64,
) -> Option<f64> {
    let tol = Tolerance::classify(nominal, average, low, high)?;
    let ratio = match tol.kind {
        RiskType::TwoSided => (tol.high - tol.low) / (2.0 * expanded),
        RiskType::LowerThreshold => (tol.average - tol.low) / expanded,
        RiskType::UpperThreshold => (tol.high - tol.average) / expanded,
        _ => return None,
    };
    positive(ratio.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tur_of_four() {
        let tur = calc_tur(Some(10.0), Some(10.0), Some(9.0), Some(11.0), 0.25).unwrap();
        assert!((tur - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_tur_invalid_input() {
        assert!(calc_tur(Some(10.0), None, Some(9.0), Some(11.0), 0.0).is_none());
        assert!(calc_tur(Some(10.0), None, Some(9.0), Some(11.0), f64::NAN).is_none());
        assert!(calc_tur(Some(10.0), None, None, None, 0.25).is_none());
    }

    #[test]
    fn test_threshold_tur() {
        let tur = calc_tur(Some(5.0), Some(4.0), None, Some(6.0), 0.5).unwrap();
        assert!((tur - 4.0).abs() < 1e-12);
        assert!(calc_tur(Some(5.0), None, None, Some(6.0), 0.5).is_none());
    }

    #[test]
    fn test_tar() {
        let tar = calc_tar(Some(10.0), None, Some(9.0), Some(11.0), 9.9, 10.1).unwrap();
        assert!((tar - 10.0).abs() < 1e-9);

        let low = calc_tar(Some(5.0), Some(5.0), Some(4.0), None, 4.9, 5.1).unwrap();
        assert!((low - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_tar_zero_span() {
        assert!(calc_tar(Some(10.0), None, Some(9.0), Some(11.0), 10.0, 10.0).is_none());
    }
}
