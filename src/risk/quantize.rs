//! Snapping guard-band limits to the UUT's display resolution

const ZERO: f64 = 1e-6;

fn off_grid(steps: f64) -> bool {
    (steps.trunc() - steps).abs() > ZERO
}

/// Quantize a lower guard-band limit
///
/// Positive values between grid points move up to the next step, negative
/// ones down. A non-positive resolution or zero value passes through.
pub fn res_down(value: f64, resolution: f64) -> f64 {
    if resolution <= 0.0 || value == 0.0 || !resolution.is_finite() {
        return value;
    }
    let steps = value / resolution;
    let mut x = steps.floor() * resolution;
    if off_grid(steps) && value > 0.0 {
        x += resolution;
    }
    x
}

/// Quantize an upper guard-band limit: always toward the next lower step
pub fn res_up(value: f64, resolution: f64) -> f64 {
    if resolution <= 0.0 || value == 0.0 || !resolution.is_finite() {
        return value;
    }
    let steps = value / resolution;
    let mut x = steps.trunc() * resolution;
    if off_grid(steps) && value < 0.0 {
        x -= resolution;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_res_down() {
        assert!(close(res_down(9.9234, 0.01), 9.93));
        assert!(close(res_down(9.92, 0.01), 9.92));
        assert!(close(res_down(-0.95, 0.1), -1.0));
    }

    #[test]
    fn test_res_up() {
        assert!(close(res_up(10.0766, 0.01), 10.07));
        assert!(close(res_up(-0.95, 0.1), -1.0));
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(res_down(1.2345, 0.0), 1.2345);
        assert_eq!(res_up(0.0, 0.1), 0.0);
        assert_eq!(res_up(1.2345, -1.0), 1.2345);
    }
}
