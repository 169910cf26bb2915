//! Normal, bivariate-normal and Student-t distribution functions

use crate::core::solver::Bisection;

/// Standard normal CDF Φ(x)
///
/// Hart's double-precision rational approximation (Hart 1968, algorithm
/// 5666), with a continued-fraction tail beyond |x| ≈ 7.07.
pub fn normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let xa = x.abs();
    if xa > 37.0 {
        return if x > 0.0 { 1.0 } else { 0.0 };
    }

    let exponential = (-xa * xa / 2.0).exp();
    let tail = if xa < 7.071_067_811_865_47 {
        let mut num = 3.526_249_659_989_11e-2 * xa + 0.700_383_064_443_688;
        num = num * xa + 6.373_962_203_531_65;
        num = num * xa + 33.912_866_078_383;
        num = num * xa + 112.079_291_497_871;
        num = num * xa + 221.213_596_169_931;
        num = num * xa + 220.206_867_912_376;

        let mut den = 8.838_834_764_831_84e-2 * xa + 1.755_667_163_182_64;
        den = den * xa + 16.064_177_579_207;
        den = den * xa + 86.780_732_202_946_1;
        den = den * xa + 296.564_248_779_674;
        den = den * xa + 637.333_633_378_831;
        den = den * xa + 793.826_512_519_948;
        den = den * xa + 440.413_735_824_752;

        exponential * num / den
    } else {
        let mut build = xa + 0.65;
        build = xa + 4.0 / build;
        build = xa + 3.0 / build;
        build = xa + 2.0 / build;
        build = xa + 1.0 / build;
        exponential / build / 2.506_628_274_631
    };

    if x > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Inverse standard normal CDF (probit)
///
/// Cephes `ndtri` rational approximations. Returns ±∞ at the bounds of
/// `[0, 1]` and NaN outside it.
pub fn inverse_normal(p: f64) -> f64 {
    const EXPM2: f64 = 0.135_335_283_236_613;
    const S2PI: f64 = 2.506_628_274_631;

    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let mut y = p;
    let mut negate = true;
    if y > 1.0 - EXPM2 {
        y = 1.0 - y;
        negate = false;
    }

    if y > EXPM2 {
        let y = y - 0.5;
        let y2 = y * y;
        let p0 = horner(
            y2,
            &[-59.963_350_101_410_8, 98.001_075_418_6, -56.676_285_746_907, 13.931_260_938_728, -1.239_165_838_673_81],
        );
        let q0 = horner(
            y2,
            &[
                1.0,
                1.954_488_583_381_42,
                4.676_279_128_988_82,
                86.360_242_139_089_1,
                -225.462_687_854_119,
                200.260_212_380_061,
                -82.037_225_616_833_3,
                15.905_622_512_621_2,
                -1.183_316_211_213_3,
            ],
        );
        return (y + y * y2 * p0 / q0) * S2PI;
    }

    let x = (-2.0 * y.ln()).sqrt();
    let x0 = x - x.ln() / x;
    let z = 1.0 / x;
    let x1 = if x < 8.0 {
        let p1 = horner(
            z,
            &[
                4.055_448_923_059_62,
                31.525_109_459_989_4,
                57.162_819_224_642_1,
                44.080_507_389_320_1,
                14.684_956_192_885_8,
                2.186_633_068_507_9,
                -0.140_256_079_171_354,
                -0.035_042_462_682_784_8,
                -8.574_567_851_546_85e-4,
            ],
        );
        let q1 = horner(
            z,
            &[
                1.0,
                15.779_988_325_646_7,
                45.390_763_512_887_9,
                41.317_203_825_467_2,
                15.042_538_569_290_8,
                2.504_649_462_083_09,
                -0.142_182_922_854_788,
                -0.038_080_640_769_157_8,
                -9.332_594_808_954_57e-4,
            ],
        );
        z * p1 / q1
    } else {
        let p2 = horner(
            z,
            &[
                3.237_748_917_769_46,
                6.915_228_890_689_84,
                3.938_810_252_924_74,
                1.333_034_608_158_08,
                0.201_485_389_549_179,
                0.012_371_663_481_782,
                3.015_815_535_082_35e-4,
                2.658_069_746_867_38e-6,
                6.239_745_391_849_83e-9,
            ],
        );
        let q2 = horner(
            z,
            &[
                1.0,
                6.024_270_393_647_42,
                3.679_835_638_561_61,
                1.377_020_994_890_81,
                0.216_236_993_594_497,
                0.013_420_400_608_854_3,
                3.280_144_646_821_28e-4,
                2.892_478_647_453_81e-6,
                6.790_194_080_099_81e-9,
            ],
        );
        z * p2 / q2
    };

    let x = x0 - x1;
    if negate {
        -x
    } else {
        x
    }
}

/// Evaluate a polynomial, highest-order coefficient first
fn horner(x: f64, coefficients: &[f64]) -> f64 {
    coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
}

const GAUSS_NODES: [f64; 5] = [0.046_910_08, 0.230_765_34, 0.5, 0.769_234_66, 0.953_089_92];
const GAUSS_WEIGHTS: [f64; 5] = [
    0.018_854_042,
    0.038_088_059,
    0.045_270_739_4,
    0.038_088_059,
    0.018_854_042,
];

/// Bivariate standard normal CDF P(X ≤ a, Y ≤ b) with correlation `rho`
///
/// Drezner-Wesolowsky (1990) 5-point Gauss-Legendre rule, switching to the
/// transformed integrand for |rho| ≥ 0.7. Accurate to ~1e-8 for |rho| < 1.
pub fn bivariate_normal_cdf(a: f64, b: f64, rho: f64) -> f64 {
    let h1 = a;
    let mut h2 = b;
    let h12 = (h1 * h1 + h2 * h2) / 2.0;

    if rho.abs() < 0.7 {
        let h3 = h1 * h2;
        let mut lh = 0.0;
        if rho != 0.0 {
            for (x, w) in GAUSS_NODES.iter().zip(GAUSS_WEIGHTS.iter()) {
                let r1 = rho * x;
                let r2 = 1.0 - r1 * r1;
                lh += w * ((r1 * h3 - h12) / r2).exp() / r2.sqrt();
            }
        }
        return normal_cdf(h1) * normal_cdf(h2) + rho * lh;
    }

    let r2 = 1.0 - rho * rho;
    let r3 = r2.sqrt();
    if rho < 0.0 {
        h2 = -h2;
    }
    let h3 = h1 * h2;
    let h7 = (-h3 / 2.0).exp();

    let mut lh = 0.0;
    if rho.abs() < 1.0 {
        let h6 = (h1 - h2).abs();
        let h5 = h6 * h6 / 2.0;
        let h6 = h6 / r3;
        let aa = 0.5 - h3 / 8.0;
        let ab = 3.0 - 2.0 * aa * h5;
        lh = 0.132_980_76 * h6 * ab * (1.0 - normal_cdf(h6))
            - (-h5 / r2).exp() * (ab + aa * r2) * 0.053_051_647;

        for (x, w) in GAUSS_NODES.iter().zip(GAUSS_WEIGHTS.iter()) {
            let r1 = r3 * x;
            let rr = r1 * r1;
            let root = (1.0 - rr).sqrt();
            lh -= w * (-h5 / rr).exp() * ((-h3 / (1.0 + root)).exp() / root / h7 - 1.0 - aa * rr);
        }
    }

    let joint = lh * r3 * h7 + normal_cdf(h1.min(h2));
    if rho < 0.0 {
        normal_cdf(h1) - joint
    } else {
        joint
    }
}

/// ln Γ(x), Lanczos approximation (g = 7, n = 9)
pub fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS[1..].iter().enumerate() {
        sum += c / (x + i as f64 + 1.0);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Regularized incomplete beta I_x(a, b)
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(1.0 - x, b, a);
    }
    let ln_prefix = a * x.ln() + b * (1.0 - x).ln() - ln_beta(a, b);
    (ln_prefix.exp() / a) * beta_continued_fraction(x, a, b)
}

/// Lentz evaluation of the incomplete-beta continued fraction
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-30;

    let mut c = 1.0;
    let mut d = 1.0 / (1.0 - (a + b) * x / (a + 1.0)).max(TINY);
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let even = m * (b - m) * x / ((a + 2.0 * m - 1.0) * (a + 2.0 * m));
        d = 1.0 / (1.0 + even * d).max(TINY);
        c = (1.0 + even / c).max(TINY);
        h *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + 2.0 * m) * (a + 2.0 * m + 1.0));
        d = 1.0 / (1.0 + odd * d).max(TINY);
        c = (1.0 + odd / c).max(TINY);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Student-t CDF P(T ≤ t) with `df` degrees of freedom
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if !df.is_finite() {
        return normal_cdf(t);
    }
    let x = df / (df + t * t);
    let tail = 0.5 * regularized_incomplete_beta(x, df / 2.0, 0.5);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Student-t quantile, found by bisection on the CDF
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if !df.is_finite() {
        return inverse_normal(p);
    }
    if p == 0.5 {
        return 0.0;
    }
    if p < 0.5 {
        return -student_t_quantile(1.0 - p, df);
    }
    let solver = Bisection::new(1e-13, 200);
    solver.solve(|t| student_t_cdf(t, df), 0.0, 1e7, p).value
}

/// Coverage factor k for a two-sided confidence level
///
/// Infinite (or absent) degrees of freedom use the normal quantile,
/// finite ones the Student-t quantile at `dof`. `confidence` is a fraction.
pub fn coverage_factor(dof: f64, confidence: f64) -> f64 {
    let p = (1.0 + confidence) / 2.0;
    if !dof.is_finite() || dof <= 0.0 {
        inverse_normal(p)
    } else {
        student_t_quantile(p, dof.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_known_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((normal_cdf(-1.0) - 0.158_655_253_931_457).abs() < 1e-12);
        assert_eq!(normal_cdf(40.0), 1.0);
        assert_eq!(normal_cdf(-40.0), 0.0);
    }

    #[test]
    fn test_normal_cdf_tail_branch() {
        let p = normal_cdf(-8.0);
        assert!(p > 0.0 && p < 1e-14);
        assert!((normal_cdf(8.0) - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_inverse_normal() {
        assert!((inverse_normal(0.975) - 1.959_96).abs() < 1e-5);
        assert!(inverse_normal(0.5).abs() < 1e-12);
        assert!((inverse_normal(0.025) + 1.959_96).abs() < 1e-5);
        assert!((inverse_normal(1e-5) + 4.264_89).abs() < 1e-4);
        assert_eq!(inverse_normal(1.0), f64::INFINITY);
        assert_eq!(inverse_normal(0.0), f64::NEG_INFINITY);
        assert!(inverse_normal(1.5).is_nan());
    }

    #[test]
    fn test_inverse_normal_round_trip() {
        for &p in &[0.001, 0.05, 0.3, 0.7, 0.9, 0.999] {
            assert!((normal_cdf(inverse_normal(p)) - p).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bivariate_independence() {
        assert!((bivariate_normal_cdf(0.0, 0.0, 0.0) - 0.25).abs() < 1e-12);
        let expected = normal_cdf(1.0) * normal_cdf(-0.5);
        assert!((bivariate_normal_cdf(1.0, -0.5, 0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_bivariate_quadrant_probabilities() {
        // P(X<0, Y<0) = 1/4 + asin(rho) / 2π
        for &rho in &[0.3, 0.5, 0.9, 0.95, -0.5, -0.9] {
            let expected = 0.25 + f64::asin(rho) / (2.0 * std::f64::consts::PI);
            let got = bivariate_normal_cdf(0.0, 0.0, rho);
            assert!((got - expected).abs() < 1e-6, "rho={}: {} vs {}", rho, got, expected);
        }
    }

    #[test]
    fn test_bivariate_correlation_direction() {
        assert!(bivariate_normal_cdf(0.0, 0.0, 0.5) > 0.25);
        assert!(bivariate_normal_cdf(0.0, 0.0, -0.5) < 0.25);
    }

    #[test]
    fn test_bivariate_marginal_limit() {
        // Y unbounded above reduces to the marginal of X
        let got = bivariate_normal_cdf(-1.0, 9.0, 0.8);
        assert!((got - normal_cdf(-1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_ln_gamma() {
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn test_student_t_cdf() {
        assert!((student_t_cdf(0.0, 5.0) - 0.5).abs() < 1e-12);
        // df = 1 is Cauchy: F(1) = 0.75
        assert!((student_t_cdf(1.0, 1.0) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_student_t_quantile() {
        assert!((student_t_quantile(0.975, 10.0) - 2.228_14).abs() < 1e-4);
        assert!((student_t_quantile(0.975, 1.0) - 12.706_2).abs() < 1e-3);
        assert!((student_t_quantile(0.025, 10.0) + 2.228_14).abs() < 1e-4);
    }

    #[test]
    fn test_coverage_factor() {
        assert!((coverage_factor(f64::INFINITY, 0.95) - 1.959_96).abs() < 1e-4);
        assert!((coverage_factor(10.0, 0.95) - 2.228_14).abs() < 1e-4);
        assert!((coverage_factor(f64::INFINITY, 0.9973) - 3.0).abs() < 1e-2);
        assert!(coverage_factor(30.0, 0.95) > coverage_factor(f64::INFINITY, 0.95));
    }
}
