/// Standard normal density: (1/sqrt(2*pi)) * exp(-x^2/2)
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF via the Abramowitz & Stegun 26.2.17 polynomial.
/// Max error < 7.5e-8 — plenty for probabilities that get clamped to
/// [0.001, 0.999] anyway. Zero heap allocation.
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    if x >= 0.0 {
        const P: f64 = 0.231_641_9;
        const B1: f64 = 0.319_381_530;
        const B2: f64 = -0.356_563_782;
        const B3: f64 = 1.781_477_937;
        const B4: f64 = -1.821_255_978;
        const B5: f64 = 1.330_274_429;

        let t = 1.0 / (1.0 + P * x);
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t3 * t;
        let t5 = t4 * t;
        1.0 - norm_pdf(x) * (B1 * t + B2 * t2 + B3 * t3 + B4 * t4 + B5 * t5)
    } else {
        1.0 - norm_cdf(-x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: density at the peak of the bell curve.
    /// Expected: norm_pdf(0) = 1/sqrt(2*pi) ≈ 0.39894 to within 1e-12.
    #[test]
    fn test_pdf_peak() {
        assert!((norm_pdf(0.0) - 0.398_942_280_401_432_7).abs() < 1e-12);
        assert!((norm_pdf(2.0) - norm_pdf(-2.0)).abs() < 1e-15);
    }

    /// Scenario: CDF at standard z-scores used by the conviction gate.
    /// Expected: matches normal-table values (Phi(1.645) ≈ 0.95) to 1e-5.
    #[test]
    fn test_cdf_known_values() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.645) - 0.950_015).abs() < 1e-4);
        assert!((norm_cdf(1.96) - 0.975_002_1).abs() < 1e-5);
        assert!((norm_cdf(-1.96) - 0.024_997_9).abs() < 1e-5);
        assert!((norm_cdf(3.0) - 0.998_650_1).abs() < 1e-5);
    }

    /// Scenario: reflection identity Phi(x) + Phi(-x) across a spread of x.
    /// Expected: sums to 1.0 within 1e-7 for every x.
    #[test]
    fn test_cdf_symmetry() {
        for &x in &[0.25, 0.5, 1.0, 1.5, 2.0, 3.0] {
            assert!((norm_cdf(x) + norm_cdf(-x) - 1.0).abs() < 1e-7);
        }
    }

    /// Scenario: far tails at |x| = 10.
    /// Expected: essentially 1 and 0 — no NaN, no overshoot.
    #[test]
    fn test_cdf_tails() {
        assert!(norm_cdf(10.0) > 0.999_999);
        assert!(norm_cdf(-10.0) < 1e-6);
    }
}
