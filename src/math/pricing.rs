//! Terminal-probability model for binary contracts under GBM.

use rand::Rng;
use rand_distr::StandardNormal;

use super::normal::norm_cdf;

/// Probability clamp bounds — the model never claims certainty.
pub const PROB_FLOOR: f64 = 0.001;
pub const PROB_CEIL: f64 = 0.999;

#[inline]
fn clamp_prob(p: f64) -> f64 {
    p.clamp(PROB_FLOOR, PROB_CEIL)
}

/// Closed-form P(S_T > K) under GBM with drift:
/// d = (ln(S0/K) + (mu - sigma^2/2) * T) / (sigma * sqrt(T)), P = Phi(d).
///
/// sigma and mu are annualised, T in years. Degenerate inputs (zero time,
/// zero vol, non-positive prices) return 0.5 rather than a fake extreme.
pub fn prob_above(s0: f64, k: f64, t_years: f64, sigma: f64, mu: f64) -> f64 {
    if t_years <= 0.0 || sigma <= 0.0 || s0 <= 0.0 || k <= 0.0 {
        return 0.5;
    }
    let d = ((s0 / k).ln() + (mu - 0.5 * sigma * sigma) * t_years) / (sigma * t_years.sqrt());
    clamp_prob(norm_cdf(d))
}

/// Monte-Carlo estimate of P(S_T > K): `n_paths` GBM terminal draws
/// S_T = S0 * exp((mu - sigma^2/2)T + sigma*sqrt(T)*Z).
///
/// Slower and noisier than the closed form; kept for cross-checking the
/// analytic path and for payoffs that stop being vanilla binaries.
pub fn prob_above_monte_carlo(
    s0: f64,
    k: f64,
    t_years: f64,
    sigma: f64,
    mu: f64,
    n_paths: u32,
) -> f64 {
    if t_years <= 0.0 || sigma <= 0.0 || s0 <= 0.0 || k <= 0.0 || n_paths == 0 {
        return 0.5;
    }
    let drift = (mu - 0.5 * sigma * sigma) * t_years;
    let diffusion = sigma * t_years.sqrt();
    let mut rng = rand::thread_rng();
    let mut above = 0u32;
    for _ in 0..n_paths {
        let z: f64 = rng.sample(StandardNormal);
        let s_t = s0 * (drift + diffusion * z).exp();
        if s_t > k {
            above += 1;
        }
    }
    clamp_prob(above as f64 / n_paths as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: spot well above strike with modest vol and little time.
    /// Expected: probability near the 0.999 ceiling; mirrored case near floor.
    #[test]
    fn test_prob_deep_in_and_out() {
        let t = 300.0 / 31_557_600.0; // 5 minutes
        let p_in = prob_above(105.0, 100.0, t, 0.5, 0.0);
        let p_out = prob_above(95.0, 100.0, t, 0.5, 0.0);
        assert!(p_in > 0.99, "p_in = {}", p_in);
        assert!(p_out < 0.01, "p_out = {}", p_out);
        assert!(p_in <= PROB_CEIL);
        assert!(p_out >= PROB_FLOOR);
    }

    /// Scenario: spot exactly at strike, zero drift.
    /// Expected: probability just under 0.5 (the -sigma^2/2 Ito correction).
    #[test]
    fn test_prob_at_the_money() {
        let t = 300.0 / 31_557_600.0;
        let p = prob_above(100.0, 100.0, t, 1.0, 0.0);
        assert!(p < 0.5);
        assert!(p > 0.49);
    }

    /// Scenario: positive annualised drift vs zero drift, same everything else.
    /// Expected: drift pushes the probability up.
    #[test]
    fn test_prob_drift_matters() {
        let t = 600.0 / 31_557_600.0;
        let flat = prob_above(100.0, 100.0, t, 1.0, 0.0);
        let trending = prob_above(100.0, 100.0, t, 1.0, 50.0);
        assert!(trending > flat);
    }

    /// Scenario: degenerate inputs — zero time, zero vol, zero prices.
    /// Expected: 0.5 for each, never NaN or a clamped extreme.
    #[test]
    fn test_prob_degenerate_inputs() {
        assert_eq!(prob_above(100.0, 100.0, 0.0, 1.0, 0.0), 0.5);
        assert_eq!(prob_above(100.0, 100.0, 1.0, 0.0, 0.0), 0.5);
        assert_eq!(prob_above(0.0, 100.0, 1.0, 1.0, 0.0), 0.5);
        assert_eq!(prob_above(100.0, 0.0, 1.0, 1.0, 0.0), 0.5);
    }

    /// Scenario: extreme moneyness that would push Phi past the clamp.
    /// Expected: output pinned to [0.001, 0.999] exactly.
    #[test]
    fn test_prob_clamped() {
        let t = 30.0 / 31_557_600.0;
        assert_eq!(prob_above(200.0, 100.0, t, 0.1, 0.0), PROB_CEIL);
        assert_eq!(prob_above(50.0, 100.0, t, 0.1, 0.0), PROB_FLOOR);
    }

    /// Scenario: 10k-path Monte-Carlo vs the closed form on the same inputs.
    /// Expected: agreement within ~2 standard errors (1.5 percentage points).
    #[test]
    fn test_monte_carlo_matches_closed_form() {
        let t = 600.0 / 31_557_600.0;
        let analytic = prob_above(100.5, 100.0, t, 0.8, 0.0);
        let mc = prob_above_monte_carlo(100.5, 100.0, t, 0.8, 0.0, 10_000);
        assert!((analytic - mc).abs() < 0.015, "analytic={} mc={}", analytic, mc);
    }

    #[test]
    fn test_monte_carlo_degenerate() {
        assert_eq!(prob_above_monte_carlo(100.0, 100.0, 0.0, 1.0, 0.0, 1000), 0.5);
        assert_eq!(prob_above_monte_carlo(100.0, 100.0, 1.0, 1.0, 0.0, 0), 0.5);
    }
}
