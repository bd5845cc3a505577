//! Batch volatility estimators over a trailing spot-price history.
//!
//! Unlike an online per-tick tracker, these recompute from the full
//! 15-minute window each decision tick — the history is short (sub-second
//! samples, ~900 s) so the cost is a few microseconds of slice arithmetic.

use crate::types::PricePoint;

/// Seconds per Julian year * samples — the annualisation constant used for
/// both variance and drift. 365.25 * 24 * 3600.
pub const SECS_PER_YEAR: f64 = 31_557_600.0;

/// Log returns of a history slice, sorted by timestamp ascending.
fn log_returns(history: &[PricePoint]) -> Vec<f64> {
    let mut pts: Vec<&PricePoint> = history.iter().filter(|p| p.price > 0.0).collect();
    pts.sort_by_key(|p| p.ts_ms);
    pts.windows(2)
        .map(|w| (w[1].price / w[0].price).ln())
        .collect()
}

/// Annualised EWMA volatility with decay `lambda`.
///
/// The recurrence v = lambda*v + (1-lambda)*r^2 is iterated over the returns
/// in reverse chronological order so the most recent return carries the most
/// weight, starting from v = 0. The per-sample variance is annualised by
/// SECS_PER_YEAR before the square root.
pub fn ewma_volatility(history: &[PricePoint], lambda: f64) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let returns = log_returns(history);
    if returns.is_empty() {
        return 0.0;
    }
    let mut variance = 0.0;
    for r in returns.iter().rev() {
        variance = lambda * variance + (1.0 - lambda) * r * r;
    }
    (variance * SECS_PER_YEAR).sqrt()
}

/// Annualised drift: mean log return over the trailing `window_secs`.
pub fn momentum_drift(history: &[PricePoint], window_secs: i64) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let now = match history.iter().map(|p| p.ts_ms).max() {
        Some(t) => t,
        None => return 0.0,
    };
    let cutoff = now - window_secs * 1000;
    let recent: Vec<PricePoint> = history.iter().filter(|p| p.ts_ms >= cutoff).copied().collect();
    if recent.len() < 2 {
        return 0.0;
    }
    let returns = log_returns(&recent);
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    mean * SECS_PER_YEAR
}

fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// Volatility-clustering filter.
///
/// Looks at the trailing `lookback_secs` of returns, splits them 80/20, and
/// flags a spike when the short recent leg is more than `threshold` times as
/// volatile as the longer historical leg. The model's flat-sigma assumption
/// is worthless in that regime, so callers skip the tick entirely.
pub fn volatility_spike(history: &[PricePoint], lookback_secs: i64, threshold: f64) -> bool {
    if history.len() < 20 {
        return false;
    }
    let now = match history.iter().map(|p| p.ts_ms).max() {
        Some(t) => t,
        None => return false,
    };
    let cutoff = now - lookback_secs * 1000;
    let recent: Vec<PricePoint> = history.iter().filter(|p| p.ts_ms >= cutoff).copied().collect();
    if recent.len() < 10 {
        return false;
    }
    let returns = log_returns(&recent);
    if returns.len() < 5 {
        return false;
    }
    let split = (returns.len() as f64 * 0.8) as usize;
    let recent_vol = std_dev(&returns[split..]);
    let hist_vol = std_dev(&returns[..split]);
    hist_vol > 0.0 && recent_vol / hist_vol > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(prices: &[f64], step_ms: i64) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint { price: p, ts_ms: i as i64 * step_ms })
            .collect()
    }

    /// Scenario: constant price fed at 1-second intervals.
    /// Expected: every log return is zero, so sigma is ~0.
    #[test]
    fn test_ewma_constant_price() {
        let h = series(&[100.0; 10], 1000);
        assert!(ewma_volatility(&h, 0.94) < 1e-12);
    }

    /// Scenario: prices oscillating 100 / 101 at 1-second intervals.
    /// Expected: sigma > 0, and larger swings produce larger sigma.
    #[test]
    fn test_ewma_monotone_in_swing() {
        let calm: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 100.0 } else { 100.1 }).collect();
        let wild: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let v_calm = ewma_volatility(&series(&calm, 1000), 0.94);
        let v_wild = ewma_volatility(&series(&wild, 1000), 0.94);
        assert!(v_calm > 0.0);
        assert!(v_wild > v_calm, "wild {} <= calm {}", v_wild, v_calm);
    }

    /// Scenario: two prices 100 -> 101, lambda = 0.94.
    /// Expected: variance = 0.06 * ln(1.01)^2 annualised, sigma = sqrt of that.
    #[test]
    fn test_ewma_single_return() {
        let h = series(&[100.0, 101.0], 1000);
        let r = (101.0_f64 / 100.0).ln();
        let expected = (0.06 * r * r * SECS_PER_YEAR).sqrt();
        assert!((ewma_volatility(&h, 0.94) - expected).abs() < 1e-12);
    }

    /// Scenario: history arrives out of timestamp order.
    /// Expected: identical sigma to the sorted series — estimator sorts first.
    #[test]
    fn test_ewma_unsorted_input() {
        let sorted = series(&[100.0, 101.0, 100.5, 102.0], 1000);
        let mut shuffled = sorted.clone();
        shuffled.swap(0, 3);
        shuffled.swap(1, 2);
        let a = ewma_volatility(&sorted, 0.94);
        let b = ewma_volatility(&shuffled, 0.94);
        assert!((a - b).abs() < 1e-15);
    }

    #[test]
    fn test_ewma_too_short() {
        assert_eq!(ewma_volatility(&[], 0.94), 0.0);
        assert_eq!(ewma_volatility(&series(&[100.0], 1000), 0.94), 0.0);
    }

    /// Scenario: steady uptrend, +0.1% per second over the last minute.
    /// Expected: positive drift close to 0.001 * SECS_PER_YEAR; downtrend mirrors negative.
    #[test]
    fn test_drift_direction() {
        let up: Vec<f64> = (0..61).map(|i| 100.0 * 1.001_f64.powi(i)).collect();
        let drift = momentum_drift(&series(&up, 1000), 60);
        let per_sec = 1.001_f64.ln();
        assert!((drift - per_sec * SECS_PER_YEAR).abs() / (per_sec * SECS_PER_YEAR) < 1e-9);

        let down: Vec<f64> = (0..61).map(|i| 100.0 / 1.001_f64.powi(i)).collect();
        assert!(momentum_drift(&series(&down, 1000), 60) < 0.0);
    }

    /// Scenario: an hour of history but a 60-second momentum window.
    /// Expected: only the trailing minute enters the mean — early crash ignored.
    #[test]
    fn test_drift_window_cutoff() {
        let mut prices: Vec<f64> = vec![200.0; 60];
        prices.extend(std::iter::repeat(100.0).take(61));
        let h = series(&prices, 1000);
        // Trailing 60s is flat at 100 -> zero drift despite the old cliff
        assert!(momentum_drift(&h, 60).abs() < 1e-12);
    }

    /// Scenario: 80 quiet seconds then a violent last leg.
    /// Expected: spike detected; the same series with a calm tail is clean.
    #[test]
    fn test_spike_detection() {
        let mut calm: Vec<f64> = (0..100)
            .map(|i| if i % 2 == 0 { 100.0 } else { 100.05 })
            .collect();
        assert!(!volatility_spike(&series(&calm, 1000), 300, 2.0));

        // Replace the last 20 samples with 2% swings
        for (j, p) in calm.iter_mut().rev().take(20).enumerate() {
            *p = if j % 2 == 0 { 102.0 } else { 98.0 };
        }
        assert!(volatility_spike(&series(&calm, 1000), 300, 2.0));
    }

    #[test]
    fn test_spike_needs_samples() {
        let short = series(&[100.0; 19], 1000);
        assert!(!volatility_spike(&short, 300, 2.0));
    }
}
