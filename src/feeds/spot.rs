//! Spot-price source: two independent public HTTP endpoints with fallback.
//!
//! Primary returns `{"price": "..."}` for a single symbol; the fallback
//! returns a nested map keyed by pair with the last trade at `c[0]`. Both
//! are unauthenticated and capped at 5 s.

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::types::PricePoint;

pub const SPOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct SpotFeedConfig {
    /// e.g. https://api.binance.us/api/v3/ticker/price
    pub primary_url: String,
    /// e.g. SOLUSDT
    pub primary_symbol: String,
    /// e.g. https://api.kraken.com/0/public/Ticker
    pub fallback_url: String,
    /// e.g. SOLUSD
    pub fallback_pair: String,
}

/// Pull the `price` string out of the primary ticker payload.
fn parse_primary(body: &Value) -> Option<f64> {
    body.get("price")?.as_str()?.parse().ok()
}

/// Pull `result.{pair}.c[0]` (last trade) out of the fallback payload.
fn parse_fallback(body: &Value, pair: &str) -> Option<f64> {
    body.get("result")?
        .get(pair)?
        .get("c")?
        .get(0)?
        .as_str()?
        .parse()
        .ok()
}

/// Fetch the current spot price, primary first, fallback second.
/// Returns None only when both sources fail — callers skip the tick.
pub async fn fetch_spot_price(http: &reqwest::Client, cfg: &SpotFeedConfig) -> Option<f64> {
    match http
        .get(&cfg.primary_url)
        .query(&[("symbol", cfg.primary_symbol.as_str())])
        .timeout(SPOT_TIMEOUT)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(price) = parse_primary(&body) {
                    return Some(price);
                }
            }
        }
        Ok(resp) => warn!(status = %resp.status(), "primary spot source returned error"),
        Err(e) => warn!(error = %e, "primary spot source unreachable"),
    }

    match http
        .get(&cfg.fallback_url)
        .query(&[("pair", cfg.fallback_pair.as_str())])
        .timeout(SPOT_TIMEOUT)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(price) = parse_fallback(&body, &cfg.fallback_pair) {
                    return Some(price);
                }
            }
            warn!("fallback spot payload missing last-trade field");
            None
        }
        Ok(resp) => {
            warn!(status = %resp.status(), "fallback spot source returned error");
            None
        }
        Err(e) => {
            warn!(error = %e, "fallback spot source unreachable");
            None
        }
    }
}

/// Rolling spot-price window. Entries older than `window_ms` are evicted on
/// every push, so the buffer stays at ~15 minutes of sub-second samples.
pub struct PriceHistory {
    points: VecDeque<PricePoint>,
    window_ms: i64,
}

impl PriceHistory {
    pub fn new(window_ms: i64) -> Self {
        Self { points: VecDeque::with_capacity(1024), window_ms }
    }

    pub fn push(&mut self, price: f64, ts_ms: i64) {
        self.points.push_back(PricePoint { price, ts_ms });
        let cutoff = ts_ms - self.window_ms;
        while self.points.front().map_or(false, |p| p.ts_ms < cutoff) {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Contiguous copy for the strategies. Cheap: ≤ ~1k Copy elements.
    pub fn snapshot(&self) -> Vec<PricePoint> {
        self.points.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_primary_payload() {
        let body = json!({"symbol": "SOLUSDT", "price": "249.8100"});
        assert_eq!(parse_primary(&body), Some(249.81));
        assert_eq!(parse_primary(&json!({})), None);
        // Numeric instead of string is not the documented shape
        assert_eq!(parse_primary(&json!({"price": 249.81})), None);
    }

    #[test]
    fn test_parse_fallback_payload() {
        let body = json!({
            "error": [],
            "result": { "SOLUSD": { "a": ["250.0", "1", "1"], "c": ["249.79", "0.5"] } }
        });
        assert_eq!(parse_fallback(&body, "SOLUSD"), Some(249.79));
        assert_eq!(parse_fallback(&body, "BTCUSD"), None);
    }

    #[test]
    fn test_history_prunes_old_entries() {
        let mut h = PriceHistory::new(900_000);
        h.push(100.0, 0);
        h.push(101.0, 450_000);
        h.push(102.0, 900_001); // evicts ts=0
        assert_eq!(h.len(), 2);
        assert_eq!(h.snapshot()[0].ts_ms, 450_000);
    }

    #[test]
    fn test_history_keeps_window_edge() {
        let mut h = PriceHistory::new(900_000);
        h.push(100.0, 1_000);
        h.push(101.0, 901_000); // cutoff = 1_000, ts 1_000 is not < cutoff
        assert_eq!(h.len(), 2);
    }
}
