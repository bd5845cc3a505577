use anyhow::{anyhow, bail, Result};

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_opt_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(default)
}

/// Risk thresholds, all fractions of bankroll unless noted.
#[derive(Clone, Debug)]
pub struct RiskConfig {
    /// Per-position ceiling (gate 2): 2% of bankroll.
    pub position_ceiling_pct: f64,
    /// Gate 3: concurrent open positions.
    pub max_concurrent_positions: usize,
    /// Gate 4 and breaker layer 1: realized daily loss.
    pub daily_loss_threshold: f64,
    /// Gate 5 and breaker layer 2: drawdown from Monday-00:00-UTC equity.
    pub weekly_drawdown_cap: f64,
    /// Breaker layer 3: drawdown from session peak. Operator reset only.
    pub session_drawdown_threshold: f64,
    /// Edge gate: minimum model edge before the uncertainty buffer.
    pub min_edge_threshold: f64,
    /// Edge gate: extra margin for model error.
    pub uncertainty_buffer: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            position_ceiling_pct: 0.02,
            max_concurrent_positions: 5,
            daily_loss_threshold: 0.05,
            weekly_drawdown_cap: 0.10,
            session_drawdown_threshold: 0.15,
            min_edge_threshold: 0.02,
            uncertainty_buffer: 0.03,
        }
    }
}

/// The daily-loss knob historically existed under two names with two
/// defaults. The current name wins; if both are set they must agree, else
/// startup is refused rather than silently trading with the wrong cap.
pub(crate) fn resolve_daily_loss_threshold(
    legacy: Option<f64>,
    current: Option<f64>,
) -> Result<f64> {
    match (legacy, current) {
        (Some(l), Some(c)) if (l - c).abs() > 1e-9 => bail!(
            "CIRCUIT_BREAKER_LOSS_THRESHOLD ({}) conflicts with DAILY_LOSS_THRESHOLD ({}); \
             remove the legacy variable",
            l,
            c
        ),
        (_, Some(c)) => Ok(c),
        (Some(l), None) => Ok(l),
        (None, None) => Ok(0.05),
    }
}

/// Configuration loaded once at startup from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    // Exchange credentials
    pub kalshi_api_key: String,
    pub kalshi_private_key_path: Option<String>,
    pub kalshi_private_key: Option<String>,
    pub kalshi_api_base_url: String,

    // What to trade
    pub series_ticker: String,
    pub enabled_strategies: Vec<String>,

    // Spot source
    pub spot_primary_url: String,
    pub spot_primary_symbol: String,
    pub spot_fallback_url: String,
    pub spot_fallback_pair: String,

    // Risk
    pub bankroll: f64,
    pub risk: RiskConfig,

    // Mode
    pub dry_run: bool,

    // Operator surface
    pub api_host: String,
    pub api_port: u16,
    pub api_prefix: String,

    // Logging
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let kalshi_api_key = std::env::var("KALSHI_API_KEY")
            .map_err(|_| anyhow!("KALSHI_API_KEY is required"))?;
        let kalshi_private_key_path = std::env::var("KALSHI_PRIVATE_KEY_PATH").ok();
        let kalshi_private_key = std::env::var("KALSHI_PRIVATE_KEY").ok();
        if kalshi_private_key_path.is_none() && kalshi_private_key.is_none() {
            bail!("either KALSHI_PRIVATE_KEY_PATH or KALSHI_PRIVATE_KEY must be set");
        }

        let daily_loss_threshold = resolve_daily_loss_threshold(
            env_opt_f64("CIRCUIT_BREAKER_LOSS_THRESHOLD"),
            env_opt_f64("DAILY_LOSS_THRESHOLD"),
        )?;

        let risk = RiskConfig {
            position_ceiling_pct: env_parse("POSITION_CEILING_PCT", 0.02),
            max_concurrent_positions: env_parse("MAX_CONCURRENT_POSITIONS", 5),
            daily_loss_threshold,
            weekly_drawdown_cap: env_parse("WEEKLY_DRAWDOWN_CAP", 0.10),
            session_drawdown_threshold: env_parse("SESSION_DRAWDOWN_THRESHOLD", 0.15),
            min_edge_threshold: env_parse("MIN_EDGE_THRESHOLD", 0.02),
            uncertainty_buffer: env_parse("UNCERTAINTY_BUFFER", 0.03),
        };

        let enabled_strategies = std::env::var("ENABLED_STRATEGIES")
            .unwrap_or_else(|_| "high_confidence_threshold".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            kalshi_api_key,
            kalshi_private_key_path,
            kalshi_private_key,
            kalshi_api_base_url: std::env::var("KALSHI_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.elections.kalshi.com/trade-api/v2".into()),
            series_ticker: std::env::var("SERIES_TICKER").unwrap_or_else(|_| "KXSOL15M".into()),
            enabled_strategies,
            spot_primary_url: std::env::var("SPOT_PRIMARY_URL")
                .unwrap_or_else(|_| "https://api.binance.us/api/v3/ticker/price".into()),
            spot_primary_symbol: std::env::var("SPOT_PRIMARY_SYMBOL")
                .unwrap_or_else(|_| "SOLUSDT".into()),
            spot_fallback_url: std::env::var("SPOT_FALLBACK_URL")
                .unwrap_or_else(|_| "https://api.kraken.com/0/public/Ticker".into()),
            spot_fallback_pair: std::env::var("SPOT_FALLBACK_PAIR")
                .unwrap_or_else(|_| "SOLUSD".into()),
            bankroll: env_parse("BANKROLL", 10_000.0),
            risk,
            dry_run: env_bool("DRY_RUN", true),
            api_host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            api_port: env_parse("API_PORT", 8000),
            api_prefix: std::env::var("API_PREFIX").unwrap_or_else(|_| "/api".into()),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".into()),
        })
    }

    pub fn spot_feed(&self) -> crate::feeds::spot::SpotFeedConfig {
        crate::feeds::spot::SpotFeedConfig {
            primary_url: self.spot_primary_url.clone(),
            primary_symbol: self.spot_primary_symbol.clone(),
            fallback_url: self.spot_fallback_url.clone(),
            fallback_pair: self.spot_fallback_pair.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_loss_threshold_resolution() {
        // Neither set: the 5% default
        assert_eq!(resolve_daily_loss_threshold(None, None).unwrap(), 0.05);
        // Only one set: that one wins
        assert_eq!(resolve_daily_loss_threshold(Some(0.20), None).unwrap(), 0.20);
        assert_eq!(resolve_daily_loss_threshold(None, Some(0.05)).unwrap(), 0.05);
        // Both set and equal: fine
        assert_eq!(resolve_daily_loss_threshold(Some(0.05), Some(0.05)).unwrap(), 0.05);
        // Both set and inconsistent: refuse to start
        assert!(resolve_daily_loss_threshold(Some(0.20), Some(0.05)).is_err());
    }

    #[test]
    fn test_risk_defaults() {
        let r = RiskConfig::default();
        assert_eq!(r.position_ceiling_pct, 0.02);
        assert_eq!(r.max_concurrent_positions, 5);
        assert_eq!(r.daily_loss_threshold, 0.05);
        assert_eq!(r.weekly_drawdown_cap, 0.10);
        assert_eq!(r.session_drawdown_threshold, 0.15);
    }
}
