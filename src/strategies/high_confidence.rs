//! High-confidence threshold strategy — YES and NO contracts.
//!
//! Trades 15-minute binary markets in both directions when the probability
//! model reaches 95% conviction on one side and the market is pricing it
//! meaningfully wrong. Entry requires, in order: a tradeable market, 30 s to
//! 10 min left in the window, a sane quote, enough price history, non-zero
//! EWMA volatility, and no volatility-spike regime. Sizing is 15% Kelly with
//! a hard floor (0.5% bankroll), hard ceiling (2% bankroll), and an extra 50%
//! haircut when risk/reward is worse than 5:1.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::math::pricing::{prob_above, prob_above_monte_carlo};
use crate::math::vol::{ewma_volatility, momentum_drift, volatility_spike, SECS_PER_YEAR};
use crate::types::{
    Market, Orderbook, PricePoint, Signal, SignalDirection, SignalStrength,
};

use super::{Strategy, StrategyParamUpdate};

#[derive(Clone, Debug)]
pub struct Params {
    /// Conviction threshold on the chosen side.
    pub min_probability: f64,
    /// Minimum model-vs-market edge.
    pub min_edge: f64,
    /// Window-remaining bounds, seconds.
    pub min_time_remaining: i64,
    pub max_time_remaining: i64,
    /// EWMA decay.
    pub vol_lambda: f64,
    /// Microstructure floor coefficient: sigma >= floor / sqrt(T).
    pub microstructure_floor: f64,
    pub min_samples: usize,
    /// Drift window, seconds.
    pub momentum_window: i64,
    /// Vol-regime lookback, seconds, and spike ratio.
    pub vol_regime_lookback: i64,
    pub vol_spike_threshold: f64,
    pub use_monte_carlo: bool,
    pub num_simulations: u32,
    /// Fractional Kelly multiplier.
    pub kelly_fraction: f64,
    /// Sizing floor/ceiling as bankroll fractions.
    pub position_floor_pct: f64,
    pub position_ceiling_pct: f64,
    pub bankroll: f64,
}

impl Params {
    fn defaults(bankroll: f64) -> Self {
        Self {
            min_probability: 0.95,
            min_edge: 0.05,
            min_time_remaining: 30,
            max_time_remaining: 600,
            vol_lambda: 0.94,
            microstructure_floor: 0.0007,
            min_samples: 5,
            momentum_window: 60,
            vol_regime_lookback: 300,
            vol_spike_threshold: 2.0,
            use_monte_carlo: false,
            num_simulations: 10_000,
            kelly_fraction: 0.15,
            position_floor_pct: 0.005,
            position_ceiling_pct: 0.02,
            bankroll,
        }
    }
}

pub struct HighConfidenceThreshold {
    params: Mutex<Params>,
}

impl HighConfidenceThreshold {
    pub fn new(bankroll: f64) -> Self {
        let params = Params::defaults(bankroll);
        info!(
            min_prob = params.min_probability,
            min_edge = params.min_edge,
            window_s = format!("[{},{}]", params.min_time_remaining, params.max_time_remaining),
            kelly = params.kelly_fraction,
            "high_confidence_threshold initialised"
        );
        Self { params: Mutex::new(params) }
    }
}

impl Strategy for HighConfidenceThreshold {
    fn name(&self) -> &'static str {
        "high_confidence_threshold"
    }

    fn analyze(
        &self,
        market: &Market,
        spot_price: f64,
        price_history: &[PricePoint],
        orderbook: Option<&Orderbook>,
        now: DateTime<Utc>,
    ) -> Option<Signal> {
        let p = self.params.lock().clone();

        // 1. Pre-filter: market state, time window, quotes, data
        if !market.is_tradeable(now) {
            return None;
        }
        let time_remaining = market.time_remaining_secs(now);
        if time_remaining < p.min_time_remaining || time_remaining > p.max_time_remaining {
            debug!(ticker = %market.ticker, time_remaining, "outside time window");
            return None;
        }

        let yes_price = market.yes_price.filter(|y| *y > 0.0 && *y < 1.0)?;
        let no_price = market.no_price.unwrap_or(1.0 - yes_price);

        if price_history.len() < p.min_samples {
            return None;
        }

        // 2. Volatility with microstructure floor
        let sigma = ewma_volatility(price_history, p.vol_lambda);
        if sigma <= 0.0 {
            return None;
        }
        let t_years = time_remaining as f64 / SECS_PER_YEAR;
        if t_years <= 0.0 {
            return None;
        }
        let vol_floor = p.microstructure_floor / t_years.sqrt();
        let vol_total = sigma.max(vol_floor);

        // 3. Volatility-regime filter
        if volatility_spike(price_history, p.vol_regime_lookback, p.vol_spike_threshold) {
            info!(ticker = %market.ticker, "volatility clustering, skipping");
            return None;
        }

        // 4. Drift
        let drift = momentum_drift(price_history, p.momentum_window);

        // 5. True probability of finishing above strike
        let true_prob = if p.use_monte_carlo {
            prob_above_monte_carlo(
                spot_price,
                market.strike_price,
                t_years,
                vol_total,
                drift,
                p.num_simulations,
            )
        } else {
            prob_above(spot_price, market.strike_price, t_years, vol_total, drift)
        };

        // 6 & 7. Evaluate both sides; larger edge wins, ties go YES
        let yes_signal = self.evaluate_side(
            SignalDirection::Yes,
            true_prob,
            yes_price,
            market,
            orderbook,
            &p,
        );
        let no_signal = self.evaluate_side(
            SignalDirection::No,
            1.0 - true_prob,
            no_price,
            market,
            orderbook,
            &p,
        );

        match (yes_signal, no_signal) {
            (Some(y), Some(n)) => Some(if y.edge >= n.edge { y } else { n }),
            (y, n) => y.or(n),
        }
    }

    fn update_params(&self, update: &StrategyParamUpdate) {
        let mut p = self.params.lock();
        if let Some(e) = update.min_edge {
            p.min_edge = e;
        }
        if let Some(k) = update.kelly_fraction {
            p.kelly_fraction = k;
        }
        if let Some(b) = update.bankroll {
            p.bankroll = b;
        }
        if let Some(mc) = update.use_monte_carlo {
            p.use_monte_carlo = mc;
        }
    }

    fn metrics(&self) -> serde_json::Value {
        let p = self.params.lock();
        serde_json::json!({
            "name": self.name(),
            "min_probability": p.min_probability,
            "min_edge": p.min_edge,
            "kelly_fraction": p.kelly_fraction,
            "use_monte_carlo": p.use_monte_carlo,
            "bankroll": p.bankroll,
        })
    }
}

impl HighConfidenceThreshold {
    /// One side of the book: conviction gate, edge gate, size, price.
    fn evaluate_side(
        &self,
        direction: SignalDirection,
        side_prob: f64,
        side_price: f64,
        market: &Market,
        orderbook: Option<&Orderbook>,
        p: &Params,
    ) -> Option<Signal> {
        if side_prob < p.min_probability {
            return None;
        }
        let edge = side_prob - side_price;
        if edge < p.min_edge {
            return None;
        }

        let quantity = position_size(edge, p.bankroll, side_price, p);
        if quantity == 0 {
            return None;
        }

        let recommended_price = optimal_price(direction, market, orderbook);
        let strength = categorize_strength(edge);

        info!(
            ticker = %market.ticker, %direction,
            prob = side_prob, edge, quantity, price = side_price,
            "signal"
        );

        Some(Signal {
            strategy_name: self.name().to_string(),
            ticker: market.ticker.clone(),
            direction,
            strength,
            true_probability: side_prob,
            market_probability: side_price,
            edge,
            recommended_quantity: quantity,
            recommended_price,
            confidence: strength.confidence(),
            expires_at: market.close_time,
        })
    }
}

fn categorize_strength(edge: f64) -> SignalStrength {
    if edge >= 0.10 {
        SignalStrength::High
    } else if edge >= 0.07 {
        SignalStrength::Medium
    } else {
        SignalStrength::Low
    }
}

/// 15% Kelly with asymmetric haircut, hard floor, and hard ceiling.
///
/// Full Kelly = edge / price, scaled by the fractional multiplier; a further
/// 50% haircut when risk/reward exceeds 5:1 (price near 1 risks a lot to win
/// a little). The dollar allocation is clamped to [floor_pct, ceiling_pct]
/// of bankroll before converting to whole contracts, minimum 1.
fn position_size(edge: f64, bankroll: f64, market_price: f64, p: &Params) -> u32 {
    if edge <= 0.0 || market_price <= 0.0 || market_price >= 1.0 {
        return 0;
    }

    let full_kelly = edge / market_price;
    let mut adjusted = full_kelly * p.kelly_fraction;

    let risk_reward = market_price / (1.0 - market_price);
    if risk_reward > 5.0 {
        adjusted *= 0.5;
        debug!(risk_reward, "asymmetric payoff haircut applied");
    }

    let floor = bankroll * p.position_floor_pct;
    let ceiling = bankroll * p.position_ceiling_pct;
    let dollars = (bankroll * adjusted).clamp(floor, ceiling);

    ((dollars / market_price) as u32).max(1)
}

/// Shade one cent inside the best ask on the chosen side; fall back to the
/// last market price when no book is available.
fn optimal_price(
    direction: SignalDirection,
    market: &Market,
    orderbook: Option<&Orderbook>,
) -> Option<f64> {
    let book = match orderbook {
        Some(b) => b,
        None => {
            return match direction {
                SignalDirection::Yes => market.yes_price,
                SignalDirection::No => market.no_price_or_derived(),
            }
        }
    };
    let ask = match direction {
        SignalDirection::Yes => book.best_yes_ask(),
        SignalDirection::No => book.best_no_ask(),
    };
    match ask {
        Some(a) => Some((a - 0.01).max(0.01)),
        None => match direction {
            SignalDirection::Yes => market.yes_price,
            SignalDirection::No => market.no_price_or_derived(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketStatus, OrderbookLevel};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn market(yes_price: f64, strike: f64, secs_left: i64) -> Market {
        market_at(yes_price, strike, secs_left, now())
    }

    fn market_at(yes_price: f64, strike: f64, secs_left: i64, t: DateTime<Utc>) -> Market {
        Market {
            ticker: "KXSOL15M-TEST-T250".into(),
            event_ticker: "KXSOL15M".into(),
            title: "test".into(),
            strike_price: strike,
            direction: "up".into(),
            window_start: t - Duration::seconds(900 - secs_left),
            window_end: t + Duration::seconds(secs_left),
            close_time: t + Duration::seconds(secs_left),
            expiration_time: t + Duration::seconds(secs_left),
            status: MarketStatus::Active,
            yes_price: Some(yes_price),
            no_price: None,
            yes_bid: Some(yes_price - 0.02),
            yes_ask: Some(yes_price + 0.02),
            volume: 500,
            volume_24h: 5000,
        }
    }

    /// Calm, slightly rising history: tiny EWMA vol, no spike regime.
    fn calm_history(base: f64, n: usize) -> Vec<PricePoint> {
        let end = now().timestamp_millis();
        (0..n)
            .map(|i| PricePoint {
                price: base * (1.0 + 1e-6 * i as f64),
                ts_ms: end - ((n - 1 - i) as i64) * 1000,
            })
            .collect()
    }

    fn strategy() -> HighConfidenceThreshold {
        HighConfidenceThreshold::new(10_000.0)
    }

    #[test]
    fn test_clean_yes_signal() {
        // Spot far above strike: model conviction ~1.0, market at 0.88
        let s = strategy();
        let m = market(0.88, 240.0, 300);
        let sig = s.analyze(&m, 250.0, &calm_history(250.0, 120), None, now()).unwrap();
        assert_eq!(sig.direction, SignalDirection::Yes);
        assert!(sig.edge >= 0.05);
        assert!(sig.true_probability >= 0.95);
        assert!(sig.recommended_quantity >= 1);
        // Ceiling: $200 at 0.88 → at most 227 contracts
        assert!(sig.recommended_quantity <= 227);
        assert_eq!(sig.confidence, sig.strength.confidence());
    }

    #[test]
    fn test_clean_no_signal() {
        // Spot far below strike: NO side carries the conviction
        let s = strategy();
        let m = market(0.12, 260.0, 300);
        let sig = s.analyze(&m, 250.0, &calm_history(250.0, 120), None, now()).unwrap();
        assert_eq!(sig.direction, SignalDirection::No);
        assert!(sig.true_probability >= 0.95);
        assert!(sig.edge >= 0.05);
    }

    #[test]
    fn test_no_signal_without_edge() {
        // Model near certain but the market already prices it at 0.97
        let s = strategy();
        let m = market(0.97, 240.0, 300);
        assert!(s.analyze(&m, 250.0, &calm_history(250.0, 120), None, now()).is_none());
    }

    #[test]
    fn test_time_window_boundaries() {
        let s = strategy();
        let h = calm_history(250.0, 120);
        // 29 s: too close to expiry; 30 s passes
        let t = now();
        assert!(s.analyze(&market_at(0.88, 240.0, 29, t), 250.0, &h, None, t).is_none());
        let t = now();
        assert!(s.analyze(&market_at(0.88, 240.0, 30, t), 250.0, &h, None, t).is_some());
        // 600 s passes; 601 s is too far out
        let t = now();
        assert!(s.analyze(&market_at(0.88, 240.0, 600, t), 250.0, &h, None, t).is_some());
        let t = now();
        assert!(s.analyze(&market_at(0.88, 240.0, 601, t), 250.0, &h, None, t).is_none());
    }

    #[test]
    fn test_insufficient_history() {
        let s = strategy();
        let m = market(0.88, 240.0, 300);
        assert!(s.analyze(&m, 250.0, &calm_history(250.0, 4), None, now()).is_none());
        assert!(s.analyze(&m, 250.0, &[], None, now()).is_none());
    }

    #[test]
    fn test_degenerate_quote_rejected() {
        let s = strategy();
        let h = calm_history(250.0, 120);
        let mut m = market(0.88, 240.0, 300);
        m.yes_price = Some(0.0);
        assert!(s.analyze(&m, 250.0, &h, None, now()).is_none());
        m.yes_price = Some(1.0);
        assert!(s.analyze(&m, 250.0, &h, None, now()).is_none());
        m.yes_price = None;
        assert!(s.analyze(&m, 250.0, &h, None, now()).is_none());
    }

    #[test]
    fn test_vol_spike_suppresses_signal() {
        let s = strategy();
        let m = market(0.88, 240.0, 300);
        let mut h = calm_history(250.0, 120);
        // Violent last leg: 2% swings in the final 20 samples
        let n = h.len();
        for (i, p) in h.iter_mut().enumerate().skip(n - 20) {
            p.price = if i % 2 == 0 { 255.0 } else { 245.0 };
        }
        assert!(s.analyze(&m, 250.0, &h, None, now()).is_none());
    }

    #[test]
    fn test_not_tradeable_market() {
        let s = strategy();
        let mut m = market(0.88, 240.0, 300);
        m.status = MarketStatus::Suspended;
        assert!(s.analyze(&m, 250.0, &calm_history(250.0, 120), None, now()).is_none());
    }

    #[test]
    fn test_recommended_price_shades_best_ask() {
        let s = strategy();
        let m = market(0.88, 240.0, 300);
        let book = Orderbook {
            ticker: m.ticker.clone(),
            yes_asks: vec![OrderbookLevel { price: 0.90, size: 100 }],
            no_asks: vec![],
        };
        let sig = s
            .analyze(&m, 250.0, &calm_history(250.0, 120), Some(&book), now())
            .unwrap();
        assert!((sig.recommended_price.unwrap() - 0.89).abs() < 1e-12);

        // Without a book the last market price is used
        let sig = s.analyze(&m, 250.0, &calm_history(250.0, 120), None, now()).unwrap();
        assert!((sig.recommended_price.unwrap() - 0.88).abs() < 1e-12);
    }

    #[test]
    fn test_strength_categories() {
        assert_eq!(categorize_strength(0.055), SignalStrength::Low);
        assert_eq!(categorize_strength(0.07), SignalStrength::Medium);
        assert_eq!(categorize_strength(0.10), SignalStrength::High);
    }

    #[test]
    fn test_sizing_floor_and_ceiling() {
        let p = Params::defaults(10_000.0);
        // Vanishing edge still buys the floor: $50 / price
        let q = position_size(1e-9, 10_000.0, 0.50, &p);
        assert_eq!(q, (50.0 / 0.50) as u32);
        // Huge edge is capped at the ceiling: $200 / price
        let q = position_size(0.40, 10_000.0, 0.50, &p);
        assert_eq!(q, (200.0 / 0.50) as u32);
        // Degenerate prices size to zero
        assert_eq!(position_size(0.10, 10_000.0, 0.0, &p), 0);
        assert_eq!(position_size(0.10, 10_000.0, 1.0, &p), 0);
        assert_eq!(position_size(0.0, 10_000.0, 0.5, &p), 0);
    }

    #[test]
    fn test_asymmetric_haircut() {
        let p = Params::defaults(10_000.0);
        // price 0.90 → R/R 9:1 → haircut halves the kelly dollars.
        // edge chosen so the halved allocation still sits between floor and ceiling:
        // full kelly = .12/.9 = .1333, 15% → 2% → $200 → haircut → $100 → 111 contracts
        let q = position_size(0.12, 10_000.0, 0.90, &p);
        assert_eq!(q, 111);
    }

    #[test]
    fn test_live_param_update() {
        let s = strategy();
        s.update_params(&StrategyParamUpdate {
            min_edge: Some(0.10),
            kelly_fraction: None,
            bankroll: Some(20_000.0),
            use_monte_carlo: None,
        });
        let m = s.metrics();
        assert_eq!(m["min_edge"], 0.10);
        assert_eq!(m["bankroll"], 20_000.0);
        // A market edge of ~0.08 now fails the raised bar
        let mkt = market(0.90, 240.0, 300);
        assert!(s.analyze(&mkt, 250.0, &calm_history(250.0, 120), None, now()).is_none());
    }
}
