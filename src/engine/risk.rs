//! Risk management: position limits, drawdown tracking, circuit breakers.
//!
//! Three latching breaker layers, each with its own clearing rule:
//!   Layer 1 — daily loss >= 5% of bankroll (clears at UTC midnight)
//!   Layer 2 — weekly drawdown >= 10% from Monday 00:00 UTC equity (clears Monday)
//!   Layer 3 — session drawdown >= 15% from session peak (operator reset only)
//!
//! Seven admission gates, evaluated in order, fail-closed: breaker, position
//! ceiling, concurrent positions, daily loss, weekly drawdown, total
//! exposure, one-position-per-market.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RiskConfig;
use crate::types::{Position, Trade, TradeStatus};

/// Full risk snapshot, rebuilt on every record/admission and serialized for
/// the operator surface.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RiskMetrics {
    pub total_positions: usize,
    pub open_orders_count: usize,
    pub total_exposure: f64,
    pub daily_pnl: f64,
    /// Negative portion of daily_pnl only (<= 0).
    pub daily_loss: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    /// Fractions, e.g. 0.05 = 5%.
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub weekly_drawdown: f64,
    pub win_rate: f64,
    /// Mean P&L per closed trade, dollars.
    pub ev_per_trade: f64,
    pub circuit_breaker_triggered: bool,
    pub circuit_breaker_reason: String,
    pub exposure_per_market: HashMap<String, f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct RiskManager {
    pub config: RiskConfig,
    /// Starting-capital reference for every fractional threshold.
    pub bankroll: f64,

    all_trades: Vec<Trade>,
    pub positions: HashMap<String, Position>,

    // Daily window (resets at UTC midnight)
    daily_date: NaiveDate,
    daily_realized_pnl: f64,

    // Weekly window (resets Monday 00:00 UTC)
    weekly_start_date: NaiveDate,
    weekly_start_equity: f64,
    weekly_peak_equity: f64,

    // Session anchors (never auto-reset)
    session_start_equity: f64,
    session_peak_equity: f64,

    // Latching breaker
    breaker_active: bool,
    breaker_triggered_at: Option<DateTime<Utc>>,
    breaker_reason: String,

    max_drawdown: f64,
    open_orders_count: usize,

    pub metrics: RiskMetrics,
}

impl RiskManager {
    pub fn new(config: RiskConfig, bankroll: f64, now: DateTime<Utc>) -> Self {
        info!(bankroll, "risk manager initialized");
        Self {
            config,
            bankroll,
            all_trades: Vec::new(),
            positions: HashMap::new(),
            daily_date: now.date_naive(),
            daily_realized_pnl: 0.0,
            weekly_start_date: Self::week_monday(now),
            weekly_start_equity: bankroll,
            weekly_peak_equity: bankroll,
            session_start_equity: bankroll,
            session_peak_equity: bankroll,
            breaker_active: false,
            breaker_triggered_at: None,
            breaker_reason: String::new(),
            max_drawdown: 0.0,
            open_orders_count: 0,
            metrics: RiskMetrics::default(),
        }
    }

    // ─── Seven-gate admission ───

    /// Ok(()) when the trade passes all seven gates; Err(reason) at the first
    /// failure. Evaluated sequentially — the execute path is serialized, so
    /// no concurrent admission arbitration is needed.
    pub fn check_trade_allowed(
        &mut self,
        ticker: &str,
        quantity: u32,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        self.maybe_reset_daily(now);
        self.maybe_reset_weekly(now);

        let position_value = quantity as f64 * price;

        // Gate 1 — latched breaker blocks everything
        if self.breaker_active {
            return Err(format!("Circuit breaker active: {}", self.breaker_reason));
        }

        // Gate 2 — per-position ceiling
        let ceiling = self.bankroll * self.config.position_ceiling_pct;
        if position_value > ceiling {
            return Err(format!(
                "Position ${:.2} exceeds {:.0}% bankroll ceiling ${:.2}",
                position_value,
                self.config.position_ceiling_pct * 100.0,
                ceiling
            ));
        }

        // Gate 3 — concurrent positions
        if self.positions.len() >= self.config.max_concurrent_positions {
            return Err(format!(
                "Max concurrent positions ({}) reached",
                self.config.max_concurrent_positions
            ));
        }

        // Gate 4 — realized daily loss cap
        let daily_cap = self.bankroll * self.config.daily_loss_threshold;
        if self.daily_realized_pnl < 0.0 && self.daily_realized_pnl.abs() >= daily_cap {
            return Err(format!(
                "Daily loss ${:.2} >= daily cap ${:.2}",
                self.daily_realized_pnl.abs(),
                daily_cap
            ));
        }

        // Gate 5 — weekly drawdown cap
        let weekly_drawdown = self.compute_weekly_drawdown();
        if weekly_drawdown >= self.config.weekly_drawdown_cap {
            return Err(format!(
                "Weekly drawdown {:.1}% >= cap {:.0}%",
                weekly_drawdown * 100.0,
                self.config.weekly_drawdown_cap * 100.0
            ));
        }

        // Gate 6 — total portfolio exposure
        let current_exposure: f64 = self.positions.values().map(|p| p.exposure()).sum();
        let max_exposure = ceiling * self.config.max_concurrent_positions as f64;
        if current_exposure + position_value > max_exposure {
            return Err(format!(
                "Total exposure ${:.2} would exceed limit ${:.2}",
                current_exposure + position_value,
                max_exposure
            ));
        }

        // Gate 7 — one position per market
        if self.positions.contains_key(ticker) {
            return Err(format!("Already have an open position in {}", ticker));
        }

        Ok(())
    }

    /// Separate edge gate: |edge| must clear the threshold plus the
    /// uncertainty buffer, and the signal must not be a coin flip.
    pub fn validate_signal_edge(&self, edge: f64, confidence: f64) -> Result<(), String> {
        let min_edge = self.config.min_edge_threshold + self.config.uncertainty_buffer;
        if edge.abs() < min_edge {
            return Err(format!(
                "Edge {:.3} below minimum {:.3} (threshold {:.3} + buffer {:.3})",
                edge, min_edge, self.config.min_edge_threshold, self.config.uncertainty_buffer
            ));
        }
        if confidence < 0.5 {
            return Err(format!("Confidence {:.2} below 0.50 minimum", confidence));
        }
        Ok(())
    }

    // ─── Recording ───

    /// Record a trade; fills update positions and realized P&L, then the
    /// whole metrics snapshot is rebuilt and breaker layers re-checked.
    pub fn record_trade(&mut self, trade: &Trade, now: DateTime<Utc>) {
        self.maybe_reset_daily(now);
        self.maybe_reset_weekly(now);
        self.all_trades.push(trade.clone());

        if trade.status == TradeStatus::Filled {
            self.apply_fill(trade, now);
            if let Some(pnl) = trade.realized_pnl {
                self.daily_realized_pnl += pnl;
            }
        }

        self.recompute_metrics(now);
        debug!(internal_id = %trade.internal_id, status = ?trade.status, "trade recorded");
    }

    /// Kept in sync by the order monitor after every tick.
    pub fn set_open_orders_count(&mut self, count: usize) {
        self.open_orders_count = count;
        self.metrics.open_orders_count = count;
    }

    // ─── Positions ───

    fn apply_fill(&mut self, trade: &Trade, now: DateTime<Utc>) {
        let qty = trade.filled_quantity;
        if qty == 0 {
            return;
        }
        let fill_price = trade
            .average_fill_price
            .or(trade.limit_price)
            .unwrap_or(0.0);

        match self.positions.get_mut(&trade.ticker) {
            None => {
                let qty_f = qty as f64;
                self.positions.insert(
                    trade.ticker.clone(),
                    Position {
                        ticker: trade.ticker.clone(),
                        side: trade.side,
                        quantity: qty,
                        average_entry_price: fill_price,
                        current_price: None,
                        unrealized_pnl: 0.0,
                        entry_time: trade.filled_at.unwrap_or(now),
                        last_updated: now,
                        max_loss: qty_f * fill_price,
                        max_gain: qty_f * (1.0 - fill_price),
                    },
                );
                info!(ticker = %trade.ticker, side = ?trade.side, qty, price = fill_price, "new position");
            }
            Some(pos) => {
                let total = pos.quantity + qty;
                pos.average_entry_price = (pos.average_entry_price * pos.quantity as f64
                    + fill_price * qty as f64)
                    / total as f64;
                pos.quantity = total;
                pos.last_updated = now;
            }
        }
    }

    /// Remove a settled position and book its exit P&L into the daily window.
    pub fn close_position(&mut self, ticker: &str, exit_pnl: f64, now: DateTime<Utc>) {
        if self.positions.remove(ticker).is_some() {
            self.daily_realized_pnl += exit_pnl;
            self.recompute_metrics(now);
            info!(ticker, exit_pnl, "position closed");
        }
    }

    /// Mark an open position at the latest contract price.
    pub fn update_position_price(&mut self, ticker: &str, current_price: f64, now: DateTime<Utc>) {
        if let Some(pos) = self.positions.get_mut(ticker) {
            pos.current_price = Some(current_price);
            pos.unrealized_pnl = pos.pnl_at(current_price);
            pos.last_updated = now;
        }
    }

    // ─── Metrics ───

    fn recompute_metrics(&mut self, now: DateTime<Utc>) {
        let total_exposure: f64 = self.positions.values().map(|p| p.exposure()).sum();
        let unrealized: f64 = self.positions.values().map(|p| p.unrealized_pnl).sum();
        let exposure_per_market = self
            .positions
            .iter()
            .map(|(t, p)| (t.clone(), p.exposure()))
            .collect();

        let daily_pnl = self.daily_realized_pnl + unrealized;
        let daily_loss = daily_pnl.min(0.0);

        // Session drawdown against the ratcheting peak
        let current_equity = self.session_start_equity + daily_pnl;
        if current_equity > self.session_peak_equity {
            self.session_peak_equity = current_equity;
        }
        let session_drawdown = if self.session_peak_equity > 0.0 {
            (self.session_peak_equity - current_equity) / self.session_peak_equity
        } else {
            0.0
        };
        self.max_drawdown = self.max_drawdown.max(session_drawdown);

        let weekly_drawdown = self.compute_weekly_drawdown();

        let closed: Vec<&Trade> = self
            .all_trades
            .iter()
            .filter(|t| t.status == TradeStatus::Filled && t.realized_pnl.is_some())
            .collect();
        let (win_rate, ev_per_trade) = if closed.is_empty() {
            (0.0, 0.0)
        } else {
            let wins = closed.iter().filter(|t| t.realized_pnl.unwrap_or(0.0) > 0.0).count();
            let total: f64 = closed.iter().map(|t| t.realized_pnl.unwrap_or(0.0)).sum();
            (wins as f64 / closed.len() as f64, total / closed.len() as f64)
        };

        self.metrics = RiskMetrics {
            total_positions: self.positions.len(),
            open_orders_count: self.open_orders_count,
            total_exposure,
            daily_pnl,
            daily_loss,
            unrealized_pnl: unrealized,
            realized_pnl: self.daily_realized_pnl,
            max_drawdown: self.max_drawdown,
            current_drawdown: session_drawdown,
            weekly_drawdown,
            win_rate,
            ev_per_trade,
            circuit_breaker_triggered: self.breaker_active,
            circuit_breaker_reason: self.breaker_reason.clone(),
            exposure_per_market,
            last_updated: Some(now),
        };

        self.check_circuit_breakers(now);
    }

    /// Rebuild and return the snapshot.
    pub fn get_metrics(&mut self, now: DateTime<Utc>) -> RiskMetrics {
        self.recompute_metrics(now);
        self.metrics.clone()
    }

    pub fn position_summary(&self) -> serde_json::Value {
        let positions: Vec<serde_json::Value> = self
            .positions
            .values()
            .map(|p| {
                serde_json::json!({
                    "ticker": p.ticker,
                    "side": p.side.as_str(),
                    "quantity": p.quantity,
                    "entry_price": p.average_entry_price,
                    "current_price": p.current_price,
                    "unrealized_pnl": p.unrealized_pnl,
                    "exposure": p.exposure(),
                })
            })
            .collect();
        serde_json::json!({
            "count": self.positions.len(),
            "positions": positions,
            "total_exposure": self.positions.values().map(|p| p.exposure()).sum::<f64>(),
            "total_unrealized_pnl": self.positions.values().map(|p| p.unrealized_pnl).sum::<f64>(),
        })
    }

    // ─── Circuit breakers ───

    fn check_circuit_breakers(&mut self, now: DateTime<Utc>) {
        if self.breaker_active {
            return;
        }

        // Layer 1 — daily loss
        if self.bankroll > 0.0 && self.metrics.daily_loss < 0.0 {
            let daily_loss_pct = self.metrics.daily_loss.abs() / self.bankroll;
            if daily_loss_pct >= self.config.daily_loss_threshold {
                self.trigger_circuit_breaker(
                    format!(
                        "Layer-1 daily loss {:.1}% >= {:.0}% of bankroll",
                        daily_loss_pct * 100.0,
                        self.config.daily_loss_threshold * 100.0
                    ),
                    now,
                );
                return;
            }
        }

        // Layer 2 — weekly drawdown
        if self.metrics.weekly_drawdown >= self.config.weekly_drawdown_cap {
            self.trigger_circuit_breaker(
                format!(
                    "Layer-2 weekly drawdown {:.1}% >= {:.0}%",
                    self.metrics.weekly_drawdown * 100.0,
                    self.config.weekly_drawdown_cap * 100.0
                ),
                now,
            );
            return;
        }

        // Layer 3 — session drawdown
        if self.metrics.current_drawdown >= self.config.session_drawdown_threshold {
            self.trigger_circuit_breaker(
                format!(
                    "Layer-3 session drawdown {:.1}% >= {:.0}%",
                    self.metrics.current_drawdown * 100.0,
                    self.config.session_drawdown_threshold * 100.0
                ),
                now,
            );
        }
    }

    /// Latch the breaker. Stays latched until an explicit reset or the
    /// matching rollover.
    pub fn trigger_circuit_breaker(&mut self, reason: String, now: DateTime<Utc>) {
        if !self.breaker_active {
            error!(%reason, "CIRCUIT BREAKER TRIGGERED");
            self.breaker_active = true;
            self.breaker_triggered_at = Some(now);
            self.breaker_reason = reason.clone();
            self.metrics.circuit_breaker_triggered = true;
            self.metrics.circuit_breaker_reason = reason;
        }
    }

    pub fn reset_circuit_breaker(&mut self) {
        if self.breaker_active {
            warn!("circuit breaker reset by operator");
            self.breaker_active = false;
            self.breaker_triggered_at = None;
            self.breaker_reason.clear();
            self.metrics.circuit_breaker_triggered = false;
            self.metrics.circuit_breaker_reason.clear();
        }
    }

    pub fn circuit_breaker_active(&self) -> bool {
        self.breaker_active
    }

    pub fn circuit_breaker_reason(&self) -> &str {
        &self.breaker_reason
    }

    // ─── Rollovers ───

    fn week_monday(now: DateTime<Utc>) -> NaiveDate {
        let today = now.date_naive();
        today - Duration::days(today.weekday().num_days_from_monday() as i64)
    }

    /// Drawdown fraction from the weekly peak. Ratchets the peak as a side
    /// effect — equity here is realized-only, unrealized swings don't count
    /// against the week.
    fn compute_weekly_drawdown(&mut self) -> f64 {
        if self.weekly_peak_equity <= 0.0 {
            return 0.0;
        }
        let current_equity = self.session_start_equity + self.daily_realized_pnl;
        if current_equity > self.weekly_peak_equity {
            self.weekly_peak_equity = current_equity;
        }
        ((self.weekly_peak_equity - current_equity) / self.weekly_peak_equity).max(0.0)
    }

    fn maybe_reset_daily(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today > self.daily_date {
            info!(
                previous_daily_pnl = self.daily_realized_pnl,
                "day rollover, resetting daily metrics"
            );
            self.daily_date = today;
            self.daily_realized_pnl = 0.0;
            if self.breaker_active && self.breaker_reason.contains("Layer-1") {
                self.reset_circuit_breaker();
            }
        }
    }

    fn maybe_reset_weekly(&mut self, now: DateTime<Utc>) {
        let monday = Self::week_monday(now);
        if monday > self.weekly_start_date {
            info!(weekly_start_equity = self.weekly_start_equity, "week rollover");
            self.weekly_start_date = monday;
            self.weekly_start_equity = self.session_start_equity + self.daily_realized_pnl;
            self.weekly_peak_equity = self.weekly_start_equity;
            if self.breaker_active && self.breaker_reason.contains("Layer-2") {
                self.reset_circuit_breaker();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn weekly_start_equity(&self) -> f64 {
        self.weekly_start_equity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderType, TradeSide};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        // A Wednesday
        Utc.with_ymd_and_hms(2025, 3, 12, 15, 0, 0).unwrap()
    }

    fn manager() -> RiskManager {
        RiskManager::new(RiskConfig::default(), 10_000.0, t0())
    }

    fn filled_trade(ticker: &str, qty: u32, price: f64, pnl: Option<f64>) -> Trade {
        Trade {
            internal_id: format!("t-{}", ticker),
            exchange_order_id: Some(format!("x-{}", ticker)),
            ticker: ticker.into(),
            side: TradeSide::Yes,
            order_type: OrderType::Limit,
            quantity: qty,
            limit_price: Some(price),
            status: TradeStatus::Filled,
            filled_quantity: qty,
            average_fill_price: Some(price),
            cost: Some(qty as f64 * price),
            realized_pnl: pnl,
            strategy_name: "high_confidence_threshold".into(),
            edge: 0.08,
            confidence: 0.9,
            dry_run: true,
            created_at: t0(),
            submitted_at: Some(t0()),
            filled_at: Some(t0()),
            cancelled_at: None,
            notes: None,
        }
    }

    #[test]
    fn test_clean_trade_passes_all_gates() {
        let mut rm = manager();
        assert!(rm.check_trade_allowed("TICK-A", 100, 0.50, t0()).is_ok());
    }

    #[test]
    fn test_gate2_position_ceiling() {
        let mut rm = manager();
        // 500 * 0.50 = $250 > 2% of 10k = $200
        let err = rm.check_trade_allowed("TICK-A", 500, 0.50, t0()).unwrap_err();
        assert!(err.contains("ceiling"), "{}", err);
    }

    #[test]
    fn test_gate3_concurrent_positions() {
        let mut rm = manager();
        for i in 0..5 {
            rm.record_trade(&filled_trade(&format!("TICK-{}", i), 10, 0.30, None), t0());
        }
        let err = rm.check_trade_allowed("TICK-NEW", 10, 0.30, t0()).unwrap_err();
        assert!(err.contains("Max concurrent"), "{}", err);
    }

    #[test]
    fn test_gate7_one_position_per_market() {
        let mut rm = manager();
        rm.record_trade(&filled_trade("TICK-A", 10, 0.50, None), t0());
        let err = rm.check_trade_allowed("TICK-A", 10, 0.50, t0()).unwrap_err();
        assert!(err.contains("Already have an open position"), "{}", err);
        // A different ticker is still fine
        assert!(rm.check_trade_allowed("TICK-B", 10, 0.50, t0()).is_ok());
    }

    #[test]
    fn test_daily_loss_breaker_latches_and_clears() {
        let mut rm = manager();
        // Open then settle for a $501 loss — over the 5% daily cap
        rm.record_trade(&filled_trade("TICK-A", 100, 0.50, None), t0());
        rm.close_position("TICK-A", -501.0, t0());

        assert!(rm.circuit_breaker_active());
        assert!(rm.circuit_breaker_reason().contains("Layer-1"));

        // Gate 1 refuses with the stored reason
        let err = rm.check_trade_allowed("TICK-B", 10, 0.50, t0()).unwrap_err();
        assert!(err.contains("Circuit breaker active"));
        assert!(err.contains("Layer-1"));

        // Operator reset clears it
        rm.reset_circuit_breaker();
        assert!(!rm.circuit_breaker_active());
    }

    #[test]
    fn test_daily_breaker_auto_clears_at_midnight() {
        let mut rm = manager();
        rm.record_trade(&filled_trade("TICK-A", 100, 0.50, None), t0());
        rm.close_position("TICK-A", -501.0, t0());
        assert!(rm.circuit_breaker_active());

        // Next UTC day: Layer-1 clears, daily pnl resets
        let next_day = t0() + Duration::days(1);
        assert!(rm.check_trade_allowed("TICK-B", 10, 0.50, next_day).is_ok());
        assert!(!rm.circuit_breaker_active());
    }

    #[test]
    fn test_session_breaker_never_auto_clears() {
        let mut rm = manager();
        rm.trigger_circuit_breaker("Layer-3 session drawdown 16.0% >= 15%".into(), t0());
        // Neither a day nor a week rollover touches Layer-3
        let next_week = t0() + Duration::days(7);
        let err = rm.check_trade_allowed("TICK-A", 10, 0.50, next_week).unwrap_err();
        assert!(err.contains("Layer-3"));
        rm.reset_circuit_breaker();
        assert!(rm.check_trade_allowed("TICK-A", 10, 0.50, next_week).is_ok());
    }

    #[test]
    fn test_position_weighted_average_entry() {
        let mut rm = manager();
        rm.record_trade(&filled_trade("TICK-A", 10, 0.50, None), t0());
        rm.record_trade(&filled_trade("TICK-A", 10, 0.60, None), t0());
        let pos = &rm.positions["TICK-A"];
        assert_eq!(pos.quantity, 20);
        assert!((pos.average_entry_price - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_close_position_books_realized_pnl() {
        let mut rm = manager();
        rm.record_trade(&filled_trade("TICK-A", 10, 0.50, None), t0());
        rm.close_position("TICK-A", 4.5, t0());
        assert!(rm.positions.is_empty());
        let m = rm.get_metrics(t0());
        assert!((m.realized_pnl - 4.5).abs() < 1e-12);
        assert!((m.daily_pnl - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_edge_gate() {
        let rm = manager();
        // 0.02 + 0.03 buffer: 0.04 fails, 0.06 passes
        assert!(rm.validate_signal_edge(0.04, 0.9).is_err());
        assert!(rm.validate_signal_edge(0.06, 0.9).is_ok());
        assert!(rm.validate_signal_edge(0.06, 0.4).is_err());
        // Magnitude counts — a NO-side edge expressed negative still clears
        assert!(rm.validate_signal_edge(-0.06, 0.9).is_ok());
    }

    #[test]
    fn test_weekly_rollover_repins_equity() {
        let mut rm = manager();
        rm.record_trade(&filled_trade("TICK-A", 100, 0.50, None), t0());
        rm.close_position("TICK-A", -300.0, t0());

        // Cross into next week (t0 is Wednesday; +5 days is Monday)
        let next_monday = t0() + Duration::days(5);
        let _ = rm.check_trade_allowed("TICK-B", 10, 0.50, next_monday);
        // Weekly anchor = session_start + daily_realized at the rollover instant.
        // t0+5d is a new UTC day too, so daily reset fired first: -300 was wiped.
        assert!((rm.weekly_start_equity() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_exposure_and_counts() {
        let mut rm = manager();
        rm.record_trade(&filled_trade("TICK-A", 10, 0.50, None), t0());
        rm.set_open_orders_count(3);
        let m = rm.get_metrics(t0());
        assert_eq!(m.total_positions, 1);
        assert_eq!(m.open_orders_count, 3);
        assert!((m.total_exposure - 5.0).abs() < 1e-12);
        assert!((m.exposure_per_market["TICK-A"] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_win_rate_and_ev() {
        let mut rm = manager();
        rm.record_trade(&filled_trade("TICK-A", 10, 0.50, Some(5.0)), t0());
        // New ticker so gate bookkeeping stays sane
        rm.record_trade(&filled_trade("TICK-B", 10, 0.50, Some(-2.0)), t0());
        let m = rm.get_metrics(t0());
        assert!((m.win_rate - 0.5).abs() < 1e-12);
        assert!((m.ev_per_trade - 1.5).abs() < 1e-12);
    }
}
