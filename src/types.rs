use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Markets ───

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Active,
    Closed,
    Settled,
    Suspended,
}

impl MarketStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => MarketStatus::Active,
            "closed" => MarketStatus::Closed,
            "settled" => MarketStatus::Settled,
            "suspended" => MarketStatus::Suspended,
            _ => MarketStatus::Open,
        }
    }
}

/// One binary up/down contract on a 15-minute underlying-price window.
/// Prices are fractions in [0,1]; only the exchange boundary speaks cents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Market {
    pub ticker: String,
    pub event_ticker: String,
    pub title: String,
    pub strike_price: f64,
    /// "up" or "down" — which side of the strike YES pays on.
    pub direction: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub status: MarketStatus,
    pub yes_price: Option<f64>,
    pub no_price: Option<f64>,
    pub yes_bid: Option<f64>,
    pub yes_ask: Option<f64>,
    pub volume: i64,
    pub volume_24h: i64,
}

impl Market {
    /// Inside the 15-minute window right now.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, MarketStatus::Open | MarketStatus::Active)
            && self.window_start <= now
            && now < self.window_end
    }

    /// Orders are still accepted.
    pub fn is_tradeable(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, MarketStatus::Open | MarketStatus::Active) && now < self.close_time
    }

    /// Seconds until the window ends, floored at zero.
    pub fn time_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.window_end - now).num_seconds().max(0)
    }

    /// NO price, deriving 1 - yes when the exchange only quoted one side.
    pub fn no_price_or_derived(&self) -> Option<f64> {
        self.no_price.or_else(|| self.yes_price.map(|y| 1.0 - y))
    }
}

// ─── Orderbook ───

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OrderbookLevel {
    pub price: f64,
    pub size: i64,
}

/// Per-tick snapshot of the resting asks on both sides. Ephemeral.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Orderbook {
    pub ticker: String,
    pub yes_asks: Vec<OrderbookLevel>,
    pub no_asks: Vec<OrderbookLevel>,
}

impl Orderbook {
    pub fn best_yes_ask(&self) -> Option<f64> {
        self.yes_asks
            .iter()
            .map(|l| l.price)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn best_no_ask(&self) -> Option<f64> {
        self.no_asks
            .iter()
            .map(|l| l.price)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }
}

// ─── Spot price history ───

/// One spot-price observation, millisecond timestamp.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub ts_ms: i64,
}

// ─── Strategy output ───

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Yes,
    No,
}

impl std::fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalDirection::Yes => write!(f, "YES"),
            SignalDirection::No => write!(f, "NO"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStrength {
    Low,
    Medium,
    High,
}

impl SignalStrength {
    /// Confidence score attached to signals of this strength.
    pub fn confidence(&self) -> f64 {
        match self {
            SignalStrength::Low => 0.6,
            SignalStrength::Medium => 0.75,
            SignalStrength::High => 0.9,
        }
    }
}

/// A strategy's request to take one side of one market.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Signal {
    pub strategy_name: String,
    pub ticker: String,
    pub direction: SignalDirection,
    pub strength: SignalStrength,
    /// Model probability on the chosen side.
    pub true_probability: f64,
    /// Market-quoted probability on the chosen side.
    pub market_probability: f64,
    pub edge: f64,
    pub recommended_quantity: u32,
    pub recommended_price: Option<f64>,
    pub confidence: f64,
    pub expires_at: DateTime<Utc>,
}

impl Signal {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.recommended_quantity >= 1
    }
}

// ─── Trades ───

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Submitted,
    Filled,
    Cancelled,
    Rejected,
    Failed,
}

impl TradeStatus {
    /// Terminal states never transition again.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Filled | TradeStatus::Cancelled | TradeStatus::Rejected | TradeStatus::Failed
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Yes,
    No,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Yes => "yes",
            TradeSide::No => "no",
        }
    }
}

impl From<SignalDirection> for TradeSide {
    fn from(d: SignalDirection) -> Self {
        match d {
            SignalDirection::Yes => TradeSide::Yes,
            SignalDirection::No => TradeSide::No,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// One order through its whole lifecycle, from signal to terminal state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    /// Internal id (UUIDv4) — stable across amends.
    pub internal_id: String,
    /// Exchange-assigned order id; set once accepted, replaced on amend.
    pub exchange_order_id: Option<String>,
    pub ticker: String,
    pub side: TradeSide,
    pub order_type: OrderType,
    pub quantity: u32,
    pub limit_price: Option<f64>,
    pub status: TradeStatus,
    pub filled_quantity: u32,
    pub average_fill_price: Option<f64>,
    pub cost: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub strategy_name: String,
    pub edge: f64,
    pub confidence: f64,
    pub dry_run: bool,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// ─── Operator events (pushed over the dashboard WebSocket) ───

#[derive(Clone, Debug)]
pub enum OperatorEvent {
    /// Something changed that the dashboard should re-render.
    StatusChanged,
    SignalEmitted(Signal),
    TradeExecuted(Trade),
    Alert { alert_type: String, message: String, level: String },
}

// ─── Positions ───

/// Net holding in one market. At most one per ticker at a time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub side: TradeSide,
    pub quantity: u32,
    pub average_entry_price: f64,
    pub current_price: Option<f64>,
    pub unrealized_pnl: f64,
    pub entry_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// qty * entry — the full premium at risk.
    pub max_loss: f64,
    /// qty * (1 - entry) — the payout if the side resolves.
    pub max_gain: f64,
}

impl Position {
    /// Mark-to-market P&L at the given contract price.
    pub fn pnl_at(&self, current_price: f64) -> f64 {
        let qty = self.quantity as f64;
        match self.side {
            TradeSide::Yes => (current_price - self.average_entry_price) * qty,
            TradeSide::No => (self.average_entry_price - current_price) * qty,
        }
    }

    pub fn exposure(&self) -> f64 {
        self.quantity as f64 * self.average_entry_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn market_at(now: DateTime<Utc>) -> Market {
        Market {
            ticker: "KXSOL15M-TEST-T100".into(),
            event_ticker: "KXSOL15M".into(),
            title: "SOL above 100?".into(),
            strike_price: 100.0,
            direction: "up".into(),
            window_start: now - Duration::minutes(5),
            window_end: now + Duration::minutes(10),
            close_time: now + Duration::minutes(10),
            expiration_time: now + Duration::minutes(10),
            status: MarketStatus::Active,
            yes_price: Some(0.6),
            no_price: None,
            yes_bid: Some(0.58),
            yes_ask: Some(0.62),
            volume: 100,
            volume_24h: 1000,
        }
    }

    #[test]
    fn test_market_windows() {
        let now = Utc::now();
        let m = market_at(now);
        assert!(m.is_active(now));
        assert!(m.is_tradeable(now));
        // Past close: neither tradeable nor active
        assert!(!m.is_tradeable(now + Duration::minutes(11)));
        assert!(!m.is_active(now + Duration::minutes(11)));
        // Before window start: tradeable but not active
        let early = now - Duration::minutes(6);
        assert!(m.is_tradeable(early));
        assert!(!m.is_active(early));
    }

    #[test]
    fn test_market_settled_not_tradeable() {
        let now = Utc::now();
        let mut m = market_at(now);
        m.status = MarketStatus::Settled;
        assert!(!m.is_tradeable(now));
    }

    #[test]
    fn test_no_price_derived() {
        let now = Utc::now();
        let m = market_at(now);
        assert!((m.no_price_or_derived().unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_best_asks() {
        let book = Orderbook {
            ticker: "T".into(),
            yes_asks: vec![
                OrderbookLevel { price: 0.62, size: 10 },
                OrderbookLevel { price: 0.60, size: 5 },
            ],
            no_asks: vec![],
        };
        assert_eq!(book.best_yes_ask(), Some(0.60));
        assert_eq!(book.best_no_ask(), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TradeStatus::Pending.is_terminal());
        assert!(!TradeStatus::Submitted.is_terminal());
        assert!(TradeStatus::Filled.is_terminal());
        assert!(TradeStatus::Cancelled.is_terminal());
        assert!(TradeStatus::Rejected.is_terminal());
        assert!(TradeStatus::Failed.is_terminal());
    }

    #[test]
    fn test_position_pnl_both_sides() {
        let now = Utc::now();
        let yes = Position {
            ticker: "T".into(),
            side: TradeSide::Yes,
            quantity: 10,
            average_entry_price: 0.55,
            current_price: None,
            unrealized_pnl: 0.0,
            entry_time: now,
            last_updated: now,
            max_loss: 5.5,
            max_gain: 4.5,
        };
        assert!((yes.pnl_at(0.60) - 0.5).abs() < 1e-12);
        let no = Position { side: TradeSide::No, ..yes.clone() };
        assert!((no.pnl_at(0.60) + 0.5).abs() < 1e-12);
        assert!((yes.exposure() - 5.5).abs() < 1e-12);
    }
}
