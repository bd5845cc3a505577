//! Wire types and conversions for the exchange REST API.
//!
//! Bodies are built with `Option` fields and `skip_serializing_if` so absent
//! keys are omitted entirely — the exchange rejects explicit nulls for the
//! price fields. Prices cross this boundary as integer cents; everything
//! inside the core stays a fraction in [0,1].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Market, MarketStatus, Orderbook, OrderbookLevel, TradeSide};

use super::error::ExchangeError;

// ─── Price units ───

/// Fraction → cents, rounding half away from zero (0.545 → 55¢).
/// Truncation is never acceptable here: `int(54.999...)` style conversion
/// systematically underprices. The fraction must sit in [0.01, 0.99] — a
/// 0.005 input is refused outright rather than rounded up to the 1¢ minimum.
pub fn price_to_cents(price: f64) -> Result<i64, ExchangeError> {
    if !(0.01..=0.99).contains(&price) {
        return Err(ExchangeError::Validation(format!(
            "price {:.4} outside [0.01, 0.99]",
            price
        )));
    }
    let cents = (price * 100.0).round() as i64;
    Ok(cents.clamp(1, 99))
}

#[inline]
pub fn cents_to_price(cents: i64) -> f64 {
    cents as f64 / 100.0
}

// ─── Order placement ───

/// POST /portfolio/orders body. Exactly one of `yes_price`/`no_price` may be
/// set on a limit order; a market buy sets `buy_max_cost` and no price field.
#[derive(Clone, Debug, Serialize)]
pub struct OrderRequest {
    pub ticker: String,
    pub client_order_id: String,
    pub side: String,
    pub action: String,
    pub count: u32,
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_max_cost: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_ts: Option<i64>,
}

impl OrderRequest {
    /// Limit buy with the price on the side-correct field.
    pub fn limit_buy(
        ticker: &str,
        side: TradeSide,
        count: u32,
        price: f64,
        client_order_id: &str,
    ) -> Result<Self, ExchangeError> {
        let cents = price_to_cents(price)?;
        let (yes_price, no_price) = match side {
            TradeSide::Yes => (Some(cents), None),
            TradeSide::No => (None, Some(cents)),
        };
        Ok(Self {
            ticker: ticker.to_string(),
            client_order_id: client_order_id.to_string(),
            side: side.as_str().to_string(),
            action: "buy".to_string(),
            count,
            order_type: "limit".to_string(),
            yes_price,
            no_price,
            buy_max_cost: None,
            time_in_force: None,
            post_only: None,
            reduce_only: None,
            expiration_ts: None,
        })
    }

    /// Market buy — `buy_max_cost` (cents) is mandatory, no price field.
    pub fn market_buy(
        ticker: &str,
        side: TradeSide,
        count: u32,
        buy_max_cost: i64,
        client_order_id: &str,
    ) -> Result<Self, ExchangeError> {
        if buy_max_cost <= 0 {
            return Err(ExchangeError::Validation(
                "buy_max_cost is required for market buys".into(),
            ));
        }
        Ok(Self {
            ticker: ticker.to_string(),
            client_order_id: client_order_id.to_string(),
            side: side.as_str().to_string(),
            action: "buy".to_string(),
            count,
            order_type: "market".to_string(),
            yes_price: None,
            no_price: None,
            buy_max_cost: Some(buy_max_cost),
            time_in_force: None,
            post_only: None,
            reduce_only: None,
            expiration_ts: None,
        })
    }
}

/// POST /portfolio/orders/{id}/amend body.
#[derive(Clone, Debug, Serialize)]
pub struct AmendRequest {
    pub ticker: String,
    pub side: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// POST /portfolio/orders/{id}/decrease body — exactly one field set.
#[derive(Clone, Debug, Serialize)]
pub struct DecreaseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_by: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_to: Option<u32>,
}

// ─── Responses ───

/// Exchange-side order snapshot. Terminal fill status is the literal string
/// "executed" — the exchange never says "filled".
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct WireOrder {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub yes_price: Option<i64>,
    #[serde(default)]
    pub no_price: Option<i64>,
    #[serde(default)]
    pub fill_count: Option<u32>,
    #[serde(default)]
    pub remaining_count: Option<u32>,
    #[serde(default)]
    pub taker_fill_cost: Option<i64>,
    #[serde(default)]
    pub maker_fill_cost: Option<i64>,
}

impl WireOrder {
    /// Average fill price as a fraction:
    /// (taker_fill_cost + maker_fill_cost) / fill_count / 100.
    pub fn average_fill_price(&self) -> Option<f64> {
        let count = self.fill_count.unwrap_or(0);
        let cost = self.taker_fill_cost.unwrap_or(0) + self.maker_fill_cost.unwrap_or(0);
        if count > 0 && cost > 0 {
            Some(cost as f64 / count as f64 / 100.0)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct OrderResponse {
    pub order: WireOrder,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CancelResponse {
    pub order: WireOrder,
    #[serde(default)]
    pub reduced_by: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AmendResponse {
    pub order: WireOrder,
    #[serde(default)]
    pub old_order: Option<WireOrder>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Balance {
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub portfolio_value: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WireFill {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub yes_price: i64,
    #[serde(default)]
    pub no_price: i64,
}

impl WireFill {
    /// Fill price as a fraction on the given trade side.
    pub fn price_for_side(&self, side: TradeSide) -> f64 {
        match side {
            TradeSide::Yes => cents_to_price(self.yes_price),
            TradeSide::No => cents_to_price(self.no_price),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FillsResponse {
    #[serde(default)]
    pub fills: Vec<WireFill>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub market_positions: Vec<Value>,
    #[serde(default)]
    pub event_positions: Vec<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrdersListResponse {
    #[serde(default)]
    pub orders: Vec<WireOrder>,
    #[serde(default)]
    pub cursor: Option<String>,
}

// ─── Market parsing ───

fn parse_ts(v: &Value, key: &str) -> Option<DateTime<Utc>> {
    v.get(key)
        .and_then(|s| s.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Dollar-denominated field if present, else the cent field / 100.
fn dollars_or_cents(v: &Value, key_dollars: &str, key_cents: &str) -> Option<f64> {
    if let Some(d) = v.get(key_dollars) {
        if let Some(f) = d.as_f64() {
            if f > 0.0 {
                return Some(f);
            }
        }
        if let Some(s) = d.as_str() {
            if let Ok(f) = s.parse::<f64>() {
                if f > 0.0 {
                    return Some(f);
                }
            }
        }
    }
    v.get(key_cents)
        .and_then(|c| c.as_i64())
        .filter(|&c| c > 0)
        .map(cents_to_price)
}

/// Raw market JSON → `Market`. Returns None when the timestamps are missing
/// (a market we cannot place on a timeline is not tradeable anyway).
pub fn parse_market(data: &Value) -> Option<Market> {
    let ticker = data.get("ticker")?.as_str()?.to_string();

    let strike_price = data
        .get("floor_strike")
        .and_then(|v| v.as_f64())
        .or_else(|| data.get("cap_strike").and_then(|v| v.as_f64()))
        .or_else(|| {
            data.get("functional_strike")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(0.0);

    let direction = data
        .get("yes_sub_title")
        .and_then(|v| v.as_str())
        .map(|s| s.to_lowercase().contains("below"))
        .map(|below| if below { "down" } else { "up" })
        .unwrap_or("up")
        .to_string();

    let open_time = parse_ts(data, "open_time")?;
    let close_time = parse_ts(data, "close_time")?;
    let expiration_time = parse_ts(data, "expiration_time")?;

    let yes_price = dollars_or_cents(data, "last_price_dollars", "last_price");
    let yes_bid = dollars_or_cents(data, "yes_bid_dollars", "yes_bid");
    let yes_ask = dollars_or_cents(data, "yes_ask_dollars", "yes_ask");

    Some(Market {
        ticker,
        event_ticker: data
            .get("event_ticker")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        title: data.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        strike_price,
        direction,
        window_start: open_time,
        window_end: expiration_time,
        close_time,
        expiration_time,
        status: MarketStatus::from_str(
            data.get("status").and_then(|v| v.as_str()).unwrap_or("open"),
        ),
        yes_price,
        no_price: yes_price.map(|y| 1.0 - y),
        yes_bid,
        yes_ask,
        volume: data.get("volume").and_then(|v| v.as_i64()).unwrap_or(0),
        volume_24h: data.get("volume_24h").and_then(|v| v.as_i64()).unwrap_or(0),
    })
}

fn parse_levels_dollars(arr: &Value) -> Vec<OrderbookLevel> {
    arr.as_array()
        .map(|levels| {
            levels
                .iter()
                .filter_map(|l| {
                    let pair = l.as_array()?;
                    let price = match pair.first()? {
                        Value::String(s) => s.parse().ok()?,
                        v => v.as_f64()?,
                    };
                    Some(OrderbookLevel { price, size: pair.get(1)?.as_i64()? })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_levels_cents(arr: &Value) -> Vec<OrderbookLevel> {
    arr.as_array()
        .map(|levels| {
            levels
                .iter()
                .filter_map(|l| {
                    let pair = l.as_array()?;
                    Some(OrderbookLevel {
                        price: cents_to_price(pair.first()?.as_i64()?),
                        size: pair.get(1)?.as_i64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Raw orderbook JSON → `Orderbook`. Prefers the fractional-dollar shape
/// (`orderbook_fp`), falls back to the integer-cent one.
pub fn parse_orderbook(ticker: &str, data: &Value) -> Orderbook {
    let fp = data.get("orderbook_fp");
    let cents = data.get("orderbook");

    let yes_asks = fp
        .and_then(|v| v.get("yes_dollars"))
        .map(parse_levels_dollars)
        .or_else(|| cents.and_then(|v| v.get("yes")).map(parse_levels_cents))
        .unwrap_or_default();
    let no_asks = fp
        .and_then(|v| v.get("no_dollars"))
        .map(parse_levels_dollars)
        .or_else(|| cents.and_then(|v| v.get("no")).map(parse_levels_cents))
        .unwrap_or_default();

    Orderbook { ticker: ticker.to_string(), yes_asks, no_asks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_price_to_cents_rounds_half_away() {
        assert_eq!(price_to_cents(0.545).unwrap(), 55);
        assert_eq!(price_to_cents(0.55).unwrap(), 55);
        assert_eq!(price_to_cents(0.554).unwrap(), 55);
        assert_eq!(price_to_cents(0.50).unwrap(), 50);
        assert_eq!(price_to_cents(0.01).unwrap(), 1);
        assert_eq!(price_to_cents(0.99).unwrap(), 99);
    }

    #[test]
    fn test_price_to_cents_rejects_out_of_range() {
        assert!(price_to_cents(0.005).is_err()); // below the 1¢ minimum, not rounded up
        assert!(price_to_cents(0.0).is_err());
        assert!(price_to_cents(0.995).is_err());
        assert!(price_to_cents(1.0).is_err());
    }

    #[test]
    fn test_limit_order_sets_one_price_field() {
        let yes = OrderRequest::limit_buy("T", TradeSide::Yes, 10, 0.55, "cid-1").unwrap();
        assert_eq!(yes.yes_price, Some(55));
        assert_eq!(yes.no_price, None);

        let no = OrderRequest::limit_buy("T", TradeSide::No, 10, 0.40, "cid-2").unwrap();
        assert_eq!(no.yes_price, None);
        assert_eq!(no.no_price, Some(40));
    }

    #[test]
    fn test_order_body_omits_absent_keys() {
        let req = OrderRequest::limit_buy("T", TradeSide::Yes, 5, 0.50, "cid").unwrap();
        let body = serde_json::to_value(&req).unwrap();
        let obj = body.as_object().unwrap();
        assert!(obj.contains_key("yes_price"));
        assert!(!obj.contains_key("no_price"), "absent price must be omitted, not null");
        assert!(!obj.contains_key("buy_max_cost"));
        assert!(!obj.contains_key("post_only"));
        assert_eq!(obj["type"], "limit");
    }

    #[test]
    fn test_market_buy_requires_max_cost() {
        assert!(OrderRequest::market_buy("T", TradeSide::Yes, 5, 0, "cid").is_err());
        let req = OrderRequest::market_buy("T", TradeSide::Yes, 5, 300, "cid").unwrap();
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["buy_max_cost"], 300);
        assert!(!body.as_object().unwrap().contains_key("yes_price"));
    }

    #[test]
    fn test_wire_order_average_fill_price() {
        let order = WireOrder {
            fill_count: Some(10),
            taker_fill_cost: Some(330),
            maker_fill_cost: Some(220),
            ..Default::default()
        };
        // (330 + 220) / 10 / 100 = 0.55
        assert!((order.average_fill_price().unwrap() - 0.55).abs() < 1e-12);
        assert!(WireOrder::default().average_fill_price().is_none());
    }

    #[test]
    fn test_parse_market_basic() {
        let raw = json!({
            "ticker": "KXSOL15M-25JAN01-1430-T250",
            "event_ticker": "KXSOL15M",
            "title": "SOL above 250 at 14:45?",
            "floor_strike": 250.0,
            "open_time": "2025-01-01T14:30:00Z",
            "close_time": "2025-01-01T14:45:00Z",
            "expiration_time": "2025-01-01T14:45:00Z",
            "status": "active",
            "last_price": 62,
            "yes_bid": 60,
            "yes_ask": 64,
            "volume": 1200
        });
        let m = parse_market(&raw).unwrap();
        assert_eq!(m.status, MarketStatus::Active);
        assert_eq!(m.strike_price, 250.0);
        assert_eq!(m.direction, "up");
        assert!((m.yes_price.unwrap() - 0.62).abs() < 1e-12);
        assert!((m.no_price.unwrap() - 0.38).abs() < 1e-12);
        assert!((m.yes_ask.unwrap() - 0.64).abs() < 1e-12);
    }

    #[test]
    fn test_parse_market_prefers_dollar_fields_and_below_direction() {
        let raw = json!({
            "ticker": "T",
            "yes_sub_title": "Price is below 250",
            "functional_strike": "249.50",
            "open_time": "2025-01-01T14:30:00Z",
            "close_time": "2025-01-01T14:45:00Z",
            "expiration_time": "2025-01-01T14:45:00Z",
            "last_price_dollars": "0.62",
            "last_price": 61
        });
        let m = parse_market(&raw).unwrap();
        assert_eq!(m.direction, "down");
        assert_eq!(m.strike_price, 249.50);
        assert!((m.yes_price.unwrap() - 0.62).abs() < 1e-12);
    }

    #[test]
    fn test_parse_market_missing_times_is_none() {
        assert!(parse_market(&json!({"ticker": "T"})).is_none());
    }

    #[test]
    fn test_parse_orderbook_prefers_fp() {
        let raw = json!({
            "orderbook": { "yes": [[55, 100]], "no": [[45, 50]] },
            "orderbook_fp": { "yes_dollars": [["0.56", 100]], "no_dollars": [["0.44", 50]] }
        });
        let book = parse_orderbook("T", &raw);
        assert!((book.best_yes_ask().unwrap() - 0.56).abs() < 1e-12);
        assert!((book.best_no_ask().unwrap() - 0.44).abs() < 1e-12);
    }

    #[test]
    fn test_parse_orderbook_cents_fallback() {
        let raw = json!({ "orderbook": { "yes": [[55, 100], [53, 10]], "no": [[45, 50]] } });
        let book = parse_orderbook("T", &raw);
        assert!((book.best_yes_ask().unwrap() - 0.53).abs() < 1e-12);
        assert_eq!(book.yes_asks.len(), 2);
    }

    #[test]
    fn test_fill_price_for_side() {
        let fill = WireFill {
            order_id: "o1".into(),
            ticker: "T".into(),
            side: "yes".into(),
            count: 10,
            yes_price: 55,
            no_price: 45,
        };
        assert!((fill.price_for_side(TradeSide::Yes) - 0.55).abs() < 1e-12);
        assert!((fill.price_for_side(TradeSide::No) - 0.45).abs() < 1e-12);
    }
}
