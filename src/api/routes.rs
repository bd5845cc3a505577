//! REST operator surface: bot control, monitoring, portfolio passthroughs.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::engine::bot::TradingBot;
use crate::exchange::ExchangeError;
use crate::strategies::StrategyParamUpdate;

use super::{status_payload, ws};

type Bot = Arc<TradingBot>;
type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

fn bad_request(detail: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail.into() })))
}

fn not_found(detail: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail.into() })))
}

fn upstream(e: ExchangeError) -> ApiError {
    (StatusCode::BAD_GATEWAY, Json(json!({ "detail": e.to_string() })))
}

pub fn api_routes() -> Router<Bot> {
    Router::new()
        // Health & status
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/system/health", get(system_health))
        // Lifecycle
        .route("/start", post(start_bot))
        .route("/stop", post(stop_bot))
        // Emergency controls
        .route("/emergency/halt", post(emergency_halt))
        .route("/emergency/cancel-all", post(cancel_all))
        .route("/circuit-breaker/reset", post(reset_breaker))
        // Portfolio
        .route("/balance", get(balance))
        .route("/positions", get(positions))
        .route("/fills", get(fills))
        .route("/settlements", get(settlements))
        // Orders & trades
        .route("/orders", get(list_orders))
        .route("/orders/queue-positions", get(all_queue_positions))
        .route("/orders/{order_id}/queue-position", get(queue_position))
        .route("/trades", get(trades))
        .route("/trades/active", get(active_trades))
        .route("/trades/{trade_id}/cancel", post(cancel_trade))
        .route("/trades/{trade_id}/decrease", post(decrease_trade))
        .route("/trades/{trade_id}/amend", post(amend_trade))
        // Bankroll & mode
        .route("/bankroll", get(get_bankroll).post(update_bankroll))
        .route("/mode", get(get_mode).post(set_mode))
        // Strategies
        .route("/strategies", get(strategies))
        .route("/strategies/{name}/enable", post(enable_strategy))
        .route("/strategies/{name}/disable", post(disable_strategy))
        .route("/strategies/{name}/params", post(update_strategy_params))
        // Chart data proxy
        .route("/price-history", get(price_history))
        // Live updates
        .route("/ws", get(ws::ws_handler))
}

// ─── Health & status ───

/// Liveness probe — 200 even when the bot is stopped.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "service": "kalshi-trading-bot",
    }))
}

async fn get_status(State(bot): State<Bot>) -> Json<Value> {
    Json(status_payload(&bot))
}

async fn system_health(State(bot): State<Bot>) -> Json<Value> {
    let health = bot.client.health_info();
    let risk = bot.risk.lock().get_metrics(Utc::now());
    Json(json!({
        "api_connected": health.healthy,
        "auth_ok": health.consecutive_errors == 0,
        "last_successful_request": health.last_successful_request,
        "consecutive_errors": health.consecutive_errors,
        "total_requests": health.total_requests,
        "circuit_breaker_active": risk.circuit_breaker_triggered,
        "circuit_breaker_reason": risk.circuit_breaker_reason,
        "bot_running": bot.is_running(),
        "dry_run_mode": bot.is_dry_run(),
        "open_orders": risk.open_orders_count,
        "timestamp": Utc::now(),
    }))
}

// ─── Lifecycle ───

async fn start_bot(State(bot): State<Bot>) -> ApiResult {
    if bot.is_running() {
        return Err(bad_request("Bot is already running"));
    }
    bot.start();
    Ok(Json(json!({ "message": "Bot started", "dry_run": bot.is_dry_run() })))
}

async fn stop_bot(State(bot): State<Bot>) -> ApiResult {
    if !bot.is_running() {
        return Err(bad_request("Bot is not running"));
    }
    bot.stop().await;
    Ok(Json(json!({ "message": "Bot stopped" })))
}

// ─── Emergency ───

async fn emergency_halt(State(bot): State<Bot>) -> Json<Value> {
    let cancelled = bot.emergency_halt().await;
    Json(json!({
        "message": "EMERGENCY HALT EXECUTED",
        "orders_cancelled": cancelled,
        "strategies_disabled": bot.strategies.len(),
        "circuit_breaker": true,
        "timestamp": Utc::now(),
    }))
}

async fn cancel_all(State(bot): State<Bot>) -> Json<Value> {
    let cancelled = bot.orders.cancel_all().await;
    Json(json!({ "message": format!("Cancelled {} orders", cancelled), "count": cancelled }))
}

async fn reset_breaker(State(bot): State<Bot>) -> Json<Value> {
    bot.risk.lock().reset_circuit_breaker();
    Json(json!({ "message": "Circuit breaker reset" }))
}

// ─── Portfolio ───

async fn balance(State(bot): State<Bot>) -> ApiResult {
    let data = bot.client.get_balance().await.map_err(upstream)?;
    Ok(Json(json!({
        "balance_cents": data.balance,
        "portfolio_value_cents": data.portfolio_value,
        "balance_dollars": data.balance as f64 / 100.0,
        "portfolio_value_dollars": data.portfolio_value as f64 / 100.0,
        "total_value_dollars": (data.balance + data.portfolio_value) as f64 / 100.0,
    })))
}

async fn positions(State(bot): State<Bot>) -> Json<Value> {
    let mut local = bot.risk.lock().position_summary();
    let kalshi_positions = match bot.client.get_positions().await {
        Ok(resp) => serde_json::to_value(resp.market_positions).unwrap_or_default(),
        Err(_) => Value::Array(vec![]),
    };
    if let Some(obj) = local.as_object_mut() {
        obj.insert("kalshi_positions".into(), kalshi_positions);
    }
    Json(local)
}

#[derive(Deserialize)]
struct FillsQuery {
    ticker: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    100
}

async fn fills(State(bot): State<Bot>, Query(q): Query<FillsQuery>) -> ApiResult {
    let resp = bot
        .client
        .get_fills(q.ticker.as_deref(), None, None, q.limit, None)
        .await
        .map_err(upstream)?;
    let fills: Vec<Value> = resp
        .fills
        .iter()
        .map(|f| {
            json!({
                "order_id": f.order_id,
                "ticker": f.ticker,
                "side": f.side,
                "count": f.count,
                "yes_price": f.yes_price,
                "no_price": f.no_price,
            })
        })
        .collect();
    Ok(Json(json!({ "fills": fills, "cursor": resp.cursor })))
}

#[derive(Deserialize)]
struct SettlementsQuery {
    #[serde(default = "default_limit")]
    limit: u32,
}

async fn settlements(State(bot): State<Bot>, Query(q): Query<SettlementsQuery>) -> ApiResult {
    let data = bot.client.get_settlements(q.limit, None).await.map_err(upstream)?;
    Ok(Json(data))
}

// ─── Orders & trades ───

#[derive(Deserialize)]
struct OrdersQuery {
    ticker: Option<String>,
    status: Option<String>,
}

async fn list_orders(State(bot): State<Bot>, Query(q): Query<OrdersQuery>) -> ApiResult {
    let resp = bot
        .client
        .list_orders(q.ticker.as_deref(), q.status.as_deref())
        .await
        .map_err(upstream)?;
    Ok(Json(json!({ "orders": resp.orders, "cursor": resp.cursor })))
}

async fn all_queue_positions(State(bot): State<Bot>) -> ApiResult {
    Ok(Json(bot.client.get_all_queue_positions().await.map_err(upstream)?))
}

async fn queue_position(State(bot): State<Bot>, Path(order_id): Path<String>) -> ApiResult {
    Ok(Json(bot.client.get_queue_position(&order_id).await.map_err(upstream)?))
}

#[derive(Deserialize)]
struct TradesQuery {
    #[serde(default = "default_limit")]
    limit: u32,
    status: Option<String>,
}

async fn trades(State(bot): State<Bot>, Query(q): Query<TradesQuery>) -> Json<Value> {
    let mut trades = bot.orders.completed_trades(q.limit as usize);
    if let Some(status) = &q.status {
        trades.retain(|t| {
            serde_json::to_value(t.status)
                .ok()
                .and_then(|v| v.as_str().map(|s| s == status))
                .unwrap_or(false)
        });
    }
    Json(serde_json::to_value(trades).unwrap_or_default())
}

async fn active_trades(State(bot): State<Bot>) -> Json<Value> {
    Json(serde_json::to_value(bot.orders.active_trades()).unwrap_or_default())
}

/// Accepts either the internal trade id or, failing that, a raw exchange
/// order id (operators paste both).
async fn cancel_trade(State(bot): State<Bot>, Path(trade_id): Path<String>) -> ApiResult {
    let ok = bot.orders.cancel(&trade_id).await
        || bot.orders.cancel_by_exchange_id(&trade_id).await;
    if !ok {
        return Err(not_found(format!("Trade {} not found or not cancellable", trade_id)));
    }
    Ok(Json(json!({ "message": format!("Trade {} cancelled", trade_id) })))
}

#[derive(Deserialize)]
struct DecreaseBody {
    reduce_by: Option<u32>,
    reduce_to: Option<u32>,
}

async fn decrease_trade(
    State(bot): State<Bot>,
    Path(trade_id): Path<String>,
    Json(body): Json<DecreaseBody>,
) -> ApiResult {
    if body.reduce_by.is_none() && body.reduce_to.is_none() {
        return Err(bad_request("Provide reduce_by or reduce_to"));
    }
    if body.reduce_by.is_some() && body.reduce_to.is_some() {
        return Err(bad_request("Provide reduce_by OR reduce_to, not both"));
    }
    if !bot.orders.decrease(&trade_id, body.reduce_by, body.reduce_to).await {
        return Err(not_found(format!("Trade {} not found", trade_id)));
    }
    Ok(Json(json!({ "message": format!("Trade {} decreased", trade_id) })))
}

#[derive(Deserialize)]
struct AmendBody {
    new_price: Option<f64>,
    new_quantity: Option<u32>,
}

async fn amend_trade(
    State(bot): State<Bot>,
    Path(trade_id): Path<String>,
    Json(body): Json<AmendBody>,
) -> ApiResult {
    if body.new_price.is_none() && body.new_quantity.is_none() {
        return Err(bad_request("Provide new_price or new_quantity"));
    }
    match bot.orders.amend(&trade_id, body.new_price, body.new_quantity).await {
        Some(new_order_id) => Ok(Json(json!({
            "message": format!("Trade {} amended", trade_id),
            "new_order_id": new_order_id,
        }))),
        None => Err(not_found(format!("Trade {} amend failed", trade_id))),
    }
}

// ─── Bankroll & risk settings ───

#[derive(Deserialize)]
struct BankrollBody {
    bankroll: f64,
    kelly_fraction: Option<f64>,
    position_ceiling_pct: Option<f64>,
    daily_loss_threshold: Option<f64>,
}

/// Live-updates bankroll and risk knobs. Takes effect on the next admission.
async fn update_bankroll(State(bot): State<Bot>, Json(body): Json<BankrollBody>) -> ApiResult {
    if body.bankroll <= 0.0 {
        return Err(bad_request("Bankroll must be > 0"));
    }
    {
        let mut risk = bot.risk.lock();
        risk.bankroll = body.bankroll;
        if let Some(pct) = body.position_ceiling_pct {
            risk.config.position_ceiling_pct = pct;
        }
        if let Some(t) = body.daily_loss_threshold {
            risk.config.daily_loss_threshold = t;
        }
    }
    let update = StrategyParamUpdate {
        kelly_fraction: body.kelly_fraction,
        bankroll: Some(body.bankroll),
        ..Default::default()
    };
    for slot in &bot.strategies {
        slot.strategy.update_params(&update);
    }
    Ok(Json(json!({ "message": "Bankroll updated", "bankroll": body.bankroll })))
}

async fn get_bankroll(State(bot): State<Bot>) -> Json<Value> {
    let (bankroll, ceiling_pct, daily_thresh, max_positions, metrics) = {
        let mut risk = bot.risk.lock();
        let m = risk.get_metrics(Utc::now());
        (
            risk.bankroll,
            risk.config.position_ceiling_pct,
            risk.config.daily_loss_threshold,
            risk.config.max_concurrent_positions,
            m,
        )
    };
    Json(json!({
        "bankroll": bankroll,
        "position_ceiling_pct": ceiling_pct,
        "daily_loss_threshold": daily_thresh,
        "max_concurrent_positions": max_positions,
        "total_exposure": metrics.total_exposure,
        "remaining_capacity": (bankroll - metrics.total_exposure).max(0.0),
        "daily_pnl": metrics.daily_pnl,
    }))
}

// ─── Trading mode ───

#[derive(Deserialize)]
struct ModeBody {
    mode: String,
    confirmed_bankroll: Option<f64>,
    #[serde(default)]
    risk_acknowledged: bool,
}

/// dry_run | paper | live. Going live needs an explicit risk acknowledgement
/// and a confirmed bankroll — anything less is a 400 and no state change.
async fn set_mode(State(bot): State<Bot>, Json(body): Json<ModeBody>) -> ApiResult {
    match body.mode.as_str() {
        "dry_run" | "paper" => bot.set_dry_run(true),
        "live" => {
            if !body.risk_acknowledged {
                return Err(bad_request("risk_acknowledged must be true to enable live trading"));
            }
            if body.confirmed_bankroll.unwrap_or(0.0) <= 0.0 {
                return Err(bad_request("confirmed_bankroll required for live mode"));
            }
            bot.set_dry_run(false);
        }
        _ => return Err(bad_request("mode must be dry_run | paper | live")),
    }
    Ok(Json(json!({
        "message": format!("Trading mode set to {}", body.mode.to_uppercase()),
        "dry_run": bot.is_dry_run(),
        "mode": body.mode,
    })))
}

async fn get_mode(State(bot): State<Bot>) -> Json<Value> {
    let mode = if bot.is_dry_run() { "dry_run" } else { "live" };
    Json(json!({ "mode": mode, "dry_run": bot.is_dry_run() }))
}

// ─── Strategies ───

async fn strategies(State(bot): State<Bot>) -> Json<Value> {
    let list: Vec<Value> = bot.strategies.iter().map(|s| s.metrics()).collect();
    Json(Value::Array(list))
}

fn find_strategy<'a>(bot: &'a Bot, name: &str) -> Option<&'a crate::strategies::StrategySlot> {
    bot.strategies.iter().find(|s| s.strategy.name() == name)
}

async fn enable_strategy(State(bot): State<Bot>, Path(name): Path<String>) -> ApiResult {
    let slot = find_strategy(&bot, &name)
        .ok_or_else(|| not_found(format!("Strategy '{}' not found", name)))?;
    slot.set_enabled(true);
    Ok(Json(json!({ "message": format!("Strategy '{}' enabled", name) })))
}

async fn disable_strategy(State(bot): State<Bot>, Path(name): Path<String>) -> ApiResult {
    let slot = find_strategy(&bot, &name)
        .ok_or_else(|| not_found(format!("Strategy '{}' not found", name)))?;
    slot.set_enabled(false);
    Ok(Json(json!({ "message": format!("Strategy '{}' disabled", name) })))
}

async fn update_strategy_params(
    State(bot): State<Bot>,
    Path(name): Path<String>,
    Json(update): Json<StrategyParamUpdate>,
) -> ApiResult {
    let slot = find_strategy(&bot, &name)
        .ok_or_else(|| not_found(format!("Strategy '{}' not found", name)))?;
    slot.strategy.update_params(&update);
    Ok(Json(json!({
        "message": format!("Strategy '{}' updated", name),
        "params": slot.metrics(),
    })))
}

// ─── Chart data proxy ───

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct KlinesQuery {
    startTime: i64,
    endTime: i64,
    #[serde(default = "default_symbol")]
    symbol: String,
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default = "default_klines_limit")]
    limit: u32,
}

fn default_symbol() -> String {
    "SOLUSD".into()
}

fn default_interval() -> String {
    "1m".into()
}

fn default_klines_limit() -> u32 {
    1000
}

/// Server-side kline proxy so the dashboard avoids browser CORS limits.
async fn price_history(Query(q): Query<KlinesQuery>) -> ApiResult {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| bad_request(e.to_string()))?;
    let resp = client
        .get("https://api.binance.us/api/v3/klines")
        .query(&[
            ("symbol", q.symbol.as_str()),
            ("interval", q.interval.as_str()),
            ("startTime", &q.startTime.to_string()),
            ("endTime", &q.endTime.to_string()),
            ("limit", &q.limit.to_string()),
        ])
        .send()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, Json(json!({ "detail": e.to_string() }))))?;
    if !resp.status().is_success() {
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({ "detail": "Upstream price data unavailable" })),
        ));
    }
    let data: Value = resp
        .json()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, Json(json!({ "detail": e.to_string() }))))?;
    Ok(Json(data))
}
