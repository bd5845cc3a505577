pub mod routes;
pub mod ws;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::engine::bot::TradingBot;

/// The status document shared by GET /status and the WS status_update frame.
pub fn status_payload(bot: &Arc<TradingBot>) -> Value {
    let now = Utc::now();
    let risk_metrics = bot.risk.lock().get_metrics(now);
    let positions = bot.risk.lock().position_summary();
    json!({
        "running": bot.is_running(),
        "dry_run": bot.is_dry_run(),
        "enabled_strategies": bot.enabled_strategy_names(),
        "risk_metrics": risk_metrics,
        "order_summary": bot.orders.summary(),
        "position_summary": positions,
        "client_health": bot.client.health_info(),
        "timestamp": now,
    })
}

pub fn router(bot: Arc<TradingBot>, prefix: &str) -> Router {
    Router::new()
        .nest(prefix, routes::api_routes())
        .layer(CorsLayer::permissive())
        .with_state(bot)
}

/// Bind and serve the operator surface until the process exits.
pub async fn serve(bot: Arc<TradingBot>) -> Result<()> {
    let addr = format!("{}:{}", bot.config.api_host, bot.config.api_port);
    let prefix = bot.config.api_prefix.clone();
    let app = router(Arc::clone(&bot), &prefix);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, %prefix, "operator API listening");
    axum::serve(listener, app).await.context("api server")?;
    Ok(())
}
