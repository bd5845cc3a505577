//! Dashboard WebSocket: pushes status_update / trading_signal /
//! trade_execution / alert frames and accepts a small command vocabulary
//! (ping, get_status, start_bot, stop_bot).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::engine::bot::TradingBot;
use crate::types::OperatorEvent;

use super::status_payload;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(bot): State<Arc<TradingBot>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, bot))
}

fn frame(frame_type: &str, data: Value) -> Message {
    let body = json!({
        "type": frame_type,
        "timestamp": Utc::now(),
        "data": data,
    });
    Message::Text(body.to_string().into())
}

fn event_frame(bot: &Arc<TradingBot>, event: &OperatorEvent) -> Option<Message> {
    match event {
        OperatorEvent::StatusChanged => Some(frame("status_update", status_payload(bot))),
        OperatorEvent::SignalEmitted(signal) => {
            Some(frame("trading_signal", serde_json::to_value(signal).ok()?))
        }
        OperatorEvent::TradeExecuted(trade) => {
            Some(frame("trade_execution", serde_json::to_value(trade).ok()?))
        }
        OperatorEvent::Alert { alert_type, message, level } => Some(frame(
            "alert",
            json!({ "alert_type": alert_type, "message": message, "level": level }),
        )),
    }
}

async fn handle_socket(socket: WebSocket, bot: Arc<TradingBot>) {
    info!("websocket client connected");
    let (mut sink, mut stream) = socket.split();
    let mut events = bot.events.subscribe();

    // Greet with a full status snapshot
    if sink.send(frame("status_update", status_payload(&bot))).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(ev) => {
                        if let Some(msg) = event_frame(&bot, &ev) {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    // Lagged receivers just miss frames; the next status
                    // snapshot resynchronizes the dashboard.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(missed = n, "websocket receiver lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let parsed: Value = match serde_json::from_str(text.as_str()) {
                            Ok(v) => v,
                            Err(_) => continue,
                        };
                        if let Some(reply) = handle_command(&bot, &parsed).await {
                            if sink.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket receive error");
                        break;
                    }
                }
            }
        }
    }
    info!("websocket client disconnected");
}

async fn handle_command(bot: &Arc<TradingBot>, message: &Value) -> Option<Message> {
    match message.get("type").and_then(|t| t.as_str()) {
        Some("ping") => Some(Message::Text(json!({ "type": "pong" }).to_string().into())),
        Some("get_status") => Some(frame("status_update", status_payload(bot))),
        Some("start_bot") => {
            if !bot.is_running() {
                bot.start();
                let _ = bot.events.send(OperatorEvent::Alert {
                    alert_type: "bot_control".into(),
                    message: "Trading bot started".into(),
                    level: "info".into(),
                });
            }
            None
        }
        Some("stop_bot") => {
            if bot.is_running() {
                bot.stop().await;
                let _ = bot.events.send(OperatorEvent::Alert {
                    alert_type: "bot_control".into(),
                    message: "Trading bot stopped".into(),
                    level: "warning".into(),
                });
            }
            None
        }
        other => {
            warn!(message_type = ?other, "unknown websocket message type");
            None
        }
    }
}
