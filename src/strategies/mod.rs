pub mod high_confidence;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::types::{Market, Orderbook, PricePoint, Signal};

/// Parameter updates that can be applied to a running strategy.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct StrategyParamUpdate {
    pub min_edge: Option<f64>,
    pub kelly_fraction: Option<f64>,
    pub bankroll: Option<f64>,
    pub use_monte_carlo: Option<bool>,
}

/// Strategy contract: pure over its inputs plus internal configuration.
/// May be called for different markets concurrently; must not mutate shared
/// trading state — sizing knobs live behind the strategy's own lock.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(
        &self,
        market: &Market,
        spot_price: f64,
        price_history: &[PricePoint],
        orderbook: Option<&Orderbook>,
        now: DateTime<Utc>,
    ) -> Option<Signal>;

    /// Live parameter updates from the operator surface. Default: ignore.
    fn update_params(&self, _update: &StrategyParamUpdate) {}

    /// Strategy-specific metrics for GET /strategies.
    fn metrics(&self) -> serde_json::Value {
        serde_json::json!({ "name": self.name() })
    }
}

/// A registered strategy plus its live enable flag and signal counter.
pub struct StrategySlot {
    pub strategy: Box<dyn Strategy>,
    enabled: AtomicBool,
    signal_count: AtomicU64,
}

impl StrategySlot {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self { strategy, enabled: AtomicBool::new(true), signal_count: AtomicU64::new(0) }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn note_signal(&self) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> serde_json::Value {
        let mut m = self.strategy.metrics();
        if let Some(obj) = m.as_object_mut() {
            obj.insert("enabled".into(), self.is_enabled().into());
            obj.insert("signal_count".into(), self.signal_count.load(Ordering::Relaxed).into());
        }
        m
    }
}

/// Build the slots for the configured strategy names. Unknown names are
/// skipped with a warning rather than refusing to start.
pub fn load_strategies(names: &[String], bankroll: f64) -> Vec<StrategySlot> {
    let mut slots = Vec::new();
    for name in names {
        match name.as_str() {
            "high_confidence_threshold" => {
                slots.push(StrategySlot::new(Box::new(
                    high_confidence::HighConfidenceThreshold::new(bankroll),
                )));
                tracing::info!(strategy = %name, "strategy loaded");
            }
            other => tracing::warn!(strategy = %other, "unknown strategy, skipping"),
        }
    }
    slots
}
