//! Bot orchestration: the 1-second decision loop plus start/stop plumbing.
//!
//! Each tick: discover open markets for the series, narrow to tradeable then
//! currently-active, pick the first (deterministic), fetch spot and book,
//! run every enabled strategy, hand signals to the order manager, and append
//! the spot price to the rolling history. Any failure logs and the loop
//! moves on — a bad tick never kills the bot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::exchange::auth::Credentials;
use crate::exchange::KalshiClient;
use crate::feeds::spot::{self, PriceHistory, SpotFeedConfig};
use crate::strategies::{load_strategies, StrategySlot};
use crate::types::OperatorEvent;

use super::orders::OrderManager;
use super::risk::RiskManager;

const TICK: Duration = Duration::from_secs(1);
const NO_MARKETS_WAIT: Duration = Duration::from_secs(10);
const NO_ACTIVE_WAIT: Duration = Duration::from_secs(5);
const HISTORY_WINDOW_MS: i64 = 15 * 60 * 1000;

pub struct TradingBot {
    pub config: Config,
    pub client: Arc<KalshiClient>,
    pub risk: Arc<Mutex<RiskManager>>,
    pub orders: Arc<OrderManager>,
    pub strategies: Vec<StrategySlot>,
    pub dry_run: Arc<AtomicBool>,
    pub events: broadcast::Sender<OperatorEvent>,

    running: AtomicBool,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    history: Mutex<PriceHistory>,
    spot_cfg: SpotFeedConfig,
    /// Separate short-timeout client for the spot sources.
    spot_http: reqwest::Client,
}

impl TradingBot {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let creds = match (&config.kalshi_private_key, &config.kalshi_private_key_path) {
            (Some(pem), _) => Credentials::from_pem(&config.kalshi_api_key, pem),
            (None, Some(path)) => Credentials::from_pem_file(&config.kalshi_api_key, path),
            (None, None) => unreachable!("config validation requires one key source"),
        }
        .context("loading exchange credentials")?;

        let client = Arc::new(
            KalshiClient::new(creds, config.kalshi_api_base_url.clone())
                .context("building exchange client")?,
        );
        let risk = Arc::new(Mutex::new(RiskManager::new(
            config.risk.clone(),
            config.bankroll,
            Utc::now(),
        )));
        let dry_run = Arc::new(AtomicBool::new(config.dry_run));
        let (events, _) = broadcast::channel(256);
        let orders = Arc::new(OrderManager::new(
            Arc::clone(&client),
            Arc::clone(&risk),
            Arc::clone(&dry_run),
            events.clone(),
        ));
        let strategies = load_strategies(&config.enabled_strategies, config.bankroll);
        let spot_cfg = config.spot_feed();
        let spot_http = reqwest::Client::builder()
            .timeout(spot::SPOT_TIMEOUT)
            .build()
            .context("building spot http client")?;

        info!(
            series = %config.series_ticker,
            dry_run = config.dry_run,
            bankroll = config.bankroll,
            strategies = strategies.len(),
            "trading bot initialized"
        );

        Ok(Arc::new(Self {
            config,
            client,
            risk,
            orders,
            strategies,
            dry_run,
            events,
            running: AtomicBool::new(false),
            loop_task: Mutex::new(None),
            history: Mutex::new(PriceHistory::new(HISTORY_WINDOW_MS)),
            spot_cfg,
            spot_http,
        }))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }

    pub fn set_dry_run(&self, dry_run: bool) {
        self.dry_run.store(dry_run, Ordering::SeqCst);
    }

    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("bot is already running");
            return;
        }
        self.orders.start_monitor();

        let bot = Arc::clone(self);
        let handle = tokio::spawn(async move {
            bot.trading_loop().await;
        });
        *self.loop_task.lock() = Some(handle);
        let _ = self.events.send(OperatorEvent::StatusChanged);
        info!("trading bot started");
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("bot is not running");
            return;
        }
        // Monitor first so no fill lands while the loop is mid-teardown,
        // then the decision loop. Resting orders are left untouched.
        self.orders.stop_monitor().await;
        let handle = self.loop_task.lock().take();
        if let Some(h) = handle {
            h.abort();
            let _ = h.await;
        }
        let _ = self.events.send(OperatorEvent::StatusChanged);
        info!("trading bot stopped");
    }

    async fn trading_loop(self: Arc<Self>) {
        info!("trading loop started");
        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.tick().await {
                error!(error = %e, "trading loop tick failed");
                tokio::time::sleep(NO_ACTIVE_WAIT).await;
            }
        }
        info!("trading loop exited");
    }

    /// One decision tick. Returns Err only for unexpected failures; the
    /// expected nothing-to-do cases sleep and return Ok.
    async fn tick(&self) -> Result<()> {
        let now = Utc::now();

        // 1. Open markets for the series
        let markets = match self
            .client
            .get_markets(&self.config.series_ticker, "open", 100)
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "market discovery failed");
                tokio::time::sleep(NO_MARKETS_WAIT).await;
                return Ok(());
            }
        };
        if markets.is_empty() {
            info!(series = %self.config.series_ticker, "no markets returned, waiting 10s");
            tokio::time::sleep(NO_MARKETS_WAIT).await;
            return Ok(());
        }

        // 2. Tradeable
        let tradeable: Vec<_> = markets.iter().filter(|m| m.is_tradeable(now)).collect();
        if tradeable.is_empty() {
            info!(total = markets.len(), "markets found but none tradeable, waiting 10s");
            tokio::time::sleep(NO_MARKETS_WAIT).await;
            return Ok(());
        }

        // 3. Inside the current 15-minute window
        let active: Vec<_> = tradeable.iter().filter(|m| m.is_active(now)).collect();
        if active.is_empty() {
            info!(tradeable = tradeable.len(), "no market in the current window, waiting 5s");
            tokio::time::sleep(NO_ACTIVE_WAIT).await;
            return Ok(());
        }

        // 4. Deterministic selection: first active market in exchange order
        let market = active[0];

        // 5. Spot price, primary then fallback
        let spot_price = match spot::fetch_spot_price(&self.spot_http, &self.spot_cfg).await {
            Some(p) => p,
            None => {
                warn!("spot price unavailable from both sources, skipping tick");
                tokio::time::sleep(NO_ACTIVE_WAIT).await;
                return Ok(());
            }
        };

        // 6. Orderbook is best-effort
        let orderbook = match self.client.get_orderbook(&market.ticker).await {
            Ok(b) => Some(b),
            Err(e) => {
                warn!(ticker = %market.ticker, error = %e, "orderbook fetch failed");
                None
            }
        };

        // 7. Strategies → signals → execution
        let history = self.history.lock().snapshot();
        for slot in &self.strategies {
            if !slot.is_enabled() {
                continue;
            }
            let signal = slot.strategy.analyze(
                market,
                spot_price,
                &history,
                orderbook.as_ref(),
                now,
            );
            if let Some(signal) = signal {
                if signal.is_valid(now) && signal.edge > 0.0 {
                    slot.note_signal();
                    info!(
                        strategy = %signal.strategy_name,
                        ticker = %signal.ticker,
                        direction = %signal.direction,
                        edge = signal.edge,
                        "signal emitted"
                    );
                    let _ = self.events.send(OperatorEvent::SignalEmitted(signal.clone()));
                    if let Some(trade) = self.orders.execute_signal(&signal).await {
                        info!(internal_id = %trade.internal_id, status = ?trade.status, "trade executed");
                    }
                }
            }
        }

        // 8. Roll the spot history forward
        self.history.lock().push(spot_price, now.timestamp_millis());

        tokio::time::sleep(TICK).await;
        Ok(())
    }

    /// Stop everything, disable strategies, cancel all resting orders, and
    /// latch the breaker. The operator's big red button.
    pub async fn emergency_halt(&self) -> usize {
        if self.is_running() {
            self.stop().await;
        }
        for slot in &self.strategies {
            slot.set_enabled(false);
        }
        let cancelled = self.orders.cancel_all().await;
        self.risk
            .lock()
            .trigger_circuit_breaker("OPERATOR EMERGENCY HALT".into(), Utc::now());
        let _ = self.events.send(OperatorEvent::Alert {
            alert_type: "emergency_halt".into(),
            message: format!("Emergency halt: {} orders cancelled", cancelled),
            level: "critical".into(),
        });
        cancelled
    }

    pub fn enabled_strategy_names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| s.strategy.name())
            .collect()
    }
}
