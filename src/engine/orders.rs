//! Order lifecycle: execution, tracking, reconciliation, paper fills.
//!
//! State machine (PENDING is initial):
//!   PENDING  → SUBMITTED  exchange accepted
//!   PENDING  → FAILED     rejection / network error after retries
//!   SUBMITTED → FILLED    status "executed" or the id shows up in /fills
//!   SUBMITTED → CANCELLED cancel accepted, stale sweep, or market halt
//!   SUBMITTED → REJECTED  post-acceptance rejection
//! FILLED / CANCELLED / REJECTED / FAILED are terminal.
//!
//! The exchange's filled state is the literal string "executed" — matching
//! "filled" here would silently strand every fill.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::exchange::client::BATCH_LIMIT;
use crate::exchange::models::{AmendRequest, OrderRequest, WireOrder};
use crate::exchange::KalshiClient;
use crate::types::{
    MarketStatus, OperatorEvent, OrderType, Signal, Trade, TradeSide, TradeStatus,
};

use super::risk::RiskManager;

/// Resting orders older than one full window are stale and swept.
const STALE_ORDER_SECS: i64 = 14 * 60;
/// Monitor cadence; fills reconciliation runs every 5th tick.
const MONITOR_TICK: Duration = Duration::from_secs(2);
const FILLS_EVERY_N_TICKS: u32 = 5;
/// Simulated queue delay before a paper order fills.
const PAPER_FILL_DELAY_SECS: i64 = 2;

#[derive(Default)]
struct OrderState {
    /// In-flight orders keyed by internal trade id.
    active: HashMap<String, Trade>,
    /// Terminal orders, newest last, capped at 500.
    completed: Vec<Trade>,
    /// Every client_order_id ever submitted — dedup guard.
    submitted_client_ids: HashSet<String>,
    /// Watermark for incremental /fills polling (unix seconds).
    last_fills_ts: i64,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct OrderSummary {
    pub active_count: usize,
    pub completed_count: usize,
    pub filled_count: usize,
    pub cancelled_count: usize,
    pub failed_count: usize,
}

pub struct OrderManager {
    client: Arc<KalshiClient>,
    risk: Arc<Mutex<RiskManager>>,
    dry_run: Arc<AtomicBool>,
    state: Mutex<OrderState>,
    running: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<OperatorEvent>,
}

impl OrderManager {
    pub fn new(
        client: Arc<KalshiClient>,
        risk: Arc<Mutex<RiskManager>>,
        dry_run: Arc<AtomicBool>,
        events: broadcast::Sender<OperatorEvent>,
    ) -> Self {
        info!(dry_run = dry_run.load(Ordering::Relaxed), "order manager initialized");
        Self {
            client,
            risk,
            dry_run,
            state: Mutex::new(OrderState::default()),
            running: AtomicBool::new(false),
            monitor: Mutex::new(None),
            events,
        }
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Relaxed)
    }

    // ─── Signal execution ───

    /// Gate a signal (edge, then risk) and submit the resulting order.
    /// Returns the Trade for anything that got past the gates — including
    /// trades that FAILED at submission — and None for gate refusals.
    pub async fn execute_signal(&self, signal: &Signal) -> Option<Trade> {
        let now = Utc::now();
        if !signal.is_valid(now) {
            warn!(ticker = %signal.ticker, "signal invalid or expired");
            return None;
        }

        let price = signal.recommended_price.unwrap_or(0.5);
        {
            let mut risk = self.risk.lock();
            if let Err(reason) = risk.validate_signal_edge(signal.edge, signal.confidence) {
                warn!(ticker = %signal.ticker, %reason, "signal rejected (edge)");
                return None;
            }
            if let Err(reason) =
                risk.check_trade_allowed(&signal.ticker, signal.recommended_quantity, price, now)
            {
                warn!(ticker = %signal.ticker, %reason, "signal rejected (risk)");
                return None;
            }
        }

        let dry_run = self.is_dry_run();
        let mut trade = Trade {
            internal_id: Uuid::new_v4().to_string(),
            exchange_order_id: None,
            ticker: signal.ticker.clone(),
            side: signal.direction.into(),
            order_type: OrderType::Limit,
            quantity: signal.recommended_quantity,
            limit_price: signal.recommended_price,
            status: TradeStatus::Pending,
            filled_quantity: 0,
            average_fill_price: None,
            cost: None,
            realized_pnl: None,
            strategy_name: signal.strategy_name.clone(),
            edge: signal.edge,
            confidence: signal.confidence,
            dry_run,
            created_at: now,
            submitted_at: None,
            filled_at: None,
            cancelled_at: None,
            notes: None,
        };

        if dry_run {
            // Paper path: no exchange mutation. The monitor simulates the
            // fill after a short queue delay.
            trade.submitted_at = Some(now);
            info!(
                ticker = %trade.ticker, side = ?trade.side, qty = trade.quantity,
                price = ?trade.limit_price, "[paper] trade created"
            );
            let mut st = self.state.lock();
            st.active.insert(trade.internal_id.clone(), trade.clone());
            drop(st);
            self.sync_open_count();
            self.risk.lock().record_trade(&trade, now);
            let _ = self.events.send(OperatorEvent::TradeExecuted(trade.clone()));
            return Some(trade);
        }

        let client_order_id = Uuid::new_v4().to_string();
        self.state.lock().submitted_client_ids.insert(client_order_id.clone());

        let request = match OrderRequest::limit_buy(
            &trade.ticker,
            trade.side,
            trade.quantity,
            price,
            &client_order_id,
        ) {
            Ok(r) => r,
            Err(e) => {
                trade.status = TradeStatus::Failed;
                trade.notes = Some(e.to_string());
                warn!(ticker = %trade.ticker, error = %e, "order failed validation");
                self.push_completed(trade.clone());
                return Some(trade);
            }
        };

        match self.client.place_order(&request).await {
            Ok(order) => {
                trade.exchange_order_id = Some(order.order_id.clone());
                trade.status = TradeStatus::Submitted;
                trade.submitted_at = Some(Utc::now());
                info!(
                    ticker = %trade.ticker, side = ?trade.side, qty = trade.quantity,
                    order_id = %order.order_id, edge = trade.edge, "signal executed"
                );
                let mut st = self.state.lock();
                st.active.insert(trade.internal_id.clone(), trade.clone());
                drop(st);
                self.sync_open_count();
                self.risk.lock().record_trade(&trade, Utc::now());
                let _ = self.events.send(OperatorEvent::TradeExecuted(trade.clone()));
                Some(trade)
            }
            Err(e) => {
                error!(ticker = %trade.ticker, error = %e, "signal execution failed");
                trade.status = TradeStatus::Failed;
                trade.notes = Some(e.to_string());
                self.push_completed(trade.clone());
                Some(trade)
            }
        }
    }

    // ─── Cancellation / amendment ───

    /// Cancel one resting order by internal id. Refuses terminal trades.
    pub async fn cancel(&self, internal_id: &str) -> bool {
        let trade = match self.state.lock().active.get(internal_id).cloned() {
            Some(t) => t,
            None => {
                warn!(internal_id, "cancel: not found in active orders");
                return false;
            }
        };

        if trade.status.is_terminal() {
            warn!(internal_id, status = ?trade.status, "cancel: trade already terminal");
            return false;
        }

        if !trade.dry_run {
            let order_id = match &trade.exchange_order_id {
                Some(id) => id.clone(),
                None => {
                    warn!(internal_id, "cancel: trade has no exchange order id");
                    return false;
                }
            };
            if let Err(e) = self.client.cancel_order(&order_id).await {
                error!(internal_id, error = %e, "cancel failed");
                return false;
            }
        }

        self.mark_cancelled(internal_id);
        info!(internal_id, "order cancelled");
        true
    }

    /// Cancel by exchange order id — used by the REST surface. Falls back to
    /// sending the cancel even when the order is not tracked locally.
    pub async fn cancel_by_exchange_id(&self, order_id: &str) -> bool {
        let internal = self
            .state
            .lock()
            .active
            .values()
            .find(|t| t.exchange_order_id.as_deref() == Some(order_id))
            .map(|t| t.internal_id.clone());
        match internal {
            Some(id) => self.cancel(&id).await,
            // Paper mode never reaches the exchange, even for untracked ids
            None if self.is_dry_run() => false,
            None => match self.client.cancel_order(order_id).await {
                Ok(_) => {
                    info!(order_id, "cancelled untracked order");
                    true
                }
                Err(e) => {
                    error!(order_id, error = %e, "cancel of untracked order failed");
                    false
                }
            },
        }
    }

    /// Batch-cancel every resting order in chunks of 20. Returns the count.
    pub async fn cancel_all(&self) -> usize {
        let (internal_ids, resting_ids, dry_run) = {
            let st = self.state.lock();
            let internal: Vec<String> = st.active.keys().cloned().collect();
            let resting: Vec<String> = st
                .active
                .values()
                .filter_map(|t| t.exchange_order_id.clone())
                .collect();
            (internal, resting, self.is_dry_run())
        };

        let mut cancelled = 0usize;
        if !dry_run {
            for chunk in resting_ids.chunks(BATCH_LIMIT) {
                match self.client.batch_cancel(chunk).await {
                    Ok(_) => cancelled += chunk.len(),
                    Err(e) => error!(error = %e, "batch cancel chunk failed"),
                }
            }
        }

        for id in &internal_ids {
            self.mark_cancelled(id);
        }
        if dry_run {
            cancelled = internal_ids.len();
        }
        info!(cancelled, "cancel_all complete");
        cancelled
    }

    /// Shrink a resting order. Exactly one of `reduce_by`/`reduce_to`;
    /// reduce_to = 0 is routed through cancel so local state matches.
    pub async fn decrease(
        &self,
        internal_id: &str,
        reduce_by: Option<u32>,
        reduce_to: Option<u32>,
    ) -> bool {
        if reduce_by.is_some() == reduce_to.is_some() {
            warn!(internal_id, "decrease: provide exactly one of reduce_by / reduce_to");
            return false;
        }
        if reduce_to == Some(0) {
            return self.cancel(internal_id).await;
        }

        let trade = match self.state.lock().active.get(internal_id).cloned() {
            Some(t) => t,
            None => return false,
        };
        let order_id = match (&trade.exchange_order_id, trade.dry_run) {
            (_, true) => {
                // Paper orders just shrink locally
                let mut st = self.state.lock();
                if let Some(t) = st.active.get_mut(internal_id) {
                    if let Some(to) = reduce_to {
                        t.quantity = to.min(t.quantity);
                    }
                    if let Some(by) = reduce_by {
                        t.quantity = t.quantity.saturating_sub(by);
                    }
                }
                return true;
            }
            (Some(id), false) => id.clone(),
            (None, false) => return false,
        };

        match self.client.decrease_order(&order_id, reduce_by, reduce_to).await {
            Ok(order) => {
                let mut st = self.state.lock();
                if let Some(t) = st.active.get_mut(internal_id) {
                    if let Some(remaining) = order.remaining_count {
                        t.quantity = t.filled_quantity + remaining;
                    }
                }
                info!(internal_id, "order decreased");
                true
            }
            Err(e) => {
                error!(internal_id, error = %e, "decrease failed");
                false
            }
        }
    }

    /// Amend price and/or quantity. The exchange cancels the old order and
    /// issues a NEW id; the trade keeps its internal id but re-points its
    /// exchange_order_id at the replacement.
    pub async fn amend(
        &self,
        internal_id: &str,
        new_price: Option<f64>,
        new_quantity: Option<u32>,
    ) -> Option<String> {
        let trade = self.state.lock().active.get(internal_id).cloned()?;

        if trade.dry_run {
            let mut st = self.state.lock();
            let t = st.active.get_mut(internal_id)?;
            if let Some(p) = new_price {
                t.limit_price = Some(p);
            }
            if let Some(q) = new_quantity {
                t.quantity = q;
            }
            return t.exchange_order_id.clone().or_else(|| Some(t.internal_id.clone()));
        }

        let order_id = trade.exchange_order_id.clone()?;
        let (yes_price, no_price) = match (new_price, trade.side) {
            (Some(p), TradeSide::Yes) => {
                (Some(crate::exchange::models::price_to_cents(p).ok()?), None)
            }
            (Some(p), TradeSide::No) => {
                (None, Some(crate::exchange::models::price_to_cents(p).ok()?))
            }
            (None, _) => (None, None),
        };
        let req = AmendRequest {
            ticker: trade.ticker.clone(),
            side: trade.side.as_str().to_string(),
            action: "buy".to_string(),
            yes_price,
            no_price,
            count: new_quantity,
        };

        match self.client.amend_order(&order_id, &req).await {
            Ok(resp) => {
                let new_id = resp.order.order_id;
                if new_id.is_empty() {
                    return None;
                }
                let mut st = self.state.lock();
                if let Some(t) = st.active.get_mut(internal_id) {
                    t.exchange_order_id = Some(new_id.clone());
                    if let Some(p) = new_price {
                        t.limit_price = Some(p);
                    }
                    if let Some(q) = new_quantity {
                        t.quantity = q;
                    }
                }
                info!(internal_id, old_order_id = %order_id, new_order_id = %new_id, "order amended");
                Some(new_id)
            }
            Err(e) => {
                error!(internal_id, error = %e, "amend failed");
                None
            }
        }
    }

    // ─── Monitor ───

    pub fn start_monitor(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mgr = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(MONITOR_TICK);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut tick: u32 = 0;
            while mgr.running.load(Ordering::SeqCst) {
                interval.tick().await;
                tick = tick.wrapping_add(1);
                mgr.monitor_tick(tick % FILLS_EVERY_N_TICKS == 0).await;
            }
        });
        *self.monitor.lock() = Some(handle);
        info!("order monitoring started");
    }

    pub async fn stop_monitor(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.monitor.lock().take();
        if let Some(h) = handle {
            h.abort();
            let _ = h.await;
        }
        info!("order monitoring stopped");
    }

    /// One monitor pass. Errors are logged and never kill the loop.
    pub async fn monitor_tick(&self, reconcile: bool) {
        if self.is_dry_run() {
            self.simulate_paper_fills();
            if reconcile {
                self.settle_paper_positions().await;
            }
        } else {
            self.poll_active_orders().await;
            if reconcile {
                self.reconcile_fills().await;
            }
        }
        self.sweep_stale_orders().await;
        self.sync_open_count();
    }

    /// Poll the exchange for each active order and apply transitions.
    async fn poll_active_orders(&self) {
        let targets: Vec<(String, String)> = self
            .state
            .lock()
            .active
            .values()
            .filter_map(|t| t.exchange_order_id.clone().map(|oid| (t.internal_id.clone(), oid)))
            .collect();

        for (internal_id, order_id) in targets {
            match self.client.get_order_status(&order_id).await {
                Ok(order) => {
                    let terminal = {
                        let mut st = self.state.lock();
                        match st.active.get_mut(&internal_id) {
                            Some(trade) => {
                                apply_order_status(trade, &order);
                                trade.status.is_terminal().then(|| trade.clone())
                            }
                            None => None,
                        }
                    };
                    if let Some(trade) = terminal {
                        self.risk.lock().record_trade(&trade, Utc::now());
                        self.move_to_completed(&internal_id);
                    }
                }
                Err(e) => error!(%order_id, error = %e, "status poll failed"),
            }
        }
    }

    /// Paper fills: after the simulated queue delay, PENDING dry-run trades
    /// fill in full at their limit price. P&L stays unset until settlement.
    fn simulate_paper_fills(&self) {
        let now = Utc::now();
        let filled: Vec<Trade> = {
            let mut st = self.state.lock();
            let mut done = Vec::new();
            for trade in st.active.values_mut() {
                if trade.status != TradeStatus::Pending || !trade.dry_run {
                    continue;
                }
                let age = (now - trade.submitted_at.unwrap_or(trade.created_at)).num_seconds();
                if age < PAPER_FILL_DELAY_SECS {
                    continue;
                }
                let fill_price = trade.limit_price.filter(|p| *p > 0.0).unwrap_or(0.5);
                trade.status = TradeStatus::Filled;
                trade.filled_at = Some(now);
                trade.filled_quantity = trade.quantity;
                trade.average_fill_price = Some(fill_price);
                trade.cost = Some(trade.quantity as f64 * fill_price);
                trade.realized_pnl = None;
                info!(
                    ticker = %trade.ticker, side = ?trade.side,
                    qty = trade.filled_quantity, price = fill_price,
                    "[paper] simulated fill"
                );
                done.push(trade.clone());
            }
            done
        };

        for trade in filled {
            self.risk.lock().record_trade(&trade, now);
            self.move_to_completed(&trade.internal_id);
            let _ = self.events.send(OperatorEvent::TradeExecuted(trade));
        }
    }

    /// Paper settlement: read-only market fetches are always safe. A market
    /// that has closed with its YES price pinned at an extreme has resolved;
    /// book the settlement P&L and close the position.
    async fn settle_paper_positions(&self) {
        let open: Vec<(String, TradeSide, u32, f64)> = self
            .risk
            .lock()
            .positions
            .values()
            .map(|p| (p.ticker.clone(), p.side, p.quantity, p.average_entry_price))
            .collect();

        for (ticker, side, qty, entry) in open {
            match self.client.get_market(&ticker).await {
                Ok(market) => {
                    if !matches!(market.status, MarketStatus::Closed | MarketStatus::Settled) {
                        continue;
                    }
                    let yes_price = match market.yes_price {
                        Some(p) => p,
                        None => continue,
                    };
                    let resolved_yes = if yes_price >= 0.99 {
                        true
                    } else if yes_price <= 0.01 {
                        false
                    } else {
                        continue; // still mid-settlement
                    };

                    let qty_f = qty as f64;
                    let won = match side {
                        TradeSide::Yes => resolved_yes,
                        TradeSide::No => !resolved_yes,
                    };
                    let pnl = if won { (1.0 - entry) * qty_f } else { -entry * qty_f };

                    self.risk.lock().close_position(&ticker, pnl, Utc::now());
                    let outcome = if resolved_yes { "YES" } else { "NO" };
                    info!(%ticker, outcome, pnl, "[paper] position settled");
                    let _ = self.events.send(OperatorEvent::Alert {
                        alert_type: "settlement".into(),
                        message: format!("{} resolved {} for P&L ${:+.2}", ticker, outcome, pnl),
                        level: if pnl >= 0.0 { "info".into() } else { "warning".into() },
                    });
                }
                Err(e) => error!(%ticker, error = %e, "paper settlement check failed"),
            }
        }
    }

    /// Catch fills the status poll missed by walking /fills since the last
    /// watermark. Never downgrades — only SUBMITTED→FILLED.
    async fn reconcile_fills(&self) {
        let now_ts = Utc::now().timestamp();
        let min_ts = {
            let st = self.state.lock();
            if st.last_fills_ts > 0 { st.last_fills_ts } else { now_ts - 300 }
        };

        let fills = match self.client.get_fills(None, None, Some(min_ts), 200, None).await {
            Ok(resp) => resp.fills,
            Err(e) => {
                error!(error = %e, "fill reconciliation failed");
                return;
            }
        };

        let mut reconciled = Vec::new();
        {
            let mut st = self.state.lock();
            for fill in &fills {
                if fill.order_id.is_empty() {
                    continue;
                }
                let trade = st
                    .active
                    .values_mut()
                    .find(|t| t.exchange_order_id.as_deref() == Some(fill.order_id.as_str()));
                if let Some(trade) = trade {
                    if trade.status == TradeStatus::Filled {
                        continue;
                    }
                    trade.status = TradeStatus::Filled;
                    trade.filled_at = Some(Utc::now());
                    trade.filled_quantity = fill.count.min(trade.quantity);
                    trade.average_fill_price = Some(fill.price_for_side(trade.side));
                    trade.cost = trade
                        .average_fill_price
                        .map(|p| trade.filled_quantity as f64 * p);
                    info!(order_id = %fill.order_id, qty = fill.count, "fill reconciled");
                    reconciled.push(trade.clone());
                }
            }
            st.last_fills_ts = now_ts;
        }

        for trade in reconciled {
            self.risk.lock().record_trade(&trade, Utc::now());
            self.move_to_completed(&trade.internal_id);
        }
    }

    /// Cancel resting orders older than one full market window.
    async fn sweep_stale_orders(&self) {
        let now = Utc::now();
        let stale: Vec<String> = self
            .state
            .lock()
            .active
            .values()
            .filter(|t| {
                t.status == TradeStatus::Submitted
                    && (now - t.submitted_at.unwrap_or(t.created_at)).num_seconds()
                        > STALE_ORDER_SECS
            })
            .map(|t| t.internal_id.clone())
            .collect();

        for internal_id in stale {
            warn!(%internal_id, "auto-cancelling stale order");
            self.cancel(&internal_id).await;
        }
    }

    // ─── Bookkeeping ───

    fn mark_cancelled(&self, internal_id: &str) {
        {
            let mut st = self.state.lock();
            if let Some(t) = st.active.get_mut(internal_id) {
                t.status = TradeStatus::Cancelled;
                t.cancelled_at = Some(Utc::now());
            }
        }
        self.move_to_completed(internal_id);
    }

    fn move_to_completed(&self, internal_id: &str) {
        let mut st = self.state.lock();
        if let Some(trade) = st.active.remove(internal_id) {
            st.completed.push(trade);
            let excess = st.completed.len().saturating_sub(500);
            if excess > 0 {
                st.completed.drain(..excess);
            }
        }
        drop(st);
        self.sync_open_count();
    }

    fn push_completed(&self, trade: Trade) {
        let mut st = self.state.lock();
        st.completed.push(trade);
        let excess = st.completed.len().saturating_sub(500);
        if excess > 0 {
            st.completed.drain(..excess);
        }
    }

    fn sync_open_count(&self) {
        let count = self.state.lock().active.len();
        self.risk.lock().set_open_orders_count(count);
    }

    // ─── Accessors ───

    pub fn active_trades(&self) -> Vec<Trade> {
        self.state.lock().active.values().cloned().collect()
    }

    pub fn completed_trades(&self, limit: usize) -> Vec<Trade> {
        let st = self.state.lock();
        let mut trades: Vec<Trade> = st.completed.clone();
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        trades.truncate(limit);
        trades
    }

    pub fn find_active(&self, internal_id: &str) -> Option<Trade> {
        self.state.lock().active.get(internal_id).cloned()
    }

    pub fn summary(&self) -> OrderSummary {
        let st = self.state.lock();
        let count = |s: TradeStatus| st.completed.iter().filter(|t| t.status == s).count();
        OrderSummary {
            active_count: st.active.len(),
            completed_count: st.completed.len(),
            filled_count: count(TradeStatus::Filled),
            cancelled_count: count(TradeStatus::Cancelled),
            failed_count: count(TradeStatus::Failed),
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate_active(&self, internal_id: &str, secs: i64) {
        let mut st = self.state.lock();
        if let Some(t) = st.active.get_mut(internal_id) {
            let shifted = t.created_at - chrono::Duration::seconds(secs);
            t.created_at = shifted;
            t.submitted_at = t.submitted_at.map(|s| s - chrono::Duration::seconds(secs));
        }
    }
}

/// Map an exchange order snapshot onto a local trade.
///
/// "executed" is terminal-filled; "resting" keeps the trade SUBMITTED;
/// "canceled" (their spelling) is terminal-cancelled. A trade already in a
/// terminal state never transitions again, FILLED in particular is never
/// downgraded by a late "resting" snapshot.
fn apply_order_status(trade: &mut Trade, order: &WireOrder) {
    if trade.status.is_terminal() {
        return;
    }
    match order.status.to_lowercase().as_str() {
        "resting" => trade.status = TradeStatus::Submitted,
        "executed" => {
            trade.status = TradeStatus::Filled;
            trade.filled_at = Some(Utc::now());
        }
        "canceled" => {
            trade.status = TradeStatus::Cancelled;
            trade.cancelled_at = Some(Utc::now());
        }
        "rejected" => {
            trade.status = TradeStatus::Rejected;
        }
        _ => {}
    }

    if let Some(count) = order.fill_count {
        if count > 0 {
            trade.filled_quantity = count.min(trade.quantity);
        }
    }
    if let Some(avg) = order.average_fill_price() {
        trade.average_fill_price = Some(avg);
    }
    if trade.filled_quantity > 0 {
        if let Some(avg) = trade.average_fill_price {
            trade.cost = Some(trade.filled_quantity as f64 * avg);
        }
    }
}
