//! Per-symbol order book
//!
//! Owns matching, resting, cancellation, modification, and expiry for one
//! symbol, plus every depth and history query. Orders are shared between
//! the id index and (while resting) exactly one price level; all fill-state
//! mutation happens while the ladder lock is held for writing.
//!
//! Lock discipline: `ladders` is taken before any order lock, and neither
//! the id index nor the trade history is ever held while waiting on the
//! other. Event sinks run synchronously under the ladder write lock and
//! must not call back into the book.
//!
//! Semantics worth knowing at the API boundary:
//! - Trades execute at the maker's price.
//! - Stop orders trigger against top-of-book (best ask for buy stops, best
//!   bid for sell stops), not against the last trade price.
//! - `modify_order` preserves time priority only for a same-price quantity
//!   reduction; any other change cancels and re-adds, forfeiting priority.
//! - Fill-or-kill is strict: a pre-scan kills unfillable orders with zero
//!   side effects.

pub mod ladder;
pub mod price_level;

use crate::events::{OrderUpdateSink, TradeSink};
use crate::matching;
use parking_lot::RwLock;
use self::ladder::Ladder;
use self::price_level::LevelSnapshot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use types::errors::validate_order;
use types::ids::{OrderId, Symbol, UserId};
use types::order::{Order, OrderStatus, OrderType, Side, TimeInForce};
use types::trade::Trade;
use types::units::{now_nanos, now_secs, Price, Quantity};

/// An order shared between the book's id index and its price level.
pub type SharedOrder = Arc<RwLock<Order>>;

/// Both sides of the book, guarded together so no operation can observe a
/// crossed state.
#[derive(Debug)]
struct Ladders {
    bids: Ladder,
    asks: Ladder,
}

impl Ladders {
    fn new() -> Self {
        Self {
            bids: Ladder::new(Side::Buy),
            asks: Ladder::new(Side::Sell),
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Ladder {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn opposing(&self, side: Side) -> &Ladder {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    fn opposing_mut(&mut self, side: Side) -> &mut Ladder {
        match side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        }
    }
}

/// Order book for a single symbol.
pub struct OrderBook {
    symbol: Symbol,
    ladders: RwLock<Ladders>,
    orders: RwLock<HashMap<OrderId, SharedOrder>>,
    trade_history: RwLock<Vec<Trade>>,
    /// Cumulative count of accepted orders (survives cancels; reset by clear).
    total_orders: AtomicU64,
    total_trades: AtomicU64,
    total_volume: AtomicU64,
    trade_sink: RwLock<Option<TradeSink>>,
    order_update_sink: RwLock<Option<OrderUpdateSink>>,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            ladders: RwLock::new(Ladders::new()),
            orders: RwLock::new(HashMap::new()),
            trade_history: RwLock::new(Vec::new()),
            total_orders: AtomicU64::new(0),
            total_trades: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
            trade_sink: RwLock::new(None),
            order_update_sink: RwLock::new(None),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Install the trade sink. Called once per trade, after book counters
    /// are updated.
    pub fn set_trade_sink(&self, sink: TradeSink) {
        *self.trade_sink.write() = Some(sink);
    }

    /// Install the order-update sink. Called with a snapshot on every
    /// order-state transition.
    pub fn set_order_update_sink(&self, sink: OrderUpdateSink) {
        *self.order_update_sink.write() = Some(sink);
    }

    /// Accept an order: validate, match against the opposing side, apply
    /// time-in-force, and rest any remainder the type allows. Returns the
    /// trades produced, in matching order (best price first, FIFO within a
    /// level).
    ///
    /// Invalid quantity or price, and stop orders with no reference price,
    /// mark the order `Rejected` with no book side effects; the only event
    /// is the order update carrying the terminal status.
    pub fn add_order(&self, mut order: Order) -> Vec<Trade> {
        if let Err(reason) = validate_order(&order) {
            order.status = OrderStatus::Rejected;
            debug!(order_id = %order.id, symbol = %self.symbol, %reason, "order rejected");
            self.emit_order_update(&order);
            return Vec::new();
        }

        let mut ladders = self.ladders.write();

        // Stop types arm against the opposing top of book; without an
        // observable reference the order is rejected before it touches any
        // book state.
        let stop_triggered = match order.order_type {
            OrderType::Stop | OrderType::StopLimit => {
                let reference = match order.side {
                    Side::Buy => ladders.asks.best_price(),
                    Side::Sell => ladders.bids.best_price(),
                };
                match reference {
                    None => {
                        drop(ladders);
                        order.status = OrderStatus::Rejected;
                        debug!(
                            order_id = %order.id,
                            symbol = %self.symbol,
                            "stop order rejected: no reference price"
                        );
                        self.emit_order_update(&order);
                        return Vec::new();
                    }
                    Some(reference) => {
                        matching::stop_triggered(order.side, order.stop_price, reference)
                    }
                }
            }
            _ => false,
        };

        let order_id = order.id.clone();
        let shared: SharedOrder = Arc::new(RwLock::new(order));
        self.orders.write().insert(order_id, Arc::clone(&shared));
        self.total_orders.fetch_add(1, Ordering::Relaxed);

        let trades = self.process(&mut ladders, &shared, stop_triggered);
        if !trades.is_empty() {
            self.trade_history.write().extend(trades.iter().cloned());
        }
        drop(ladders);

        let snapshot = shared.read().clone();
        self.emit_order_update(&snapshot);
        trades
    }

    /// Dispatch an accepted order by type. The ladder write lock is held
    /// for the whole pass so the book can never be observed crossed.
    fn process(
        &self,
        ladders: &mut Ladders,
        shared: &SharedOrder,
        stop_triggered: bool,
    ) -> Vec<Trade> {
        let mut taker = shared.write();
        match taker.order_type {
            OrderType::Market => self.execute_market(ladders, &mut taker),
            OrderType::Limit => self.execute_limit(ladders, shared, &mut taker),
            OrderType::Stop => {
                if stop_triggered {
                    taker.order_type = OrderType::Market;
                    self.execute_market(ladders, &mut taker)
                } else {
                    // Parked: stays New off the ladder, never re-armed.
                    Vec::new()
                }
            }
            OrderType::StopLimit => {
                if stop_triggered {
                    taker.order_type = OrderType::Limit;
                    self.execute_limit(ladders, shared, &mut taker)
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn execute_market(&self, ladders: &mut Ladders, taker: &mut Order) -> Vec<Trade> {
        if taker.tif == TimeInForce::Fok {
            let fillable = matching::fillable_quantity(
                ladders.opposing(taker.side),
                taker.side,
                None,
                taker.quantity,
            );
            if fillable < taker.quantity {
                taker.status = OrderStatus::Cancelled;
                debug!(order_id = %taker.id, "fill-or-kill killed: insufficient liquidity");
                return Vec::new();
            }
        }

        let trades = self.match_incoming(ladders, taker, None);
        if !taker.is_filled() {
            // Market orders never rest; a zero-fill order could not execute
            // at all, a partial one has its remainder discarded.
            taker.status = if taker.has_fills() {
                OrderStatus::Cancelled
            } else {
                OrderStatus::Rejected
            };
        }
        trades
    }

    fn execute_limit(
        &self,
        ladders: &mut Ladders,
        shared: &SharedOrder,
        taker: &mut Order,
    ) -> Vec<Trade> {
        if taker.tif == TimeInForce::Fok {
            let fillable = matching::fillable_quantity(
                ladders.opposing(taker.side),
                taker.side,
                Some(taker.price),
                taker.quantity,
            );
            if fillable < taker.quantity {
                taker.status = OrderStatus::Cancelled;
                debug!(order_id = %taker.id, "fill-or-kill killed: insufficient liquidity");
                return Vec::new();
            }
        }

        let limit = Some(taker.price);
        let trades = self.match_incoming(ladders, taker, limit);

        if !taker.is_filled() {
            match taker.tif {
                TimeInForce::Gtc => {
                    ladders.side_mut(taker.side).insert(
                        taker.id.clone(),
                        Arc::clone(shared),
                        taker.price,
                        taker.remaining(),
                    );
                }
                // The pre-scan makes the Fok arm unreachable; kept total.
                TimeInForce::Ioc | TimeInForce::Fok => {
                    taker.status = OrderStatus::Cancelled;
                }
            }
        }
        trades
    }

    /// Walk the opposing side best-price-first, FIFO within each level,
    /// emitting one trade per maker at the maker's price.
    fn match_incoming(
        &self,
        ladders: &mut Ladders,
        taker: &mut Order,
        limit_price: Option<Price>,
    ) -> Vec<Trade> {
        let mut trades = Vec::new();
        let opposing = ladders.opposing_mut(taker.side);

        while taker.remaining() > 0 {
            let Some(best_price) = opposing.best_price() else {
                break;
            };
            if !matching::crosses(taker.side, limit_price, best_price) {
                break;
            }

            let emptied = {
                let Some(level) = opposing.level_mut(best_price) else {
                    break;
                };
                while taker.remaining() > 0 {
                    let Some(maker) = level.front() else {
                        break;
                    };
                    let mut maker_guard = maker.write();

                    let trade_qty = taker.remaining().min(maker_guard.remaining());
                    debug_assert!(trade_qty > 0, "resting order with nothing remaining");

                    let (buy_order_id, sell_order_id) = match taker.side {
                        Side::Buy => (taker.id.clone(), maker_guard.id.clone()),
                        Side::Sell => (maker_guard.id.clone(), taker.id.clone()),
                    };
                    let trade = Trade::new(
                        buy_order_id,
                        sell_order_id,
                        self.symbol.clone(),
                        best_price,
                        trade_qty,
                        now_nanos(),
                    );

                    taker.fill(trade_qty);
                    maker_guard.fill(trade_qty);
                    level.reduce(trade_qty);

                    self.total_trades.fetch_add(1, Ordering::Relaxed);
                    self.total_volume.fetch_add(trade_qty, Ordering::Relaxed);

                    let maker_snapshot = maker_guard.clone();
                    drop(maker_guard);
                    if maker_snapshot.is_filled() {
                        level.pop_front();
                    }

                    self.emit_trade(&trade);
                    self.emit_order_update(&maker_snapshot);
                    trades.push(trade);
                }
                level.is_empty()
            };
            if emptied {
                opposing.remove_level(best_price);
            }
        }
        trades
    }

    /// Cancel a live order. Returns true iff the order existed with a
    /// non-terminal status; repeated cancels of the same id return false
    /// and change nothing.
    pub fn cancel_order(&self, order_id: &OrderId) -> bool {
        let Some(shared) = self.orders.read().get(order_id).cloned() else {
            debug!(order_id = %order_id, symbol = %self.symbol, "cancel: order not found");
            return false;
        };

        let snapshot = {
            let mut ladders = self.ladders.write();
            let mut order = shared.write();
            if order.status.is_terminal() {
                debug!(order_id = %order_id, status = ?order.status, "cancel: already terminal");
                return false;
            }
            order.status = OrderStatus::Cancelled;
            let snapshot = order.clone();
            drop(order);
            if snapshot.price > 0 {
                // No-op for orders that never rested (parked stops).
                ladders.side_mut(snapshot.side).remove(order_id, snapshot.price);
            }
            snapshot
        };

        self.orders.write().remove(order_id);
        debug!(order_id = %order_id, symbol = %self.symbol, "order cancelled");
        self.emit_order_update(&snapshot);
        true
    }

    /// Modify a live order's price and quantity.
    ///
    /// A same-price reduction that stays above the filled amount mutates in
    /// place and keeps the order's FIFO slot; anything else cancels and
    /// re-adds under the same id and user, forfeiting time priority (and
    /// possibly matching immediately at the new price).
    pub fn modify_order(&self, order_id: &OrderId, new_price: Price, new_quantity: Quantity) -> bool {
        let Some(shared) = self.orders.read().get(order_id).cloned() else {
            return false;
        };

        enum Outcome {
            InPlace(Order),
            Reinstate(Order),
        }

        let outcome = {
            let mut ladders = self.ladders.write();
            let mut order = shared.write();
            if order.status.is_terminal() {
                return false;
            }
            let in_place = new_price == order.price
                && new_quantity <= order.quantity
                && new_quantity > order.filled_quantity;
            if in_place {
                let delta = order.quantity - new_quantity;
                order.quantity = new_quantity;
                if delta > 0 {
                    let (side, price, id) = (order.side, order.price, order.id.clone());
                    ladders.side_mut(side).reduce_order(&id, price, delta);
                }
                Outcome::InPlace(order.clone())
            } else {
                Outcome::Reinstate(order.clone())
            }
        };

        match outcome {
            Outcome::InPlace(snapshot) => {
                debug!(order_id = %order_id, quantity = new_quantity, "order modified in place");
                self.emit_order_update(&snapshot);
                true
            }
            Outcome::Reinstate(old) => {
                self.cancel_order(order_id);
                let replacement = Order {
                    id: old.id,
                    symbol: old.symbol,
                    side: old.side,
                    order_type: old.order_type,
                    price: new_price,
                    stop_price: old.stop_price,
                    quantity: new_quantity,
                    filled_quantity: 0,
                    status: OrderStatus::New,
                    user_id: old.user_id,
                    timestamp: now_nanos(),
                    expiry: old.expiry,
                    tif: old.tif,
                };
                debug!(
                    order_id = %order_id,
                    price = new_price,
                    quantity = new_quantity,
                    "order modified via cancel and re-add"
                );
                self.add_order(replacement);
                true
            }
        }
    }

    /// Cancel every order whose expiry has passed and which has not traded
    /// yet. Returns the ids actually cancelled.
    pub fn cancel_expired_orders(&self) -> Vec<OrderId> {
        let now = now_secs();
        let expired: Vec<OrderId> = self
            .orders
            .read()
            .values()
            .filter_map(|shared| {
                let order = shared.read();
                (order.status == OrderStatus::New && order.is_expired(now))
                    .then(|| order.id.clone())
            })
            .collect();

        let mut cancelled = Vec::new();
        for order_id in expired {
            if self.cancel_order(&order_id) {
                cancelled.push(order_id);
            }
        }
        if !cancelled.is_empty() {
            debug!(symbol = %self.symbol, count = cancelled.len(), "expired orders cancelled");
        }
        cancelled
    }

    /// Reset all state to empty, including counters.
    pub fn clear(&self) {
        {
            let mut ladders = self.ladders.write();
            ladders.bids.clear();
            ladders.asks.clear();
        }
        self.orders.write().clear();
        self.trade_history.write().clear();
        self.total_orders.store(0, Ordering::Relaxed);
        self.total_trades.store(0, Ordering::Relaxed);
        self.total_volume.store(0, Ordering::Relaxed);
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Best bid price, or 0 with no bids.
    pub fn best_bid(&self) -> Price {
        self.ladders.read().bids.best_price().unwrap_or(0)
    }

    /// Best ask price, or 0 with no asks.
    pub fn best_ask(&self) -> Price {
        self.ladders.read().asks.best_price().unwrap_or(0)
    }

    /// `best_ask − best_bid`, or 0 when either side is empty.
    pub fn spread(&self) -> Price {
        let ladders = self.ladders.read();
        match (ladders.bids.best_price(), ladders.asks.best_price()) {
            (Some(bid), Some(ask)) => ask - bid,
            _ => 0,
        }
    }

    /// Top `depth` bid levels, highest price first.
    pub fn bid_levels(&self, depth: usize) -> Vec<LevelSnapshot> {
        self.ladders.read().bids.top_levels(depth)
    }

    /// Top `depth` ask levels, lowest price first.
    pub fn ask_levels(&self, depth: usize) -> Vec<LevelSnapshot> {
        self.ladders.read().asks.top_levels(depth)
    }

    /// Total resting bid quantity at prices `>= price`.
    pub fn bid_depth(&self, price: Price) -> Quantity {
        self.ladders.read().bids.depth_at_or_better(price)
    }

    /// Total resting ask quantity at prices `<= price`.
    pub fn ask_depth(&self, price: Price) -> Quantity {
        self.ladders.read().asks.depth_at_or_better(price)
    }

    /// Snapshot of an order the book still tracks.
    pub fn get_order(&self, order_id: &OrderId) -> Option<Order> {
        self.orders
            .read()
            .get(order_id)
            .map(|shared| shared.read().clone())
    }

    /// Snapshots of every non-terminal order, parked stops included.
    pub fn get_open_orders(&self) -> Vec<Order> {
        self.orders
            .read()
            .values()
            .filter_map(|shared| {
                let order = shared.read();
                (!order.status.is_terminal()).then(|| order.clone())
            })
            .collect()
    }

    /// Non-terminal orders belonging to `user_id`.
    pub fn get_user_orders(&self, user_id: &UserId) -> Vec<Order> {
        self.orders
            .read()
            .values()
            .filter_map(|shared| {
                let order = shared.read();
                (!order.status.is_terminal() && order.user_id == *user_id)
                    .then(|| order.clone())
            })
            .collect()
    }

    /// Trades in which `user_id` was buyer or seller, resolved through the
    /// id index; trades whose orders have been retired are not attributed.
    pub fn get_user_trades(&self, user_id: &UserId) -> Vec<Trade> {
        let history = self.trade_history.read().clone();
        let orders = self.orders.read();
        let belongs = |order_id: &OrderId| {
            orders
                .get(order_id)
                .map(|shared| shared.read().user_id == *user_id)
                .unwrap_or(false)
        };
        history
            .into_iter()
            .filter(|trade| belongs(&trade.buy_order_id) || belongs(&trade.sell_order_id))
            .collect()
    }

    /// Chronological trade log of this book.
    pub fn get_trade_history(&self) -> Vec<Trade> {
        self.trade_history.read().clone()
    }

    /// Number of orders the book still tracks (open and add-path terminal).
    pub fn order_count(&self) -> usize {
        self.orders.read().len()
    }

    /// True when nothing rests on either side.
    pub fn is_empty(&self) -> bool {
        let ladders = self.ladders.read();
        ladders.bids.is_empty() && ladders.asks.is_empty()
    }

    pub fn total_orders(&self) -> u64 {
        self.total_orders.load(Ordering::Relaxed)
    }

    pub fn total_trades(&self) -> u64 {
        self.total_trades.load(Ordering::Relaxed)
    }

    pub fn total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    // ── Activity metrics ────────────────────────────────────────────────

    /// Mean ask−bid gap across the top `depth` paired levels.
    pub fn average_spread(&self, depth: usize) -> f64 {
        let ladders = self.ladders.read();
        let bids = ladders.bids.top_prices(depth);
        let asks = ladders.asks.top_prices(depth);
        let pairs = bids.len().min(asks.len());
        if pairs == 0 {
            return 0.0;
        }
        let total: f64 = (0..pairs)
            .map(|i| asks[i] as f64 - bids[i] as f64)
            .sum();
        total / pairs as f64
    }

    /// Accepted orders per executed trade; 0.0 before the first trade.
    pub fn order_to_trade_ratio(&self) -> f64 {
        let trades = self.total_trades.load(Ordering::Relaxed);
        if trades == 0 {
            return 0.0;
        }
        self.total_orders.load(Ordering::Relaxed) as f64 / trades as f64
    }

    /// Share of accepted orders that have left the book through cancel or
    /// expiry.
    pub fn cancellation_rate(&self) -> f64 {
        let accepted = self.total_orders.load(Ordering::Relaxed);
        if accepted == 0 {
            return 0.0;
        }
        let tracked = self.order_count() as u64;
        accepted.saturating_sub(tracked) as f64 / accepted as f64
    }

    // ── Event emission ──────────────────────────────────────────────────

    fn emit_trade(&self, trade: &Trade) {
        let sink = self.trade_sink.read().clone();
        if let Some(sink) = sink {
            sink(trade);
        }
    }

    fn emit_order_update(&self, order: &Order) {
        let sink = self.order_update_sink.read().clone();
        if let Some(sink) = sink {
            sink(order);
        }
    }
}
