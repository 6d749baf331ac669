//! Multi-symbol matching engine
//!
//! Routes every operation to the owning per-symbol book, maintains the
//! global id→symbol map, aggregates statistics, and re-emits trade and
//! order-update events to the installed subscribers.
//!
//! Books are created lazily on the first order for a symbol. Each book gets
//! callbacks that bump the engine counters and append to the engine trade
//! log before the external sinks run, so a subscriber reading `get_stats`
//! inside a callback sees a consistent view. Callbacks run on the calling
//! thread and must not call back into the engine.

use crate::book::price_level::LevelSnapshot;
use crate::book::OrderBook;
use crate::events::{OrderUpdateSink, TradeSink};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use types::ids::{OrderId, Symbol, UserId};
use types::order::Order;
use types::trade::Trade;
use types::units::{Price, Quantity};

/// Engine activity counters.
///
/// `total_orders` is the number of orders the engine currently tracks
/// (successful cancels and expiries decrement it, floored at zero);
/// `total_trades` and `total_volume` are cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_orders: u64,
    pub total_trades: u64,
    pub total_volume: u64,
}

#[derive(Default)]
struct EngineCounters {
    total_orders: AtomicU64,
    total_trades: AtomicU64,
    total_volume: AtomicU64,
}

impl EngineCounters {
    fn decrement_orders(&self) {
        // Floor at zero; replay hosts may cancel ids the engine never saw.
        let _ = self
            .total_orders
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

#[derive(Default)]
struct EventSinks {
    on_trade: RwLock<Option<TradeSink>>,
    on_order_update: RwLock<Option<OrderUpdateSink>>,
}

#[derive(Default)]
struct EngineInner {
    books: HashMap<Symbol, Arc<OrderBook>>,
    order_id_to_symbol: HashMap<OrderId, Symbol>,
}

/// Orchestrator across symbols.
pub struct MatchingEngine {
    inner: RwLock<EngineInner>,
    counters: Arc<EngineCounters>,
    trade_log: Arc<RwLock<Vec<Trade>>>,
    sinks: Arc<EventSinks>,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(EngineInner::default()),
            counters: Arc::new(EngineCounters::default()),
            trade_log: Arc::new(RwLock::new(Vec::new())),
            sinks: Arc::new(EventSinks::default()),
        }
    }

    /// Subscribe to executed trades. The sink receives a value copy after
    /// engine statistics and the trade log are updated.
    pub fn set_on_trade<F>(&self, sink: F)
    where
        F: Fn(&Trade) + Send + Sync + 'static,
    {
        *self.sinks.on_trade.write() = Some(Arc::new(sink));
    }

    /// Subscribe to order-state snapshots.
    pub fn set_on_order_update<F>(&self, sink: F)
    where
        F: Fn(&Order) + Send + Sync + 'static,
    {
        *self.sinks.on_order_update.write() = Some(Arc::new(sink));
    }

    /// Get or lazily create the book for `symbol`, wiring its callbacks
    /// into the engine on creation.
    fn book_for(&self, symbol: &Symbol) -> Arc<OrderBook> {
        if let Some(book) = self.inner.read().books.get(symbol) {
            return Arc::clone(book);
        }

        let mut inner = self.inner.write();
        let book = inner.books.entry(symbol.clone()).or_insert_with(|| {
            debug!(symbol = %symbol, "creating order book");
            let book = Arc::new(OrderBook::new(symbol.clone()));

            let counters = Arc::clone(&self.counters);
            let trade_log = Arc::clone(&self.trade_log);
            let sinks = Arc::clone(&self.sinks);
            book.set_trade_sink(Arc::new(move |trade: &Trade| {
                counters.total_trades.fetch_add(1, Ordering::Relaxed);
                counters.total_volume.fetch_add(trade.quantity, Ordering::Relaxed);
                trade_log.write().push(trade.clone());
                let sink = sinks.on_trade.read().clone();
                if let Some(sink) = sink {
                    sink(trade);
                }
            }));

            let sinks = Arc::clone(&self.sinks);
            book.set_order_update_sink(Arc::new(move |order: &Order| {
                let sink = sinks.on_order_update.read().clone();
                if let Some(sink) = sink {
                    sink(order);
                }
            }));

            book
        });
        Arc::clone(book)
    }

    fn book_for_order(&self, order_id: &OrderId) -> Option<Arc<OrderBook>> {
        let inner = self.inner.read();
        let symbol = inner.order_id_to_symbol.get(order_id)?;
        inner.books.get(symbol).map(Arc::clone)
    }

    fn book_for_symbol(&self, symbol: &Symbol) -> Option<Arc<OrderBook>> {
        self.inner.read().books.get(symbol).map(Arc::clone)
    }

    fn all_books(&self) -> Vec<Arc<OrderBook>> {
        self.inner.read().books.values().map(Arc::clone).collect()
    }

    /// Submit an order; its symbol selects (and lazily creates) the book.
    /// Returns the trades the order produced.
    pub fn add_order(&self, order: Order) -> Vec<Trade> {
        let symbol = order.symbol.clone();
        let order_id = order.id.clone();
        let book = self.book_for(&symbol);
        let trades = book.add_order(order);

        // Track the order only if the book retained it; validation rejects
        // leave no engine-side trace.
        if book.get_order(&order_id).is_some() {
            self.inner.write().order_id_to_symbol.insert(order_id, symbol);
            self.counters.total_orders.fetch_add(1, Ordering::Relaxed);
        }
        trades
    }

    /// Cancel an order anywhere in the engine. Returns true iff the owning
    /// book cancelled it.
    pub fn cancel_order(&self, order_id: &OrderId) -> bool {
        let Some(book) = self.book_for_order(order_id) else {
            debug!(order_id = %order_id, "cancel: unknown order id");
            return false;
        };
        let cancelled = book.cancel_order(order_id);
        if cancelled {
            self.inner.write().order_id_to_symbol.remove(order_id);
            self.counters.decrement_orders();
        }
        cancelled
    }

    /// Modify an order anywhere in the engine; see
    /// [`OrderBook::modify_order`] for the priority rules.
    pub fn modify_order(&self, order_id: &OrderId, new_price: Price, new_quantity: Quantity) -> bool {
        match self.book_for_order(order_id) {
            Some(book) => book.modify_order(order_id, new_price, new_quantity),
            None => false,
        }
    }

    /// Snapshot of an order the engine still tracks.
    pub fn get_order(&self, order_id: &OrderId) -> Option<Order> {
        self.book_for_order(order_id)?.get_order(order_id)
    }

    /// Best bid for `symbol`, or 0.
    pub fn get_best_bid(&self, symbol: &Symbol) -> Price {
        self.book_for_symbol(symbol).map_or(0, |b| b.best_bid())
    }

    /// Best ask for `symbol`, or 0.
    pub fn get_best_ask(&self, symbol: &Symbol) -> Price {
        self.book_for_symbol(symbol).map_or(0, |b| b.best_ask())
    }

    /// Spread for `symbol`, or 0 when either side is empty.
    pub fn get_spread(&self, symbol: &Symbol) -> Price {
        self.book_for_symbol(symbol).map_or(0, |b| b.spread())
    }

    /// Top bid levels for `symbol`, highest price first.
    pub fn get_bid_levels(&self, symbol: &Symbol, depth: usize) -> Vec<LevelSnapshot> {
        self.book_for_symbol(symbol)
            .map_or_else(Vec::new, |b| b.bid_levels(depth))
    }

    /// Top ask levels for `symbol`, lowest price first.
    pub fn get_ask_levels(&self, symbol: &Symbol, depth: usize) -> Vec<LevelSnapshot> {
        self.book_for_symbol(symbol)
            .map_or_else(Vec::new, |b| b.ask_levels(depth))
    }

    /// Resting bid quantity at prices `>= price`.
    pub fn get_bid_depth(&self, symbol: &Symbol, price: Price) -> Quantity {
        self.book_for_symbol(symbol).map_or(0, |b| b.bid_depth(price))
    }

    /// Resting ask quantity at prices `<= price`.
    pub fn get_ask_depth(&self, symbol: &Symbol, price: Price) -> Quantity {
        self.book_for_symbol(symbol).map_or(0, |b| b.ask_depth(price))
    }

    /// Number of orders the engine currently tracks.
    pub fn get_order_count(&self) -> u64 {
        self.counters.total_orders.load(Ordering::Relaxed)
    }

    /// Non-terminal orders across every book.
    pub fn get_all_orders(&self) -> Vec<Order> {
        self.all_books()
            .iter()
            .flat_map(|book| book.get_open_orders())
            .collect()
    }

    /// Non-terminal orders for `user_id` across every book.
    pub fn get_user_orders(&self, user_id: &UserId) -> Vec<Order> {
        self.all_books()
            .iter()
            .flat_map(|book| book.get_user_orders(user_id))
            .collect()
    }

    /// Trades for `user_id`, concatenated across books.
    pub fn get_user_trades(&self, user_id: &UserId) -> Vec<Trade> {
        self.all_books()
            .iter()
            .flat_map(|book| book.get_user_trades(user_id))
            .collect()
    }

    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            total_orders: self.counters.total_orders.load(Ordering::Relaxed),
            total_trades: self.counters.total_trades.load(Ordering::Relaxed),
            total_volume: self.counters.total_volume.load(Ordering::Relaxed),
        }
    }

    /// Sweep every book for expired orders; returns how many were
    /// cancelled.
    pub fn cancel_expired_orders(&self) -> usize {
        let mut expired = Vec::new();
        for book in self.all_books() {
            expired.extend(book.cancel_expired_orders());
        }
        if !expired.is_empty() {
            let mut inner = self.inner.write();
            for order_id in &expired {
                inner.order_id_to_symbol.remove(order_id);
                self.counters.decrement_orders();
            }
        }
        expired.len()
    }

    /// Append a trade to the engine-level trade log without touching any
    /// book. Used by hosts restoring history at startup.
    pub fn add_trade_history(&self, trade: Trade) {
        self.trade_log.write().push(trade);
    }

    /// The engine-level trade log (matching emission order per book).
    pub fn trade_history(&self) -> Vec<Trade> {
        self.trade_log.read().clone()
    }

    /// Reset every book and all engine state.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        for book in inner.books.values() {
            book.clear();
        }
        inner.books.clear();
        inner.order_id_to_symbol.clear();
        drop(inner);

        self.trade_log.write().clear();
        self.counters.total_orders.store(0, Ordering::Relaxed);
        self.counters.total_trades.store(0, Ordering::Relaxed);
        self.counters.total_volume.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use types::order::{OrderType, Side};
    use types::units::now_secs;

    fn limit(id: &str, symbol: &str, side: Side, price: Price, quantity: Quantity, user: &str) -> Order {
        Order::new(id, symbol, side, OrderType::Limit, price, quantity, user)
    }

    #[test]
    fn test_add_and_get_order() {
        let engine = MatchingEngine::new();
        let trades = engine.add_order(limit("1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));
        assert!(trades.is_empty());

        let fetched = engine.get_order(&OrderId::new("1")).unwrap();
        assert_eq!(fetched.id.as_str(), "1");
        assert_eq!(fetched.symbol.as_str(), "BTC-USD");
        assert_eq!(fetched.side, Side::Buy);
    }

    #[test]
    fn test_routing_by_symbol() {
        let engine = MatchingEngine::new();
        engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));
        engine.add_order(limit("e1", "ETH-USD", Side::Buy, 2_000, 1, "alice"));

        // Same price level, different books: no interaction.
        engine.add_order(limit("e2", "ETH-USD", Side::Sell, 2_500, 1, "bob"));
        assert_eq!(engine.get_best_bid(&Symbol::new("BTC-USD")), 10_000);
        assert_eq!(engine.get_best_bid(&Symbol::new("ETH-USD")), 2_000);
        assert_eq!(engine.get_best_ask(&Symbol::new("ETH-USD")), 2_500);
        assert_eq!(engine.get_spread(&Symbol::new("ETH-USD")), 500);
        assert_eq!(engine.get_best_bid(&Symbol::new("SOL-USD")), 0);
    }

    #[test]
    fn test_cross_symbol_isolation_of_cancel() {
        let engine = MatchingEngine::new();
        engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));

        assert!(engine.cancel_order(&OrderId::new("b1")));
        assert!(!engine.cancel_order(&OrderId::new("b1")));
        assert!(engine.get_order(&OrderId::new("b1")).is_none());
    }

    #[test]
    fn test_matching_updates_stats() {
        let engine = MatchingEngine::new();
        engine.add_order(limit("s1", "BTC-USD", Side::Sell, 10_000, 2, "bob"));
        let trades = engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 2, "alice"));
        assert_eq!(trades.len(), 1);

        let stats = engine.get_stats();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.total_volume, 2);
        assert_eq!(engine.trade_history().len(), 1);
    }

    #[test]
    fn test_order_count_decrements_on_cancel() {
        let engine = MatchingEngine::new();
        engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));
        engine.add_order(limit("b2", "BTC-USD", Side::Buy, 9_900, 1, "alice"));
        assert_eq!(engine.get_order_count(), 2);

        engine.cancel_order(&OrderId::new("b1"));
        assert_eq!(engine.get_order_count(), 1);
    }

    #[test]
    fn test_validation_reject_leaves_no_engine_trace() {
        let engine = MatchingEngine::new();
        let trades = engine.add_order(limit("z1", "BTC-USD", Side::Buy, 0, 1, "alice"));
        assert!(trades.is_empty());
        assert!(engine.get_order(&OrderId::new("z1")).is_none());
        assert_eq!(engine.get_order_count(), 0);
    }

    #[test]
    fn test_user_queries_span_books() {
        let engine = MatchingEngine::new();
        engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));
        engine.add_order(limit("e1", "ETH-USD", Side::Buy, 2_000, 1, "alice"));
        engine.add_order(limit("e2", "ETH-USD", Side::Sell, 2_100, 1, "bob"));

        let alice_orders = engine.get_user_orders(&UserId::new("alice"));
        assert_eq!(alice_orders.len(), 2);
        assert_eq!(engine.get_all_orders().len(), 3);

        engine.add_order(limit("e3", "ETH-USD", Side::Buy, 2_100, 1, "alice"));
        let alice_trades = engine.get_user_trades(&UserId::new("alice"));
        assert_eq!(alice_trades.len(), 1);
        assert_eq!(alice_trades[0].buy_order_id.as_str(), "e3");
    }

    #[test]
    fn test_stats_visible_inside_trade_callback() {
        let engine = Arc::new(MatchingEngine::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let counters = Arc::clone(&engine.counters);
        let seen_in_sink = Arc::clone(&seen);
        engine.set_on_trade(move |trade: &Trade| {
            // Engine counters are already updated when the sink runs.
            seen_in_sink
                .lock()
                .push((trade.quantity, counters.total_trades.load(Ordering::Relaxed)));
        });

        engine.add_order(limit("s1", "BTC-USD", Side::Sell, 10_000, 1, "bob"));
        engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (1, 1));
    }

    #[test]
    fn test_expiry_sweep_spans_books() {
        let engine = MatchingEngine::new();
        let past = now_secs() - 10;
        engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice").with_expiry(past));
        engine.add_order(limit("e1", "ETH-USD", Side::Buy, 2_000, 1, "alice").with_expiry(past));
        engine.add_order(limit("e2", "ETH-USD", Side::Buy, 1_900, 1, "alice"));

        assert_eq!(engine.cancel_expired_orders(), 2);
        assert!(engine.get_order(&OrderId::new("b1")).is_none());
        assert!(engine.get_order(&OrderId::new("e1")).is_none());
        assert!(engine.get_order(&OrderId::new("e2")).is_some());
        assert_eq!(engine.get_order_count(), 1);
    }

    #[test]
    fn test_clear_resets_engine() {
        let engine = MatchingEngine::new();
        engine.add_order(limit("s1", "BTC-USD", Side::Sell, 10_000, 1, "bob"));
        engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));

        engine.clear();
        assert_eq!(engine.get_order_count(), 0);
        assert_eq!(engine.get_stats(), EngineStats::default());
        assert!(engine.get_all_orders().is_empty());
        assert!(engine.trade_history().is_empty());
        assert_eq!(engine.get_best_bid(&Symbol::new("BTC-USD")), 0);
    }

    #[test]
    fn test_add_trade_history_for_replay() {
        let engine = MatchingEngine::new();
        engine.add_trade_history(Trade::new(
            OrderId::new("b"),
            OrderId::new("s"),
            Symbol::new("BTC-USD"),
            10_000,
            1,
            0,
        ));
        assert_eq!(engine.trade_history().len(), 1);
        // History restoration does not touch matching statistics.
        assert_eq!(engine.get_stats().total_trades, 0);
    }
}
