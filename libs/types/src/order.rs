//! Order lifecycle types
//!
//! An [`Order`] is an immutable-identity record of a trading intention with
//! mutable fill state. The matching engine owns every mutation; hosts only
//! ever see cloned snapshots.

use crate::ids::{OrderId, Symbol, UserId};
use crate::units::{now_nanos, Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// How an order interacts with the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Execute immediately at the best available prices; never rests.
    Market,
    /// Execute at `price` or better; the remainder rests.
    Limit,
    /// Market order armed at `stop_price`.
    Stop,
    /// Limit order armed at `stop_price`.
    StopLimit,
}

/// Current status of an order.
///
/// `Filled`, `Cancelled`, and `Rejected` are terminal; the only legal
/// transitions are `New → {Partial, Filled, Cancelled, Rejected}` and
/// `Partial → {Filled, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Accepted, no fills yet.
    New,
    /// Partially filled, quantity remaining.
    Partial,
    /// Completely filled (terminal).
    Filled,
    /// Cancelled by user or system (terminal).
    Cancelled,
    /// Failed validation or could not execute (terminal).
    Rejected,
}

impl OrderStatus {
    /// Check if the status is terminal (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Time-in-force policy, applied after the initial match pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good-till-cancel: the unfilled remainder rests.
    Gtc,
    /// Immediate-or-cancel: the unfilled remainder is cancelled.
    Ioc,
    /// Fill-or-kill: full fill on the initial pass or nothing at all.
    Fok,
}

impl Default for TimeInForce {
    fn default() -> Self {
        TimeInForce::Gtc
    }
}

/// A trading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier, chosen by the submission path.
    pub id: OrderId,
    /// Market this order trades on.
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price in ticks; 0 only for market orders.
    pub price: Price,
    /// Trigger price in ticks; meaningful only for stop types.
    pub stop_price: Price,
    /// Original size.
    pub quantity: Quantity,
    /// Cumulative filled size, monotonically non-decreasing, ≤ `quantity`.
    pub filled_quantity: Quantity,
    pub status: OrderStatus,
    pub user_id: UserId,
    /// Unix nanoseconds, assigned at construction. Breaks FIFO ties.
    pub timestamp: i64,
    /// Unix seconds after which the order is eligible for the expiry sweep;
    /// 0 means never.
    pub expiry: i64,
    pub tif: TimeInForce,
}

impl Order {
    /// Create a new order with no stop price, no expiry, and GTC
    /// time-in-force. The timestamp is taken at construction.
    pub fn new(
        id: impl Into<OrderId>,
        symbol: impl Into<Symbol>,
        side: Side,
        order_type: OrderType,
        price: Price,
        quantity: Quantity,
        user_id: impl Into<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            order_type,
            price,
            stop_price: 0,
            quantity,
            filled_quantity: 0,
            status: OrderStatus::New,
            user_id: user_id.into(),
            timestamp: now_nanos(),
            expiry: 0,
            tif: TimeInForce::Gtc,
        }
    }

    /// Set the trigger price (stop types only).
    pub fn with_stop_price(mut self, stop_price: Price) -> Self {
        self.stop_price = stop_price;
        self
    }

    /// Set the expiry timestamp (Unix seconds, 0 = never).
    pub fn with_expiry(mut self, expiry: i64) -> Self {
        self.expiry = expiry;
        self
    }

    /// Set the time-in-force policy.
    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.tif = tif;
        self
    }

    /// Quantity still open.
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// Check if the order is completely filled.
    pub fn is_filled(&self) -> bool {
        self.filled_quantity == self.quantity
    }

    /// Check if the order has any fills.
    pub fn has_fills(&self) -> bool {
        self.filled_quantity > 0
    }

    /// Check whether the order's expiry has passed at `now` (Unix seconds).
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry > 0 && self.expiry <= now
    }

    /// Record a fill and advance the status.
    ///
    /// # Panics
    /// Panics in debug builds if the fill would exceed the order quantity;
    /// the matching loop never produces such a fill.
    pub fn fill(&mut self, fill_quantity: Quantity) {
        debug_assert!(
            self.filled_quantity + fill_quantity <= self.quantity,
            "fill would exceed order quantity"
        );
        self.filled_quantity += fill_quantity;
        if self.is_filled() {
            self.status = OrderStatus::Filled;
        } else if self.has_fills() {
            self.status = OrderStatus::Partial;
        }
    }
}
