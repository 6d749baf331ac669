//! Price level with a FIFO order queue
//!
//! A price level holds every resting order at one price on one side, in
//! arrival order. Arrival order is time priority: the matching loop only
//! ever consumes the front of the queue.
//!
//! Invariant: `total_quantity` always equals the sum of the remaining
//! quantities of the queued orders, and an empty level is evicted from its
//! ladder by the caller.

use crate::book::SharedOrder;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use types::ids::OrderId;
use types::order::Order;
use types::units::{Price, Quantity};

/// One queued order. The id is cached so lookups never need the order lock.
#[derive(Debug, Clone)]
struct LevelEntry {
    id: OrderId,
    order: SharedOrder,
}

/// All resting orders at a single price on one side.
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    price: Price,
    orders: VecDeque<LevelEntry>,
    total_quantity: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: 0,
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    /// Append an order at the back of the queue (lowest time priority).
    pub fn push_back(&mut self, id: OrderId, order: SharedOrder, remaining: Quantity) {
        self.orders.push_back(LevelEntry { id, order });
        self.total_quantity += remaining;
    }

    /// Remove an order by id, returning its remaining quantity.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self.orders.iter().position(|entry| &entry.id == order_id)?;
        let entry = self.orders.remove(position)?;
        let remaining = entry.order.read().remaining();
        self.total_quantity = self.total_quantity.saturating_sub(remaining);
        Some(remaining)
    }

    /// The order at the front of the queue (highest time priority).
    pub fn front(&self) -> Option<SharedOrder> {
        self.orders.front().map(|entry| entry.order.clone())
    }

    /// Drop the front order; used once it is fully filled.
    pub fn pop_front(&mut self) -> Option<SharedOrder> {
        self.orders.pop_front().map(|entry| entry.order)
    }

    /// Account for `quantity` traded out of (or modified off) this level.
    pub fn reduce(&mut self, quantity: Quantity) {
        debug_assert!(
            quantity <= self.total_quantity,
            "level reduction exceeds total quantity"
        );
        self.total_quantity = self.total_quantity.saturating_sub(quantity);
    }

    /// Reduce the level total only if `order_id` is queued here. Returns
    /// whether the order was found.
    pub fn reduce_for(&mut self, order_id: &OrderId, quantity: Quantity) -> bool {
        if self.orders.iter().any(|entry| &entry.id == order_id) {
            self.reduce(quantity);
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Value snapshot of the level, cloning each queued order in FIFO order.
    pub fn snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            price: self.price,
            total_quantity: self.total_quantity,
            orders: self
                .orders
                .iter()
                .map(|entry| entry.order.read().clone())
                .collect(),
        }
    }
}

/// Point-in-time view of one price level, as returned by depth queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: Price,
    pub total_quantity: Quantity,
    /// Queued orders in time-priority order.
    pub orders: Vec<Order>,
}
