//! One side of the book: price levels sorted best-first
//!
//! A `Ladder` keys levels by price in a `BTreeMap` and inverts the
//! iteration direction per side: bids iterate highest-to-lowest, asks
//! lowest-to-highest. `BTreeMap` keeps iteration deterministic.

use crate::book::price_level::{LevelSnapshot, PriceLevel};
use crate::book::SharedOrder;
use std::collections::BTreeMap;
use types::ids::OrderId;
use types::order::Side;
use types::units::{Price, Quantity};

/// Price-sorted levels for a single side.
#[derive(Debug, Clone)]
pub struct Ladder {
    side: Side,
    levels: BTreeMap<Price, PriceLevel>,
}

impl Ladder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// The best price on this side: highest bid, lowest ask.
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Queue an order at its price, creating the level if needed.
    pub fn insert(&mut self, id: OrderId, order: SharedOrder, price: Price, remaining: Quantity) {
        self.levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(id, order, remaining);
    }

    /// Remove an order from its level, evicting the level if it empties.
    /// Returns false when the order is not resting here.
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> bool {
        let Some(level) = self.levels.get_mut(&price) else {
            return false;
        };
        if level.remove(order_id).is_none() {
            return false;
        }
        if level.is_empty() {
            self.levels.remove(&price);
        }
        true
    }

    /// Shrink the level total for an in-place quantity reduction. Returns
    /// false when the order is not resting here.
    pub fn reduce_order(&mut self, order_id: &OrderId, price: Price, delta: Quantity) -> bool {
        self.levels
            .get_mut(&price)
            .map(|level| level.reduce_for(order_id, delta))
            .unwrap_or(false)
    }

    /// Drop an emptied level. The matching loop calls this after draining
    /// the front level's queue.
    pub fn remove_level(&mut self, price: Price) {
        debug_assert!(
            self.levels.get(&price).map(PriceLevel::is_empty).unwrap_or(true),
            "removing a non-empty level"
        );
        self.levels.remove(&price);
    }

    /// Iterate levels best-first (bids descending, asks ascending).
    pub fn iter_best_first(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        }
    }

    /// Total resting quantity at `price` or better: `>= price` for bids,
    /// `<= price` for asks.
    pub fn depth_at_or_better(&self, price: Price) -> Quantity {
        let range: Box<dyn Iterator<Item = &PriceLevel>> = match self.side {
            Side::Buy => Box::new(self.levels.range(price..).map(|(_, level)| level)),
            Side::Sell => Box::new(self.levels.range(..=price).map(|(_, level)| level)),
        };
        range.map(PriceLevel::total_quantity).sum()
    }

    /// Snapshot the first `depth` levels in best-first order.
    pub fn top_levels(&self, depth: usize) -> Vec<LevelSnapshot> {
        self.iter_best_first()
            .take(depth)
            .map(PriceLevel::snapshot)
            .collect()
    }

    /// Prices of the first `depth` levels in best-first order.
    pub fn top_prices(&self, depth: usize) -> Vec<Price> {
        self.iter_best_first()
            .take(depth)
            .map(PriceLevel::price)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of price levels on this side.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}
