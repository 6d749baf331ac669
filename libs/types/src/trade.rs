//! Trade execution record
//!
//! When a buy and a sell cross, the book emits one [`Trade`] per maker it
//! walks. The trade price is always the maker's price; any price
//! improvement goes to the taker.

use crate::ids::{OrderId, Symbol};
use crate::units::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// An executed trade between one buy order and one sell order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol: Symbol,
    /// Execution price in ticks (the maker's price).
    pub price: Price,
    pub quantity: Quantity,
    /// Unix nanoseconds at execution.
    pub timestamp: i64,
}

impl Trade {
    pub fn new(
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        symbol: Symbol,
        price: Price,
        quantity: Quantity,
        timestamp: i64,
    ) -> Self {
        Self {
            buy_order_id,
            sell_order_id,
            symbol,
            price,
            quantity,
            timestamp,
        }
    }

    /// Traded value in tick units (price × quantity).
    pub fn notional(&self) -> u128 {
        self.price as u128 * self.quantity as u128
    }

    /// Check whether `order_id` was on either side of this trade.
    pub fn involves(&self, order_id: &OrderId) -> bool {
        &self.buy_order_id == order_id || &self.sell_order_id == order_id
    }
}
