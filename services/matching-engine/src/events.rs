//! Event plumbing for the matching engine
//!
//! The engine exposes two subscriber slots: one for executed trades, one
//! for order-state snapshots. Both receive value copies of the record and
//! run synchronously on the thread that performed the mutation, after the
//! engine's own statistics and trade log are up to date. Subscribers must
//! not call back into the engine.
//!
//! [`EngineEvent`] is the serializable union of both payloads, consumed by
//! the persistence writer and the market-data broadcaster.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use types::order::Order;
use types::trade::Trade;

/// Subscriber slot for executed trades.
pub type TradeSink = Arc<dyn Fn(&Trade) + Send + Sync>;

/// Subscriber slot for order-state snapshots.
pub type OrderUpdateSink = Arc<dyn Fn(&Order) + Send + Sync>;

/// Wire-visible engine event, as persisted and broadcast by hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A trade was executed.
    Trade(Trade),
    /// An order changed state; carries a full snapshot.
    OrderUpdate(Order),
}

impl EngineEvent {
    /// Event type label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            EngineEvent::Trade(_) => "trade",
            EngineEvent::OrderUpdate(_) => "order_update",
        }
    }

    /// The symbol the event belongs to.
    pub fn symbol(&self) -> &types::ids::Symbol {
        match self {
            EngineEvent::Trade(trade) => &trade.symbol,
            EngineEvent::OrderUpdate(order) => &order.symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{OrderId, Symbol};
    use types::order::{OrderType, Side};

    #[test]
    fn test_trade_event_roundtrip() {
        let event = EngineEvent::Trade(Trade::new(
            OrderId::new("b-1"),
            OrderId::new("s-1"),
            Symbol::new("BTC-USD"),
            10_000,
            2,
            1_700_000_000_000_000_000,
        ));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"trade\""));
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_order_update_event_roundtrip() {
        let order = Order::new(
            "o-1",
            "BTC-USD",
            Side::Buy,
            OrderType::Limit,
            10_000,
            5,
            "alice",
        );
        let event = EngineEvent::OrderUpdate(order);
        let json = serde_json::to_string(&event).unwrap();
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
        assert_eq!(event.label(), "order_update");
        assert_eq!(event.symbol().as_str(), "BTC-USD");
    }
}
