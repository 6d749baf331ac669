//! Startup replay
//!
//! Rebuilds engine state from a persisted action log: open orders are
//! re-added, then recorded cancels and modifies are applied in their
//! original chronological order, then the historical trade log is restored
//! through [`MatchingEngine::add_trade_history`].
//!
//! The driver itself never installs event sinks; a host that wants a silent
//! replay simply runs it before subscribing (or with no-op sinks in place),
//! so nothing is re-broadcast or re-persisted.

use crate::engine::MatchingEngine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use types::ids::OrderId;
use types::order::Order;
use types::trade::Trade;
use types::units::{Price, Quantity};

/// One persisted action, as journaled by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayRecord {
    /// Re-submit an order that was open at shutdown.
    Add { order: Order },
    /// A cancel that was applied after the order's add was journaled.
    Cancel { order_id: OrderId },
    /// A modify that was applied after the order's add was journaled.
    Modify {
        order_id: OrderId,
        price: Price,
        quantity: Quantity,
    },
    /// A historical trade to restore into the engine trade log.
    TradeHistory { trade: Trade },
}

/// Replay decoding failure.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("malformed replay record at line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

/// What a replay run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub orders_added: usize,
    /// Trades produced while re-adding orders. Non-zero only if the
    /// journaled open set was crossed, which indicates a host journal bug.
    pub trades_emitted: usize,
    pub cancels_applied: usize,
    pub modifies_applied: usize,
    pub trades_restored: usize,
}

/// Apply records to the engine: adds first, then cancels, then modifies in
/// record order, then trade-history restoration.
pub fn replay_records(engine: &MatchingEngine, records: &[ReplayRecord]) -> ReplayReport {
    let mut report = ReplayReport::default();

    for record in records {
        if let ReplayRecord::Add { order } = record {
            report.trades_emitted += engine.add_order(order.clone()).len();
            report.orders_added += 1;
        }
    }
    for record in records {
        if let ReplayRecord::Cancel { order_id } = record {
            if engine.cancel_order(order_id) {
                report.cancels_applied += 1;
            }
        }
    }
    for record in records {
        if let ReplayRecord::Modify {
            order_id,
            price,
            quantity,
        } = record
        {
            if engine.modify_order(order_id, *price, *quantity) {
                report.modifies_applied += 1;
            }
        }
    }
    for record in records {
        if let ReplayRecord::TradeHistory { trade } = record {
            engine.add_trade_history(trade.clone());
            report.trades_restored += 1;
        }
    }

    info!(
        orders = report.orders_added,
        cancels = report.cancels_applied,
        modifies = report.modifies_applied,
        trades = report.trades_restored,
        "replay complete"
    );
    report
}

/// Decode one JSON record per line and replay them. Blank lines are
/// skipped; a malformed line aborts with its line number.
pub fn replay_json_lines(engine: &MatchingEngine, input: &str) -> Result<ReplayReport, ReplayError> {
    let mut records = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| ReplayError::Malformed {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(replay_records(engine, &records))
}
