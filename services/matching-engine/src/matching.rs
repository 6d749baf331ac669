//! Crossing and trigger predicates
//!
//! Pure price-compatibility logic shared by the matching loop, the
//! fill-or-kill pre-scan, and stop-order arming.

use crate::book::ladder::Ladder;
use types::order::Side;
use types::units::{Price, Quantity};

/// Check if a taker at `taker_price` can trade against a resting level at
/// `maker_price`. `None` means a market taker, which crosses any level.
pub fn crosses(taker_side: Side, taker_price: Option<Price>, maker_price: Price) -> bool {
    match taker_price {
        None => true,
        Some(limit) => match taker_side {
            Side::Buy => maker_price <= limit,
            Side::Sell => maker_price >= limit,
        },
    }
}

/// Check whether a stop order arms against the reference price.
///
/// Buy stops trigger once the reference rises to the stop price; sell
/// stops once it falls to it.
pub fn stop_triggered(side: Side, stop_price: Price, reference: Price) -> bool {
    match side {
        Side::Buy => reference >= stop_price,
        Side::Sell => reference <= stop_price,
    }
}

/// Quantity a taker could fill against `opposing` without mutating it,
/// capped at `needed`. Used by the fill-or-kill pre-scan so an unfillable
/// order can be killed with zero side effects.
pub fn fillable_quantity(
    opposing: &Ladder,
    taker_side: Side,
    taker_price: Option<Price>,
    needed: Quantity,
) -> Quantity {
    let mut available: Quantity = 0;
    for level in opposing.iter_best_first() {
        if !crosses(taker_side, taker_price, level.price()) {
            break;
        }
        available = available.saturating_add(level.total_quantity());
        if available >= needed {
            break;
        }
    }
    available.min(needed)
}
