//! Tick-denominated units and venue limits
//!
//! Prices and quantities are 64-bit unsigned integers in venue-defined
//! minimum units. Deterministic integer arithmetic end to end; no floating
//! point anywhere in the matching path.

use std::time::{SystemTime, UNIX_EPOCH};

/// Price in minimum-tick units. 0 is reserved for "no price" (market orders,
/// empty book sides).
pub type Price = u64;

/// Quantity in minimum-size units.
pub type Quantity = u64;

/// Largest quantity a single order may carry.
pub const MAX_ORDER_QUANTITY: Quantity = 1_000_000;

/// Largest price a single order may carry.
pub const MAX_ORDER_PRICE: Price = 1_000_000;

/// Current wall-clock time as Unix nanoseconds.
///
/// Order timestamps use this resolution; within one book the arrival
/// sequence breaks any remaining ties.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Current wall-clock time as Unix seconds. Expiry timestamps use this
/// resolution.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
