//! Rejection taxonomy and order validation
//!
//! The engine never propagates errors across its API boundary; a failed
//! precondition marks the order `Rejected` and the reason is logged. The
//! taxonomy here names those reasons.

use crate::order::{Order, OrderType};
use crate::units::{MAX_ORDER_PRICE, MAX_ORDER_QUANTITY};
use thiserror::Error;

/// Why an order failed acceptance.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRejectReason {
    #[error("invalid quantity: must be in (0, {MAX_ORDER_QUANTITY}]")]
    InvalidQuantity,

    #[error("invalid price: limit-type orders require price in (0, {MAX_ORDER_PRICE}]")]
    InvalidPrice,

    #[error("stop order has no reference price: opposing side is empty")]
    StopUntriggerable,
}

/// Validate an order's static preconditions.
///
/// Checks quantity bounds for every order and price bounds for the
/// price-bearing types (limit and stop-limit; price 0 is reserved for
/// market behavior). Stop reference availability depends on book state and
/// is checked by the book itself.
pub fn validate_order(order: &Order) -> Result<(), OrderRejectReason> {
    if order.quantity == 0 || order.quantity > MAX_ORDER_QUANTITY {
        return Err(OrderRejectReason::InvalidQuantity);
    }
    if matches!(order.order_type, OrderType::Limit | OrderType::StopLimit)
        && (order.price == 0 || order.price > MAX_ORDER_PRICE)
    {
        return Err(OrderRejectReason::InvalidPrice);
    }
    Ok(())
}
