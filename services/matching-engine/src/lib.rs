//! Matching Engine
//!
//! Multi-symbol central-limit order book with price-time priority matching.
//! One [`book::OrderBook`] per symbol resolves acceptance, matching,
//! cancellation, modification, and expiry; the [`MatchingEngine`] routes
//! operations across books, aggregates statistics, and fans trade and
//! order-update events out to subscribers.
//!
//! **Key invariants:**
//! - Price-time priority strictly enforced (best price first, FIFO within
//!   a level)
//! - Trades execute at the maker's price
//! - Conservation of quantity: every trade advances buyer and seller fill
//!   state by exactly its quantity
//! - The book is never left crossed
//!
//! All operations are synchronous and thread-safe; any thread may call any
//! operation at any time. Event callbacks run on the calling thread and
//! must not call back into the engine.

pub mod book;
pub mod engine;
pub mod events;
pub mod matching;
pub mod replay;

pub use book::OrderBook;
pub use engine::{EngineStats, MatchingEngine};
