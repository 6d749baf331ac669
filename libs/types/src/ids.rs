//! Opaque identifier types for venue entities
//!
//! Identifiers are opaque strings chosen by the submission path; the engine
//! never inspects their contents. `OrderId::generate` mints UUID v7 ids for
//! hosts that do not carry their own id scheme, keeping ids time-sortable
//! for chronological queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an order.
///
/// Unique across the engine lifetime. Hosts may supply any string; ids
/// minted by [`OrderId::generate`] are UUID v7 and therefore time-sortable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Create from an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh UUID v7 id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Market symbol identifying one trading pair (e.g. "BTC-USD").
///
/// Opaque to the engine; each distinct symbol gets its own order book.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_generate_unique() {
        let id1 = OrderId::generate();
        let id2 = OrderId::generate();
        assert_ne!(id1, id2, "generated OrderIds should be unique");
    }

    #[test]
    fn test_order_id_opaque_roundtrip() {
        let id = OrderId::new("client-42");
        assert_eq!(id.as_str(), "client-42");
        assert_eq!(id.to_string(), "client-42");
    }

    #[test]
    fn test_order_id_serialization() {
        let id = OrderId::new("abc-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc-123\"");
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_symbol_serialization() {
        let symbol = Symbol::new("BTC-USD");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"BTC-USD\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(symbol, back);
    }

    #[test]
    fn test_user_id_from_str() {
        let user: UserId = "alice".into();
        assert_eq!(user.as_str(), "alice");
    }
}
