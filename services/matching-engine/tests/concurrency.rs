//! Concurrency tests
//!
//! The engine is shared behind an `Arc` and hammered from plain threads the
//! way a request pool would: writers submitting and cancelling, readers
//! querying mid-flight. Assertions target the invariants that must hold at
//! any observation point: conservation of quantity, an uncrossed book, and
//! exactly-once cancellation.

use matching_engine::MatchingEngine;
use std::sync::Arc;
use std::thread;
use types::ids::{OrderId, Symbol};
use types::order::{Order, OrderType, Side};
use types::units::Quantity;

fn limit(id: &str, symbol: &str, side: Side, price: u64, quantity: u64, user: &str) -> Order {
    Order::new(id, symbol, side, OrderType::Limit, price, quantity, user)
}

#[test]
fn concurrent_markets_do_not_interfere() {
    let engine = Arc::new(MatchingEngine::new());
    let symbols = ["BTC-USD", "ETH-USD", "SOL-USD", "DOGE-USD"];

    let handles: Vec<_> = symbols
        .iter()
        .map(|sym| {
            let engine = Arc::clone(&engine);
            let sym = sym.to_string();
            thread::spawn(move || {
                for i in 0..500 {
                    engine.add_order(limit(
                        &format!("{sym}-s{i}"),
                        &sym,
                        Side::Sell,
                        50_000,
                        1,
                        "bob",
                    ));
                    engine.add_order(limit(
                        &format!("{sym}-b{i}"),
                        &sym,
                        Side::Buy,
                        50_000,
                        1,
                        "alice",
                    ));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Every pair matched inside its own book.
    let stats = engine.get_stats();
    assert_eq!(stats.total_trades, 2_000);
    assert_eq!(stats.total_volume, 2_000);
    for sym in symbols {
        let symbol = Symbol::new(sym);
        assert_eq!(engine.get_best_bid(&symbol), 0);
        assert_eq!(engine.get_best_ask(&symbol), 0);
    }
}

#[test]
fn concurrent_writers_conserve_quantity() {
    let engine = Arc::new(MatchingEngine::new());
    let writers = 4;
    let orders_per_writer = 200;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..orders_per_writer {
                    let side = if (w + i) % 2 == 0 { Side::Buy } else { Side::Sell };
                    // Prices straddle 100 so flows cross often.
                    let price = 98 + ((w + i) % 5) as u64;
                    engine.add_order(limit(
                        &format!("w{w}-o{i}"),
                        "BTC-USD",
                        side,
                        price,
                        3,
                        &format!("user-{w}"),
                    ));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // No order was cancelled, so every accepted order is still tracked and
    // each trade advanced one buyer and one seller by its quantity.
    let traded: Quantity = engine.trade_history().iter().map(|t| t.quantity).sum();
    assert_eq!(engine.get_stats().total_volume, traded);

    let mut filled_total: Quantity = 0;
    for w in 0..writers {
        for i in 0..orders_per_writer {
            let order = engine
                .get_order(&OrderId::new(format!("w{w}-o{i}")))
                .expect("accepted orders stay tracked");
            assert!(order.filled_quantity <= order.quantity);
            filled_total += order.filled_quantity;
        }
    }
    assert_eq!(filled_total, 2 * traded);

    // The book settles uncrossed.
    let symbol = Symbol::new("BTC-USD");
    let (bid, ask) = (engine.get_best_bid(&symbol), engine.get_best_ask(&symbol));
    assert!(bid == 0 || ask == 0 || bid < ask, "book left crossed: {bid} >= {ask}");
}

#[test]
fn concurrent_readers_see_consistent_levels() {
    let engine = Arc::new(MatchingEngine::new());
    let symbol = Symbol::new("BTC-USD");

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..300u64 {
                let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                let price = if i % 2 == 0 { 95 + i % 4 } else { 101 + i % 4 };
                engine.add_order(limit(
                    &format!("o{i}"),
                    "BTC-USD",
                    side,
                    price,
                    2,
                    "alice",
                ));
                if i % 7 == 0 {
                    engine.cancel_order(&OrderId::new(format!("o{}", i / 2)));
                }
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let symbol = symbol.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let bid = engine.get_best_bid(&symbol);
                    let ask = engine.get_best_ask(&symbol);
                    assert!(bid == 0 || ask == 0 || bid < ask);

                    // Every level snapshot is internally consistent.
                    for level in engine.get_bid_levels(&symbol, 10) {
                        let sum: Quantity =
                            level.orders.iter().map(|o| o.remaining()).sum();
                        assert_eq!(level.total_quantity, sum);
                    }
                    let _ = engine.get_user_trades(&types::ids::UserId::new("alice"));
                    let _ = engine.get_stats();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn concurrent_cancels_have_one_winner() {
    let engine = Arc::new(MatchingEngine::new());
    engine.add_order(limit("b1", "BTC-USD", Side::Buy, 10_000, 1, "alice"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.cancel_order(&OrderId::new("b1")))
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(wins, 1);
    assert_eq!(engine.get_order_count(), 0);
}

#[test]
fn parallel_runs_are_deterministic_per_thread_order() {
    // Identical sequential input on two engines run in parallel threads
    // must produce identical books and statistics.
    let run = || {
        thread::spawn(|| {
            let engine = MatchingEngine::new();
            for i in 0..100u64 {
                engine.add_order(limit(
                    &format!("s{i}"),
                    "BTC-USD",
                    Side::Sell,
                    50_000 + i % 3,
                    1,
                    "bob",
                ));
                engine.add_order(limit(
                    &format!("b{i}"),
                    "BTC-USD",
                    Side::Buy,
                    50_000,
                    1,
                    "alice",
                ));
            }
            let symbol = Symbol::new("BTC-USD");
            (
                engine.get_stats(),
                engine.get_best_bid(&symbol),
                engine.get_best_ask(&symbol),
                engine.get_bid_depth(&symbol, 0),
            )
        })
    };

    let first = run().join().unwrap();
    let second = run().join().unwrap();
    assert_eq!(first, second, "parallel runs must produce identical results");
}
