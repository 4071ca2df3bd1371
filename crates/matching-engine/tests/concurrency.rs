//! Cross-thread behavior of the matching engine
//!
//! Submits for different tickers must never interfere: running ticker A's
//! orders and ticker B's orders from separate threads has to produce the
//! same final books as running them serially. Submits for the same ticker
//! from many threads must serialize without losing or inventing quantity.

use std::sync::Arc;
use std::thread;

use common::Side;
use matching_engine::{LevelView, MatchingEngine};

type Script = Vec<(Side, u64, f64)>;

fn script_a() -> Script {
    vec![
        (Side::Sell, 30, 101.0),
        (Side::Sell, 20, 100.0),
        (Side::Buy, 10, 99.0),
        (Side::Buy, 25, 100.5),
        (Side::Sell, 15, 99.0),
        (Side::Buy, 40, 102.0),
        (Side::Sell, 5, 103.0),
        (Side::Buy, 12, 101.5),
    ]
}

fn script_b() -> Script {
    vec![
        (Side::Buy, 50, 49.0),
        (Side::Sell, 10, 50.0),
        (Side::Sell, 35, 48.5),
        (Side::Buy, 20, 48.0),
        (Side::Sell, 5, 47.0),
        (Side::Buy, 60, 51.0),
        (Side::Sell, 25, 52.0),
    ]
}

fn run_script(engine: &MatchingEngine, symbol: &str, script: &Script) -> u64 {
    let mut traded = 0;
    for &(side, quantity, price) in script {
        let events = engine.submit(side, symbol, quantity, price).unwrap();
        traded += events.iter().map(|e| e.quantity).sum::<u64>();
    }
    traded
}

fn final_levels(engine: &MatchingEngine, symbol: &str) -> (Vec<LevelView>, Vec<LevelView>) {
    match engine.snapshot(symbol, usize::MAX) {
        Some(snap) => (snap.bids, snap.asks),
        None => (Vec::new(), Vec::new()),
    }
}

#[test]
fn concurrent_tickers_match_serial_outcome() {
    // Reference run: everything on one thread, A then B
    let serial = MatchingEngine::new();
    run_script(&serial, "AAPL", &script_a());
    run_script(&serial, "MSFT", &script_b());

    let engine = Arc::new(MatchingEngine::new());
    let handles = vec![
        thread::spawn({
            let engine = Arc::clone(&engine);
            move || run_script(&engine, "AAPL", &script_a())
        }),
        thread::spawn({
            let engine = Arc::clone(&engine);
            move || run_script(&engine, "MSFT", &script_b())
        }),
    ];
    for handle in handles {
        handle.join().unwrap();
    }

    for symbol in ["AAPL", "MSFT"] {
        assert_eq!(
            final_levels(&engine, symbol),
            final_levels(&serial, symbol),
            "final book for {} diverged from the serial run",
            symbol
        );
        assert_eq!(engine.order_count(symbol), serial.order_count(symbol));
    }
}

#[test]
fn same_ticker_submissions_conserve_quantity() {
    const THREADS: u64 = 4;
    const ROUNDS: u64 = 50;

    let engine = Arc::new(MatchingEngine::new());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut submitted_buy = 0;
                let mut submitted_sell = 0;
                let mut traded = 0;
                for i in 0..ROUNDS {
                    // Prices wander around 100 so some orders cross and
                    // some rest.
                    let price = 95.0 + ((t * 7 + i * 3) % 11) as f64;
                    let quantity = 1 + (t + i) % 5;
                    let side = if (t + i) % 2 == 0 {
                        submitted_buy += quantity;
                        Side::Buy
                    } else {
                        submitted_sell += quantity;
                        Side::Sell
                    };
                    let events = engine.submit(side, "TSLA", quantity, price).unwrap();
                    traded += events.iter().map(|e| e.quantity).sum::<u64>();
                }
                (submitted_buy, submitted_sell, traded)
            })
        })
        .collect();

    let mut total_buy = 0;
    let mut total_sell = 0;
    let mut total_traded = 0;
    for handle in handles {
        let (buy, sell, traded) = handle.join().unwrap();
        total_buy += buy;
        total_sell += sell;
        total_traded += traded;
    }

    let (bids, asks) = final_levels(&engine, "TSLA");
    let resting_bid: u64 = bids.iter().map(|l| l.quantity).sum();
    let resting_ask: u64 = asks.iter().map(|l| l.quantity).sum();

    // Every trade consumes equal quantity from one buy and one sell
    assert_eq!(total_buy, resting_bid + total_traded);
    assert_eq!(total_sell, resting_ask + total_traded);

    // No crossing pair may rest once all submits have returned
    if let (Some(bid), Some(ask)) = (engine.best_bid("TSLA"), engine.best_ask("TSLA")) {
        assert!(bid < ask, "book rests crossed: bid {} >= ask {}", bid, ask);
    }
}
