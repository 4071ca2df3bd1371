//! Matchbook demo harness
//!
//! Spawns worker threads that submit random orders for a handful of
//! tickers through a shared [`MatchingEngine`], logging every trade via
//! a [`LogSink`]. This is a load generator, not part of the engine: it
//! only uses the public submit/query contract.

use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::Rng;
use tracing::{info, warn};

use common::Side;
use matching_engine::{LogSink, MatchingEngine};
use observability::{init_logging, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "matchbook", about = "Random order flow against the matching engine")]
struct Args {
    /// Number of concurrent submitter threads
    #[arg(long, env = "MATCHBOOK_THREADS", default_value_t = 4)]
    threads: usize,

    /// Orders submitted per thread
    #[arg(long, env = "MATCHBOOK_ORDERS", default_value_t = 250)]
    orders: usize,

    /// Tickers to trade, comma separated
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "AAPL,GOOGL,MSFT,AMZN,TSLA"
    )]
    tickers: Vec<String>,

    /// Lower bound of the random price range
    #[arg(long, default_value_t = 50.0)]
    min_price: f64,

    /// Upper bound of the random price range
    #[arg(long, default_value_t = 150.0)]
    max_price: f64,

    /// Upper bound of the random order quantity
    #[arg(long, default_value_t = 100)]
    max_quantity: u64,

    /// Log output format (pretty, json, compact)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// Print final book snapshots as JSON on stdout
    #[arg(long, default_value_t = false)]
    snapshots: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging("matchbook", args.log_format)?;

    if args.tickers.is_empty() {
        bail!("at least one ticker is required");
    }
    if !(args.min_price > 0.0 && args.min_price < args.max_price) {
        bail!(
            "invalid price range: {}..{}",
            args.min_price,
            args.max_price
        );
    }
    if args.max_quantity == 0 {
        bail!("max quantity must be positive");
    }

    info!(
        threads = args.threads,
        orders = args.orders,
        tickers = ?args.tickers,
        "Starting simulated trading"
    );

    let engine = Arc::new(MatchingEngine::with_sink(Arc::new(LogSink)));

    let handles: Vec<_> = (0..args.threads)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            let tickers = args.tickers.clone();
            let (min_price, max_price) = (args.min_price, args.max_price);
            let (orders, max_quantity) = (args.orders, args.max_quantity);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut trades = 0u64;
                for _ in 0..orders {
                    let ticker = &tickers[rng.gen_range(0..tickers.len())];
                    let side = if rng.gen_bool(0.5) {
                        Side::Buy
                    } else {
                        Side::Sell
                    };
                    let quantity = rng.gen_range(1..=max_quantity);
                    // Two-decimal prices, like real equity ticks
                    let price = (rng.gen_range(min_price..=max_price) * 100.0).round() / 100.0;

                    match engine.submit(side, ticker, quantity, price) {
                        Ok(events) => trades += events.len() as u64,
                        Err(err) => warn!(worker, %ticker, %err, "order rejected"),
                    }
                }
                trades
            })
        })
        .collect();

    let mut total_trades = 0u64;
    for handle in handles {
        total_trades += handle
            .join()
            .map_err(|_| anyhow::anyhow!("submitter thread panicked"))?;
    }

    info!(total_trades, "Simulated trading finished");

    for ticker in &args.tickers {
        let best_bid = engine.best_bid(ticker);
        let best_ask = engine.best_ask(ticker);
        info!(
            %ticker,
            best_bid = ?best_bid,
            best_ask = ?best_ask,
            resting_orders = engine.order_count(ticker),
            "Final book"
        );

        if args.snapshots {
            if let Some(snapshot) = engine.snapshot(ticker, 10) {
                let line = serde_json::to_string(&snapshot)
                    .context("serializing book snapshot")?;
                println!("{}", line);
            }
        }
    }

    Ok(())
}
