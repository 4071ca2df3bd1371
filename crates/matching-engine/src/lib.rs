//! Order matching engine for Matchbook
//!
//! This crate implements continuous price-time priority matching over
//! per-ticker order books.
//!
//! # Guarantees
//!
//! - Price priority: the most aggressive opposite level always matches
//!   first; time priority (FIFO) breaks ties within a level.
//! - Trades execute at the resting order's price.
//! - Per-ticker isolation: submits for different tickers run in
//!   parallel; submits for the same ticker are serialized end-to-end.
//! - After any submit returns, no crossing orders rest in any book.
//!
//! # Example
//!
//! ```
//! use common::Side;
//! use matching_engine::MatchingEngine;
//!
//! let engine = MatchingEngine::new();
//! engine.submit(Side::Sell, "AAPL", 10, 100.0)?;
//! let trades = engine.submit(Side::Buy, "AAPL", 10, 100.0)?;
//! assert_eq!(trades.len(), 1);
//! # Ok::<(), matching_engine::MatchingError>(())
//! ```

pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod sink;

pub use domain::{BookSnapshot, LevelView, Order, OrderBook};
pub use engine::MatchingEngine;
pub use error::MatchingError;
pub use event::TradeEvent;
pub use sink::{CollectingSink, LogSink, TradeSink};

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchingError>;
