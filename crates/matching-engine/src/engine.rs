//! Core matching engine
//!
//! This module implements the continuous price-time priority matching
//! algorithm over per-ticker order books.
//!
//! Each `submit` call runs insertion plus the full matching loop to
//! completion under that ticker's exclusive section. Different tickers
//! never contend with each other; a call never holds more than one
//! ticker's lock, so cross-ticker deadlock is impossible by construction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use common::{OrderId, Side, Symbol};

use crate::domain::{BookSnapshot, Order, OrderBook};
use crate::error::MatchingError;
use crate::event::TradeEvent;
use crate::sink::TradeSink;

/// Number of levels per side included in sink book updates
const SNAPSHOT_DEPTH: usize = 10;

/// Matching engine
///
/// CRITICAL PROPERTIES:
/// 1. Deterministic per ticker (same submission order, same outcome)
/// 2. Price-time priority, strictly enforced
/// 3. Per-ticker isolation (books never interact, locks never nest)
/// 4. Rejections happen before any state is touched
pub struct MatchingEngine {
    /// Ticker -> (book, exclusion guard), created lazily on first use
    books: RwLock<HashMap<Symbol, Arc<Mutex<OrderBook>>>>,
    /// Optional consumer of trades and book updates
    sink: Option<Arc<dyn TradeSink>>,
}

impl MatchingEngine {
    /// Create a new matching engine with no sink
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            sink: None,
        }
    }

    /// Create a new matching engine that delivers events to `sink`
    pub fn with_sink(sink: Arc<dyn TradeSink>) -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            sink: Some(sink),
        }
    }

    /// Submit a limit order
    ///
    /// Validates the order, then under the ticker's exclusive section:
    /// assigns the time-priority sequence, matches against the opposite
    /// side while prices cross, rests any remainder, and delivers events
    /// to the sink. Returns the trades this submission produced, in
    /// generation order.
    ///
    /// Tickers are an open set: a book is created on first reference.
    /// An empty opposite side is not an error, the order simply rests.
    ///
    /// # Errors
    ///
    /// [`MatchingError::InvalidOrder`] if `quantity` is 0, `price` is
    /// non-finite or not positive, or `symbol` is malformed. Rejection
    /// happens before any mutation; the book is left unchanged.
    pub fn submit(
        &self,
        side: Side,
        symbol: &str,
        quantity: u64,
        price: f64,
    ) -> Result<Vec<TradeEvent>, MatchingError> {
        let symbol = Symbol::parse(symbol)
            .map_err(|e| MatchingError::invalid_order(e.to_string()))?;
        if quantity == 0 {
            warn!(%symbol, %side, "Order rejected: zero quantity");
            return Err(MatchingError::invalid_order("quantity must be positive"));
        }
        if !price.is_finite() || price <= 0.0 {
            warn!(%symbol, %side, price, "Order rejected: invalid price");
            return Err(MatchingError::invalid_order(format!(
                "price must be positive and finite, got {}",
                price
            )));
        }

        let book = self.book(&symbol);
        let mut book = book.lock();

        // Sequence assignment and the whole matching loop happen under
        // the same lock, so per-ticker FIFO order is the observed
        // submission order.
        let sequence = book.next_order_sequence();
        let mut order = Order::new(OrderId::new(), symbol, side, price, quantity, sequence);

        debug!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            price = order.price,
            quantity = order.quantity,
            sequence = order.sequence,
            "Order accepted"
        );

        let events = Self::match_incoming(&mut book, &mut order)?;

        // Any remainder rests and waits for a future crossing order.
        if !order.is_filled() {
            book.insert(order);
        }

        if let Some(sink) = &self.sink {
            for event in &events {
                sink.on_trade(event);
            }
            sink.on_book_update(&BookSnapshot::from_book(&book, SNAPSHOT_DEPTH));
        }

        Ok(events)
    }

    /// Run the matching loop for one incoming order
    ///
    /// Matches against the front of the best opposite level while the
    /// incoming order still has quantity and prices cross; terminates on
    /// the first non-crossing best price. The trade price is always the
    /// resting order's price.
    fn match_incoming(
        book: &mut OrderBook,
        order: &mut Order,
    ) -> Result<Vec<TradeEvent>, MatchingError> {
        let mut events = Vec::new();
        let opposite = order.side.opposite();

        while !order.is_filled() {
            let best = match book.best_price(opposite) {
                Some(price) => price,
                None => break,
            };
            let crosses = match order.side {
                Side::Buy => order.price >= best,
                Side::Sell => order.price <= best,
            };
            if !crosses {
                break;
            }

            let (resting_id, resting_price, traded, resting_filled) = {
                let resting = book.front_order_mut(opposite).ok_or_else(|| {
                    MatchingError::internal("best level has no resting orders")
                })?;
                let traded = order.quantity.min(resting.quantity);
                resting.fill(traded);
                (resting.id, resting.price, traded, resting.is_filled())
            };
            order.fill(traded);

            let (buy_order_id, sell_order_id) = match order.side {
                Side::Buy => (order.id, resting_id),
                Side::Sell => (resting_id, order.id),
            };
            let event = TradeEvent::new(
                order.symbol.clone(),
                resting_price,
                traded,
                buy_order_id,
                sell_order_id,
                order.side,
                book.next_trade_sequence(),
            );

            debug!(
                trade_id = %event.trade_id,
                symbol = %event.symbol,
                price = event.price,
                quantity = event.quantity,
                "Trade executed"
            );
            events.push(event);

            // An order leaves the book in the same step that drives its
            // quantity to zero.
            if resting_filled {
                book.remove_filled(resting_id).ok_or_else(|| {
                    MatchingError::internal("filled resting order missing from book")
                })?;
            }
        }

        Ok(events)
    }

    /// Get or create the book entry for a ticker
    fn book(&self, symbol: &Symbol) -> Arc<Mutex<OrderBook>> {
        if let Some(book) = self.books.read().get(symbol) {
            return Arc::clone(book);
        }
        let mut books = self.books.write();
        Arc::clone(
            books
                .entry(symbol.clone())
                .or_insert_with(|| Arc::new(Mutex::new(OrderBook::new(symbol.clone())))),
        )
    }

    /// Look up the book entry for a ticker, if one exists
    fn existing_book(&self, symbol: &str) -> Option<Arc<Mutex<OrderBook>>> {
        let symbol = Symbol::parse(symbol).ok()?;
        self.books.read().get(&symbol).map(Arc::clone)
    }

    /// Best bid price for a ticker
    ///
    /// May race benignly with concurrent submits; the returned value
    /// reflects some consistent point no later than the call's return.
    pub fn best_bid(&self, symbol: &str) -> Option<f64> {
        self.existing_book(symbol)?.lock().best_bid()
    }

    /// Best ask price for a ticker
    pub fn best_ask(&self, symbol: &str) -> Option<f64> {
        self.existing_book(symbol)?.lock().best_ask()
    }

    /// Snapshot of the top `depth` levels of a ticker's book
    pub fn snapshot(&self, symbol: &str, depth: usize) -> Option<BookSnapshot> {
        let book = self.existing_book(symbol)?;
        let book = book.lock();
        Some(BookSnapshot::from_book(&book, depth))
    }

    /// Number of orders resting in a ticker's book
    pub fn order_count(&self, symbol: &str) -> usize {
        self.existing_book(symbol)
            .map(|b| b.lock().order_count())
            .unwrap_or(0)
    }

    /// All tickers with an order book
    pub fn symbols(&self) -> Vec<Symbol> {
        self.books.read().keys().cloned().collect()
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use assert_matches::assert_matches;

    #[test]
    fn test_resting_then_full_match() {
        let engine = MatchingEngine::new();

        // Sell 10 @ 100 rests (no buyers yet)
        let events = engine.submit(Side::Sell, "AAPL", 10, 100.0).unwrap();
        assert!(events.is_empty());
        assert_eq!(engine.best_ask("AAPL"), Some(100.0));

        // Buy 10 @ 100 crosses and clears the book
        let events = engine.submit(Side::Buy, "AAPL", 10, 100.0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].quantity, 10);
        assert_eq!(events[0].price, 100.0);
        assert_eq!(events[0].aggressor_side, Side::Buy);

        assert!(engine.best_bid("AAPL").is_none());
        assert!(engine.best_ask("AAPL").is_none());
        assert_eq!(engine.order_count("AAPL"), 0);
    }

    #[test]
    fn test_partial_fill_leaves_resting_remainder() {
        let engine = MatchingEngine::new();

        engine.submit(Side::Sell, "AAPL", 5, 100.0).unwrap();
        let events = engine.submit(Side::Buy, "AAPL", 10, 100.0).unwrap();

        // 5 traded, 5 rests on the bid
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].quantity, 5);
        assert!(engine.best_ask("AAPL").is_none());
        assert_eq!(engine.best_bid("AAPL"), Some(100.0));

        let snap = engine.snapshot("AAPL", 10).unwrap();
        assert_eq!(snap.bids[0].quantity, 5);
    }

    #[test]
    fn test_partially_filled_resting_order_keeps_front() {
        let engine = MatchingEngine::new();

        // Sell 10 @ 100, then two small buys
        engine.submit(Side::Sell, "AAPL", 10, 100.0).unwrap();
        let first = engine.submit(Side::Buy, "AAPL", 4, 100.0).unwrap();
        let second = engine.submit(Side::Buy, "AAPL", 6, 100.0).unwrap();

        assert_eq!(first[0].quantity, 4);
        assert_eq!(second[0].quantity, 6);
        // Both fills hit the same resting seller
        assert_eq!(first[0].sell_order_id, second[0].sell_order_id);
        assert!(engine.best_ask("AAPL").is_none());
    }

    #[test]
    fn test_trade_price_is_resting_price() {
        let engine = MatchingEngine::new();

        // Bid 100 rests; an aggressive sell at 95 must trade at 100
        engine.submit(Side::Buy, "AAPL", 10, 100.0).unwrap();
        let events = engine.submit(Side::Sell, "AAPL", 10, 95.0).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].price, 100.0);
        assert_eq!(events[0].aggressor_side, Side::Sell);
    }

    #[test]
    fn test_two_level_walk() {
        let engine = MatchingEngine::new();

        // Sell 5 @ 100, Sell 5 @ 101; Buy 8 @ 101 walks the book
        engine.submit(Side::Sell, "AAPL", 5, 100.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 5, 101.0).unwrap();
        let events = engine.submit(Side::Buy, "AAPL", 8, 101.0).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!((events[0].quantity, events[0].price), (5, 100.0));
        assert_eq!((events[1].quantity, events[1].price), (3, 101.0));

        // Sell 2 @ 101 remains
        assert_eq!(engine.best_ask("AAPL"), Some(101.0));
        let snap = engine.snapshot("AAPL", 10).unwrap();
        assert_eq!(snap.asks[0].quantity, 2);
        assert!(engine.best_bid("AAPL").is_none());
    }

    #[test]
    fn test_time_priority_within_level() {
        let engine = MatchingEngine::new();

        // Three sells at the same price, distinguishable by quantity
        engine.submit(Side::Sell, "AAPL", 10, 100.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 20, 100.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 30, 100.0).unwrap();

        let events = engine.submit(Side::Buy, "AAPL", 60, 100.0).unwrap();

        // Consumed strictly in submission order
        let quantities: Vec<u64> = events.iter().map(|e| e.quantity).collect();
        assert_eq!(quantities, vec![10, 20, 30]);
        assert_eq!(engine.order_count("AAPL"), 0);
    }

    #[test]
    fn test_price_priority_dominates_time_priority() {
        let engine = MatchingEngine::new();

        // The 100 level arrives after the 101 level but matches first
        engine.submit(Side::Sell, "AAPL", 5, 101.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 5, 100.0).unwrap();

        let events = engine.submit(Side::Buy, "AAPL", 10, 101.0).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].price, 100.0);
        assert_eq!(events[1].price, 101.0);
    }

    #[test]
    fn test_early_termination_on_first_non_cross() {
        let engine = MatchingEngine::new();

        engine.submit(Side::Sell, "AAPL", 5, 100.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 5, 105.0).unwrap();

        // Buy 10 @ 102 takes the 100 level and stops at 105
        let events = engine.submit(Side::Buy, "AAPL", 10, 102.0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].price, 100.0);

        // Remainder rests without crossing
        assert_eq!(engine.best_bid("AAPL"), Some(102.0));
        assert_eq!(engine.best_ask("AAPL"), Some(105.0));
    }

    #[test]
    fn test_no_resting_cross_invariant() {
        let engine = MatchingEngine::new();

        let orders = [
            (Side::Sell, 30, 101.0),
            (Side::Buy, 10, 99.0),
            (Side::Buy, 25, 102.0),
            (Side::Sell, 40, 98.0),
            (Side::Buy, 7, 100.5),
        ];
        for (side, qty, price) in orders {
            engine.submit(side, "AAPL", qty, price).unwrap();

            if let (Some(bid), Some(ask)) = (engine.best_bid("AAPL"), engine.best_ask("AAPL")) {
                assert!(bid < ask, "book rests crossed: bid {} >= ask {}", bid, ask);
            }
        }
    }

    #[test]
    fn test_quantity_conservation() {
        let engine = MatchingEngine::new();

        engine.submit(Side::Sell, "AAPL", 4, 99.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 9, 100.0).unwrap();

        let submitted = 10;
        let events = engine.submit(Side::Buy, "AAPL", submitted, 100.0).unwrap();
        let filled: u64 = events.iter().map(|e| e.quantity).sum();
        assert!(filled <= submitted);
        assert_eq!(filled, 10);

        // Residue on the ask side accounts for the rest
        let snap = engine.snapshot("AAPL", 10).unwrap();
        assert_eq!(snap.asks[0].quantity, 3);
    }

    #[test]
    fn test_rejects_leave_book_unchanged() {
        let engine = MatchingEngine::new();
        engine.submit(Side::Buy, "AAPL", 10, 99.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 10, 101.0).unwrap();

        let before = (engine.best_bid("AAPL"), engine.best_ask("AAPL"));

        assert_matches!(
            engine.submit(Side::Buy, "AAPL", 0, 100.0),
            Err(MatchingError::InvalidOrder(_))
        );
        assert_matches!(
            engine.submit(Side::Sell, "AAPL", 10, -5.0),
            Err(MatchingError::InvalidOrder(_))
        );
        assert_matches!(
            engine.submit(Side::Sell, "AAPL", 10, f64::NAN),
            Err(MatchingError::InvalidOrder(_))
        );
        assert_matches!(
            engine.submit(Side::Buy, "not a ticker!", 10, 100.0),
            Err(MatchingError::InvalidOrder(_))
        );

        assert_eq!((engine.best_bid("AAPL"), engine.best_ask("AAPL")), before);
        assert_eq!(engine.order_count("AAPL"), 2);
    }

    #[test]
    fn test_tickers_are_independent() {
        let engine = MatchingEngine::new();

        engine.submit(Side::Sell, "AAPL", 10, 100.0).unwrap();
        engine.submit(Side::Sell, "MSFT", 10, 50.0).unwrap();

        // A crossing buy on AAPL must not touch MSFT
        let events = engine.submit(Side::Buy, "AAPL", 10, 100.0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(engine.best_ask("MSFT"), Some(50.0));
        assert!(engine.best_ask("AAPL").is_none());

        let mut symbols: Vec<String> = engine
            .symbols()
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect();
        symbols.sort();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_sink_delivery_is_synchronous_and_ordered() {
        let sink = Arc::new(CollectingSink::new());
        let engine = MatchingEngine::with_sink(Arc::clone(&sink) as Arc<dyn TradeSink>);

        engine.submit(Side::Sell, "AAPL", 5, 100.0).unwrap();
        engine.submit(Side::Sell, "AAPL", 5, 101.0).unwrap();
        let returned = engine.submit(Side::Buy, "AAPL", 8, 101.0).unwrap();

        // The sink saw exactly the returned trades, in the same order
        let seen = sink.trades();
        assert_eq!(seen.len(), returned.len());
        for (s, r) in seen.iter().zip(returned.iter()) {
            assert_eq!(s.trade_id, r.trade_id);
        }

        // One book update per submit
        assert_eq!(sink.updates().len(), 3);
        let last = &sink.updates()[2];
        assert_eq!(last.asks[0].quantity, 2);
    }

    #[test]
    fn test_unreferenced_ticker_queries() {
        let engine = MatchingEngine::new();
        assert!(engine.best_bid("GOOG").is_none());
        assert!(engine.best_ask("GOOG").is_none());
        assert!(engine.snapshot("GOOG", 10).is_none());
        assert_eq!(engine.order_count("GOOG"), 0);
    }
}
