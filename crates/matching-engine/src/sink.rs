//! Trade sinks
//!
//! A [`TradeSink`] is the external collaborator that consumes trade and
//! book-update events. Delivery is synchronous: the sink is invoked
//! inside the submitting call, in generation order, before `submit`
//! returns. Implementations can forward to an event bus, persistence or
//! a UI; here we ship a logging sink and a collector for tests.

use parking_lot::Mutex;

use crate::domain::BookSnapshot;
use crate::event::TradeEvent;

/// Consumer of matching engine output
///
/// Implementations must be cheap: they run inside the ticker's exclusive
/// section and extend the time the book is held.
pub trait TradeSink: Send + Sync {
    /// Called once per trade, in the order trades were generated
    fn on_trade(&self, event: &TradeEvent);

    /// Called after each submit with the residual state of the book
    fn on_book_update(&self, _snapshot: &BookSnapshot) {}
}

/// Sink that logs every trade via `tracing`
#[derive(Debug, Default)]
pub struct LogSink;

impl TradeSink for LogSink {
    fn on_trade(&self, event: &TradeEvent) {
        tracing::info!(
            trade_id = %event.trade_id,
            symbol = %event.symbol,
            price = event.price,
            quantity = event.quantity,
            buy_order_id = %event.buy_order_id,
            sell_order_id = %event.sell_order_id,
            aggressor = %event.aggressor_side,
            sequence = event.sequence,
            "Trade executed"
        );
    }

    fn on_book_update(&self, snapshot: &BookSnapshot) {
        tracing::debug!(
            symbol = %snapshot.symbol,
            best_bid = ?snapshot.bids.first().map(|l| l.price),
            best_ask = ?snapshot.asks.first().map(|l| l.price),
            "Book updated"
        );
    }
}

/// Sink that buffers everything it receives, for assertions in tests
#[derive(Debug, Default)]
pub struct CollectingSink {
    trades: Mutex<Vec<TradeEvent>>,
    updates: Mutex<Vec<BookSnapshot>>,
}

impl CollectingSink {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// All trades received so far
    pub fn trades(&self) -> Vec<TradeEvent> {
        self.trades.lock().clone()
    }

    /// All book updates received so far
    pub fn updates(&self) -> Vec<BookSnapshot> {
        self.updates.lock().clone()
    }
}

impl TradeSink for CollectingSink {
    fn on_trade(&self, event: &TradeEvent) {
        self.trades.lock().push(event.clone());
    }

    fn on_book_update(&self, snapshot: &BookSnapshot) {
        self.updates.lock().push(snapshot.clone());
    }
}
