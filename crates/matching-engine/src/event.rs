//! Event types emitted by the matching engine
//!
//! A [`TradeEvent`] is the atomic record of a matched execution. Events
//! are generated inside the submitting call's exclusive section and
//! delivered synchronously, in generation order, before `submit` returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{OrderId, Side, Symbol, TradeId};

/// A matched execution between two orders
///
/// The price is ALWAYS the resting (maker) order's price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Unique trade identifier
    pub trade_id: TradeId,
    /// Ticker the trade occurred on
    pub symbol: Symbol,
    /// Execution price (the resting order's limit price)
    pub price: f64,
    /// Quantity exchanged
    pub quantity: u64,
    /// Order on the buy side of the trade
    pub buy_order_id: OrderId,
    /// Order on the sell side of the trade
    pub sell_order_id: OrderId,
    /// Which side was the aggressor (the incoming order)
    pub aggressor_side: Side,
    /// Per-ticker trade sequence number (deterministic ordering)
    pub sequence: u64,
    /// When the trade occurred
    pub timestamp: DateTime<Utc>,
}

impl TradeEvent {
    /// Create a new trade event
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        price: f64,
        quantity: u64,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        aggressor_side: Side,
        sequence: u64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            symbol,
            price,
            quantity,
            buy_order_id,
            sell_order_id,
            aggressor_side,
            sequence,
            timestamp: Utc::now(),
        }
    }
}
