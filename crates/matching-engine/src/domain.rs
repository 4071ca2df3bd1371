//! Domain types for the matching engine
//!
//! This module defines orders, per-ticker order books and book snapshots.
//! A book keeps two sides as price-ordered level maps (bids descending,
//! asks ascending), each level a FIFO queue, plus an id index locating
//! every resting order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use common::{OrderId, Side, Symbol};

// ============================================================================
// Order
// ============================================================================

/// A limit order resting in (or passing through) the book
///
/// Identity fields are immutable; only `quantity` changes, strictly
/// decreasing as fills occur. An order with quantity 0 is terminal and
/// never rests in a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order ID, assigned at submission
    pub id: OrderId,
    /// Ticker being traded
    pub symbol: Symbol,
    /// Buy or Sell
    pub side: Side,
    /// Limit price
    pub price: f64,
    /// Remaining quantity to fill
    pub quantity: u64,
    /// Per-ticker sequence number (determines time priority)
    pub sequence: u64,
}

impl Order {
    /// Create a new order
    pub fn new(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        price: f64,
        quantity: u64,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            price,
            quantity,
            sequence,
        }
    }

    /// Reduce quantity after a (partial) fill
    pub fn fill(&mut self, qty: u64) {
        self.quantity = self.quantity.saturating_sub(qty);
    }

    /// Check if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }
}

// ============================================================================
// Order Book
// ============================================================================

/// Order book for a single ticker
///
/// CRITICAL PROPERTIES:
/// 1. Bids sorted descending (highest price first)
/// 2. Asks sorted ascending (lowest price first)
/// 3. Each price level is a FIFO queue (ascending sequence)
/// 4. Empty levels are pruned the moment the last order leaves
/// 5. The id index always points at every resting order's level
#[derive(Debug)]
pub struct OrderBook {
    /// Ticker this book is for
    symbol: Symbol,
    /// Buy orders (price level -> FIFO queue), descending iteration
    bids: BTreeMap<Reverse<OrderedFloat<f64>>, VecDeque<Order>>,
    /// Sell orders (price level -> FIFO queue), ascending iteration
    asks: BTreeMap<OrderedFloat<f64>, VecDeque<Order>>,
    /// Order id -> (side, price level) of the resting order
    index: HashMap<OrderId, (Side, OrderedFloat<f64>)>,
    /// Sequence counter for orders entering this book
    order_sequence: u64,
    /// Sequence counter for trades on this book
    trade_sequence: u64,
}

impl OrderBook {
    /// Create a new, empty order book
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            order_sequence: 0,
            trade_sequence: 0,
        }
    }

    /// Ticker this book belongs to
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Next order sequence number (time priority tie-break)
    ///
    /// Must be called under the same exclusive section that inserts the
    /// order, so sequence order matches observable insertion order.
    pub fn next_order_sequence(&mut self) -> u64 {
        self.order_sequence += 1;
        self.order_sequence
    }

    /// Next trade sequence number
    pub fn next_trade_sequence(&mut self) -> u64 {
        self.trade_sequence += 1;
        self.trade_sequence
    }

    /// Get best bid price (highest buy)
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.keys().next().map(|k| k.0 .0)
    }

    /// Get best ask price (lowest sell)
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.keys().next().map(|k| k.0)
    }

    /// Best price on the given side
    pub fn best_price(&self, side: Side) -> Option<f64> {
        match side {
            Side::Buy => self.best_bid(),
            Side::Sell => self.best_ask(),
        }
    }

    /// Get spread (best ask - best bid)
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Insert an order at the level implied by its side and price
    ///
    /// Creates the level if absent; appends at the back of the level
    /// (FIFO within equal prices) and records the order in the id index.
    pub fn insert(&mut self, order: Order) {
        let price = OrderedFloat(order.price);
        self.index.insert(order.id, (order.side, price));
        match order.side {
            Side::Buy => {
                self.bids
                    .entry(Reverse(price))
                    .or_insert_with(VecDeque::new)
                    .push_back(order);
            }
            Side::Sell => {
                self.asks
                    .entry(price)
                    .or_insert_with(VecDeque::new)
                    .push_back(order);
            }
        }
    }

    /// Earliest-arrived order at the best level on `side`
    pub fn front_order_mut(&mut self, side: Side) -> Option<&mut Order> {
        match side {
            Side::Buy => self.bids.values_mut().next()?.front_mut(),
            Side::Sell => self.asks.values_mut().next()?.front_mut(),
        }
    }

    /// Remove an order whose quantity has reached 0
    ///
    /// Locates the order through the id index and prunes its level if it
    /// becomes empty. Returns `None` if the order is not resting.
    pub fn remove_filled(&mut self, order_id: OrderId) -> Option<Order> {
        let (side, price) = self.index.remove(&order_id)?;
        match side {
            Side::Buy => {
                let queue = self.bids.get_mut(&Reverse(price))?;
                let pos = queue.iter().position(|o| o.id == order_id)?;
                let order = queue.remove(pos);
                if queue.is_empty() {
                    self.bids.remove(&Reverse(price));
                }
                order
            }
            Side::Sell => {
                let queue = self.asks.get_mut(&price)?;
                let pos = queue.iter().position(|o| o.id == order_id)?;
                let order = queue.remove(pos);
                if queue.is_empty() {
                    self.asks.remove(&price);
                }
                order
            }
        }
    }

    /// Check whether an order is resting in this book
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Total quantity resting at a bid price level
    pub fn bid_quantity_at(&self, price: f64) -> u64 {
        self.bids
            .get(&Reverse(OrderedFloat(price)))
            .map(|orders| orders.iter().map(|o| o.quantity).sum())
            .unwrap_or(0)
    }

    /// Total quantity resting at an ask price level
    pub fn ask_quantity_at(&self, price: f64) -> u64 {
        self.asks
            .get(&OrderedFloat(price))
            .map(|orders| orders.iter().map(|o| o.quantity).sum())
            .unwrap_or(0)
    }

    /// Total quantity resting on one side
    pub fn side_quantity(&self, side: Side) -> u64 {
        match side {
            Side::Buy => self
                .bids
                .values()
                .flat_map(|q| q.iter())
                .map(|o| o.quantity)
                .sum(),
            Side::Sell => self
                .asks
                .values()
                .flat_map(|q| q.iter())
                .map(|o| o.quantity)
                .sum(),
        }
    }

    /// Check if book is empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Get total number of orders resting in the book
    pub fn order_count(&self) -> usize {
        self.index.len()
    }
}

// ============================================================================
// Book Snapshot
// ============================================================================

/// Aggregated view of one price level, for market data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelView {
    /// Price
    pub price: f64,
    /// Total quantity at this price
    pub quantity: u64,
    /// Number of orders at this price
    pub order_count: usize,
}

/// Order book snapshot delivered to sinks after each submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Ticker
    pub symbol: Symbol,
    /// Bid price levels (best first)
    pub bids: Vec<LevelView>,
    /// Ask price levels (best first)
    pub asks: Vec<LevelView>,
    /// Book order sequence at snapshot time
    pub sequence: u64,
    /// Snapshot timestamp
    pub timestamp: DateTime<Utc>,
}

impl BookSnapshot {
    /// Create a snapshot of the top `depth` levels of each side
    pub fn from_book(book: &OrderBook, depth: usize) -> Self {
        let bids: Vec<LevelView> = book
            .bids
            .iter()
            .take(depth)
            .map(|(price, orders)| LevelView {
                price: price.0 .0,
                quantity: orders.iter().map(|o| o.quantity).sum(),
                order_count: orders.len(),
            })
            .collect();

        let asks: Vec<LevelView> = book
            .asks
            .iter()
            .take(depth)
            .map(|(price, orders)| LevelView {
                price: price.0,
                quantity: orders.iter().map(|o| o.quantity).sum(),
                order_count: orders.len(),
            })
            .collect();

        Self {
            symbol: book.symbol.clone(),
            bids,
            asks,
            sequence: book.order_sequence,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
