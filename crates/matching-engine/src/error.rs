//! Matching engine error types

use thiserror::Error;

/// Errors that can occur during order matching
#[derive(Error, Debug)]
pub enum MatchingError {
    /// Order was rejected before touching the book (bad quantity, price
    /// or symbol). The book is left observably unchanged.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// A book invariant was violated. This aborts the operation rather
    /// than risk emitting a corrupt trade.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatchingError {
    /// Create an invalid order rejection
    pub fn invalid_order(msg: impl Into<String>) -> Self {
        Self::InvalidOrder(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
