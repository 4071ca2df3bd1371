//! Common types and utilities for Matchbook
//!
//! This crate provides the shared domain vocabulary used across
//! all Matchbook crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (OrderId, Side, Symbol, etc.)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
