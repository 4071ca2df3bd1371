//! Observability infrastructure for Matchbook
//!
//! This crate provides structured logging via tracing.
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("matchbook", LogFormat::Pretty)?;
//! tracing::info!("engine started");
//! ```

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
