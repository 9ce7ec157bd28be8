//! # Observability
//!
//! Structured logging for secret fetch and bind operations.

pub mod logging;

pub use logging::{init_logging, LoggingOptions};
