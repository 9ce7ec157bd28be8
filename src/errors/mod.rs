//! # Error Handling
//!
//! Crate-wide error types built with `thiserror`. Secret-store failures have
//! their own [`crate::secrets::SecretsError`] and are wrapped here once they
//! cross into a bind or load call.

pub mod types;

pub use types::{Result, VaultBindError};

/// Shorthand used across the crate and re-exported at the root.
pub type Error = VaultBindError;
