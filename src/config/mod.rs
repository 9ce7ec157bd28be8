//! # Configuration Management
//!
//! Layered configuration built on the `config` crate: environment variables,
//! command-line arguments, JSON settings files, in-memory overrides, and key
//! vault secrets, composed by [`ConfigLoader`] into a [`Settings`] snapshot.
//!
//! Keys are colon-delimited paths such as `Database:Password`.

pub mod environment;
pub mod keys;
pub mod loader;
pub mod settings;
pub mod sources;

pub use environment::{EnvironmentProvider, FixedEnvironment, ProcessEnvironment};
pub use keys::{normalize_secret_key, to_config_path};
pub use loader::{ConfigLoader, KeyVaultSource, BASE_SETTINGS_FILE};
pub use settings::Settings;
pub use sources::{CommandLineSource, KeyValueSource};
