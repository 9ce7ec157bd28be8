//! # vaultbind
//!
//! Layered configuration loading with key vault secret binding.
//!
//! ## Architecture
//!
//! ```text
//! env vars → args → appsettings.json → appsettings.{env}.json → overrides / secrets
//!                              ↓
//!                      ConfigLoader → Settings
//!                              ↓
//!        Binder: section → T, then secret-mapped fields ← key vault
//! ```
//!
//! ## Core Components
//!
//! - **Configuration** ([`config`]): [`ConfigLoader`] composes sources in a
//!   fixed precedence and produces a [`Settings`] snapshot
//! - **Secrets** ([`secrets`]): the [`secrets::SecretsClient`] seam, the key
//!   vault REST client, managed identity credentials, and batch fetch with
//!   not-found suppression
//! - **Mappings** ([`mapping`]): which fields of a settings type come from
//!   which secrets, declared with [`secret_fields!`]
//! - **Binding** ([`binding`]): [`bind`] and [`Binder`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use vaultbind::{ConfigLoader, Result};
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct DatabaseSettings {
//!     #[serde(default)]
//!     host: String,
//!     #[serde(default)]
//!     password: String,
//! }
//!
//! vaultbind::secret_fields!(DatabaseSettings { password => "db-password" });
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = ConfigLoader::new().build()?;
//!     let db: DatabaseSettings =
//!         vaultbind::bind(settings.as_config(), Some("database"), &[]).await?;
//!     println!("connecting to {}", db.host);
//!     Ok(())
//! }
//! ```

pub mod binding;
pub mod cli;
pub mod config;
pub mod errors;
pub mod mapping;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use binding::{bind, Binder};
pub use config::{ConfigLoader, KeyVaultSource, Settings};
pub use errors::{Error, Result, VaultBindError};
pub use mapping::{SecretFields, SecretMapping};
pub use secrets::{KeyVaultConnector, SecretString, SecretsClient, VaultConnector};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
