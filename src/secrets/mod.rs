//! Secret-store access.
//!
//! The layer is built around the [`SecretsClient`] trait, a read-only seam
//! with one operation: fetch the current value of a named secret.
//!
//! - [`KeyVaultClient`]: HTTPS key vault backend authenticated through a
//!   [`TokenCredential`] (managed identity or a static token)
//! - [`MemorySecretsClient`]: in-memory store for tests and local runs
//! - [`EnvVarSecretsClient`]: `VAULTBIND_SECRET_*` environment variables
//!
//! [`fetch_secrets`] runs a batch against any backend, applying the
//! not-found suppression policy. [`KeyVaultOptions`] carries the settings
//! that locate the vault.
//!
//! Secret values are wrapped in [`SecretString`] and never logged.

pub mod client;
pub mod credential;
pub mod env;
pub mod error;
pub mod fetch;
pub mod keyvault;
pub mod location;
pub mod memory;
pub mod types;

pub use client::{validate_secret_name, SecretsClient, VaultConnector};
pub use credential::{
    AccessToken, ManagedIdentityCredential, StaticTokenCredential, TokenCredential,
};
pub use env::EnvVarSecretsClient;
pub use error::{Result, SecretsError};
pub use fetch::{fetch_secrets, FetchOptions, SecretBatch, SecretRequest};
pub use keyvault::{KeyVaultClient, KeyVaultConnector};
pub use location::{vault_url_from_name, KeyVaultOptions, KEY_VAULT_SECTION};
pub use memory::MemorySecretsClient;
pub use types::SecretString;
