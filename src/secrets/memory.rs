//! In-memory secrets backend for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use url::Url;

use super::client::{SecretsClient, VaultConnector};
use super::error::{Result, SecretsError};
use super::location::KeyVaultOptions;
use super::types::SecretString;

/// Secret store backed by a `HashMap`.
///
/// Clones share the same map and request counter, so a test can hand one
/// clone to a binder and inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretsClient {
    data: Arc<RwLock<HashMap<String, String>>>,
    requests: Arc<AtomicUsize>,
}

impl MemorySecretsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a secret. A lock poisoned by a panicking writer is
    /// recovered; the map holds whole entries only.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(name.into(), value.into());
    }

    /// Number of `get_secret` calls served so far, hits and misses alike.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretsClient for MemorySecretsClient {
    async fn get_secret(&self, name: &str) -> Result<SecretString> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);

        data.get(name)
            .map(|v| SecretString::new(v.as_str()))
            .ok_or_else(|| SecretsError::not_found(name))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Hands out clones, so every connection sees the same map.
impl VaultConnector for MemorySecretsClient {
    fn connect(&self, vault_url: &Url, _options: &KeyVaultOptions) -> Result<Box<dyn SecretsClient>> {
        tracing::debug!(vault_url = %vault_url, "Connecting in-memory secret store");
        Ok(Box::new(self.clone()))
    }
}
