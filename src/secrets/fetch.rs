//! Batch secret fetch with not-found suppression.
//!
//! Requests are issued strictly one after another. A missing secret is either
//! logged and skipped (suppression on, the default) or ends the batch with
//! the not-found error. Any other failure ends the batch immediately and the
//! values gathered so far are dropped with it.

use tracing::Instrument;

use super::client::SecretsClient;
use super::error::Result;
use super::types::SecretString;

/// One secret to fetch, optionally published under a different key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    pub name: String,
    pub key: Option<String>,
}

impl SecretRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), key: None }
    }

    /// Publish the value under `key` instead of the secret name.
    pub fn as_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Key the fetched value is published under.
    pub fn output_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }
}

impl From<&str> for SecretRequest {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SecretRequest {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Fetch behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub suppress_not_found: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { suppress_not_found: true }
    }
}

/// Values fetched in request order, plus the names that were skipped.
#[derive(Debug, Default)]
pub struct SecretBatch {
    values: Vec<(String, SecretString)>,
    missing: Vec<String>,
}

impl SecretBatch {
    /// Value published under `key`; the last one wins if two requests share a key.
    pub fn get(&self, key: &str) -> Option<&SecretString> {
        self.values.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn values(&self) -> &[(String, SecretString)] {
        &self.values
    }

    pub fn into_values(self) -> Vec<(String, SecretString)> {
        self.values
    }

    /// Secret names skipped as not found.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fetch every request from `client`, one round trip each.
pub async fn fetch_secrets(
    client: &dyn SecretsClient,
    requests: &[SecretRequest],
    options: FetchOptions,
) -> Result<SecretBatch> {
    let span = crate::fetch_span!(client.backend_name(), requests.len());

    async move {
        let mut batch = SecretBatch::default();

        for request in requests {
            match client.get_secret(&request.name).await {
                Ok(value) => {
                    tracing::debug!(secret = %request.name, key = %request.output_key(), "Fetched secret");
                    batch.values.push((request.output_key().to_string(), value));
                }
                Err(e) if e.is_not_found() && options.suppress_not_found => {
                    tracing::warn!(secret = %request.name, "Secret not found in key vault, skipping");
                    batch.missing.push(request.name.clone());
                }
                Err(e) => {
                    tracing::error!(error = %e, secret = %request.name, "Secret fetch aborted");
                    return Err(e);
                }
            }
        }

        tracing::info!(
            fetched = batch.values.len(),
            missing = batch.missing.len(),
            "Secret batch complete"
        );
        Ok(batch)
    }
    .instrument(span)
    .await
}
