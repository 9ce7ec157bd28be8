//! # Configuration Settings
//!
//! [`Settings`] is an immutable snapshot of the layered configuration.
//! Keys are colon paths (`Database:Password`) and match regardless of case.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;

use super::keys::{to_config_path, KEY_DELIMITER};
use super::loader::ConfigLoader;
use crate::errors::{Result, VaultBindError};

/// Placeholder written over secret values in [`Settings::to_redacted_json`].
pub const REDACTED: &str = "[REDACTED]";

/// Layered configuration snapshot.
#[derive(Debug, Clone)]
pub struct Settings {
    config: config::Config,
    environment: String,
    secret_keys: BTreeSet<String>,
    loader: Option<ConfigLoader>,
}

impl Settings {
    pub(crate) fn new(
        config: config::Config,
        environment: String,
        secret_keys: Vec<String>,
        loader: Option<ConfigLoader>,
    ) -> Self {
        let secret_keys = secret_keys.iter().map(|k| to_config_path(k)).collect();
        Self { config, environment, secret_keys, loader }
    }

    /// Wrap a configuration built elsewhere.
    pub fn from_config(config: config::Config, environment: impl Into<String>) -> Self {
        Self::new(config, environment.into(), Vec::new(), None)
    }

    /// Environment name the snapshot was built for.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// String value at `key`, or `None` if absent or not a scalar.
    pub fn get_string(&self, key: &str) -> Option<String> {
        lookup::<config::Value>(&self.config, key).and_then(|v| v.into_string()).ok()
    }

    /// Deserialize the value at `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.section(key)?
            .ok_or_else(|| VaultBindError::config(format!("Missing setting '{}'", key)))
    }

    /// Deserialize the value at `key`; `None` if the key is absent.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match lookup::<T>(&self.config, key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(VaultBindError::config_with_source(
                format!("Invalid setting '{}'", key),
                Box::new(e),
            )),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        lookup::<config::Value>(&self.config, key).is_ok()
    }

    /// Whether `key` was populated from a key vault.
    pub fn is_secret(&self, key: &str) -> bool {
        self.secret_keys.contains(&to_config_path(key))
    }

    /// Keys populated from a key vault, in colon form.
    pub fn secret_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.secret_keys.iter().map(|k| k.replace('.', &KEY_DELIMITER.to_string()))
    }

    pub fn as_config(&self) -> &config::Config {
        &self.config
    }

    pub fn into_config(self) -> config::Config {
        self.config
    }

    /// Whole configuration as JSON with secret values replaced by [`REDACTED`].
    pub fn to_redacted_json(&self) -> Result<serde_json::Value> {
        let mut json: serde_json::Value = self.config.clone().try_deserialize()?;

        for path in &self.secret_keys {
            redact(&mut json, path);
        }
        Ok(json)
    }

    /// Rebuild from the same loader, re-reading files and refetching secrets.
    pub async fn reload(&mut self) -> Result<()> {
        let loader = self.loader.clone().ok_or_else(|| {
            VaultBindError::config("Settings were not produced by a loader and cannot be reloaded")
        })?;

        *self = loader.load().await?;
        tracing::info!(environment = %self.environment, "Configuration reloaded");
        Ok(())
    }
}

/// Read `key` under its lowercase path, then under the path as written.
///
/// Loader-built configurations only hold lowercase keys. The second attempt
/// covers configurations assembled elsewhere with mixed-case keys.
pub(crate) fn lookup<T: DeserializeOwned>(
    config: &config::Config,
    key: &str,
) -> std::result::Result<T, config::ConfigError> {
    match config.get::<T>(&to_config_path(key)) {
        Err(config::ConfigError::NotFound(_)) => {
            let as_written: Vec<&str> = key.split(KEY_DELIMITER).filter(|s| !s.is_empty()).collect();
            config.get::<T>(&as_written.join("."))
        }
        found => found,
    }
}

fn redact(json: &mut serde_json::Value, path: &str) {
    let mut node = json;
    for segment in path.split('.') {
        match node.get_mut(segment) {
            Some(next) => node = next,
            None => return,
        }
    }
    if !node.is_object() {
        *node = serde_json::Value::String(REDACTED.to_string());
    }
}
