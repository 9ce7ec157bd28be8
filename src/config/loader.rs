//! # Layered Configuration Loader
//!
//! [`ConfigLoader`] assembles sources in a fixed order, lowest precedence
//! first:
//!
//! 1. process environment variables (`__` separates nesting levels)
//! 2. command-line arguments
//! 3. `appsettings.json` (optional)
//! 4. `appsettings.{environment}.json` (optional)
//! 5. overlays, in the order they were added: in-memory overrides and
//!    key vault secrets
//!
//! A later source wins over an earlier one for the same key. Keys are
//! folded to lowercase in every layer, so `Database__Host`, `"Database":
//! {"Host": ..}` and a `database--host` secret all write the same setting.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};

use super::environment::{EnvironmentProvider, FixedEnvironment, ProcessEnvironment};
use super::keys::normalize_entries;
use super::settings::Settings;
use super::sources::{CaseFolded, CommandLineSource, KeyValueSource};
use crate::errors::{Result, VaultBindError};
use crate::secrets::{
    fetch_secrets, FetchOptions, KeyVaultConnector, KeyVaultOptions, SecretRequest,
    VaultConnector,
};

/// Base settings file, read from the loader's base path.
pub const BASE_SETTINGS_FILE: &str = "appsettings.json";

/// Nesting separator for environment variable names (`Database__Host`).
pub const ENV_SEPARATOR: &str = "__";

/// Environment-specific settings file name.
pub fn environment_settings_file(environment: &str) -> String {
    format!("appsettings.{}.json", environment)
}

/// Secrets layered into the configuration at [`ConfigLoader::load`] time.
///
/// The secret list is the union of the names added here and the
/// `key_vault.secrets` setting. Prefix and suppression fall back to the
/// `key_vault` section when not set here.
#[derive(Clone)]
pub struct KeyVaultSource {
    connector: Arc<dyn VaultConnector>,
    secrets: Vec<SecretRequest>,
    prefix: Option<String>,
    suppress_not_found: Option<bool>,
}

impl KeyVaultSource {
    pub fn new(connector: Arc<dyn VaultConnector>) -> Self {
        Self { connector, secrets: Vec::new(), prefix: None, suppress_not_found: None }
    }

    /// Source authenticated with the platform managed identity.
    pub fn managed_identity() -> Self {
        Self::new(Arc::new(KeyVaultConnector::managed_identity()))
    }

    pub fn secret(mut self, request: impl Into<SecretRequest>) -> Self {
        self.secrets.push(request.into());
        self
    }

    pub fn secrets<I, R>(mut self, requests: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<SecretRequest>,
    {
        self.secrets.extend(requests.into_iter().map(Into::into));
        self
    }

    /// Publish secrets under `prefix:` (e.g. `base` → `base:Db:Password`).
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn suppress_not_found(mut self, suppress: bool) -> Self {
        self.suppress_not_found = Some(suppress);
        self
    }
}

impl fmt::Debug for KeyVaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVaultSource")
            .field("secrets", &self.secrets)
            .field("prefix", &self.prefix)
            .field("suppress_not_found", &self.suppress_not_found)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Overlay {
    Values(KeyValueSource),
    KeyVault(KeyVaultSource),
}

/// Builder for a layered [`Settings`] snapshot.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base_path: PathBuf,
    environment: Arc<dyn EnvironmentProvider>,
    env_prefix: Option<String>,
    include_environment_variables: bool,
    args: Option<Vec<String>>,
    overlays: Vec<Overlay>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            environment: Arc::new(ProcessEnvironment),
            env_prefix: None,
            include_environment_variables: true,
            args: None,
            overlays: Vec::new(),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the settings files.
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Fix the environment name instead of reading it from the process.
    pub fn environment_name(self, name: impl Into<String>) -> Self {
        self.environment_provider(Arc::new(FixedEnvironment::new(name)))
    }

    pub fn environment_provider(mut self, provider: Arc<dyn EnvironmentProvider>) -> Self {
        self.environment = provider;
        self
    }

    /// Only read environment variables starting with `{prefix}_`.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn without_environment_variables(mut self) -> Self {
        self.include_environment_variables = false;
        self
    }

    /// Use these arguments instead of the process arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Add one in-memory value on top of everything added so far.
    pub fn with_override(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let entry: (String, String) = (key.into(), value.into());
        self.with_overrides([entry])
    }

    /// Add in-memory values on top of everything added so far.
    pub fn with_overrides<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        match self.overlays.last_mut() {
            Some(Overlay::Values(source)) => source.extend(entries),
            _ => self
                .overlays
                .push(Overlay::Values(KeyValueSource::with_entries("in-memory", entries))),
        }
        self
    }

    /// Layer secrets from a key vault on top of everything added so far.
    pub fn with_key_vault(mut self, source: KeyVaultSource) -> Self {
        self.overlays.push(Overlay::KeyVault(source));
        self
    }

    pub fn resolve_environment(&self) -> String {
        self.environment.environment_name()
    }

    /// Build without contacting any key vault; key vault overlays are skipped.
    pub fn build(&self) -> Result<Settings> {
        let environment = self.resolve_environment();
        let config = self.compose(&environment, self.value_layers())?;
        Ok(Settings::new(config, environment, Vec::new(), Some(self.clone())))
    }

    /// Build, fetching key vault overlays first.
    ///
    /// The vault location and policy are read from the configuration as it
    /// stands without any secrets. Each overlay uses its own short-lived
    /// client; a fetch failure fails the whole load.
    pub async fn load(&self) -> Result<Settings> {
        if !self.overlays.iter().any(|o| matches!(o, Overlay::KeyVault(_))) {
            return self.build();
        }

        let environment = self.resolve_environment();
        let base = self.build()?;

        let mut layers = Vec::with_capacity(self.overlays.len());
        let mut secret_keys = Vec::new();

        for overlay in &self.overlays {
            match overlay {
                Overlay::Values(source) => layers.push(source.clone()),
                Overlay::KeyVault(source) => {
                    let secrets = fetch_overlay(source, base.as_config()).await?;
                    secret_keys.extend(secrets.keys().map(str::to_string));
                    layers.push(secrets);
                }
            }
        }

        let config = self.compose(&environment, layers)?;
        Ok(Settings::new(config, environment, secret_keys, Some(self.clone())))
    }

    /// The loader's sources without key vault overlays, plus `secrets`
    /// (already keyed) on top. A bind call reads fetched values from this view.
    pub fn build_with_secrets(&self, secrets: KeyValueSource) -> Result<Settings> {
        let environment = self.resolve_environment();
        let secret_keys = secrets.keys().map(str::to_string).collect();

        let mut layers = self.value_layers();
        layers.push(secrets);

        let config = self.compose(&environment, layers)?;
        Ok(Settings::new(config, environment, secret_keys, None))
    }

    fn value_layers(&self) -> Vec<KeyValueSource> {
        self.overlays
            .iter()
            .filter_map(|overlay| match overlay {
                Overlay::Values(source) => Some(source.clone()),
                Overlay::KeyVault(_) => None,
            })
            .collect()
    }

    fn compose(&self, environment: &str, layers: Vec<KeyValueSource>) -> Result<config::Config> {
        let mut builder: ConfigBuilder<DefaultState> = config::Config::builder();

        if self.include_environment_variables {
            let env = match &self.env_prefix {
                Some(prefix) => Environment::with_prefix(prefix).prefix_separator("_"),
                None => Environment::default(),
            };
            builder = builder.add_source(CaseFolded::new(env.separator(ENV_SEPARATOR)));
        }

        let args = match &self.args {
            Some(args) => CommandLineSource::new(args.iter().cloned()),
            None => CommandLineSource::from_process(),
        };
        builder = builder.add_source(args);

        let base_file = self.base_path.join(BASE_SETTINGS_FILE);
        let env_file = self.base_path.join(environment_settings_file(environment));
        tracing::debug!(
            base = %base_file.display(),
            environment_file = %env_file.display(),
            "Reading settings files"
        );

        builder = builder
            .add_source(CaseFolded::new(File::from(base_file).format(FileFormat::Json).required(false)))
            .add_source(CaseFolded::new(File::from(env_file).format(FileFormat::Json).required(false)));

        for layer in layers {
            builder = builder.add_source(layer);
        }

        builder.build().map_err(|e| {
            VaultBindError::config_with_source("Failed to build configuration", Box::new(e))
        })
    }
}

async fn fetch_overlay(source: &KeyVaultSource, base: &config::Config) -> Result<KeyValueSource> {
    let options = KeyVaultOptions::from_config(base)?;

    let mut requests = source.secrets.clone();
    requests.extend(options.secrets.iter().map(SecretRequest::new));

    if requests.is_empty() {
        tracing::debug!("Key vault source has no secrets to fetch");
        return Ok(KeyValueSource::new("key vault"));
    }

    let prefix = source.prefix.clone().or_else(|| options.prefix.clone());
    let fetch = FetchOptions {
        suppress_not_found: source.suppress_not_found.unwrap_or(options.suppress_not_found),
    };
    let vault_url = options.resolve_url()?;

    let batch = {
        let client = source
            .connector
            .connect(&vault_url, &options)
            .map_err(VaultBindError::secret_fetch)?;
        fetch_secrets(client.as_ref(), &requests, fetch)
            .await
            .map_err(VaultBindError::secret_fetch)?
    };

    let values = batch.into_values().into_iter().map(|(key, value)| (key, value.into_inner()));
    let entries = normalize_entries(values, prefix.as_deref());

    tracing::info!(vault = %vault_url, keys = entries.len(), "Layered key vault secrets");
    Ok(KeyValueSource::with_entries("key vault", entries))
}
