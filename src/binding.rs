//! # Binding
//!
//! Populate a settings struct from configuration, then overwrite its
//! secret-mapped fields with values from the key vault.
//!
//! ```rust,ignore
//! #[derive(Debug, Default, Deserialize)]
//! struct DatabaseSettings {
//!     host: String,
//!     password: String,
//! }
//!
//! vaultbind::secret_fields!(DatabaseSettings { password => "db-password" });
//!
//! let settings = ConfigLoader::new().build()?;
//! let db: DatabaseSettings = vaultbind::bind(settings.as_config(), Some("database"), &[]).await?;
//! ```
//!
//! A bind call with no mappings never touches the network. Otherwise it
//! resolves the vault from the `key_vault` section of the same
//! configuration, fetches each mapped secret once, and assigns every field
//! whose secret resolved. Missing secrets leave their field as bound, unless
//! `key_vault.suppress_not_found` is `false`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::config::keys::{normalize_entries, to_hierarchical};
use crate::config::settings::lookup;
use crate::config::{ConfigLoader, KeyValueSource};
use crate::errors::{Result, VaultBindError};
use crate::mapping::{collect_mappings, SecretFields, SecretMapping};
use crate::secrets::{
    fetch_secrets, FetchOptions, KeyVaultConnector, KeyVaultOptions, SecretRequest,
    VaultConnector,
};

/// Binds settings types against a key vault.
///
/// `loader` supplies the default sources of the view fetched secrets are
/// read back from; `connector` opens the vault client for each call.
#[derive(Clone)]
pub struct Binder {
    loader: ConfigLoader,
    connector: Arc<dyn VaultConnector>,
}

impl Default for Binder {
    fn default() -> Self {
        Self {
            loader: ConfigLoader::new(),
            connector: Arc::new(KeyVaultConnector::managed_identity()),
        }
    }
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn VaultConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Bind `T` from `section` of `config`, applying the mappings `T`
    /// declares plus `manual`.
    pub async fn bind<T>(
        &self,
        config: &config::Config,
        section: Option<&str>,
        manual: &[SecretMapping<T>],
    ) -> Result<T>
    where
        T: SecretFields + DeserializeOwned + Default,
    {
        self.bind_with(config, section, collect_mappings(T::secret_fields(), manual)).await
    }

    /// Like [`Binder::bind`] for types without a [`SecretFields`] impl; only
    /// `mappings` are applied.
    pub async fn bind_mapped<T>(
        &self,
        config: &config::Config,
        section: Option<&str>,
        mappings: &[SecretMapping<T>],
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        self.bind_with(config, section, collect_mappings(Vec::new(), mappings)).await
    }

    async fn bind_with<T>(
        &self,
        config: &config::Config,
        section: Option<&str>,
        mappings: Vec<SecretMapping<T>>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let span = crate::bind_span!(std::any::type_name::<T>(), mappings.len());
        if let Some(section) = section {
            span.record("section", section);
        }

        async move {
            let mut target = bind_section::<T>(config, section)?;

            if mappings.is_empty() {
                tracing::debug!("No secret mappings, skipping key vault");
                return Ok(target);
            }

            let options = KeyVaultOptions::from_config(config)?;
            let vault_url = options.resolve_url()?;

            let mut requests: Vec<SecretRequest> = Vec::new();
            for mapping in &mappings {
                if !requests.iter().any(|r| r.name == mapping.secret()) {
                    requests.push(SecretRequest::new(mapping.secret()));
                }
            }

            let fetch = FetchOptions { suppress_not_found: options.suppress_not_found };
            let batch = {
                let client = self
                    .connector
                    .connect(&vault_url, &options)
                    .map_err(VaultBindError::secret_fetch)?;
                fetch_secrets(client.as_ref(), &requests, fetch)
                    .await
                    .map_err(VaultBindError::secret_fetch)?
            };

            let values = batch.into_values().into_iter().map(|(k, v)| (k, v.into_inner()));
            let secrets = KeyValueSource::with_entries("key vault", normalize_entries(values, None));
            let view = self.loader.build_with_secrets(secrets)?;

            let mut assigned = 0usize;
            for mapping in &mappings {
                match view.get_string(&to_hierarchical(mapping.secret())) {
                    Some(value) => {
                        mapping.assign(&mut target, &value)?;
                        assigned += 1;
                    }
                    None => tracing::debug!(
                        field = %mapping.field(),
                        secret = %mapping.secret(),
                        "No value resolved, field left as bound"
                    ),
                }
            }

            tracing::info!(assigned, mappings = mappings.len(), "Bound secret fields");
            Ok(target)
        }
        .instrument(span)
        .await
    }
}

fn bind_section<T>(config: &config::Config, section: Option<&str>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(section) = section else {
        return Ok(T::default());
    };

    match lookup::<T>(config, section) {
        Ok(target) => Ok(target),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section = %section, "Section absent, starting from defaults");
            Ok(T::default())
        }
        Err(e) => Err(VaultBindError::config_with_source(
            format!("Failed to bind section '{}'", section),
            Box::new(e),
        )),
    }
}

/// [`Binder::bind`] with the default loader and a managed identity connector.
pub async fn bind<T>(
    config: &config::Config,
    section: Option<&str>,
    manual: &[SecretMapping<T>],
) -> Result<T>
where
    T: SecretFields + DeserializeOwned + Default,
{
    Binder::new().bind(config, section, manual).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::types::SECRET_FETCH_FAILED;
    use crate::secrets::MemorySecretsClient;
    use serde::Deserialize;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct DbSettings {
        #[serde(default)]
        host: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        pool_size: u32,
    }

    crate::secret_fields!(DbSettings {
        password => "db-password",
        pool_size => "db-pool-size",
    });

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct NoSecrets {
        #[serde(default)]
        name: String,
    }

    impl SecretFields for NoSecrets {}

    fn config(entries: &[(&str, &str)]) -> config::Config {
        entries
            .iter()
            .fold(config::Config::builder(), |builder, (k, v)| {
                builder.set_override(*k, *v).unwrap()
            })
            .build()
            .unwrap()
    }

    fn binder(dir: &TempDir, store: &MemorySecretsClient) -> Binder {
        Binder::new()
            .with_loader(
                ConfigLoader::new()
                    .base_path(dir.path())
                    .environment_name("test")
                    .without_environment_variables()
                    .args(Vec::<String>::new()),
            )
            .with_connector(Arc::new(store.clone()))
    }

    #[traced_test]
    #[tokio::test]
    async fn test_binds_section_then_secrets() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new()
            .with_secret("db-password", "s3cr3t")
            .with_secret("db-pool-size", "16");
        let config = config(&[
            ("key_vault.name", "contoso"),
            ("database.host", "db.local"),
            ("database.password", "from-config"),
        ]);

        let db: DbSettings =
            binder(&dir, &store).bind(&config, Some("database"), &[]).await.unwrap();

        assert_eq!(
            db,
            DbSettings { host: "db.local".into(), password: "s3cr3t".into(), pool_size: 16 }
        );
        assert!(!logs_contain("Secret not found"));
        assert!(!logs_contain("s3cr3t"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_missing_secret_keeps_default_and_warns_once() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new().with_secret("db-password", "s3cr3t");
        let config = config(&[("key_vault.name", "contoso"), ("database.pool_size", "4")]);

        let db: DbSettings =
            binder(&dir, &store).bind(&config, Some("database"), &[]).await.unwrap();

        assert_eq!(db.password, "s3cr3t");
        assert_eq!(db.pool_size, 4);
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("Secret not found in key vault")).count() {
                1 => Ok(()),
                n => Err(format!("expected one not-found warning, saw {}", n)),
            }
        });
    }

    #[tokio::test]
    async fn test_zero_mappings_skip_key_vault() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new();
        let config = config(&[("app.name", "demo")]);

        let app: NoSecrets = binder(&dir, &store).bind(&config, Some("app"), &[]).await.unwrap();

        assert_eq!(app.name, "demo");
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_no_section_starts_from_default() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new();
        let config = config(&[("name", "root-level")]);

        let app: NoSecrets = binder(&dir, &store).bind(&config, None, &[]).await.unwrap();
        assert_eq!(app, NoSecrets::default());

        let app: NoSecrets = binder(&dir, &store).bind(&config, Some("absent"), &[]).await.unwrap();
        assert_eq!(app, NoSecrets::default());
    }

    #[tokio::test]
    async fn test_unsuppressed_miss_fails_bind() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new().with_secret("db-password", "s3cr3t");
        let config = config(&[
            ("key_vault.name", "contoso"),
            ("key_vault.suppress_not_found", "false"),
        ]);

        let err = binder(&dir, &store)
            .bind::<DbSettings>(&config, Some("database"), &[])
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), SECRET_FETCH_FAILED);
        assert!(err.secrets_error().is_some_and(|e| e.is_not_found()));
    }

    #[tokio::test]
    async fn test_missing_vault_location_fails_before_connecting() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new();
        let config = config(&[("database.host", "db.local")]);

        let err = binder(&dir, &store)
            .bind::<DbSettings>(&config, Some("database"), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, VaultBindError::Config { .. }));
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_mapped_with_manual_mapping() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new().with_secret("service--name", "billing");
        let config = config(&[("key_vault.url", "https://contoso.vault.azure.net/")]);

        let mapping = SecretMapping::new("name", "service--name", |t: &mut NoSecrets, v: &str| {
            t.name = v.to_string();
            Ok(())
        });

        let app: NoSecrets =
            binder(&dir, &store).bind_mapped(&config, None, &[mapping]).await.unwrap();
        assert_eq!(app.name, "billing");
    }

    #[tokio::test]
    async fn test_shared_secret_fetched_once() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new().with_secret("db-password", "s3cr3t");
        let config = config(&[("key_vault.name", "contoso")]);

        let extra = SecretMapping::new("host", "db-password", |t: &mut DbSettings, v: &str| {
            t.host = format!("{}-host", v.len());
            Ok(())
        });

        let db: DbSettings = binder(&dir, &store).bind(&config, None, &[extra]).await.unwrap();

        assert_eq!(db.password, "s3cr3t");
        assert_eq!(db.host, "6-host");
        assert_eq!(store.request_count(), 2, "db-password and db-pool-size, once each");
    }

    #[tokio::test]
    async fn test_unparseable_secret_is_binding_error() {
        let dir = TempDir::new().unwrap();
        let store = MemorySecretsClient::new().with_secret("db-pool-size", "lots");
        let config = config(&[("key_vault.name", "contoso")]);

        let err = binder(&dir, &store).bind::<DbSettings>(&config, None, &[]).await.unwrap_err();
        assert!(matches!(err, VaultBindError::Binding { ref field, .. } if field == "pool_size"));
    }
}
