//! Key vault settings and vault URL resolution.
//!
//! Settings live under the `key_vault` section:
//!
//! ```json
//! { "key_vault": { "url": "https://contoso.vault.azure.net/" } }
//! { "key_vault": { "name": "contoso" } }
//! ```
//!
//! An explicit `url` wins and `name` is then ignored, valid or not;
//! otherwise `name` is expanded through [`vault_url_from_name`]. Anything
//! else is a configuration error raised before a client is built.
//!
//! `client_id` selects a user-assigned managed identity.

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::config::settings::lookup;
use crate::errors::{Result, VaultBindError};

/// Configuration section holding [`KeyVaultOptions`].
pub const KEY_VAULT_SECTION: &str = "key_vault";

/// Public-cloud host suffix for vaults addressed by name.
pub const VAULT_HOST_SUFFIX: &str = "vault.azure.net";

/// Length bounds of a vault instance name.
pub const VAULT_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=24;

fn default_suppress_not_found() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Key vault settings read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct KeyVaultOptions {
    /// Absolute vault URL; takes precedence over `name`
    #[serde(default)]
    pub url: Option<String>,

    /// Vault instance name, expanded to `https://{name}.vault.azure.net/`
    #[serde(default)]
    pub name: Option<String>,

    /// Client id of a user-assigned managed identity
    #[serde(default)]
    pub client_id: Option<String>,

    /// Treat a missing secret as a soft miss instead of failing the batch
    #[serde(default = "default_suppress_not_found")]
    pub suppress_not_found: bool,

    /// Section prefix applied to secrets layered by the loader
    #[serde(default)]
    pub prefix: Option<String>,

    /// Secret names the loader fetches
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,
}

impl Default for KeyVaultOptions {
    fn default() -> Self {
        Self {
            url: None,
            name: None,
            client_id: None,
            suppress_not_found: default_suppress_not_found(),
            prefix: None,
            secrets: Vec::new(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl KeyVaultOptions {
    /// Read the `key_vault` section; an absent section yields the defaults.
    pub fn from_config(config: &config::Config) -> Result<Self> {
        let options = match lookup::<KeyVaultOptions>(config, KEY_VAULT_SECTION) {
            Ok(options) => options,
            Err(config::ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                return Err(VaultBindError::config_with_source(
                    "Invalid key_vault settings",
                    Box::new(e),
                ))
            }
        };

        options.validate()?;
        Ok(options)
    }

    /// Resolve the vault base URL: explicit url → name template → error.
    pub fn resolve_url(&self) -> Result<Url> {
        let explicit = self.url.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let name = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let raw = match (explicit, name) {
            (Some(url), _) => url.to_string(),
            (None, Some(name)) => {
                if !VAULT_NAME_LEN.contains(&name.chars().count()) {
                    return Err(VaultBindError::validation_field(
                        format!(
                            "Vault name must be {}-{} characters",
                            VAULT_NAME_LEN.start(),
                            VAULT_NAME_LEN.end()
                        ),
                        "name",
                    ));
                }
                vault_url_from_name(name)
            }
            (None, None) => {
                return Err(VaultBindError::config(
                    "Key vault location missing: set key_vault.url or key_vault.name",
                ))
            }
        };

        parse_vault_url(&raw)
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }

    /// Trimmed `client_id`, if one is set.
    pub fn managed_identity_client_id(&self) -> Option<&str> {
        self.client_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Expand a vault instance name into its public-cloud URL.
pub fn vault_url_from_name(name: &str) -> String {
    format!("https://{}.{}/", name, VAULT_HOST_SUFFIX)
}

/// Parse and check a vault URL: absolute, http(s), with a host.
pub fn parse_vault_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| {
        VaultBindError::config_with_source(format!("Invalid key vault URL '{}'", raw), Box::new(e))
    })?;

    if !matches!(url.scheme(), "https" | "http") {
        return Err(VaultBindError::config(format!(
            "Key vault URL '{}' must use https (or http for local endpoints)",
            raw
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(VaultBindError::config(format!("Key vault URL '{}' has no host", raw)));
    }

    Ok(url)
}
