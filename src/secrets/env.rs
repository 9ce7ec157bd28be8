//! Environment variable secrets backend.
//!
//! Development stand-in for the key vault: secret `db-password` is read from
//! `VAULTBIND_SECRET_DB_PASSWORD`. Dashes become underscores and the name is
//! upper-cased. Not for production use, since environment variables are
//! visible in process listings and carry no access control.

use async_trait::async_trait;
use std::env;
use url::Url;

use super::client::{SecretsClient, VaultConnector};
use super::error::{Result, SecretsError};
use super::location::KeyVaultOptions;
use super::types::SecretString;

/// Default environment variable prefix for secrets.
pub const SECRET_PREFIX: &str = "VAULTBIND_SECRET_";

/// Reads secrets from prefixed environment variables.
#[derive(Debug, Clone)]
pub struct EnvVarSecretsClient {
    prefix: String,
}

impl Default for EnvVarSecretsClient {
    fn default() -> Self {
        Self { prefix: SECRET_PREFIX.to_string() }
    }
}

impl EnvVarSecretsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Environment variable consulted for a secret name.
    pub fn env_var_for(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.replace('-', "_").to_uppercase())
    }
}

#[async_trait]
impl SecretsClient for EnvVarSecretsClient {
    async fn get_secret(&self, name: &str) -> Result<SecretString> {
        let env_var = self.env_var_for(name);

        env::var(&env_var).map(SecretString::new).map_err(|_| SecretsError::not_found(name))
    }

    fn backend_name(&self) -> &'static str {
        "env"
    }
}

/// Ignores the vault URL; secrets always come from the environment.
impl VaultConnector for EnvVarSecretsClient {
    fn connect(&self, vault_url: &Url, _options: &KeyVaultOptions) -> Result<Box<dyn SecretsClient>> {
        tracing::warn!(
            vault_url = %vault_url,
            prefix = %self.prefix,
            "Reading secrets from environment variables instead of the key vault"
        );
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_for() {
        let client = EnvVarSecretsClient::new();
        assert_eq!(client.env_var_for("db-password"), "VAULTBIND_SECRET_DB_PASSWORD");
        assert_eq!(client.env_var_for("Cache--Url"), "VAULTBIND_SECRET_CACHE__URL");

        let custom = EnvVarSecretsClient::with_prefix("APP_");
        assert_eq!(custom.env_var_for("token"), "APP_TOKEN");
    }

    #[tokio::test]
    async fn test_get_secret_from_env() {
        env::set_var("VAULTBIND_SECRET_ENV_BACKEND_TEST", "from-env");

        let client = EnvVarSecretsClient::new();
        let value = client.get_secret("env-backend-test").await.unwrap();
        assert_eq!(value.expose_secret(), "from-env");

        env::remove_var("VAULTBIND_SECRET_ENV_BACKEND_TEST");
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let client = EnvVarSecretsClient::with_prefix("VAULTBIND_UNSET_PREFIX_");
        let err = client.get_secret("nothing-here").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
