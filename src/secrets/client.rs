//! Core secrets client trait.

use async_trait::async_trait;
use url::Url;

use super::error::{Result, SecretsError};
use super::location::KeyVaultOptions;
use super::types::SecretString;

/// Longest secret name the key vault accepts.
pub const MAX_SECRET_NAME_LEN: usize = 127;

/// Read access to a secret store.
///
/// Implementations return [`SecretsError::NotFound`] for a name the store does
/// not hold; the fetch layer treats that variant, and only that variant, as a
/// soft miss. Every other error aborts the batch.
///
/// Implementations MUST NOT log secret values.
#[async_trait]
pub trait SecretsClient: Send + Sync {
    /// Retrieve the current value of a secret.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`] if the secret doesn't exist
    /// - [`SecretsError::ConnectionFailed`] if the backend is unreachable
    /// - [`SecretsError::AuthenticationFailed`] if auth fails
    async fn get_secret(&self, name: &str) -> Result<SecretString>;

    /// Short label used in log fields.
    fn backend_name(&self) -> &'static str;
}

/// Opens a secrets client for a resolved vault URL.
///
/// The returned client is owned by the caller for the duration of one bind or
/// load call. Tests plug in [`super::MemorySecretsClient`] here.
pub trait VaultConnector: Send + Sync {
    fn connect(&self, vault_url: &Url, options: &KeyVaultOptions) -> Result<Box<dyn SecretsClient>>;
}

/// Checks a name against key vault naming rules: 1-127 ASCII letters,
/// digits and dashes.
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SecretsError::invalid_key(name, "secret name cannot be empty"));
    }

    if name.len() > MAX_SECRET_NAME_LEN {
        return Err(SecretsError::invalid_key(
            name,
            format!("exceeds maximum length of {} characters", MAX_SECRET_NAME_LEN),
        ));
    }

    if let Some(bad) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-')) {
        return Err(SecretsError::invalid_key(name, format!("invalid character '{}'", bad)));
    }

    Ok(())
}
