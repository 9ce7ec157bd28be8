//! Key vault secrets backend.
//!
//! Reads secrets over the key vault REST API, one request per secret:
//!
//! ```text
//! GET {vault}/secrets/{name}?api-version=7.4
//! Authorization: Bearer <token>
//! ```
//!
//! The bearer token comes from a [`TokenCredential`] and is reused for the
//! lifetime of the client. A client is meant to live for a single bind or
//! load call and is dropped when that call returns.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

use super::client::{validate_secret_name, SecretsClient, VaultConnector};
use super::credential::{AccessToken, ManagedIdentityCredential, TokenCredential, KEY_VAULT_RESOURCE};
use super::error::{Result, SecretsError};
use super::location::KeyVaultOptions;
use super::types::SecretString;

/// REST API version sent with every request.
pub const API_VERSION: &str = "7.4";

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// HTTPS client for one key vault.
pub struct KeyVaultClient {
    http: reqwest::Client,
    vault_url: Url,
    credential: Arc<dyn TokenCredential>,
    token: Mutex<Option<AccessToken>>,
}

impl KeyVaultClient {
    /// Build a client for `vault_url` with the given per-request timeout.
    pub fn new(
        vault_url: Url,
        credential: Arc<dyn TokenCredential>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            SecretsError::config_error(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { http, vault_url, credential, token: Mutex::new(None) })
    }

    pub fn vault_url(&self) -> &Url {
        &self.vault_url
    }

    fn secret_url(&self, name: &str) -> Result<Url> {
        let mut url = self.vault_url.clone();
        url.path_segments_mut()
            .map_err(|_| SecretsError::config_error("Key vault URL cannot be a base URL"))?
            .pop_if_empty()
            .push("secrets")
            .push(name);
        Ok(url)
    }

    async fn bearer_token(&self) -> Result<SecretString> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.token.clone());
        }

        let token = self.credential.get_token(KEY_VAULT_RESOURCE).await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }
}

#[async_trait]
impl SecretsClient for KeyVaultClient {
    async fn get_secret(&self, name: &str) -> Result<SecretString> {
        validate_secret_name(name)?;

        let url = self.secret_url(name)?;
        let token = self.bearer_token().await?;

        let response = self
            .http
            .get(url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, secret = %name, "Key vault request failed");
                SecretsError::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let bundle: SecretBundle = response.json().await.map_err(|e| {
                SecretsError::backend_error(format!("Malformed response for secret '{}': {}", name, e))
            })?;

            return bundle.value.map(SecretString::new).ok_or_else(|| {
                SecretsError::backend_error(format!("Secret '{}' has no value", name))
            });
        }

        let detail = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.error.code.unwrap_or_default(),
                    e.error.message.unwrap_or_default()
                )
            })
            .unwrap_or_else(|| status.to_string());

        match status.as_u16() {
            404 => Err(SecretsError::not_found(name)),
            401 | 403 => {
                tracing::error!(status = %status, secret = %name, "Key vault rejected credentials");
                Err(SecretsError::authentication_failed(detail))
            }
            _ => {
                tracing::error!(status = %status, secret = %name, "Key vault returned an error");
                Err(SecretsError::backend_error(format!(
                    "Reading secret '{}' failed with {}",
                    name, detail
                )))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "keyvault"
    }
}

/// Connects [`KeyVaultClient`]s using a shared credential or the
/// platform managed identity.
#[derive(Clone)]
pub struct KeyVaultConnector {
    credential: ConnectorCredential,
}

#[derive(Clone)]
enum ConnectorCredential {
    Shared(Arc<dyn TokenCredential>),
    /// Narrowed per connection by `key_vault.client_id`.
    ManagedIdentity(ManagedIdentityCredential),
}

impl KeyVaultConnector {
    pub fn new(credential: Arc<dyn TokenCredential>) -> Self {
        Self { credential: ConnectorCredential::Shared(credential) }
    }

    /// Connector using the platform managed identity.
    pub fn managed_identity() -> Self {
        Self::with_managed_identity(ManagedIdentityCredential::new())
    }

    /// Connector using `identity`, switched to a user-assigned identity
    /// whenever the options carry a `client_id`.
    pub fn with_managed_identity(identity: ManagedIdentityCredential) -> Self {
        Self { credential: ConnectorCredential::ManagedIdentity(identity) }
    }

    fn credential_for(&self, options: &KeyVaultOptions) -> Arc<dyn TokenCredential> {
        match &self.credential {
            ConnectorCredential::Shared(credential) => credential.clone(),
            ConnectorCredential::ManagedIdentity(identity) => {
                match options.managed_identity_client_id() {
                    Some(client_id) => {
                        tracing::debug!(client_id = %client_id, "Using user-assigned managed identity");
                        Arc::new(identity.clone().with_client_id(client_id))
                    }
                    None => Arc::new(identity.clone()),
                }
            }
        }
    }
}

impl VaultConnector for KeyVaultConnector {
    fn connect(&self, vault_url: &Url, options: &KeyVaultOptions) -> Result<Box<dyn SecretsClient>> {
        let client = KeyVaultClient::new(vault_url.clone(), self.credential_for(options), options.timeout())?;
        Ok(Box::new(client))
    }
}
