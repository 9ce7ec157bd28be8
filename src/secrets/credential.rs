//! Bearer-token providers for the key vault client.
//!
//! [`ManagedIdentityCredential`] asks the hosting platform for a token: the
//! App Service identity endpoint when `IDENTITY_ENDPOINT` and `IDENTITY_HEADER`
//! are set, the instance metadata service (IMDS) otherwise.
//! [`StaticTokenCredential`] hands out a fixed token for local work and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::error::{Result, SecretsError};
use super::types::SecretString;

/// Resource identifier requested for key vault tokens.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";

/// Instance metadata service token endpoint.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// A bearer token and its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self { token: SecretString::new(token), expires_on }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SKEW_SECONDS) >= self.expires_on
    }
}

/// Source of bearer tokens for a resource.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, resource: &str) -> Result<AccessToken>;
}

/// Always returns the same token, valid for a day from each call.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: SecretString,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: SecretString::new(token) }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _resource: &str) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: Utc::now() + Duration::hours(24),
        })
    }
}

#[derive(Debug, Clone)]
enum IdentityEndpoint {
    AppService { url: String, header: SecretString },
    Imds { url: String },
}

/// Token provider backed by the platform's managed identity.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: IdentityEndpoint,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_on: serde_json::Value,
}

impl ManagedIdentityCredential {
    /// Detects the identity endpoint from the process environment.
    pub fn new() -> Self {
        let endpoint = match (std::env::var("IDENTITY_ENDPOINT"), std::env::var("IDENTITY_HEADER")) {
            (Ok(url), Ok(header)) => {
                IdentityEndpoint::AppService { url, header: SecretString::new(header) }
            }
            _ => IdentityEndpoint::Imds { url: IMDS_TOKEN_ENDPOINT.to_string() },
        };

        Self { http: reqwest::Client::new(), endpoint, client_id: None }
    }

    /// Use the IMDS protocol against a specific URL.
    pub fn imds_at(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: IdentityEndpoint::Imds { url: url.into() },
            client_id: None,
        }
    }

    /// Use the App Service protocol against a specific URL and header secret.
    pub fn app_service_at(url: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: IdentityEndpoint::AppService {
                url: url.into(),
                header: SecretString::new(header),
            },
            client_id: None,
        }
    }

    /// Select a user-assigned identity.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    fn request(&self, resource: &str) -> reqwest::RequestBuilder {
        let mut query = vec![("resource", resource.to_string())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }

        match &self.endpoint {
            IdentityEndpoint::AppService { url, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION.to_string()));
                self.http
                    .get(url)
                    .header("X-IDENTITY-HEADER", header.expose_secret())
                    .query(&query)
            }
            IdentityEndpoint::Imds { url } => {
                query.push(("api-version", IMDS_API_VERSION.to_string()));
                self.http.get(url).header("Metadata", "true").query(&query)
            }
        }
    }
}

impl Default for ManagedIdentityCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken> {
        let response = self.request(resource).send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::error!(status = %status, resource = %resource, "Managed identity token request failed");
            return Err(SecretsError::authentication_failed(format!(
                "managed identity endpoint returned status {}",
                status
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            SecretsError::authentication_failed(format!("malformed token response: {}", e))
        })?;

        let expires_on = parse_expires_on(&body.expires_on).ok_or_else(|| {
            SecretsError::authentication_failed("token response has no usable expires_on")
        })?;

        tracing::debug!(resource = %resource, expires_on = %expires_on, "Acquired managed identity token");
        Ok(AccessToken::new(body.access_token, expires_on))
    }
}

/// Identity endpoints send `expires_on` as unix seconds, either as a JSON
/// number or as a numeric string.
fn parse_expires_on(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(seconds, 0)
}
