//! # Error Types
//!
//! Error types for configuration loading and secret binding.

use crate::secrets::SecretsError;

/// Custom result type for vaultbind operations
pub type Result<T> = std::result::Result<T, VaultBindError>;

/// Message attached to every wrapped secret-store failure.
pub const SECRET_FETCH_FAILED: &str = "Failed to load secrets from the key vault";

/// Main error type for vaultbind
#[derive(thiserror::Error, Debug)]
pub enum VaultBindError {
    /// Configuration errors: missing or malformed settings, bad vault URL,
    /// unreadable sources. Raised before any network call.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A secret-store batch failed. The partial batch is discarded.
    #[error("{message}")]
    SecretFetch {
        message: String,
        #[source]
        source: SecretsError,
    },

    /// A fetched secret could not be assigned to its field
    #[error("Binding error on field '{field}': {message}")]
    Binding { field: String, message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },
}

impl VaultBindError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Wrap a secret-store failure with the fixed batch message
    pub fn secret_fetch(source: SecretsError) -> Self {
        Self::SecretFetch { message: SECRET_FETCH_FAILED.to_string(), source }
    }

    /// Create a binding error for a field
    pub fn binding<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Binding { field: field.into(), message: message.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// The wrapped secret-store error, if this is a fetch failure
    pub fn secrets_error(&self) -> Option<&SecretsError> {
        match self {
            VaultBindError::SecretFetch { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for VaultBindError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<url::ParseError> for VaultBindError {
    fn from(error: url::ParseError) -> Self {
        Self::config_with_source("Invalid key vault URL", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for VaultBindError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = VaultBindError::config("Test configuration error");
        assert!(matches!(error, VaultBindError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_secret_fetch_uses_fixed_message() {
        let error = VaultBindError::secret_fetch(SecretsError::authentication_failed("denied"));
        assert_eq!(error.to_string(), SECRET_FETCH_FAILED);
        assert!(matches!(
            error.secrets_error(),
            Some(SecretsError::AuthenticationFailed { .. })
        ));

        let source = std::error::Error::source(&error).expect("source");
        assert!(source.to_string().contains("denied"));
    }

    #[test]
    fn test_binding_error() {
        let error = VaultBindError::binding("port", "invalid digit found in string");
        assert_eq!(
            error.to_string(),
            "Binding error on field 'port': invalid digit found in string"
        );
        assert!(error.secrets_error().is_none());
    }

    #[test]
    fn test_validation_error() {
        let error = VaultBindError::validation_field("Invalid vault name", "name");
        if let VaultBindError::Validation { field, .. } = error {
            assert_eq!(field, Some("name".to_string()));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_error_conversions() {
        let parse_error = url::Url::parse("not a url").unwrap_err();
        let error: VaultBindError = parse_error.into();
        assert!(matches!(error, VaultBindError::Config { .. }));

        let config_error = config::ConfigError::Message("boom".to_string());
        let error: VaultBindError = config_error.into();
        assert!(matches!(error, VaultBindError::Config { source: Some(_), .. }));
    }
}
