//! Integration tests for layered configuration loading
//!
//! These tests validate source precedence across environment variables,
//! arguments, settings files and overrides, and secret layering against a
//! mock key vault.

use std::env;
use std::fs;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use vaultbind::secrets::{KeyVaultConnector, MemorySecretsClient, StaticTokenCredential};
use vaultbind::{ConfigLoader, KeyVaultSource, Result};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ENV_PREFIX: &str = "VBTEST";

fn write_json(dir: &TempDir, name: &str, body: serde_json::Value) {
    fs::write(dir.path().join(name), body.to_string()).unwrap();
}

fn loader(dir: &TempDir, environment: &str) -> ConfigLoader {
    ConfigLoader::new()
        .base_path(dir.path())
        .environment_name(environment)
        .env_prefix(ENV_PREFIX)
        .args(Vec::<String>::new())
}

/// Environment variables sit below every other source
#[test]
fn test_environment_variables_are_lowest_precedence() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();

    env::set_var("VBTEST_DATABASE__HOST", "env-host");
    env::set_var("VBTEST_FEATURE__FLAG", "on");

    let dir = TempDir::new().unwrap();
    write_json(&dir, "appsettings.json", serde_json::json!({ "database": { "host": "file-host" } }));

    let settings = loader(&dir, "production").build()?;
    assert_eq!(settings.get_string("database:host").as_deref(), Some("file-host"));
    assert_eq!(settings.get_string("feature:flag").as_deref(), Some("on"));

    env::remove_var("VBTEST_DATABASE__HOST");
    env::remove_var("VBTEST_FEATURE__FLAG");
    Ok(())
}

/// Full chain: env < args < base file < environment file < override
#[test]
fn test_full_precedence_chain() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();

    env::set_var("VBTEST_LEVEL__ENV", "env");
    env::set_var("VBTEST_LEVEL__ARGS", "env");

    let dir = TempDir::new().unwrap();
    write_json(&dir, "appsettings.json", serde_json::json!({
        "level": { "base": "base", "env_file": "base", "memory": "base" }
    }));
    write_json(&dir, "appsettings.staging.json", serde_json::json!({
        "level": { "env_file": "staging", "memory": "staging" }
    }));

    let settings = loader(&dir, "staging")
        .args(["--level:args=args", "--level:base=args"])
        .with_override("level:memory", "memory")
        .build()?;

    assert_eq!(settings.get_string("level:env").as_deref(), Some("env"));
    assert_eq!(settings.get_string("level:args").as_deref(), Some("args"));
    assert_eq!(settings.get_string("level:base").as_deref(), Some("base"));
    assert_eq!(settings.get_string("level:env_file").as_deref(), Some("staging"));
    assert_eq!(settings.get_string("level:memory").as_deref(), Some("memory"));

    env::remove_var("VBTEST_LEVEL__ENV");
    env::remove_var("VBTEST_LEVEL__ARGS");
    Ok(())
}

/// Keys from every layer meet in one case-insensitive key space
#[tokio::test]
async fn test_mixed_case_keys_share_precedence_chain() -> Result<()> {
    let dir = TempDir::new().unwrap();
    write_json(&dir, "appsettings.json", serde_json::json!({
        "Key_Vault": { "Name": "contoso" },
        "App": { "Name": "file", "Tier": "base" },
        "database": { "password": "from-file" }
    }));
    write_json(&dir, "appsettings.staging.json", serde_json::json!({ "app": { "tier": "staging" } }));

    let store = MemorySecretsClient::new().with_secret("Database--Password", "from-vault");
    let loader = loader(&dir, "staging")
        .with_override("APP:MODE", "memory")
        .with_key_vault(KeyVaultSource::new(Arc::new(store)).secret("Database--Password"));

    let settings = {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("VBTEST_App__Name", "env");
        env::set_var("VBTEST_App__Region", "env-region");

        let built = loader.build();

        env::remove_var("VBTEST_App__Name");
        env::remove_var("VBTEST_App__Region");
        built?
    };

    assert_eq!(settings.get_string("App:Name").as_deref(), Some("file"));
    assert_eq!(settings.get_string("app:name").as_deref(), Some("file"));
    assert_eq!(settings.get_string("App:Region").as_deref(), Some("env-region"));
    assert_eq!(settings.get_string("APP:TIER").as_deref(), Some("staging"));
    assert_eq!(settings.get_string("app:mode").as_deref(), Some("memory"));

    let settings = loader.load().await?;
    assert_eq!(settings.get_string("Database:Password").as_deref(), Some("from-vault"));
    assert_eq!(settings.get_string("database:password").as_deref(), Some("from-vault"));
    assert!(settings.is_secret("DATABASE:PASSWORD"));

    let dump = settings.to_redacted_json()?;
    assert_eq!(dump["database"]["password"], "[REDACTED]");
    assert_eq!(dump["app"]["name"], "file");
    assert!(dump.get("App").is_none());

    Ok(())
}

/// Secrets fetched over HTTP are normalized and layered last
#[tokio::test]
async fn test_key_vault_secrets_layered_over_files() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/database--password"))
        .and(header("Authorization", "Bearer integration-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": "from-vault",
            "id": "https://contoso.vault.azure.net/secrets/database--password/1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": "k-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/retired"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": "SecretNotFound", "message": "not found" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    write_json(&dir, "appsettings.json", serde_json::json!({
        "key_vault": { "url": server.uri() },
        "database": { "host": "db.local", "password": "from-file" }
    }));

    let connector = KeyVaultConnector::new(Arc::new(StaticTokenCredential::new("integration-token")));
    let settings = loader(&dir, "production")
        .with_key_vault(
            KeyVaultSource::new(Arc::new(connector)).secrets(["database--password", "api-key", "retired"]),
        )
        .load()
        .await?;

    assert_eq!(settings.get_string("database:host").as_deref(), Some("db.local"));
    assert_eq!(settings.get_string("database:password").as_deref(), Some("from-vault"));
    assert_eq!(settings.get_string("api-key").as_deref(), Some("k-1"));
    assert_eq!(settings.get_string("apikey").as_deref(), Some("k-1"));
    assert!(!settings.contains("retired"));

    let dump = settings.to_redacted_json()?;
    assert_eq!(dump["database"]["password"], "[REDACTED]");
    assert_eq!(dump["database"]["host"], "db.local");

    Ok(())
}

/// A rejected token fails the load with the wrapped secret error
#[tokio::test]
async fn test_key_vault_auth_failure_fails_load() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let connector = KeyVaultConnector::new(Arc::new(StaticTokenCredential::new("bad-token")));

    let err = loader(&dir, "production")
        .with_override("key_vault:url", server.uri())
        .with_key_vault(KeyVaultSource::new(Arc::new(connector)).secret("anything"))
        .load()
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to load secrets from the key vault");
    assert!(matches!(
        err.secrets_error(),
        Some(vaultbind::secrets::SecretsError::AuthenticationFailed { .. })
    ));
}
