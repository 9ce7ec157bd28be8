//! # Command Line Interface
//!
//! `vaultbind` inspects the configuration an application would see: the
//! layered settings files, environment variables, overrides, and key vault
//! secrets.
//!
//! ```text
//! vaultbind --environment Development get Database:Host
//! vaultbind --secret db-password dump --output table
//! vaultbind check
//! ```

pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::keys::to_config_path;
use crate::config::{ConfigLoader, KeyVaultSource};
use crate::observability::{init_logging, LoggingOptions};
use crate::secrets::{EnvVarSecretsClient, KeyVaultConnector, KeyVaultOptions, VaultConnector};
use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "vaultbind")]
#[command(about = "Inspect layered configuration and key vault secrets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Environment name; defaults to APP_ENVIRONMENT, ENVIRONMENT, then Production
    #[arg(long, global = true)]
    pub environment: Option<String>,

    /// Directory holding appsettings.json files
    #[arg(long, global = true, default_value = ".")]
    pub base_path: PathBuf,

    /// Only read environment variables starting with this prefix
    #[arg(long, global = true)]
    pub env_prefix: Option<String>,

    /// In-memory override applied after the settings files (repeatable)
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Secret to layer from the key vault (repeatable)
    #[arg(long = "secret", global = true, value_name = "NAME")]
    pub secrets: Vec<String>,

    /// Section prefix for layered secrets
    #[arg(long, global = true)]
    pub secret_prefix: Option<String>,

    /// Read secrets from VAULTBIND_SECRET_* environment variables instead of the key vault
    #[arg(long, global = true)]
    pub local_secrets: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the value at a colon-delimited key
    Get {
        /// Key such as Database:Host
        key: String,
    },

    /// Print the whole configuration with secret values redacted
    Dump {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Resolve the key vault location without contacting it
    Check,
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    // Optional; a missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(LoggingOptions { verbose: cli.verbose, json: cli.json_logs });

    let loader = build_loader(&cli)?;

    match cli.command {
        Commands::Get { key } => handle_get(&loader, &key).await?,
        Commands::Dump { output } => handle_dump(&loader, output).await?,
        Commands::Check => handle_check(&loader)?,
    }

    Ok(())
}

/// Translate global flags into a loader.
pub fn build_loader(cli: &Cli) -> anyhow::Result<ConfigLoader> {
    // Process arguments are this tool's own flags, not settings.
    let mut loader = ConfigLoader::new().base_path(&cli.base_path).args(Vec::<String>::new());

    if let Some(environment) = &cli.environment {
        loader = loader.environment_name(environment);
    }
    if let Some(prefix) = &cli.env_prefix {
        loader = loader.env_prefix(prefix);
    }

    let overrides = cli
        .overrides
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (key.trim().to_string(), value.to_string()))
                .with_context(|| format!("Invalid override '{}': expected KEY=VALUE", raw))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if !overrides.is_empty() {
        loader = loader.with_overrides(overrides);
    }

    let connector: Arc<dyn VaultConnector> = if cli.local_secrets {
        Arc::new(EnvVarSecretsClient::new())
    } else {
        Arc::new(KeyVaultConnector::managed_identity())
    };
    let mut source = KeyVaultSource::new(connector).secrets(cli.secrets.iter().cloned());
    if let Some(prefix) = &cli.secret_prefix {
        source = source.prefix(prefix);
    }

    Ok(loader.with_key_vault(source))
}

async fn handle_get(loader: &ConfigLoader, key: &str) -> anyhow::Result<()> {
    let settings = loader.load().await?;

    if let Some(value) = settings.get_string(key) {
        println!("{}", value);
        return Ok(());
    }

    let tree = settings.to_redacted_json()?;
    let section = to_config_path(key).split('.').try_fold(&tree, |node, segment| node.get(segment));

    match section {
        Some(section) => output::print_json(section),
        None => anyhow::bail!("Key '{}' not found in the {} configuration", key, settings.environment()),
    }
}

async fn handle_dump(loader: &ConfigLoader, format: OutputFormat) -> anyhow::Result<()> {
    let settings = loader.load().await?;
    let tree = settings.to_redacted_json()?;

    tracing::debug!(
        environment = %settings.environment(),
        secrets = settings.secret_keys().count(),
        "Dumping configuration"
    );
    output::print_output(&tree, format)
}

fn handle_check(loader: &ConfigLoader) -> anyhow::Result<()> {
    let settings = loader.build()?;
    let options = KeyVaultOptions::from_config(settings.as_config())?;
    let vault_url = options.resolve_url()?;

    println!("Environment:        {}", settings.environment());
    println!("Key vault:          {}", vault_url);
    match options.managed_identity_client_id() {
        Some(client_id) => println!("Managed identity:   user-assigned ({})", client_id),
        None => println!("Managed identity:   system-assigned"),
    }
    println!("Suppress not found: {}", options.suppress_not_found);
    println!("Configured secrets: {}", options.secrets.len());
    Ok(())
}
