//! # Structured Logging
//!
//! Span macros and subscriber setup for the tracing ecosystem.
//!
//! Secret values never appear in log fields. Spans and events carry secret
//! *names*, key paths, and counts only.

use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span around one secret batch.
///
/// ```rust,ignore
/// let span = fetch_span!("keyvault", requests.len());
/// ```
#[macro_export]
macro_rules! fetch_span {
    ($backend:expr, $count:expr) => {
        tracing::info_span!("secret_fetch", backend = %$backend, secrets = $count)
    };
    ($backend:expr, $count:expr, $($field:tt)*) => {
        tracing::info_span!("secret_fetch", backend = %$backend, secrets = $count, $($field)*)
    };
}

/// Create a tracing span around one bind call.
#[macro_export]
macro_rules! bind_span {
    ($settings_type:expr, $mappings:expr) => {
        tracing::info_span!(
            "secret_bind",
            settings_type = %$settings_type,
            mappings = $mappings,
            section = tracing::field::Empty
        )
    };
}

/// Logging setup for binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOptions {
    pub verbose: bool,
    pub json: bool,
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
/// verbose. Returns `false` if a subscriber was already installed.
pub fn init_logging(options: LoggingOptions) -> bool {
    let default_level = if options.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let result = if options.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    // Already set elsewhere (e.g. integration tests).
    result.is_ok()
}
