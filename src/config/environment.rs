//! Hosting environment name lookup.

/// Used when no environment variable names one.
pub const DEFAULT_ENVIRONMENT: &str = "Production";

/// Variables consulted in order for the environment name.
pub const ENVIRONMENT_VARIABLES: [&str; 2] = ["APP_ENVIRONMENT", "ENVIRONMENT"];

/// Supplies the hosting environment name (e.g. "Development").
///
/// The name selects `appsettings.{name}.json`.
pub trait EnvironmentProvider: Send + Sync + std::fmt::Debug {
    fn environment_name(&self) -> String;
}

/// Reads the environment name from process variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentProvider for ProcessEnvironment {
    fn environment_name(&self) -> String {
        ENVIRONMENT_VARIABLES
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }
}

/// A fixed environment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEnvironment(pub String);

impl FixedEnvironment {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl EnvironmentProvider for FixedEnvironment {
    fn environment_name(&self) -> String {
        self.0.clone()
    }
}
