pub mod tracing;

use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

impl ConfigError {
    pub fn parse(key: impl Into<String>, details: impl ToString) -> Self {
        ConfigError::ParseError {
            key: key.into(),
            details: details.to_string(),
        }
    }
}

/// Application environment (dev = local, prod = deployed build host)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env_or_default("APP_ENV", "development");

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables.
///
/// Implementors pick their own error type as long as plain [`ConfigError`]s
/// convert into it.
pub trait FromEnv: Sized {
    type Error: From<ConfigError>;

    fn from_env() -> Result<Self, Self::Error>;
}

/// Read an environment variable, falling back to `default` when unset
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable or fail with [`ConfigError::MissingEnvVar`]
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Collect every variable starting with `prefix`, keyed by the remainder of its name.
///
/// `GBP_NOTIFICATIONS_EMAIL_FROM` becomes `EMAIL_FROM` for the prefix
/// `GBP_NOTIFICATIONS_`. Variables that are not valid unicode are skipped.
pub fn env_with_prefix(prefix: &str) -> HashMap<String, String> {
    env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(prefix)
                .map(|stripped| (stripped.to_string(), value))
        })
        .collect()
}
