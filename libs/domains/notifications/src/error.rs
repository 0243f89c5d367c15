//! Error types for the notifications domain.

use core_config::ConfigError;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// A configuration item is missing its required delimiter.
    #[error("Invalid item in string {item:?}: expected {delimiter:?}")]
    Parse { item: String, delimiter: char },

    /// A webhook header is not of the form `Name=value`.
    #[error("Invalid header assignment: '{0}'")]
    InvalidHeader(String),

    /// No delivery method (or more than one) is registered under the name.
    #[error("Notification method not found: {0}")]
    MethodNotFound(String),

    /// A background task referenced a recipient the settings do not know.
    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    /// No template is registered under the name.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Template rendering error.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// Environment configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configuration file could not be read or parsed.
    #[error("Configuration file error: {0}")]
    ConfigFile(String),

    /// Building or sending an email failed.
    #[error("Email error: {0}")]
    Email(String),

    /// An outbound HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The task runner could not execute the task.
    #[error("Task runtime error: {0}")]
    Runtime(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NotificationError {
    pub(crate) fn parse(item: impl Into<String>, delimiter: char) -> Self {
        NotificationError::Parse {
            item: item.into(),
            delimiter,
        }
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Serialization(err.to_string())
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotificationError::Email(format!("SMTP transport error: {}", err))
    }
}

impl From<lettre::address::AddressError> for NotificationError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotificationError::Email(format!("Invalid address: {}", err))
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        NotificationError::Email(format!("Failed to build email message: {}", err))
    }
}

impl From<toml::de::Error> for NotificationError {
    fn from(err: toml::de::Error) -> Self {
        NotificationError::ConfigFile(err.to_string())
    }
}

impl From<std::io::Error> for NotificationError {
    fn from(err: std::io::Error) -> Self {
        NotificationError::ConfigFile(format!("IO error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_item_and_delimiter() {
        let err = NotificationError::parse("bob", ':');
        assert_eq!(err.to_string(), "Invalid item in string \"bob\": expected ':'");
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: NotificationError = ConfigError::MissingEnvVar("HOME".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Environment variable 'HOME' is required but not set"
        );
    }
}
