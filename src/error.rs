//! Error types for account-health.

use crate::auth::Permission;
use thiserror::Error;

/// Result type alias for account-health.
pub type Result<T> = std::result::Result<T, HealthError>;

/// Account health error types.
#[derive(Error, Debug)]
pub enum HealthError {
    /// No credential, or a credential that matches no known identity.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Known identity lacking a capability.
    #[error("Insufficient permission: {0}")]
    InsufficientPermission(Permission),

    /// Out-of-range or malformed request parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// External signal source failure. Never leaves the fetcher.
    #[error("Signal source error ({source_name}): {message}")]
    Signal {
        source_name: String,
        message: String,
    },

    /// External signal source did not answer in time.
    #[error("Signal source {source_name} timed out after {millis}ms")]
    Timeout { source_name: String, millis: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HealthError {
    /// Whether this error came from the permission gate.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            HealthError::AuthenticationRequired | HealthError::InsufficientPermission(_)
        )
    }
}

impl From<reqwest::Error> for HealthError {
    fn from(e: reqwest::Error) -> Self {
        HealthError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for HealthError {
    fn from(e: toml::de::Error) -> Self {
        HealthError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for HealthError {
    fn from(e: toml::ser::Error) -> Self {
        HealthError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for HealthError {
    fn from(e: serde_json::Error) -> Self {
        HealthError::Serialization(e.to_string())
    }
}
