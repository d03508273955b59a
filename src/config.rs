//! Configuration management for account-health.

use crate::auth::{Permission, Role};
use crate::error::{HealthError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Identity registry. The built-in mock registry is used when empty.
    #[serde(default)]
    pub identities: Vec<IdentityConfig>,

    /// Scoring pipeline limits.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Order ledger location.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// External signal sources.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the fallback credential.
    #[serde(default = "default_token_env")]
    pub fallback_token_env: String,
}

fn default_token_env() -> String {
    "ACCOUNT_HEALTH_TOKEN".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            fallback_token_env: default_token_env(),
        }
    }
}

/// A registered identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Credential (or environment variable name if prefixed with $).
    pub token: String,
    pub id: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl IdentityConfig {
    pub fn resolved_token(&self) -> String {
        resolve_env(&self.token)
    }
}

/// Scoring pipeline limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Maximum accounts sent to external sources per request.
    #[serde(default = "default_safety_cap")]
    pub safety_cap: usize,

    /// Per-source deadline for external signal fetches.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

fn default_safety_cap() -> usize {
    500
}

fn default_fetch_timeout_ms() -> u64 {
    2000
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            safety_cap: default_safety_cap(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

/// Ledger location. The sample ledger is used when no path is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// External signal source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub satisfaction: SourceConfig,

    #[serde(default)]
    pub support: SourceConfig,
}

/// Backend for one external source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    #[serde(rename = "simulated")]
    Simulated {
        /// Artificial response delay.
        #[serde(default)]
        latency_ms: u64,
        /// Share of accounts (0-100) the source has data for.
        #[serde(default = "default_coverage")]
        coverage_percent: u8,
    },

    #[serde(rename = "http")]
    Http {
        /// Service base URL.
        base_url: String,
        /// API token (or environment variable name if prefixed with $).
        #[serde(default)]
        api_token: String,
    },
}

fn default_coverage() -> u8 {
    80
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Simulated {
            latency_ms: 0,
            coverage_percent: default_coverage(),
        }
    }
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Simulated { .. } => "simulated",
            SourceConfig::Http { .. } => "http",
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| HealthError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("account-health").join("config.toml"))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            auth: AuthConfig::default(),
            identities: vec![
                IdentityConfig {
                    token: "$ACCOUNT_HEALTH_ADMIN_TOKEN".to_string(),
                    id: "ops-admin".to_string(),
                    display_name: "Operations Admin".to_string(),
                    role: Role::Admin,
                    permissions: Vec::new(),
                },
                IdentityConfig {
                    token: "$ACCOUNT_HEALTH_VIEWER_TOKEN".to_string(),
                    id: "cs-viewer".to_string(),
                    display_name: "Customer Success Viewer".to_string(),
                    role: Role::Readonly,
                    permissions: vec![Permission::CustomersRead, Permission::AnalyticsRead],
                },
            ],
            scoring: ScoringConfig::default(),
            ledger: LedgerConfig::default(),
            sources: SourcesConfig {
                satisfaction: SourceConfig::Http {
                    base_url: "https://surveys.example.com".to_string(),
                    api_token: "$SURVEY_API_TOKEN".to_string(),
                },
                support: SourceConfig::default(),
            },
        }
    }
}

/// Resolve environment variable references (values starting with $).
pub(crate) fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scoring.safety_cap, 500);
        assert_eq!(config.scoring.fetch_timeout_ms, 2000);
        assert_eq!(config.auth.fallback_token_env, "ACCOUNT_HEALTH_TOKEN");
        assert!(config.identities.is_empty());
        assert_eq!(config.sources.support.kind(), "simulated");
    }

    #[test]
    fn test_example_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::example()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.identities.len(), 2);
        assert_eq!(parsed.identities[1].role, Role::Readonly);
        assert_eq!(parsed.sources.satisfaction.kind(), "http");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scoring]
            safety_cap = 25

            [sources.support]
            type = "simulated"
            latency_ms = 10

            [[identities]]
            token = "t1"
            id = "u1"
            display_name = "One"
            role = "user"
            permissions = ["analytics:read"]
            "#,
        )
        .unwrap();

        assert_eq!(config.scoring.safety_cap, 25);
        assert_eq!(config.scoring.fetch_timeout_ms, 2000);
        assert_eq!(config.identities[0].permissions, vec![Permission::AnalyticsRead]);
        match config.sources.support {
            SourceConfig::Simulated {
                latency_ms,
                coverage_percent,
            } => {
                assert_eq!(latency_ms, 10);
                assert_eq!(coverage_percent, 80);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_yields_default() {
        let config = Config::load_from(Path::new("/nonexistent/account-health.toml")).unwrap();
        assert_eq!(config.scoring.safety_cap, 500);
    }

    #[test]
    fn test_resolve_env_with_value() {
        assert_eq!(resolve_env("plain_value"), "plain_value");
    }

    #[test]
    fn test_resolve_env_with_existing_var() {
        std::env::set_var("TEST_ACCOUNT_HEALTH_VAR", "resolved_value");
        assert_eq!(resolve_env("$TEST_ACCOUNT_HEALTH_VAR"), "resolved_value");
        std::env::remove_var("TEST_ACCOUNT_HEALTH_VAR");
    }

    #[test]
    fn test_resolve_env_with_missing_var() {
        let result = resolve_env("$NONEXISTENT_VAR_12345");
        assert_eq!(result, "$NONEXISTENT_VAR_12345");
    }
}
