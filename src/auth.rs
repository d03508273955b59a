//! Caller identity resolution and the permission gate.
//!
//! Credentials are opaque tokens matched exactly against an immutable
//! [`PrincipalDirectory`] built once at startup. Nothing is decoded or
//! verified cryptographically.

use crate::config::IdentityConfig;
use crate::error::{HealthError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Caller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Readonly,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Readonly => "readonly",
        };
        f.write_str(name)
    }
}

/// Capability that can be granted to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "customers:read")]
    CustomersRead,
    #[serde(rename = "orders:read")]
    OrdersRead,
    #[serde(rename = "analytics:read")]
    AnalyticsRead,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::CustomersRead => "customers:read",
            Permission::OrdersRead => "orders:read",
            Permission::AnalyticsRead => "analytics:read",
        };
        f.write_str(name)
    }
}

/// Whether a role/permission set grants `permission`. Admin bypasses every check.
pub fn has_capability(
    role: Role,
    permissions: &BTreeSet<Permission>,
    permission: Permission,
) -> bool {
    if role == Role::Admin {
        return true;
    }
    permissions.contains(&permission)
}

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

impl Principal {
    pub fn can(&self, permission: Permission) -> bool {
        has_capability(self.role, &self.permissions, permission)
    }
}

/// Per-invocation authentication result. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AuthContext {
    /// Context for a caller that could not be identified.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_principal(principal: Principal, session_id: Option<String>) -> Self {
        Self {
            authenticated: true,
            principal: Some(principal),
            session_id,
        }
    }
}

/// Credential bundle attached to a call by the transport layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportAuth {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub extra: Option<TransportExtra>,
}

/// Identity hints carried by the transport. Informational only; the
/// directory is the source of truth.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportExtra {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Immutable token → principal lookup.
#[derive(Debug, Clone, Default)]
pub struct PrincipalDirectory {
    entries: HashMap<String, Principal>,
}

impl PrincipalDirectory {
    /// Build from configured identities.
    pub fn from_identities(identities: &[IdentityConfig]) -> Result<Self> {
        let mut entries = HashMap::new();
        for identity in identities {
            let token = identity.resolved_token();
            if token.is_empty() {
                return Err(HealthError::Config(format!(
                    "Identity {} has an empty token",
                    identity.id
                )));
            }
            let principal = Principal {
                id: identity.id.clone(),
                display_name: identity.display_name.clone(),
                role: identity.role,
                permissions: identity.permissions.iter().copied().collect(),
            };
            if entries.insert(token, principal).is_some() {
                return Err(HealthError::Config(format!(
                    "Duplicate token for identity {}",
                    identity.id
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Mock registry used when no identities are configured.
    pub fn builtin() -> Self {
        let entries = [
            (
                "admin-token-123",
                "user-001",
                "Admin User",
                Role::Admin,
                vec![],
            ),
            (
                "analyst-token-456",
                "user-002",
                "Data Analyst",
                Role::User,
                vec![
                    Permission::CustomersRead,
                    Permission::OrdersRead,
                    Permission::AnalyticsRead,
                ],
            ),
            (
                "viewer-token-789",
                "user-003",
                "Read-only Viewer",
                Role::Readonly,
                vec![Permission::CustomersRead, Permission::AnalyticsRead],
            ),
        ]
        .into_iter()
        .map(|(token, id, name, role, permissions)| {
            (
                token.to_string(),
                Principal {
                    id: id.to_string(),
                    display_name: name.to_string(),
                    role,
                    permissions: permissions.into_iter().collect(),
                },
            )
        })
        .collect();

        Self { entries }
    }

    pub fn lookup(&self, token: &str) -> Option<&Principal> {
        self.entries.get(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Principals sorted by id.
    pub fn principals(&self) -> Vec<&Principal> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

/// Resolves an [`AuthContext`] from a transport credential or the
/// environment fallback.
#[derive(Debug, Clone)]
pub struct AuthResolver {
    directory: PrincipalDirectory,
    fallback_token: Option<String>,
}

impl AuthResolver {
    pub fn new(directory: PrincipalDirectory, fallback_token: Option<String>) -> Self {
        Self {
            directory,
            fallback_token: fallback_token.filter(|t| !t.is_empty()),
        }
    }

    /// Read the fallback token from the named environment variable.
    pub fn from_env(directory: PrincipalDirectory, env_var: &str) -> Self {
        Self::new(directory, std::env::var(env_var).ok())
    }

    pub fn directory(&self) -> &PrincipalDirectory {
        &self.directory
    }

    /// Resolve the caller. Never fails; unknown credentials yield an
    /// unauthenticated context.
    pub fn resolve(&self, transport: Option<&TransportAuth>) -> AuthContext {
        let (token, session_id) = match transport {
            Some(auth) if !auth.token.is_empty() => {
                (Some(auth.token.as_str()), auth.client_id.clone())
            }
            _ => (self.fallback_token.as_deref(), None),
        };

        let Some(token) = token else {
            tracing::debug!("No credential supplied");
            return AuthContext::anonymous();
        };

        match self.directory.lookup(token) {
            Some(principal) => {
                tracing::info!(
                    user = %principal.id,
                    role = %principal.role,
                    token = %mask_token(token),
                    "Resolved caller identity"
                );
                AuthContext::for_principal(principal.clone(), session_id)
            }
            None => {
                tracing::warn!(token = %mask_token(token), "Unrecognized credential");
                AuthContext::anonymous()
            }
        }
    }
}

/// Authentication first, then the capability check.
pub fn require(context: &AuthContext, permission: Option<Permission>) -> Result<&Principal> {
    let principal = match (&context.principal, context.authenticated) {
        (Some(principal), true) => principal,
        _ => return Err(HealthError::AuthenticationRequired),
    };

    if let Some(permission) = permission {
        if !principal.can(permission) {
            return Err(HealthError::InsufficientPermission(permission));
        }
    }

    Ok(principal)
}

/// Short, log-safe form of a secret. Short secrets reveal nothing; longer
/// ones reveal at most four leading characters and never more than half.
pub fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    let shown = if len <= 8 { 0 } else { (len / 2).min(4) };
    let prefix: String = token.chars().take(shown).collect();
    format!("{}***", prefix)
}
