//! # account-health
//!
//! Role-gated customer health scoring with MCP (Model Context Protocol) support.
//!
//! ## Features
//!
//! - Token-based caller identity with admin / user / readonly roles
//! - Windowed order metrics (recency, spend momentum) per account
//! - Satisfaction and support signals fetched concurrently with graceful degradation
//! - Bounded 0-100 health score, risk tier and advisory reasons
//! - MCP server for AI assistant integration (Claude Code, etc.)
//!
//! ## Usage
//!
//! ```bash
//! # Score all accounts as the fallback identity
//! ACCOUNT_HEALTH_TOKEN=analyst-token-456 account-health health --reasons
//!
//! # Show the resolved identity
//! account-health whoami --token viewer-token-789
//!
//! # Start MCP server (for AI assistants)
//! account-health mcp
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mcp;
pub mod metrics;
pub mod scoring;
pub mod signals;
pub mod workflow;

pub use auth::{AuthContext, AuthResolver, Permission, Principal, PrincipalDirectory, Role};
pub use config::Config;
pub use error::{HealthError, Result};
pub use ledger::Ledger;
pub use workflow::{HealthReport, HealthRequest, HealthWorkflow, Segment};
