//! Read-only order ledger.

use crate::error::{HealthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
}

/// A single ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub account_id: String,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

/// Customers and their orders. Never mutated after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl Ledger {
    pub fn new(customers: Vec<Customer>, orders: Vec<Order>) -> Result<Self> {
        if let Some(order) = orders.iter().find(|o| o.total.is_nan() || o.total < 0.0) {
            return Err(HealthError::Config(format!(
                "Order {} has invalid total {}",
                order.id, order.total
            )));
        }
        Ok(Self { customers, orders })
    }

    /// Load a ledger from a TOML file with `[[customers]]` and `[[orders]]`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: Ledger = toml::from_str(&content)?;
        Self::new(raw.customers, raw.orders)
    }

    /// Display name for an account, falling back to its id.
    pub fn account_name<'a>(&'a self, account_id: &'a str) -> &'a str {
        self.customers
            .iter()
            .find(|c| c.id == account_id)
            .map(|c| c.name.as_str())
            .unwrap_or(account_id)
    }

    /// Demo ledger with order dates relative to `now`.
    pub fn sample(now: DateTime<Utc>) -> Self {
        let customers = [
            ("1", "Alice Johnson"),
            ("2", "Bob Smith"),
            ("3", "Carol White"),
            ("4", "David Brown"),
            ("5", "Eve Davis"),
        ]
        .into_iter()
        .map(|(id, name)| Customer {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect();

        let orders = [
            ("101", "1", 299.99, 5),
            ("102", "1", 89.50, 40),
            ("103", "2", 149.99, 12),
            ("104", "2", 450.00, 70),
            ("105", "3", 75.25, 95),
            ("106", "3", 120.00, 200),
            ("107", "4", 35.00, 20),
            ("108", "4", 40.00, 50),
            ("109", "1", 199.99, 2),
        ]
        .into_iter()
        .map(|(id, account, total, days_ago)| Order {
            id: id.to_string(),
            account_id: account.to_string(),
            total,
            created_at: now - Duration::days(days_ago),
        })
        .collect();

        Self { customers, orders }
    }
}
