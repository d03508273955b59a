//! Windowed per-account order metrics.

use crate::ledger::Ledger;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Age reported for accounts without any order.
pub const NO_ORDER_AGE_DAYS: i64 = 999;

/// Aggregate over the current window and the equal-length window before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetricSnapshot {
    pub last_order_age_days: i64,
    pub order_count_in_window: u32,
    pub spend_in_window: f64,
    pub spend_in_prior_window: f64,
    pub spend_delta_percent: f64,
}

impl AccountMetricSnapshot {
    fn empty() -> Self {
        Self {
            last_order_age_days: NO_ORDER_AGE_DAYS,
            order_count_in_window: 0,
            spend_in_window: 0.0,
            spend_in_prior_window: 0.0,
            spend_delta_percent: 0.0,
        }
    }
}

/// Percent change between windows. The prior spend is floored at 1 in the
/// denominator; two empty windows yield 0.
pub fn spend_delta_percent(current: f64, prior: f64) -> f64 {
    if current == 0.0 && prior == 0.0 {
        return 0.0;
    }
    (current - prior) / prior.max(1.0) * 100.0
}

/// Fold the ledger into one snapshot per account.
///
/// Covers every customer plus any account that only appears in orders.
/// The current window is `[now - window, now)`, the prior one
/// `[now - 2 * window, now - window)`.
pub fn aggregate(
    ledger: &Ledger,
    now: DateTime<Utc>,
    window_days: u32,
) -> BTreeMap<String, AccountMetricSnapshot> {
    let window = Duration::days(i64::from(window_days));
    let window_start = now - window;
    let prior_start = window_start - window;

    let mut snapshots: BTreeMap<String, AccountMetricSnapshot> = ledger
        .customers
        .iter()
        .map(|c| (c.id.clone(), AccountMetricSnapshot::empty()))
        .collect();
    let mut last_order: BTreeMap<&str, DateTime<Utc>> = BTreeMap::new();

    for order in &ledger.orders {
        let snapshot = snapshots
            .entry(order.account_id.clone())
            .or_insert_with(AccountMetricSnapshot::empty);

        last_order
            .entry(order.account_id.as_str())
            .and_modify(|latest| {
                if order.created_at > *latest {
                    *latest = order.created_at;
                }
            })
            .or_insert(order.created_at);

        if order.created_at >= window_start && order.created_at < now {
            snapshot.order_count_in_window += 1;
            snapshot.spend_in_window += order.total;
        } else if order.created_at >= prior_start && order.created_at < window_start {
            snapshot.spend_in_prior_window += order.total;
        }
    }

    for (account_id, snapshot) in snapshots.iter_mut() {
        if let Some(latest) = last_order.get(account_id.as_str()) {
            snapshot.last_order_age_days = (now - *latest).num_days().max(0);
        }
        snapshot.spend_delta_percent =
            spend_delta_percent(snapshot.spend_in_window, snapshot.spend_in_prior_window);
    }

    snapshots
}
