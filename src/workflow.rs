//! Role-gated account health workflow.
//!
//! authenticate → aggregate → segment filter + safety cap → fetch signals →
//! score → rank worst-first → role cap → summarize.

use crate::auth::{require, AuthContext, Permission, Role};
use crate::error::{HealthError, Result};
use crate::ledger::Ledger;
use crate::metrics::{aggregate, AccountMetricSnapshot};
use crate::scoring::{score, Tier};
use crate::signals::SignalFetcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_WINDOW_DAYS: u32 = 365;
pub const MAX_LIMIT: usize = 200;
pub const READONLY_CAP: usize = 10;

const INACTIVE_AFTER_DAYS: i64 = 45;
const HIGH_VALUE_SPEND: f64 = 100.0;

/// Population filter applied before external enrichment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Segment {
    #[default]
    All,
    Inactive,
    HighValue,
}

impl Segment {
    pub fn matches(&self, metrics: &AccountMetricSnapshot) -> bool {
        match self {
            Segment::All => true,
            Segment::Inactive => metrics.last_order_age_days > INACTIVE_AFTER_DAYS,
            Segment::HighValue => metrics.spend_in_window >= HIGH_VALUE_SPEND,
        }
    }
}

impl std::str::FromStr for Segment {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Segment::All),
            "inactive" => Ok(Segment::Inactive),
            "highValue" => Ok(Segment::HighValue),
            other => Err(HealthError::InvalidInput(format!("Unknown segment: {}", other))),
        }
    }
}

/// Parameters of one health computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRequest {
    #[serde(default)]
    pub segment: Segment,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub include_reasons: bool,
}

fn default_window_days() -> u32 {
    30
}

fn default_limit() -> usize {
    50
}

impl Default for HealthRequest {
    fn default() -> Self {
        Self {
            segment: Segment::All,
            window_days: default_window_days(),
            limit: default_limit(),
            include_reasons: false,
        }
    }
}

impl HealthRequest {
    /// Range checks: window in (0, 365], limit in (0, 200].
    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 || self.window_days > MAX_WINDOW_DAYS {
            return Err(HealthError::InvalidInput(format!(
                "windowDays must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(HealthError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        Ok(())
    }
}

/// Health result for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub account_id: String,
    pub name: String,
    pub health_score: u8,
    pub tier: Tier,
    pub metrics: AccountMetricSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCounts {
    pub good: usize,
    pub watch: usize,
    #[serde(rename = "at_risk")]
    pub at_risk: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub satisfaction: usize,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_analyzed: usize,
    pub tiers: TierCounts,
    pub average_score: u8,
    pub external_coverage: Coverage,
}

/// Response returned to tool callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub accounts: Vec<HealthRecord>,
    pub summary: Summary,
}

impl HealthReport {
    /// Zeroed response used for every failure.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Maximum records a role may receive.
pub fn role_cap(role: Role, requested: usize) -> usize {
    match role {
        Role::Readonly => requested.min(READONLY_CAP),
        Role::Admin | Role::User => requested,
    }
}

struct Scored {
    record: HealthRecord,
    has_satisfaction: bool,
    has_support: bool,
}

/// Stateless health pipeline over a shared read-only ledger.
#[derive(Clone)]
pub struct HealthWorkflow {
    ledger: Arc<Ledger>,
    fetcher: SignalFetcher,
    safety_cap: usize,
}

impl HealthWorkflow {
    pub fn new(ledger: Arc<Ledger>, fetcher: SignalFetcher, safety_cap: usize) -> Self {
        Self {
            ledger,
            fetcher,
            safety_cap,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Never fails: any error yields [`HealthReport::empty`] and is logged.
    pub async fn compute_account_health(
        &self,
        context: &AuthContext,
        request: &HealthRequest,
    ) -> HealthReport {
        match self.evaluate(context, request, Utc::now()).await {
            Ok(report) => report,
            Err(e) if e.is_access_denied() => {
                tracing::warn!(error = %e, "Account health request denied");
                HealthReport::empty()
            }
            Err(e) => {
                tracing::error!(error = %e, "Account health computation failed");
                HealthReport::empty()
            }
        }
    }

    /// Typed pipeline result, deterministic for a fixed `now` and signal responses.
    pub async fn evaluate(
        &self,
        context: &AuthContext,
        request: &HealthRequest,
        now: DateTime<Utc>,
    ) -> Result<HealthReport> {
        let principal = require(context, Some(Permission::AnalyticsRead))?;
        request.validate()?;

        let snapshots = aggregate(&self.ledger, now, request.window_days);
        let candidates: Vec<(String, AccountMetricSnapshot)> = snapshots
            .into_iter()
            .filter(|(_, metrics)| request.segment.matches(metrics))
            .take(self.safety_cap)
            .collect();

        tracing::debug!(
            user = %principal.id,
            segment = ?request.segment,
            candidates = candidates.len(),
            "Segment filtered"
        );

        let account_ids: Vec<String> = candidates.iter().map(|(id, _)| id.clone()).collect();
        let signals = self.fetcher.fetch(&account_ids, request.window_days).await;

        let mut scored: Vec<Scored> = candidates
            .into_iter()
            .map(|(account_id, metrics)| {
                let signal = signals.signal_for(&account_id);
                let breakdown = score(&metrics, &signal);
                let reasons: Option<Vec<String>> = request
                    .include_reasons
                    .then(|| breakdown.reasons.iter().map(ToString::to_string).collect());
                Scored {
                    has_satisfaction: signal.satisfaction_score.is_some(),
                    has_support: signal.has_support_record,
                    record: HealthRecord {
                        name: self.ledger.account_name(&account_id).to_string(),
                        account_id,
                        health_score: breakdown.score,
                        tier: breakdown.tier,
                        metrics,
                        reasons,
                    },
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            a.record
                .health_score
                .cmp(&b.record.health_score)
                .then_with(|| a.record.account_id.cmp(&b.record.account_id))
        });
        scored.truncate(role_cap(principal.role, request.limit));

        let summary = summarize(&scored);
        tracing::info!(
            user = %principal.id,
            role = %principal.role,
            returned = scored.len(),
            average = summary.average_score,
            "Account health computed"
        );

        Ok(HealthReport {
            accounts: scored.into_iter().map(|s| s.record).collect(),
            summary,
        })
    }
}

fn summarize(scored: &[Scored]) -> Summary {
    let mut summary = Summary {
        total_analyzed: scored.len(),
        ..Summary::default()
    };

    let mut total: u64 = 0;
    for item in scored {
        total += u64::from(item.record.health_score);
        match item.record.tier {
            Tier::Good => summary.tiers.good += 1,
            Tier::Watch => summary.tiers.watch += 1,
            Tier::AtRisk => summary.tiers.at_risk += 1,
        }
        if item.has_satisfaction {
            summary.external_coverage.satisfaction += 1;
        }
        if item.has_support {
            summary.external_coverage.support += 1;
        }
    }

    if !scored.is_empty() {
        summary.average_score = (total as f64 / scored.len() as f64).round() as u8;
    }

    summary
}
