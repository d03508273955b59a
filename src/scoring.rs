//! Composite health score, tier and advisory reasons.

use crate::metrics::AccountMetricSnapshot;
use crate::signals::ExternalSignal;
use serde::{Deserialize, Serialize};
use std::fmt;

const RECENCY_WEIGHT: f64 = 0.30;
const MOMENTUM_WEIGHT: f64 = 0.30;
const SATISFACTION_WEIGHT: f64 = 0.25;
const RELIABILITY_WEIGHT: f64 = 0.15;

/// Used when no satisfaction score is available.
pub const NEUTRAL_SATISFACTION: f64 = 50.0;

const CRITICAL_INCIDENT_PENALTY: f64 = 25.0;
const SLA_BREACH_PENALTY: f64 = 15.0;

const DORMANT_AFTER_DAYS: i64 = 60;
const SPEND_DROP_PERCENT: f64 = -30.0;
const LOW_SATISFACTION: f64 = 30.0;

/// Risk bucket derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Good,
    Watch,
    AtRisk,
}

impl Tier {
    pub fn from_score(score: u8) -> Self {
        if score >= 75 {
            Tier::Good
        } else if score >= 50 {
            Tier::Watch
        } else {
            Tier::AtRisk
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Good => "good",
            Tier::Watch => "watch",
            Tier::AtRisk => "at_risk",
        };
        f.write_str(name)
    }
}

/// Why an account deserves attention. Does not influence the score.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Dormant { days: i64 },
    SpendDecline { percent: f64 },
    LowSatisfaction { score: f64 },
    OpenCriticalIncidents { count: u32 },
    SlaBreaches { count: u32 },
    NoOrdersInWindow,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Dormant { days } => write!(f, "No orders in {} days", days),
            Reason::SpendDecline { percent } => {
                write!(f, "Spend down {:.0}% vs prior window", percent.abs())
            }
            Reason::LowSatisfaction { score } => write!(f, "Low satisfaction score ({:.0})", score),
            Reason::OpenCriticalIncidents { count } => {
                write!(f, "{} open critical incident(s)", count)
            }
            Reason::SlaBreaches { count } => write!(f, "{} SLA breach(es) in window", count),
            Reason::NoOrdersInWindow => write!(f, "No orders in current window"),
        }
    }
}

/// Clamped sub-scores feeding the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Components {
    pub recency: f64,
    pub momentum: f64,
    pub satisfaction: f64,
    pub reliability: f64,
}

impl Components {
    pub fn compute(metrics: &AccountMetricSnapshot, signal: &ExternalSignal) -> Self {
        let recency = clamp_score(100.0 - metrics.last_order_age_days as f64);
        let momentum = clamp_score((metrics.spend_delta_percent + 100.0) / 2.0);
        let satisfaction = signal
            .satisfaction_score
            .map(clamp_score)
            .unwrap_or(NEUTRAL_SATISFACTION);
        let reliability = clamp_score(
            100.0
                - (f64::from(signal.open_critical_incidents) * CRITICAL_INCIDENT_PENALTY
                    + f64::from(signal.sla_breaches_in_window) * SLA_BREACH_PENALTY),
        );

        Self {
            recency,
            momentum,
            satisfaction,
            reliability,
        }
    }

    /// Weighted composite, clamped and rounded.
    pub fn composite(&self) -> u8 {
        let raw = RECENCY_WEIGHT * self.recency
            + MOMENTUM_WEIGHT * self.momentum
            + SATISFACTION_WEIGHT * self.satisfaction
            + RELIABILITY_WEIGHT * self.reliability;
        clamp_score(raw).round() as u8
    }
}

/// Full scoring result for one account.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub score: u8,
    pub tier: Tier,
    pub reasons: Vec<Reason>,
    pub components: Components,
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Score one account from its order metrics and external signals.
pub fn score(metrics: &AccountMetricSnapshot, signal: &ExternalSignal) -> ScoreBreakdown {
    let components = Components::compute(metrics, signal);
    let score = components.composite();

    ScoreBreakdown {
        score,
        tier: Tier::from_score(score),
        reasons: reasons(metrics, signal),
        components,
    }
}

/// Advisory reasons, derived independently of the numeric score.
pub fn reasons(metrics: &AccountMetricSnapshot, signal: &ExternalSignal) -> Vec<Reason> {
    let mut reasons = Vec::new();

    if metrics.last_order_age_days > DORMANT_AFTER_DAYS {
        reasons.push(Reason::Dormant {
            days: metrics.last_order_age_days,
        });
    }
    if metrics.spend_delta_percent < SPEND_DROP_PERCENT {
        reasons.push(Reason::SpendDecline {
            percent: metrics.spend_delta_percent,
        });
    }
    let satisfaction = signal.satisfaction_score.unwrap_or(NEUTRAL_SATISFACTION);
    if satisfaction < LOW_SATISFACTION {
        reasons.push(Reason::LowSatisfaction {
            score: satisfaction,
        });
    }
    if signal.open_critical_incidents > 0 {
        reasons.push(Reason::OpenCriticalIncidents {
            count: signal.open_critical_incidents,
        });
    }
    if signal.sla_breaches_in_window > 0 {
        reasons.push(Reason::SlaBreaches {
            count: signal.sla_breaches_in_window,
        });
    }
    if metrics.order_count_in_window == 0 {
        reasons.push(Reason::NoOrdersInWindow);
    }

    reasons
}
