//! External per-account signals from two independent sources.

mod http;
mod simulated;

#[cfg(test)]
mod tests;

pub use http::{HttpSatisfactionSource, HttpSupportSource};
pub use simulated::{SimulatedSatisfactionSource, SimulatedSupportSource};

use crate::config::{resolve_env, SourceConfig, SourcesConfig};
use crate::error::{HealthError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Support-desk figures for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportRecord {
    pub open_critical_incidents: u32,
    pub sla_breaches_in_window: u32,
}

/// Signals fused into the score for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSignal {
    pub satisfaction_score: Option<f64>,
    pub open_critical_incidents: u32,
    pub sla_breaches_in_window: u32,
    #[serde(skip)]
    pub has_support_record: bool,
}

/// Source of customer satisfaction scores.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SatisfactionSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &'static str;

    /// Scores keyed by account id. Accounts without data are omitted.
    async fn fetch_satisfaction(&self, account_ids: &[String]) -> Result<HashMap<String, f64>>;
}

/// Source of support incident data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SupportSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &'static str;

    /// Records keyed by account id. Accounts without data are omitted.
    async fn fetch_support(
        &self,
        account_ids: &[String],
        window_days: u32,
    ) -> Result<HashMap<String, SupportRecord>>;
}

/// Joined result of both sources for one batch.
#[derive(Debug, Clone, Default)]
pub struct SignalBatch {
    satisfaction: HashMap<String, f64>,
    support: HashMap<String, SupportRecord>,
}

impl SignalBatch {
    pub fn new(
        satisfaction: HashMap<String, f64>,
        support: HashMap<String, SupportRecord>,
    ) -> Self {
        Self {
            satisfaction,
            support,
        }
    }

    /// Signal for one account, with zero/absent defaults for missing data.
    pub fn signal_for(&self, account_id: &str) -> ExternalSignal {
        let support = self.support.get(account_id);
        ExternalSignal {
            satisfaction_score: self.satisfaction.get(account_id).copied(),
            open_critical_incidents: support.map_or(0, |s| s.open_critical_incidents),
            sla_breaches_in_window: support.map_or(0, |s| s.sla_breaches_in_window),
            has_support_record: support.is_some(),
        }
    }
}

/// Fans a batch out to both sources and waits for both to settle.
#[derive(Clone)]
pub struct SignalFetcher {
    satisfaction: Arc<dyn SatisfactionSource>,
    support: Arc<dyn SupportSource>,
    timeout: Duration,
}

impl SignalFetcher {
    pub fn new(
        satisfaction: Arc<dyn SatisfactionSource>,
        support: Arc<dyn SupportSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            satisfaction,
            support,
            timeout,
        }
    }

    /// Fetch both signal kinds. A failed or late source only empties its
    /// own half of the batch.
    pub async fn fetch(&self, account_ids: &[String], window_days: u32) -> SignalBatch {
        if account_ids.is_empty() {
            return SignalBatch::default();
        }

        let satisfaction = guarded(
            self.satisfaction.name(),
            self.timeout,
            self.satisfaction.fetch_satisfaction(account_ids),
        );
        let support = guarded(
            self.support.name(),
            self.timeout,
            self.support.fetch_support(account_ids, window_days),
        );

        let (satisfaction, support) = tokio::join!(satisfaction, support);

        tracing::debug!(
            accounts = account_ids.len(),
            satisfaction = satisfaction.len(),
            support = support.len(),
            "Fetched external signals"
        );

        SignalBatch::new(satisfaction, support)
    }
}

/// Run one branch under a deadline, mapping any failure to an empty result.
async fn guarded<T, F>(source_name: &str, timeout: Duration, fut: F) -> HashMap<String, T>
where
    F: Future<Output = Result<HashMap<String, T>>>,
{
    let outcome = match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(HealthError::Timeout {
            source_name: source_name.to_string(),
            millis: timeout.as_millis() as u64,
        }),
    };

    outcome.unwrap_or_else(|e| {
        tracing::warn!(
            source = source_name,
            error = %e,
            "Signal source unavailable, using defaults"
        );
        HashMap::new()
    })
}

/// Build a fetcher from configuration.
pub fn build_fetcher(config: &SourcesConfig, timeout: Duration) -> SignalFetcher {
    let satisfaction: Arc<dyn SatisfactionSource> = match &config.satisfaction {
        SourceConfig::Simulated {
            latency_ms,
            coverage_percent,
        } => Arc::new(SimulatedSatisfactionSource::new(
            Duration::from_millis(*latency_ms),
            *coverage_percent,
        )),
        SourceConfig::Http {
            base_url,
            api_token,
        } => Arc::new(HttpSatisfactionSource::new(
            base_url.clone(),
            resolve_env(api_token),
        )),
    };

    let support: Arc<dyn SupportSource> = match &config.support {
        SourceConfig::Simulated {
            latency_ms,
            coverage_percent,
        } => Arc::new(SimulatedSupportSource::new(
            Duration::from_millis(*latency_ms),
            *coverage_percent,
        )),
        SourceConfig::Http {
            base_url,
            api_token,
        } => Arc::new(HttpSupportSource::new(base_url.clone(), resolve_env(api_token))),
    };

    SignalFetcher::new(satisfaction, support, timeout)
}
