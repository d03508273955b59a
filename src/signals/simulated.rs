//! Deterministic stand-ins for the survey and support-desk services.

use super::{SatisfactionSource, SupportRecord, SupportSource};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// FNV-1a, so simulated values are stable across runs and platforms.
fn stable_hash(seed: &str, account_id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in seed.bytes().chain(account_id.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn covered(seed: &str, account_id: &str, coverage_percent: u8) -> bool {
    stable_hash(seed, account_id) % 100 < u64::from(coverage_percent.min(100))
}

/// Simulated satisfaction survey service.
pub struct SimulatedSatisfactionSource {
    latency: Duration,
    coverage_percent: u8,
}

impl SimulatedSatisfactionSource {
    pub fn new(latency: Duration, coverage_percent: u8) -> Self {
        Self {
            latency,
            coverage_percent,
        }
    }
}

#[async_trait]
impl SatisfactionSource for SimulatedSatisfactionSource {
    fn name(&self) -> &'static str {
        "simulated-satisfaction"
    }

    async fn fetch_satisfaction(&self, account_ids: &[String]) -> Result<HashMap<String, f64>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(account_ids
            .iter()
            .filter(|id| covered("csat-coverage", id, self.coverage_percent))
            .map(|id| {
                // 20.0..=100.0 in steps of 0.5
                let score = 20.0 + (stable_hash("csat", id) % 161) as f64 / 2.0;
                (id.clone(), score)
            })
            .collect())
    }
}

/// Simulated support-desk service.
pub struct SimulatedSupportSource {
    latency: Duration,
    coverage_percent: u8,
}

impl SimulatedSupportSource {
    pub fn new(latency: Duration, coverage_percent: u8) -> Self {
        Self {
            latency,
            coverage_percent,
        }
    }
}

#[async_trait]
impl SupportSource for SimulatedSupportSource {
    fn name(&self) -> &'static str {
        "simulated-support"
    }

    async fn fetch_support(
        &self,
        account_ids: &[String],
        window_days: u32,
    ) -> Result<HashMap<String, SupportRecord>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(account_ids
            .iter()
            .filter(|id| covered("support-coverage", id, self.coverage_percent))
            .map(|id| {
                let hash = stable_hash("support", id);
                // Longer windows see proportionally more breaches.
                let breach_base = (hash >> 8) % 3;
                let record = SupportRecord {
                    open_critical_incidents: (hash % 4).saturating_sub(2) as u32,
                    sla_breaches_in_window: (breach_base * u64::from(window_days) / 90) as u32,
                };
                (id.clone(), record)
            })
            .collect())
    }
}
