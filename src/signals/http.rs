//! HTTP-backed signal sources.

use super::{SatisfactionSource, SupportRecord, SupportSource};
use crate::error::{HealthError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    account_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    window_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SatisfactionResponse {
    scores: Vec<SatisfactionEntry>,
}

#[derive(Debug, Deserialize)]
struct SatisfactionEntry {
    account_id: String,
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SupportResponse {
    records: Vec<SupportEntry>,
}

#[derive(Debug, Deserialize)]
struct SupportEntry {
    account_id: String,
    #[serde(default)]
    open_critical_incidents: u32,
    #[serde(default)]
    sla_breaches: u32,
}

async fn post_batch<T: DeserializeOwned>(
    client: &reqwest::Client,
    source_name: &str,
    url: &str,
    api_token: &str,
    body: &BatchRequest<'_>,
) -> Result<T> {
    let mut request = client.post(url).json(body);
    if !api_token.is_empty() {
        request = request.header("Authorization", format!("Bearer {}", api_token));
    }

    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(HealthError::Signal {
            source_name: source_name.to_string(),
            message: format!("HTTP {} from {}", response.status(), url),
        });
    }

    Ok(response.json().await?)
}

/// Satisfaction survey service client.
pub struct HttpSatisfactionSource {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpSatisfactionSource {
    pub fn new(base_url: String, api_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }
}

#[async_trait]
impl SatisfactionSource for HttpSatisfactionSource {
    fn name(&self) -> &'static str {
        "http-satisfaction"
    }

    async fn fetch_satisfaction(&self, account_ids: &[String]) -> Result<HashMap<String, f64>> {
        let url = format!("{}/v1/satisfaction", self.base_url);
        let body = BatchRequest {
            account_ids,
            window_days: None,
        };

        let response: SatisfactionResponse =
            post_batch(&self.client, self.name(), &url, &self.api_token, &body).await?;

        Ok(response
            .scores
            .into_iter()
            .filter_map(|entry| entry.score.map(|score| (entry.account_id, score)))
            .collect())
    }
}

/// Support-desk service client.
pub struct HttpSupportSource {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpSupportSource {
    pub fn new(base_url: String, api_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }
}

#[async_trait]
impl SupportSource for HttpSupportSource {
    fn name(&self) -> &'static str {
        "http-support"
    }

    async fn fetch_support(
        &self,
        account_ids: &[String],
        window_days: u32,
    ) -> Result<HashMap<String, SupportRecord>> {
        let url = format!("{}/v1/incidents", self.base_url);
        let body = BatchRequest {
            account_ids,
            window_days: Some(window_days),
        };

        let response: SupportResponse =
            post_batch(&self.client, self.name(), &url, &self.api_token, &body).await?;

        Ok(response
            .records
            .into_iter()
            .map(|entry| {
                (
                    entry.account_id,
                    SupportRecord {
                        open_critical_incidents: entry.open_critical_incidents,
                        sla_breaches_in_window: entry.sla_breaches,
                    },
                )
            })
            .collect())
    }
}
