//! Signal source tests with HTTP and trait mocking.

#[cfg(test)]
mod http_tests {
    use crate::signals::{
        HttpSatisfactionSource, HttpSupportSource, SatisfactionSource, SupportSource,
    };
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ids() -> Vec<String> {
        vec!["1".to_string(), "2".to_string(), "3".to_string()]
    }

    #[tokio::test]
    async fn test_http_satisfaction_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/satisfaction"))
            .and(header("Authorization", "Bearer survey-token"))
            .and(body_json(serde_json::json!({"account_ids": ["1", "2", "3"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "scores": [
                    {"account_id": "1", "score": 82.5},
                    {"account_id": "2", "score": null}
                ]
            })))
            .mount(&mock_server)
            .await;

        let source = HttpSatisfactionSource::new(mock_server.uri(), "survey-token".to_string());
        let scores = source.fetch_satisfaction(&ids()).await.unwrap();

        assert_eq!(scores.len(), 1);
        assert_eq!(scores["1"], 82.5);
        assert!(!scores.contains_key("2"));
    }

    #[tokio::test]
    async fn test_http_satisfaction_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/satisfaction"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = HttpSatisfactionSource::new(mock_server.uri(), String::new());
        assert!(source.fetch_satisfaction(&ids()).await.is_err());
    }

    #[tokio::test]
    async fn test_http_support_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/incidents"))
            .and(body_json(serde_json::json!({
                "account_ids": ["1", "2", "3"],
                "window_days": 30
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [
                    {"account_id": "3", "open_critical_incidents": 2, "sla_breaches": 1},
                    {"account_id": "1"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let source = HttpSupportSource::new(format!("{}/", mock_server.uri()), String::new());
        let records = source.fetch_support(&ids(), 30).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records["3"].open_critical_incidents, 2);
        assert_eq!(records["3"].sla_breaches_in_window, 1);
        assert_eq!(records["1"].open_critical_incidents, 0);
    }

    #[tokio::test]
    async fn test_http_support_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/incidents"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let source = HttpSupportSource::new(mock_server.uri(), String::new());
        assert!(source.fetch_support(&ids(), 30).await.is_err());
    }
}

#[cfg(test)]
mod fetcher_tests {
    use crate::error::{HealthError, Result};
    use crate::signals::{
        MockSatisfactionSource, MockSupportSource, SatisfactionSource, SignalFetcher,
        SupportRecord,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn ids() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn satisfaction_ok() -> MockSatisfactionSource {
        let mut mock = MockSatisfactionSource::new();
        mock.expect_name().return_const("mock-satisfaction");
        mock.expect_fetch_satisfaction()
            .times(1)
            .returning(|_| Ok(HashMap::from([("a".to_string(), 90.0)])));
        mock
    }

    fn support_ok() -> MockSupportSource {
        let mut mock = MockSupportSource::new();
        mock.expect_name().return_const("mock-support");
        mock.expect_fetch_support()
            .times(1)
            .returning(|_, window_days| {
                assert_eq!(window_days, 30);
                Ok(HashMap::from([(
                    "b".to_string(),
                    SupportRecord {
                        open_critical_incidents: 1,
                        sla_breaches_in_window: 2,
                    },
                )]))
            });
        mock
    }

    struct StalledSatisfaction;

    #[async_trait]
    impl SatisfactionSource for StalledSatisfaction {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn fetch_satisfaction(
            &self,
            _account_ids: &[String],
        ) -> Result<HashMap<String, f64>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(HashMap::new())
        }
    }

    #[tokio::test]
    async fn test_both_sources_merge() {
        let fetcher = SignalFetcher::new(
            Arc::new(satisfaction_ok()),
            Arc::new(support_ok()),
            Duration::from_secs(1),
        );

        let batch = fetcher.fetch(&ids(), 30).await;

        let a = batch.signal_for("a");
        assert_eq!(a.satisfaction_score, Some(90.0));
        assert!(!a.has_support_record);

        let b = batch.signal_for("b");
        assert_eq!(b.satisfaction_score, None);
        assert_eq!(b.open_critical_incidents, 1);
        assert_eq!(b.sla_breaches_in_window, 2);
        assert!(b.has_support_record);
    }

    #[tokio::test]
    async fn test_failed_source_degrades_only_its_field() {
        let mut support = MockSupportSource::new();
        support.expect_name().return_const("mock-support");
        support
            .expect_fetch_support()
            .returning(|_, _| Err(HealthError::Network("connection refused".to_string())));

        let fetcher = SignalFetcher::new(
            Arc::new(satisfaction_ok()),
            Arc::new(support),
            Duration::from_secs(1),
        );

        let batch = fetcher.fetch(&ids(), 30).await;

        assert_eq!(batch.signal_for("a").satisfaction_score, Some(90.0));
        let b = batch.signal_for("b");
        assert_eq!(b.open_critical_incidents, 0);
        assert!(!b.has_support_record);
    }

    #[tokio::test]
    async fn test_stalled_source_times_out_without_blocking_other() {
        let fetcher = SignalFetcher::new(
            Arc::new(StalledSatisfaction),
            Arc::new(support_ok()),
            Duration::from_millis(50),
        );

        let batch = fetcher.fetch(&ids(), 30).await;

        assert_eq!(batch.signal_for("a").satisfaction_score, None);
        assert_eq!(batch.signal_for("b").sla_breaches_in_window, 2);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_sources() {
        let mut satisfaction = MockSatisfactionSource::new();
        satisfaction.expect_fetch_satisfaction().never();
        let mut support = MockSupportSource::new();
        support.expect_fetch_support().never();

        let fetcher = SignalFetcher::new(
            Arc::new(satisfaction),
            Arc::new(support),
            Duration::from_secs(1),
        );

        let batch = fetcher.fetch(&[], 30).await;
        assert_eq!(batch.signal_for("x").satisfaction_score, None);
    }
}
