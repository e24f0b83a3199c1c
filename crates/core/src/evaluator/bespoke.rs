use crate::config::{request_error_text, Settings};
use crate::evaluator::error::EvaluatorError;
use crate::evaluator::AccuracyEvaluator;
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.bespokelabs.com";
const EVALUATE_PATH: &str = "/v1/evaluate";
const METRIC_ACCURACY: &str = "accuracy_score";

#[derive(Debug, Clone)]
pub struct BespokeEvaluator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BespokeEvaluator {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_settings(settings: &Settings, http: reqwest::Client) -> anyhow::Result<Self> {
        let api_key = settings.require_bespoke_api_key()?;
        let base_url = settings
            .bespoke_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);
        Ok(Self::new(http, base_url, api_key))
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), EVALUATE_PATH)
    }
}

#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    text: &'a str,
    metrics: [&'static str; 1],
}

/// Accepts a JSON number or a numeric string.
fn extract_score(body: &Value) -> Result<f64, EvaluatorError> {
    let raw = body
        .get(METRIC_ACCURACY)
        .ok_or_else(|| EvaluatorError::Parse(format!("response has no {METRIC_ACCURACY}: {body}")))?;

    let score = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    score
        .filter(|s| s.is_finite())
        .ok_or_else(|| EvaluatorError::Parse(format!("{METRIC_ACCURACY} is not numeric: {raw}")))
}

#[async_trait::async_trait]
impl AccuracyEvaluator for BespokeEvaluator {
    fn provider_name(&self) -> &'static str {
        "bespoke_labs"
    }

    async fn evaluate(&self, text: &str) -> Result<f64, EvaluatorError> {
        let res = self
            .http
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&EvaluateRequest {
                text,
                metrics: [METRIC_ACCURACY],
            })
            .send()
            .await
            .map_err(|e| EvaluatorError::Network(request_error_text(e)))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| EvaluatorError::Network(request_error_text(e)))?;
        if !status.is_success() {
            return Err(EvaluatorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json = serde_json::from_str::<Value>(&body)
            .map_err(|e| EvaluatorError::Parse(format!("response is not valid JSON: {e}")))?;
        let score = extract_score(&json)?;
        tracing::debug!(score, "accuracy score received");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn evaluator(base_url: &str) -> BespokeEvaluator {
        BespokeEvaluator::new(reqwest::Client::new(), base_url, "bk-test")
    }

    #[tokio::test]
    async fn posts_text_with_metric_and_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/evaluate")
            .match_header("authorization", "Bearer bk-test")
            .match_body(Matcher::Json(json!({
                "text": "newsletter body",
                "metrics": ["accuracy_score"]
            })))
            .with_status(200)
            .with_body(json!({"accuracy_score": 92.5}).to_string())
            .create_async()
            .await;

        let score = evaluator(&server.url()).evaluate("newsletter body").await.unwrap();
        mock.assert_async().await;
        assert_eq!(score, 92.5);
    }

    #[tokio::test]
    async fn missing_score_is_a_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/evaluate")
            .with_status(200)
            .with_body(json!({"other": 1}).to_string())
            .create_async()
            .await;

        let err = evaluator(&server.url()).evaluate("x").await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn server_error_is_reported_with_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/evaluate")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = evaluator(&server.url()).evaluate("x").await.unwrap_err();
        assert!(matches!(err, EvaluatorError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn transport_failure_does_not_leak_the_api_key() {
        let err = BespokeEvaluator::new(reqwest::Client::new(), "http://127.0.0.1:1", "bk-SUPERSECRET")
            .evaluate("x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network");
        assert!(!err.to_string().contains("bk-SUPERSECRET"), "{err}");
    }

    #[test]
    fn numeric_strings_are_accepted() {
        assert_eq!(extract_score(&json!({"accuracy_score": " 81.0 "})).unwrap(), 81.0);
        assert!(extract_score(&json!({"accuracy_score": "N/A"})).is_err());
        assert!(extract_score(&json!({"accuracy_score": null})).is_err());
    }
}
