//! Grafana client fixture for telemetry queries.
//!
//! All three datasources (Prometheus, Tempo, Loki) are reached through
//! Grafana's datasource proxy with a service account bearer token, so one
//! client executes every [`TelemetryQuery`].

use crate::fixtures::provisioner::AccessToken;
use crate::queries::TelemetryQuery;
use crate::sanitize::sanitize_error_body;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Query errors. During polling every variant means "not visible yet".
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Query failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expectation not met: {0}")]
    Unsatisfied(String),
}

/// Client for Grafana's HTTP API.
pub struct GrafanaClient {
    base_url: String,
    http_client: Client,
    authorization: Option<String>,
}

impl GrafanaClient {
    /// Create an unauthenticated client (health checks only).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(base_url: impl Into<String>, http_client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            authorization: None,
        }
    }

    /// Authenticate queries with a provisioned token.
    pub fn with_token(mut self, token: &AccessToken) -> Self {
        self.authorization = Some(token.authorization());
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check Grafana health endpoint.
    pub async fn check_health(&self) -> Result<(), QueryError> {
        let url = format!("{}/api/health", self.base_url);

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        Ok(())
    }

    /// Fetch the raw JSON response for a query.
    pub async fn fetch(&self, query: &TelemetryQuery) -> Result<Value, QueryError> {
        let url = format!("{}{}", self.base_url, query.path());

        debug!(signal = %query.signal(), path = query.path(), "Executing telemetry query");

        let mut request = self.http_client.post(&url).query(query.params());
        if let Some(authorization) = &self.authorization {
            request = request.header("Authorization", authorization);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a query's response and evaluate its predicate.
    pub async fn execute(&self, query: &TelemetryQuery) -> Result<Value, QueryError> {
        let body = self.fetch(query).await?;
        query.check(&body).map_err(QueryError::Unsatisfied)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{metrics, RouteCallCount};
    use common::secret::SecretString;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(key: &str) -> AccessToken {
        AccessToken {
            key: SecretString::from(key),
        }
    }

    fn prometheus_body(count: &str) -> Value {
        json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [{"metric": {"job": "svc"}, "value": [1717000000.5, count]}]
            }
        })
    }

    #[tokio::test]
    async fn test_execute_posts_query_with_bearer_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(metrics::PROMETHEUS_QUERY_PATH))
            .and(query_param(
                "query",
                r#"http_server_request_duration_seconds_count{job="svc",http_route="/greetings"}"#,
            ))
            .and(header("authorization", "Bearer glsa_query_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(prometheus_body("1")))
            .expect(1)
            .mount(&server)
            .await;

        let client = GrafanaClient::new(server.uri()).with_token(&token("glsa_query_token"));
        let query = RouteCallCount::new("svc", "/greetings").into_query();

        let body = client.execute(&query).await.unwrap();
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn test_execute_reports_unmet_predicate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(metrics::PROMETHEUS_QUERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"resultType": "vector", "result": []}
            })))
            .mount(&server)
            .await;

        let client = GrafanaClient::new(server.uri()).with_token(&token("t"));
        let query = RouteCallCount::new("svc", "/greetings").into_query();

        let err = client.execute(&query).await.unwrap_err();
        assert!(matches!(err, QueryError::Unsatisfied(_)));
    }

    #[tokio::test]
    async fn test_execute_reports_status_with_sanitized_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(metrics::PROMETHEUS_QUERY_PATH))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string("invalid API key: Bearer glsa_rejected_key_value"),
            )
            .mount(&server)
            .await;

        let client = GrafanaClient::new(server.uri()).with_token(&token("glsa_rejected_key_value"));
        let query = RouteCallCount::new("svc", "/greetings").into_query();

        match client.execute(&query).await.unwrap_err() {
            QueryError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(!body.contains("glsa_rejected_key_value"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execute_reports_non_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let client = GrafanaClient::new(server.uri());
        let query = RouteCallCount::new("svc", "/greetings").into_query();

        assert!(matches!(
            client.execute(&query).await.unwrap_err(),
            QueryError::Json(_)
        ));
    }

    #[tokio::test]
    async fn test_check_health() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "database": "ok",
                "version": "11.0.0"
            })))
            .mount(&server)
            .await;

        assert!(GrafanaClient::new(server.uri()).check_health().await.is_ok());
    }

    #[tokio::test]
    async fn test_check_health_fails_on_503() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(
                ResponseTemplate::new(503).set_body_string("Bearer glsa_abc123 upstream down"),
            )
            .mount(&server)
            .await;

        let err = GrafanaClient::new(server.uri())
            .check_health()
            .await
            .unwrap_err();
        match err {
            QueryError::Status { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("upstream down"));
                assert!(!body.contains("glsa_abc123"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
