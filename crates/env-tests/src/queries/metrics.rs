//! Prometheus adapter, queried through Grafana's datasource proxy.

use super::{parse, Signal, TelemetryQuery};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Instant-query endpoint of the Prometheus datasource.
pub const PROMETHEUS_QUERY_PATH: &str = "/api/datasources/proxy/uid/prometheus/api/v1/query";

/// Prometheus name of the request counter derived from the
/// `http.server.request.duration` histogram.
pub const DEFAULT_REQUEST_COUNT_METRIC: &str = "http_server_request_duration_seconds_count";

/// Prometheus query response.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub data: QueryData,
}

/// Query response data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryData {
    pub result_type: String,
    pub result: Vec<QueryResult>,
}

/// A single instant-vector sample: `[unix_ts, "value"]`.
#[derive(Debug, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    pub value: Option<(f64, String)>,
}

impl QueryResult {
    /// Sample value as a number, if present and numeric.
    pub fn sample(&self) -> Option<f64> {
        self.value.as_ref().and_then(|(_, v)| v.parse::<f64>().ok())
    }
}

/// Expect a route's request counter to have reached a minimum value.
#[derive(Debug, Clone)]
pub struct RouteCallCount {
    pub metric: String,
    pub service_name: String,
    pub route: String,
    pub min_count: f64,
}

impl RouteCallCount {
    /// Expect at least one recorded call of `route` by `service_name`.
    pub fn new(service_name: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            metric: DEFAULT_REQUEST_COUNT_METRIC.to_string(),
            service_name: service_name.into(),
            route: route.into(),
            min_count: 1.0,
        }
    }

    /// Query a different counter series.
    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = metric.into();
        self
    }

    /// Require a higher call count.
    pub fn with_min_count(mut self, min_count: f64) -> Self {
        self.min_count = min_count;
        self
    }

    /// PromQL selector. OTLP ingestion maps `service.name` onto `job`.
    pub fn expression(&self) -> String {
        format!(
            r#"{metric}{{job="{job}",http_route="{route}"}}"#,
            metric = self.metric,
            job = self.service_name,
            route = self.route
        )
    }

    pub fn into_query(self) -> TelemetryQuery {
        let expression = self.expression();
        let min_count = self.min_count;

        TelemetryQuery::new(
            Signal::Metrics,
            PROMETHEUS_QUERY_PATH,
            BTreeMap::from([("query".to_string(), expression.clone())]),
            expression,
            move |body| check_min_count(body, min_count),
        )
    }
}

/// Arbitrary instant query that only has to succeed, e.g. `vector(1)`.
///
/// Useful to prove a token can read the datasource.
pub fn instant_query(expression: impl Into<String>) -> TelemetryQuery {
    let expression = expression.into();

    TelemetryQuery::new(
        Signal::Metrics,
        PROMETHEUS_QUERY_PATH,
        BTreeMap::from([("query".to_string(), expression.clone())]),
        expression,
        |body| parse::<QueryResponse>(body).and_then(|response| check_status(&response)),
    )
}

fn check_status(response: &QueryResponse) -> Result<(), String> {
    if response.status == "success" {
        Ok(())
    } else {
        Err(format!("query status: {}", response.status))
    }
}

fn check_min_count(body: &Value, min_count: f64) -> Result<(), String> {
    let response: QueryResponse = parse(body)?;
    check_status(&response)?;

    if response.data.result.is_empty() {
        return Err("no samples yet".to_string());
    }

    let best = response
        .data
        .result
        .iter()
        .filter_map(QueryResult::sample)
        .fold(f64::NEG_INFINITY, f64::max);

    if best >= min_count {
        Ok(())
    } else {
        Err(format!(
            "highest sample {} below expected count {}",
            best, min_count
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vector(values: &[&str]) -> Value {
        let result: Vec<Value> = values
            .iter()
            .map(|v| {
                json!({
                    "metric": {"job": "greeter-service", "http_route": "/greetings"},
                    "value": [1_717_000_000.123, v]
                })
            })
            .collect();

        json!({
            "status": "success",
            "data": {"resultType": "vector", "result": result}
        })
    }

    #[test]
    fn test_expression_filters_by_service_and_route() {
        let expectation = RouteCallCount::new("greeter-service", "/greetings");
        assert_eq!(
            expectation.expression(),
            r#"http_server_request_duration_seconds_count{job="greeter-service",http_route="/greetings"}"#
        );
    }

    #[test]
    fn test_query_targets_prometheus_proxy() {
        let query = RouteCallCount::new("svc", "/greetings").into_query();

        assert_eq!(query.signal(), Signal::Metrics);
        assert_eq!(query.path(), PROMETHEUS_QUERY_PATH);
        assert!(query
            .params()
            .get("query")
            .is_some_and(|q| q.contains(r#"http_route="/greetings""#)));
    }

    #[test]
    fn test_count_of_one_satisfies() {
        let query = RouteCallCount::new("svc", "/greetings").into_query();
        assert!(query.check(&vector(&["1"])).is_ok());
    }

    #[test]
    fn test_any_sample_may_satisfy() {
        let query = RouteCallCount::new("svc", "/greetings").into_query();
        assert!(query.check(&vector(&["0", "3"])).is_ok());
    }

    #[test]
    fn test_empty_result_is_not_ready() {
        let query = RouteCallCount::new("svc", "/greetings").into_query();
        let err = query.check(&vector(&[])).unwrap_err();
        assert!(err.contains("no samples"));
    }

    #[test]
    fn test_count_below_minimum_is_not_ready() {
        let query = RouteCallCount::new("svc", "/greetings")
            .with_min_count(2.0)
            .into_query();
        assert!(query.check(&vector(&["1"])).is_err());
    }

    #[test]
    fn test_error_status_is_not_ready() {
        let query = RouteCallCount::new("svc", "/greetings").into_query();
        let body = json!({
            "status": "error",
            "data": {"resultType": "vector", "result": []}
        });
        assert!(query.check(&body).unwrap_err().contains("error"));
    }

    #[test]
    fn test_malformed_body_is_not_ready() {
        let query = RouteCallCount::new("svc", "/greetings").into_query();
        let err = query.check(&json!({"message": "datasource not found"})).unwrap_err();
        assert!(err.contains("unexpected response shape"));
    }

    #[test]
    fn test_instant_query_only_needs_success() {
        let query = instant_query("vector(1)");
        assert!(query.check(&vector(&["1"])).is_ok());
        assert_eq!(query.label(), "metric query vector(1)");
    }
}
