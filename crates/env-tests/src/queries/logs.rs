//! Loki adapter: LogQL range query through Grafana's datasource proxy.

use super::{parse, Signal, TelemetryQuery};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Range-query endpoint of the Loki datasource.
pub const LOKI_QUERY_RANGE_PATH: &str = "/api/datasources/proxy/uid/loki/loki/api/v1/query_range";

/// Loki query response.
#[derive(Debug, Deserialize)]
pub struct QueryRangeResponse {
    pub status: String,
    pub data: StreamData,
}

#[derive(Debug, Deserialize)]
pub struct StreamData {
    #[serde(default)]
    pub result: Vec<Stream>,
}

/// A log stream: labels plus `[timestamp_ns, line]` entries.
#[derive(Debug, Deserialize)]
pub struct Stream {
    #[serde(default)]
    pub stream: HashMap<String, String>,
    #[serde(default)]
    pub values: Vec<(String, String)>,
}

/// Expect a log line carrying a structured `key=value` attribute and a
/// message.
#[derive(Debug, Clone)]
pub struct LogLineExpectation {
    pub service_name: String,
    pub key: String,
    pub value: String,
    pub message: String,
}

impl LogLineExpectation {
    pub fn new(
        service_name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            key: key.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// LogQL: stream selector on the service, label filter on the attribute,
    /// then an empty line filter.
    pub fn logql(&self) -> String {
        format!(
            "{{service_name=\"{}\"}} | {}=`{}` |= ``",
            self.service_name, self.key, self.value
        )
    }

    pub fn into_query(self) -> TelemetryQuery {
        let logql = self.logql();
        let message = self.message;

        TelemetryQuery::new(
            Signal::Logs,
            LOKI_QUERY_RANGE_PATH,
            BTreeMap::from([("query".to_string(), logql.clone())]),
            logql,
            move |body| check_message(body, &message),
        )
    }
}

fn check_message(body: &Value, message: &str) -> Result<(), String> {
    let response: QueryRangeResponse = parse(body)?;
    if response.status != "success" {
        return Err(format!("query status: {}", response.status));
    }

    let mut lines = response
        .data
        .result
        .iter()
        .flat_map(|stream| stream.values.iter().map(|(_, line)| line.as_str()))
        .peekable();

    if lines.peek().is_none() {
        return Err("no log lines yet".to_string());
    }

    if lines.any(|line| line.contains(message)) {
        Ok(())
    } else {
        Err(format!("no log line contains {:?}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn streams(lines: &[&str]) -> Value {
        let values: Vec<Value> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| json!([format!("171700000000000000{i}"), line]))
            .collect();

        json!({
            "status": "success",
            "data": {
                "resultType": "streams",
                "result": [{
                    "stream": {"service_name": "greeter-service", "foo": "bar"},
                    "values": values
                }]
            }
        })
    }

    #[test]
    fn test_logql_filters_service_and_attribute() {
        let expectation = LogLineExpectation::new("greeter-service", "foo", "bar", "request...");
        assert_eq!(
            expectation.logql(),
            "{service_name=\"greeter-service\"} | foo=`bar` |= ``"
        );
    }

    #[test]
    fn test_query_targets_loki_proxy() {
        let query = LogLineExpectation::new("svc", "foo", "bar", "request...").into_query();
        assert_eq!(query.signal(), Signal::Logs);
        assert_eq!(query.path(), LOKI_QUERY_RANGE_PATH);
        assert!(query.params().contains_key("query"));
    }

    #[test]
    fn test_matching_line_satisfies() {
        let query = LogLineExpectation::new("svc", "foo", "bar", "request...").into_query();
        assert!(query.check(&streams(&["request..."])).is_ok());
    }

    #[test]
    fn test_formatted_line_containing_message_satisfies() {
        let query = LogLineExpectation::new("svc", "foo", "bar", "request...").into_query();
        let body = streams(&["startup", "INFO greeter_service: request... foo=\"bar\""]);
        assert!(query.check(&body).is_ok());
    }

    #[test]
    fn test_no_streams_is_not_ready() {
        let query = LogLineExpectation::new("svc", "foo", "bar", "request...").into_query();
        let body = json!({"status": "success", "data": {"resultType": "streams", "result": []}});
        assert!(query.check(&body).unwrap_err().contains("no log lines"));
    }

    #[test]
    fn test_other_lines_fail() {
        let query = LogLineExpectation::new("svc", "foo", "bar", "request...").into_query();
        assert!(query.check(&streams(&["unrelated"])).is_err());
    }
}
