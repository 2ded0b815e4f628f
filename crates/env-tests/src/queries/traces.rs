//! Tempo adapter: TraceQL search through Grafana's datasource proxy.

use super::{parse, Signal, TelemetryQuery};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Search endpoint of the Tempo datasource.
pub const TEMPO_SEARCH_PATH: &str = "/api/datasources/proxy/uid/tempo/api/search";

/// Tempo search response.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub traces: Vec<TraceSummary>,
}

/// One trace in a search result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    #[serde(rename = "traceID", default)]
    pub trace_id: String,
    #[serde(default)]
    pub root_service_name: Option<String>,
    #[serde(default)]
    pub root_trace_name: Option<String>,
    #[serde(default)]
    pub span_set: Option<SpanSet>,
    #[serde(default)]
    pub span_sets: Vec<SpanSet>,
}

impl TraceSummary {
    /// Matched span set; newer Tempo versions only fill `spanSets`.
    fn first_span_set(&self) -> Option<&SpanSet> {
        self.span_set.as_ref().or_else(|| self.span_sets.first())
    }
}

#[derive(Debug, Deserialize)]
pub struct SpanSet {
    #[serde(default)]
    pub spans: Vec<Value>,
}

/// Expect exactly one single-span trace for a service, with a given root name.
#[derive(Debug, Clone)]
pub struct SingleSpanTrace {
    pub service_name: String,
    pub root_name: String,
}

impl SingleSpanTrace {
    pub fn new(service_name: impl Into<String>, root_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            root_name: root_name.into(),
        }
    }

    /// TraceQL selecting every span of the service.
    pub fn traceql(&self) -> String {
        format!(r#"{{resource.service.name="{}"}}"#, self.service_name)
    }

    pub fn into_query(self) -> TelemetryQuery {
        let traceql = self.traceql();
        let root_name = self.root_name;

        TelemetryQuery::new(
            Signal::Traces,
            TEMPO_SEARCH_PATH,
            BTreeMap::from([("q".to_string(), traceql.clone())]),
            traceql,
            move |body| check_single_span_trace(body, &root_name),
        )
    }
}

fn check_single_span_trace(body: &Value, root_name: &str) -> Result<(), String> {
    let response: SearchResponse = parse(body)?;

    let trace = match response.traces.as_slice() {
        [] => return Err("no traces yet".to_string()),
        [trace] => trace,
        traces => return Err(format!("expected 1 trace, found {}", traces.len())),
    };

    let spans = trace.first_span_set().map_or(0, |set| set.spans.len());
    if spans != 1 {
        return Err(format!(
            "trace {} has {} matched spans, expected 1",
            trace.trace_id, spans
        ));
    }

    match trace.root_trace_name.as_deref() {
        Some(name) if name == root_name => Ok(()),
        Some(name) => Err(format!(
            "root trace name {:?}, expected {:?}",
            name, root_name
        )),
        None => Err("trace has no root name yet".to_string()),
    }
}
