//! Deterministic stub sources standing in for cloud log/metric back-ends
//!
//! Two flavors are provided, AWS-shaped and GCP-shaped. Both advertise the
//! same two operations (`fetchLogs`, `fetchMetrics`) over canned datasets,
//! which is exactly what the multi-source routing layer needs to prove
//! namespacing: identical operation names behind different providers.

use crate::protocol::{OperationDescriptor, ParameterKind, ParameterSpec};
use crate::sources::model::{LogEntry, Metric};
use crate::sources::{LogSource, Operation, SourceError};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A stub log/metric source with a fixed provider identity and dataset.
pub struct StubSource {
    provider: String,
    credential_key: String,
    store: Arc<LogStore>,
    scope: Arc<RwLock<Option<String>>>,
}

impl StubSource {
    /// AWS-flavored stub. Requires a `region` credential.
    pub fn aws() -> Self {
        Self::flavored("AWS", "region", aws_entries())
    }

    /// GCP-flavored stub. Requires a `project` credential.
    pub fn gcp() -> Self {
        Self::flavored("GCP", "project", gcp_entries())
    }

    fn flavored(provider: &str, credential_key: &str, entries: Vec<LogEntry>) -> Self {
        Self {
            provider: provider.to_string(),
            credential_key: credential_key.to_string(),
            store: Arc::new(LogStore {
                provider: provider.to_string(),
                entries,
            }),
            scope: Arc::new(RwLock::new(None)),
        }
    }
}

#[async_trait]
impl LogSource for StubSource {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["fetchLogs".to_string(), "fetchMetrics".to_string()]
    }

    async fn initialize(
        &mut self,
        credentials: &HashMap<String, String>,
    ) -> Result<(), SourceError> {
        let scope = credentials
            .get(&self.credential_key)
            .ok_or_else(|| SourceError::MissingCredential(self.credential_key.clone()))?;
        *self.scope.write().await = Some(scope.clone());
        Ok(())
    }

    fn operations(&self) -> Vec<Arc<dyn Operation>> {
        vec![
            Arc::new(FetchLogs {
                store: Arc::clone(&self.store),
            }),
            Arc::new(FetchMetrics {
                store: Arc::clone(&self.store),
                scope: Arc::clone(&self.scope),
            }),
        ]
    }
}

/// `fetchLogs(resource, filter, limit)` over the canned dataset.
struct FetchLogs {
    store: Arc<LogStore>,
}

#[async_trait]
impl Operation for FetchLogs {
    fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor::new(
            "fetchLogs",
            "Fetch log entries for a logical resource, filtered by severity or substring",
            vec![
                ParameterSpec::required(
                    "resource",
                    ParameterKind::String,
                    "Logical resource name, e.g. a service",
                ),
                ParameterSpec::required(
                    "filter",
                    ParameterKind::String,
                    "Severity label or message substring; empty matches everything",
                ),
                ParameterSpec::required(
                    "limit",
                    ParameterKind::Integer,
                    "Maximum number of entries to return",
                ),
            ],
        )
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, SourceError> {
        let resource = require_string(arguments, "resource")?;
        let filter = require_string(arguments, "filter")?;
        let limit = require_integer(arguments, "limit")? as usize;

        let logs = self.store.fetch_logs(&resource, &filter, limit);
        Ok(json!({
            "provider": self.store.provider,
            "logs": logs,
            "count": logs.len(),
        }))
    }
}

/// `fetchMetrics(resource, metricName, timeRange)` generating a
/// deterministic series per range label.
struct FetchMetrics {
    store: Arc<LogStore>,
    scope: Arc<RwLock<Option<String>>>,
}

#[async_trait]
impl Operation for FetchMetrics {
    fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor::new(
            "fetchMetrics",
            "Fetch metric data points for a resource over a time range",
            vec![
                ParameterSpec::required(
                    "resource",
                    ParameterKind::String,
                    "Logical resource name, e.g. a service",
                ),
                ParameterSpec::required(
                    "metricName",
                    ParameterKind::String,
                    "Metric to read, e.g. cpu_utilization or error_rate",
                ),
                ParameterSpec::required(
                    "timeRange",
                    ParameterKind::String,
                    "Range label: 1h, 24h or 7d",
                ),
            ],
        )
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, SourceError> {
        let resource = require_string(arguments, "resource")?;
        let metric_name = require_string(arguments, "metricName")?;
        let time_range = require_string(arguments, "timeRange")?;

        let scope = self
            .scope
            .read()
            .await
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let metrics = self
            .store
            .fetch_metrics(&resource, &metric_name, &time_range, &scope);
        Ok(json!({
            "provider": self.store.provider,
            "metrics": metrics,
            "count": metrics.len(),
        }))
    }
}

/// Canned per-provider dataset plus deterministic metric synthesis.
struct LogStore {
    provider: String,
    entries: Vec<LogEntry>,
}

impl LogStore {
    fn fetch_logs(&self, resource: &str, filter: &str, limit: usize) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.resource == resource)
            .filter(|entry| {
                filter.is_empty() || entry.severity == filter || entry.message.contains(filter)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    fn fetch_metrics(
        &self,
        resource: &str,
        metric_name: &str,
        time_range: &str,
        scope: &str,
    ) -> Vec<Metric> {
        let points = series_len(time_range);
        let step = Duration::minutes(step_minutes(time_range));
        let end = Utc::now();

        (0..points)
            .map(|i| {
                let mut labels = HashMap::new();
                labels.insert("resource".to_string(), resource.to_string());
                labels.insert("scope".to_string(), scope.to_string());
                Metric::new(
                    end - step * (points - 1 - i) as i32,
                    metric_name,
                    synth_value(metric_name, i),
                    unit_for(metric_name),
                    labels,
                )
            })
            .collect()
    }
}

fn series_len(time_range: &str) -> usize {
    match time_range {
        "1h" => 12,
        "24h" => 24,
        "7d" => 7,
        _ => 10,
    }
}

fn step_minutes(time_range: &str) -> i64 {
    match time_range {
        "1h" => 5,
        "24h" => 60,
        "7d" => 1440,
        _ => 1,
    }
}

fn unit_for(metric_name: &str) -> &'static str {
    if metric_name.contains("cpu") || metric_name.contains("memory") || metric_name.contains("util")
    {
        "Percent"
    } else {
        "Count"
    }
}

fn synth_value(metric_name: &str, index: usize) -> f64 {
    40.0 + ((index * 7 + metric_name.len()) % 25) as f64
}

fn require_string(arguments: &Map<String, Value>, name: &str) -> Result<String, SourceError> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SourceError::invalid_arguments(format!(
            "parameter '{name}' must be a string"
        ))),
        None => Err(SourceError::invalid_arguments(format!(
            "missing required parameter '{name}'"
        ))),
    }
}

fn require_integer(arguments: &Map<String, Value>, name: &str) -> Result<u64, SourceError> {
    match arguments.get(name) {
        Some(value) => value.as_u64().ok_or_else(|| {
            SourceError::invalid_arguments(format!(
                "parameter '{name}' must be a non-negative integer"
            ))
        }),
        None => Err(SourceError::invalid_arguments(format!(
            "missing required parameter '{name}'"
        ))),
    }
}

fn aws_entries() -> Vec<LogEntry> {
    let now = Utc::now();
    let at = |minutes_ago: i64| now - Duration::minutes(minutes_ago);
    vec![
        LogEntry::new(at(1), "ERROR", "Payment gateway timeout after 30s", "payment-service"),
        LogEntry::new(at(3), "ERROR", "Connection pool exhausted: 50/50 in use", "payment-service"),
        LogEntry::new(at(6), "ERROR", "Charge declined: upstream returned 502", "payment-service"),
        LogEntry::new(at(9), "WARN", "Latency p99 above 2s for 5m window", "payment-service"),
        LogEntry::new(at(12), "ERROR", "Retry budget exhausted for tokenization call", "payment-service"),
        LogEntry::new(at(15), "ERROR", "Database connection reset by peer", "payment-service"),
        LogEntry::new(at(19), "ERROR", "Circuit breaker open for card-auth dependency", "payment-service"),
        LogEntry::new(at(24), "INFO", "Deployed build 2026-08-19.3", "payment-service"),
        LogEntry::new(at(2), "ERROR", "Upstream handler returned 500 for POST /charge", "api-gateway"),
        LogEntry::new(at(8), "ERROR", "TLS handshake failed from 10.0.4.11", "api-gateway"),
        LogEntry::new(at(14), "INFO", "Route table reloaded", "api-gateway"),
        LogEntry::new(at(5), "WARN", "Queue depth above 1000 messages", "checkout-worker"),
        LogEntry::new(at(11), "INFO", "Scaled to 6 instances", "checkout-worker"),
    ]
}

fn gcp_entries() -> Vec<LogEntry> {
    let now = Utc::now();
    let at = |minutes_ago: i64| now - Duration::minutes(minutes_ago);
    vec![
        LogEntry::new(at(2), "ERROR", "Cloud SQL connection refused", "payment-service"),
        LogEntry::new(at(7), "ERROR", "Pub/Sub ack deadline exceeded", "payment-service"),
        LogEntry::new(at(13), "ERROR", "Upstream 503 from payments backend", "payment-service"),
        LogEntry::new(at(18), "INFO", "Rolled out revision payments-00042", "payment-service"),
        LogEntry::new(at(4), "ERROR", "Backend connection closed before headers", "frontend-lb"),
        LogEntry::new(at(10), "WARN", "Healthcheck flapping on instance group", "frontend-lb"),
        LogEntry::new(at(16), "INFO", "Certificate rotated", "frontend-lb"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arguments(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_requires_flavor_credential() {
        let mut source = StubSource::aws();
        let result = source.initialize(&HashMap::new()).await;
        assert!(matches!(result, Err(SourceError::MissingCredential(ref k)) if k == "region"));

        let mut credentials = HashMap::new();
        credentials.insert("region".to_string(), "us-east-1".to_string());
        assert!(source.initialize(&credentials).await.is_ok());
    }

    #[tokio::test]
    async fn test_gcp_requires_project_credential() {
        let mut source = StubSource::gcp();
        let mut credentials = HashMap::new();
        credentials.insert("region".to_string(), "us-east-1".to_string());
        let result = source.initialize(&credentials).await;
        assert!(matches!(result, Err(SourceError::MissingCredential(ref k)) if k == "project"));
    }

    #[test]
    fn test_advertises_exactly_two_operations_in_order() {
        let source = StubSource::aws();
        let operations = source.operations();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0].descriptor().name, "fetchLogs");
        assert_eq!(operations[1].descriptor().name, "fetchMetrics");
        assert_eq!(source.capabilities(), vec!["fetchLogs", "fetchMetrics"]);
    }

    #[test]
    fn test_fetch_metrics_descriptor_uses_wire_parameter_names() {
        let source = StubSource::gcp();
        let descriptor = source.operations()[1].descriptor();
        let names: Vec<&str> = descriptor
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["resource", "metricName", "timeRange"]);
        assert!(descriptor.parameters.iter().all(|p| p.required));
    }

    #[tokio::test]
    async fn test_fetch_logs_filters_and_truncates() {
        let source = StubSource::aws();
        let fetch_logs = &source.operations()[0];

        let result = fetch_logs
            .invoke(&arguments(&[
                ("resource", json!("payment-service")),
                ("filter", json!("ERROR")),
                ("limit", json!(5)),
            ]))
            .await
            .unwrap();

        assert_eq!(result["provider"], "AWS");
        assert_eq!(result["count"], 5);
        let logs = result["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 5);
        assert!(logs.iter().all(|l| l["severity"] == "ERROR"));
        assert!(logs.iter().all(|l| l["resource"] == "payment-service"));
    }

    #[tokio::test]
    async fn test_fetch_logs_empty_filter_matches_everything() {
        let source = StubSource::aws();
        let fetch_logs = &source.operations()[0];

        let result = fetch_logs
            .invoke(&arguments(&[
                ("resource", json!("payment-service")),
                ("filter", json!("")),
                ("limit", json!(100)),
            ]))
            .await
            .unwrap();

        assert_eq!(result["count"], 8);
    }

    #[tokio::test]
    async fn test_fetch_logs_substring_filter() {
        let source = StubSource::aws();
        let fetch_logs = &source.operations()[0];

        let result = fetch_logs
            .invoke(&arguments(&[
                ("resource", json!("payment-service")),
                ("filter", json!("pool")),
                ("limit", json!(10)),
            ]))
            .await
            .unwrap();

        assert_eq!(result["count"], 1);
        assert!(
            result["logs"][0]["message"]
                .as_str()
                .unwrap()
                .contains("pool")
        );
    }

    #[tokio::test]
    async fn test_fetch_logs_unknown_resource_returns_empty() {
        let source = StubSource::gcp();
        let fetch_logs = &source.operations()[0];

        let result = fetch_logs
            .invoke(&arguments(&[
                ("resource", json!("no-such-service")),
                ("filter", json!("ERROR")),
                ("limit", json!(10)),
            ]))
            .await
            .unwrap();

        assert_eq!(result["count"], 0);
        assert_eq!(result["logs"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_logs_rejects_missing_and_mistyped_arguments() {
        let source = StubSource::aws();
        let fetch_logs = &source.operations()[0];

        let missing = fetch_logs
            .invoke(&arguments(&[("resource", json!("payment-service"))]))
            .await;
        assert!(matches!(missing, Err(SourceError::InvalidArguments(_))));

        let mistyped = fetch_logs
            .invoke(&arguments(&[
                ("resource", json!("payment-service")),
                ("filter", json!("ERROR")),
                ("limit", json!("five")),
            ]))
            .await;
        assert!(matches!(mistyped, Err(SourceError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_fetch_metrics_series_length_per_range() {
        let source = StubSource::aws();
        let fetch_metrics = &source.operations()[1];

        for (range, expected) in [("1h", 12), ("24h", 24), ("7d", 7), ("90m", 10)] {
            let result = fetch_metrics
                .invoke(&arguments(&[
                    ("resource", json!("payment-service")),
                    ("metricName", json!("error_rate")),
                    ("timeRange", json!(range)),
                ]))
                .await
                .unwrap();
            assert_eq!(result["count"], expected, "range {range}");
        }
    }

    #[tokio::test]
    async fn test_fetch_metrics_carries_scope_and_unit() {
        let mut source = StubSource::aws();
        let mut credentials = HashMap::new();
        credentials.insert("region".to_string(), "eu-west-2".to_string());
        source.initialize(&credentials).await.unwrap();

        let fetch_metrics = &source.operations()[1];
        let result = fetch_metrics
            .invoke(&arguments(&[
                ("resource", json!("api-gateway")),
                ("metricName", json!("cpu_utilization")),
                ("timeRange", json!("1h")),
            ]))
            .await
            .unwrap();

        let first = &result["metrics"][0];
        assert_eq!(first["unit"], "Percent");
        assert_eq!(first["labels"]["scope"], "eu-west-2");
        assert_eq!(first["labels"]["resource"], "api-gateway");
    }

    #[test]
    fn test_series_shape_helpers() {
        assert_eq!(series_len("1h"), 12);
        assert_eq!(series_len("24h"), 24);
        assert_eq!(series_len("7d"), 7);
        assert_eq!(series_len("anything"), 10);
        assert_eq!(unit_for("cpu_utilization"), "Percent");
        assert_eq!(unit_for("error_rate"), "Count");
        assert_eq!(synth_value("error_rate", 3), synth_value("error_rate", 3));
    }
}
