//! Data model for log and metric payloads returned by sources

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One log line as returned by `fetchLogs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// RFC 3339 timestamp
    pub timestamp: DateTime<Utc>,
    /// Severity label, e.g. "ERROR", "WARN", "INFO"
    pub severity: String,
    pub message: String,
    /// Logical resource the entry belongs to
    pub resource: String,
}

impl LogEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        severity: impl Into<String>,
        message: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            severity: severity.into(),
            message: message.into(),
            resource: resource.into(),
        }
    }
}

/// One metric data point as returned by `fetchMetrics`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    /// RFC 3339 timestamp
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub value: f64,
    /// Unit label, e.g. "Percent" or "Count"
    pub unit: String,
    /// Provider-specific dimensions
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Metric {
    pub fn new(
        timestamp: DateTime<Utc>,
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        labels: HashMap<String, String>,
    ) -> Self {
        Self {
            timestamp,
            name: name.into(),
            value,
            unit: unit.into(),
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_log_entry_wire_shape() {
        let entry = LogEntry::new(
            Utc::now(),
            "ERROR",
            "connection pool exhausted",
            "payment-service",
        );

        let wire: Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(wire["severity"], "ERROR");
        assert_eq!(wire["resource"], "payment-service");
        assert!(wire["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_metric_labels_default_empty() {
        let parsed: Metric = serde_json::from_str(
            r#"{"timestamp":"2026-08-01T00:00:00Z","name":"cpu","value":41.5,"unit":"Percent"}"#,
        )
        .unwrap();
        assert!(parsed.labels.is_empty());
        assert_eq!(parsed.value, 41.5);
    }
}
