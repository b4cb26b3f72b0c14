//! Deterministic decision maker for demos and offline runs
//!
//! The offline analyst follows a fixed two-beat script: gather evidence
//! with one log-fetching call, then answer from whatever came back. It
//! exists so the full stack (registry, protocol, sources) can be exercised
//! end to end without any hosted model.

use super::{ConversationEntry, Decision, DecisionError, DecisionMaker};
use crate::protocol::{FunctionCall, OperationDescriptor, ParameterKind};
use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, Default)]
pub struct OfflineAnalyst;

impl OfflineAnalyst {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecisionMaker for OfflineAnalyst {
    fn name(&self) -> &str {
        "offline-analyst"
    }

    async fn decide(
        &self,
        conversation: &[ConversationEntry],
        functions: &[OperationDescriptor],
    ) -> Result<Decision, DecisionError> {
        let query = conversation
            .iter()
            .find_map(|entry| match entry {
                ConversationEntry::User { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or("");

        let outcomes: Vec<(&str, &str)> = conversation
            .iter()
            .filter_map(|entry| match entry {
                ConversationEntry::FunctionOutcome { function, content } => {
                    Some((function.as_str(), content.as_str()))
                }
                _ => None,
            })
            .collect();

        if outcomes.is_empty() {
            let Some(descriptor) = pick_log_function(functions) else {
                return Ok(Decision::Answer(format!(
                    "No log sources are available to investigate: {query}"
                )));
            };

            let call = FunctionCall {
                name: descriptor.name.clone(),
                arguments: canned_arguments(descriptor, query),
            };
            return Ok(Decision::Call {
                call,
                rationale: format!("Pulling recent logs to ground the answer to: {query}"),
            });
        }

        let mut answer = format!("Findings for \"{query}\":");
        for (function, content) in outcomes {
            answer.push_str("\n- ");
            answer.push_str(function);
            answer.push_str(": ");
            answer.push_str(content);
        }
        Ok(Decision::Answer(answer))
    }
}

/// Prefer a log-fetching function, falling back to whatever is listed
/// first.
fn pick_log_function(functions: &[OperationDescriptor]) -> Option<&OperationDescriptor> {
    functions
        .iter()
        .find(|f| f.name.to_lowercase().contains("log"))
        .or_else(|| functions.first())
}

/// Fill the function's required parameters with investigation defaults:
/// the first hyphenated token of the query as the resource, ERROR as the
/// severity filter, and small bounded sizes everywhere else.
fn canned_arguments(descriptor: &OperationDescriptor, query: &str) -> Map<String, Value> {
    let mut arguments = Map::new();
    for parameter in descriptor.parameters.iter().filter(|p| p.required) {
        let value = match parameter.name.as_str() {
            "resource" => Value::String(
                resource_hint(query).unwrap_or("payment-service").to_string(),
            ),
            "filter" => Value::String("ERROR".to_string()),
            "limit" => Value::from(5),
            "timeRange" => Value::String("1h".to_string()),
            "metricName" => Value::String("error_rate".to_string()),
            _ => match parameter.kind {
                ParameterKind::String => Value::String(String::new()),
                ParameterKind::Integer => Value::from(10),
                ParameterKind::Boolean => Value::Bool(false),
            },
        };
        arguments.insert(parameter.name.clone(), value);
    }
    arguments
}

/// First token that looks like a service name, e.g. `payment-service` in
/// "why is payment-service failing?".
fn resource_hint(query: &str) -> Option<&str> {
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .find(|token| token.contains('-') && token.len() > 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ParameterSpec;

    fn fetch_logs_descriptor() -> OperationDescriptor {
        OperationDescriptor {
            name: "AWS.fetchLogs".to_string(),
            description: "Fetch log entries (from AWS)".to_string(),
            parameters: vec![
                ParameterSpec::required("resource", ParameterKind::String, "resource name"),
                ParameterSpec::required("filter", ParameterKind::String, "severity or substring"),
                ParameterSpec::required("limit", ParameterKind::Integer, "max entries"),
            ],
        }
    }

    #[tokio::test]
    async fn test_first_decision_calls_a_log_function_with_canned_arguments() {
        let analyst = OfflineAnalyst::new();
        let conversation = vec![ConversationEntry::user("Why is payment-service failing?")];
        let functions = vec![fetch_logs_descriptor()];

        let decision = analyst.decide(&conversation, &functions).await.unwrap();
        match decision {
            Decision::Call { call, rationale } => {
                assert_eq!(call.name, "AWS.fetchLogs");
                assert_eq!(call.arguments["resource"], "payment-service");
                assert_eq!(call.arguments["filter"], "ERROR");
                assert_eq!(call.arguments["limit"], 5);
                assert!(rationale.contains("payment-service failing"));
            }
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_answers_once_an_outcome_is_present() {
        let analyst = OfflineAnalyst::new();
        let conversation = vec![
            ConversationEntry::user("Why is payment-service failing?"),
            ConversationEntry::assistant("pulling logs", None),
            ConversationEntry::function_outcome(
                "AWS.fetchLogs",
                "Function AWS.fetchLogs returned: 5 entries",
            ),
        ];
        let functions = vec![fetch_logs_descriptor()];

        let decision = analyst.decide(&conversation, &functions).await.unwrap();
        match decision {
            Decision::Answer(answer) => {
                assert!(answer.contains("payment-service"));
                assert!(answer.contains("AWS.fetchLogs"));
                assert!(answer.contains("5 entries"));
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_catalog_answers_directly() {
        let analyst = OfflineAnalyst::new();
        let conversation = vec![ConversationEntry::user("anything broken?")];

        let decision = analyst.decide(&conversation, &[]).await.unwrap();
        assert!(matches!(decision, Decision::Answer(_)));
    }

    #[test]
    fn test_resource_hint_finds_the_first_service_token() {
        assert_eq!(
            resource_hint("Why is payment-service failing in us-east-1?"),
            Some("payment-service")
        );
        assert_eq!(resource_hint("is anything down"), None);
    }
}
