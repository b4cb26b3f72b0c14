//! Bounded analysis loop over the source registry
//!
//! The agent answers one operator question by alternating between the
//! decision maker and the registry: each iteration asks for the next step,
//! executes at most one function call, and feeds the rendered outcome back
//! into the transcript. The loop is strictly budgeted; an analysis that
//! does not conclude within the budget ends as [`Analysis::Incomplete`]
//! rather than an error.

use crate::error::{sanitize_error_message, AgentResult};
use crate::llm::{ConversationEntry, Decision, DecisionMaker};
use crate::protocol::{FunctionCall, FunctionResult};
use crate::registry::SourceRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default iteration budget when the configuration does not override it.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Terminal state of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// The decision maker produced a final answer.
    Complete { answer: String, iterations: u32 },
    /// The iteration budget ran out before a final answer.
    Incomplete { iterations: u32 },
}

impl Analysis {
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Complete { iterations, .. } | Self::Incomplete { iterations } => *iterations,
        }
    }
}

/// Outcome of one analysis run together with the full transcript, for
/// callers that want to show the investigation and not just the verdict.
#[derive(Debug)]
pub struct AnalysisReport {
    pub analysis: Analysis,
    pub transcript: Vec<ConversationEntry>,
}

/// Orchestrator for the ask-decide-execute loop.
pub struct WatchTowerAgent {
    registry: SourceRegistry,
    decision_maker: Arc<dyn DecisionMaker>,
    max_iterations: u32,
}

impl WatchTowerAgent {
    pub fn new(registry: SourceRegistry, decision_maker: Arc<dyn DecisionMaker>) -> Self {
        Self {
            registry,
            decision_maker,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Override the iteration budget. A budget of zero means the loop never
    /// runs and every analysis is immediately incomplete.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run one bounded analysis for the given question.
    ///
    /// Decision-maker failures abort the run with an error. Function
    /// execution failures do not: they are rendered into the transcript as
    /// outcomes so the decision maker can route around them.
    #[tracing::instrument(name = "analyze", skip(self, query))]
    pub async fn analyze(&mut self, query: &str) -> AgentResult<AnalysisReport> {
        let functions = self.registry.discover_all().await;
        info!(
            functions = functions.len(),
            decision_maker = self.decision_maker.name(),
            "starting analysis"
        );

        let mut transcript = vec![ConversationEntry::user(query)];

        for iteration in 1..=self.max_iterations {
            let decision = self
                .decision_maker
                .decide(&transcript, &functions)
                .await?;

            match decision {
                Decision::Answer(answer) => {
                    info!(iteration, "analysis complete");
                    transcript.push(ConversationEntry::assistant(answer.clone(), None));
                    return Ok(AnalysisReport {
                        analysis: Analysis::Complete { answer, iterations: iteration },
                        transcript,
                    });
                }
                Decision::Call { call, rationale } => {
                    debug!(iteration, function = %call.name, "executing function call");
                    transcript.push(ConversationEntry::assistant(rationale, Some(call.clone())));

                    let result = self.execute_call(&call).await;
                    transcript.push(ConversationEntry::function_outcome(
                        &call.name,
                        render_outcome(&result),
                    ));
                }
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "iteration budget exhausted without a final answer"
        );
        Ok(AnalysisReport {
            analysis: Analysis::Incomplete { iterations: self.max_iterations },
            transcript,
        })
    }

    async fn execute_call(&mut self, call: &FunctionCall) -> FunctionResult {
        match self.registry.execute(&call.name, call.arguments.clone()).await {
            Ok(value) => FunctionResult::ok(&call.name, value),
            Err(e) => {
                warn!(function = %call.name, error = %e, "function call failed");
                FunctionResult::failed(&call.name, sanitize_error_message(&e.to_string()))
            }
        }
    }

    /// Close the underlying source connections.
    pub async fn shutdown(self) {
        self.registry.close().await;
    }
}

/// Render a function result the way the decision maker sees it.
fn render_outcome(result: &FunctionResult) -> String {
    if result.success {
        let payload = result
            .result
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_else(|| "null".to_string());
        format!("Function {} returned: {}", result.function_name, payload)
    } else {
        let reason = result.error.as_deref().unwrap_or("unknown error");
        format!("Function {} failed: {}", result.function_name, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_outcome_success() {
        let result = FunctionResult::ok("AWS.fetchLogs", json!({"count": 5}));
        assert_eq!(
            render_outcome(&result),
            "Function AWS.fetchLogs returned: {\"count\":5}"
        );
    }

    #[test]
    fn test_render_outcome_failure() {
        let result = FunctionResult::failed("GCP.fetchLogs", "Unknown source: GCP");
        assert_eq!(
            render_outcome(&result),
            "Function GCP.fetchLogs failed: Unknown source: GCP"
        );
    }

    #[test]
    fn test_analysis_iterations_accessor() {
        let complete = Analysis::Complete {
            answer: "fine".to_string(),
            iterations: 2,
        };
        assert_eq!(complete.iterations(), 2);
        assert_eq!(Analysis::Incomplete { iterations: 10 }.iterations(), 10);
    }
}
