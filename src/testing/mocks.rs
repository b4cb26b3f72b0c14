//! Mock implementations for testing
//!
//! Provides a scripted [`DecisionMaker`] and a recording [`LogSource`] so
//! orchestration and protocol behavior can be tested without external
//! dependencies.

use crate::llm::{ConversationEntry, Decision, DecisionError, DecisionMaker};
use crate::protocol::{FunctionCall, OperationDescriptor};
use crate::sources::{LogSource, Operation, SourceError};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Scripted decision maker. Decisions are returned in order and repeat from
/// the start once exhausted, so a single `Call` script loops until the
/// iteration budget runs out.
pub struct MockDecisionMaker {
    pub decisions: Vec<Decision>,
    pub current: Arc<Mutex<usize>>,
    pub should_fail: bool,
    pub observed_conversations: Arc<Mutex<Vec<Vec<ConversationEntry>>>>,
}

impl MockDecisionMaker {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            decisions,
            current: Arc::new(Mutex::new(0)),
            should_fail: false,
            observed_conversations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    /// Always answer with the same final text.
    pub fn single_answer(answer: impl Into<String>) -> Self {
        Self::new(vec![Decision::Answer(answer.into())])
    }

    /// Always issue the same function call, never concluding.
    pub fn always_call(function: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self::new(vec![Decision::Call {
            call: FunctionCall {
                name: function.into(),
                arguments,
            },
            rationale: "scripted call".to_string(),
        }])
    }

    /// Snapshot of every conversation passed to `decide`.
    pub async fn get_observed_conversations(&self) -> Vec<Vec<ConversationEntry>> {
        self.observed_conversations.lock().await.clone()
    }
}

#[async_trait]
impl DecisionMaker for MockDecisionMaker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn decide(
        &self,
        conversation: &[ConversationEntry],
        _functions: &[OperationDescriptor],
    ) -> Result<Decision, DecisionError> {
        if self.should_fail {
            return Err(DecisionError::Unavailable(
                "Mock decision failure".to_string(),
            ));
        }

        self.observed_conversations
            .lock()
            .await
            .push(conversation.to_vec());

        if self.decisions.is_empty() {
            return Ok(Decision::Answer("Mock answer".to_string()));
        }

        let mut current = self.current.lock().await;
        let decision = self.decisions[*current % self.decisions.len()].clone();
        *current += 1;
        Ok(decision)
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    initializations: Mutex<Vec<HashMap<String, String>>>,
    invocations: Mutex<Vec<(String, Map<String, Value>)>>,
}

/// Source that records every interaction. It advertises a single `echo`
/// operation with no required parameters. Clones share the recorded state,
/// so a clone kept aside works as a probe after the source is moved into a
/// server.
#[derive(Clone)]
pub struct RecordingSource {
    provider: String,
    fail_initialize: bool,
    state: Arc<RecordingState>,
}

impl RecordingSource {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            fail_initialize: false,
            state: Arc::new(RecordingState::default()),
        }
    }

    pub fn with_failing_initialize(provider: impl Into<String>) -> Self {
        Self {
            fail_initialize: true,
            ..Self::new(provider)
        }
    }

    pub async fn initialization_count(&self) -> usize {
        self.state.initializations.lock().await.len()
    }

    pub async fn invocation_count(&self) -> usize {
        self.state.invocations.lock().await.len()
    }

    pub async fn last_credentials(&self) -> Option<HashMap<String, String>> {
        self.state.initializations.lock().await.last().cloned()
    }
}

#[async_trait]
impl LogSource for RecordingSource {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }

    async fn initialize(
        &mut self,
        credentials: &HashMap<String, String>,
    ) -> Result<(), SourceError> {
        if self.fail_initialize {
            return Err(SourceError::failed("Mock initialization failure"));
        }
        self.state
            .initializations
            .lock()
            .await
            .push(credentials.clone());
        Ok(())
    }

    fn operations(&self) -> Vec<Arc<dyn Operation>> {
        vec![Arc::new(EchoOperation {
            state: Arc::clone(&self.state),
        })]
    }
}

struct EchoOperation {
    state: Arc<RecordingState>,
}

#[async_trait]
impl Operation for EchoOperation {
    fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor {
            name: "echo".to_string(),
            description: "Echo the arguments back".to_string(),
            parameters: vec![],
        }
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, SourceError> {
        self.state
            .invocations
            .lock()
            .await
            .push(("echo".to_string(), arguments.clone()));
        Ok(json!({ "echo": Value::Object(arguments.clone()) }))
    }
}
