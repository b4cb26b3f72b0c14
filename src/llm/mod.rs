//! Decision-maker abstraction for the analysis loop
//!
//! This module defines the seam between the orchestrator and whatever
//! chooses the next step: a scripted mock in tests, the offline heuristic
//! analyst in demos, or a hosted model behind the same trait later. The
//! orchestrator only ever sees a [`Decision`].

use crate::protocol::{FunctionCall, OperationDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod offline;

pub use offline::OfflineAnalyst;

/// One entry in the analysis transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationEntry {
    /// The operator's question, opening the transcript.
    User { content: String },
    /// A decision-maker turn: commentary plus at most one function call.
    Assistant {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionCall>,
    },
    /// Rendered result of an executed function call, fed back as context.
    FunctionOutcome { function: String, content: String },
}

impl ConversationEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, function_call: Option<FunctionCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            function_call,
        }
    }

    pub fn function_outcome(function: impl Into<String>, content: impl Into<String>) -> Self {
        Self::FunctionOutcome {
            function: function.into(),
            content: content.into(),
        }
    }
}

/// What the decision maker wants to happen next.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Invoke one function, then come back with its outcome.
    Call {
        call: FunctionCall,
        rationale: String,
    },
    /// The analysis is complete with this final answer.
    Answer(String),
}

/// Picks the next step given the transcript so far and the functions
/// currently available.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn decide(
        &self,
        conversation: &[ConversationEntry],
        functions: &[OperationDescriptor],
    ) -> Result<Decision, DecisionError>;
}

/// Decision-maker failures. These abort the analysis; an unusable decision
/// maker is not something the loop can route around.
#[derive(Debug, Clone, Error)]
pub enum DecisionError {
    #[error("Decision maker unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed decision: {0}")]
    Malformed(String),
}
