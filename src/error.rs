//! Crate-level error types for the WatchTower agent
//!
//! Each subsystem carries its own thiserror enum (client, registry, sources,
//! decision-maker, config); this module unifies them for callers that drive
//! the whole agent, and hosts the message sanitizer applied to failure text
//! before it is embedded in protocol error responses.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for WatchTower agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Protocol client error: {0}")]
    Client(#[from] crate::client::ClientError),

    #[error("Registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    #[error("Source error: {0}")]
    Source(#[from] crate::sources::SourceError),

    #[error("Decision maker error: {0}")]
    Decision(#[from] crate::llm::DecisionError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

const MAX_FORWARDED_MESSAGE_LEN: usize = 500;

static SECRET_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("valid redaction pattern")
});

static SENSITIVE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid redaction pattern")
});

/// Sanitize failure text before it crosses the wire in an error response.
///
/// Source failure messages are forwarded to remote callers, so
/// credential-shaped fragments are redacted and oversized messages
/// truncated. Internals such as backtraces are never forwarded in the first
/// place; this guards the message text itself.
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_ASSIGNMENT
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_FORWARDED_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        // Back off to a char boundary; remote text is arbitrary UTF-8.
        let mut cut = MAX_FORWARDED_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(truncate_suffix);
    }

    sanitized
}
