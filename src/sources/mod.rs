//! Source boundary for the WatchTower protocol server
//!
//! A source is a provider of named, parameterized operations over log and
//! metric data. The protocol engine stays generic over this boundary: it
//! wraps one [`LogSource`] and registers its [`Operation`] handlers into a
//! dispatch map once at construction, so adding an operation means
//! registering another handler, never editing a dispatch block.

use crate::error::sanitize_error_message;
use crate::protocol::{OperationDescriptor, ProtocolError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod model;
pub mod stub;

pub use model::{LogEntry, Metric};
pub use stub::StubSource;

/// One executable operation advertised by a source.
///
/// Handler objects are registered into the protocol engine's dispatch map
/// keyed by `descriptor().name`.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Wire descriptor returned by `discover`.
    fn descriptor(&self) -> OperationDescriptor;

    /// Execute with the raw argument map from `execute` params.
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, SourceError>;
}

/// A provider of log/metric operations, bound one-to-one to a protocol
/// server session.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Provider identity, e.g. "AWS".
    fn provider(&self) -> &str;

    /// Capability summary advertised in the initialize result.
    fn capabilities(&self) -> Vec<String>;

    /// Validate and apply the opaque credentials blob from `initialize`.
    /// Called again on re-initialize.
    async fn initialize(&mut self, credentials: &HashMap<String, String>)
        -> Result<(), SourceError>;

    /// Operation handlers in the source's natural advertisement order.
    fn operations(&self) -> Vec<Arc<dyn Operation>>;
}

/// Source-side failures, mapped onto protocol error codes at the request
/// boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Source failure: {0}")]
    Failed(String),
}

impl SourceError {
    pub fn invalid_arguments<S: Into<String>>(message: S) -> Self {
        Self::InvalidArguments(message.into())
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed(message.into())
    }

    /// Convert into the protocol error sent back to the caller. Failure
    /// text is sanitized; internals never cross the wire.
    pub fn to_protocol_error(&self) -> ProtocolError {
        match self {
            SourceError::UnknownOperation(_) | SourceError::InvalidArguments(_) => {
                ProtocolError::invalid_params(sanitize_error_message(&self.to_string()))
            }
            SourceError::MissingCredential(_) | SourceError::Failed(_) => {
                ProtocolError::internal_error(sanitize_error_message(&self.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_operation_maps_to_invalid_params() {
        let error = SourceError::UnknownOperation("fetchTraces".to_string()).to_protocol_error();
        assert_eq!(error.code, ProtocolError::INVALID_PARAMS);
        assert!(error.message.contains("fetchTraces"));
    }

    #[test]
    fn test_invalid_arguments_map_to_invalid_params() {
        let error = SourceError::invalid_arguments("limit must be an integer").to_protocol_error();
        assert_eq!(error.code, ProtocolError::INVALID_PARAMS);
        assert!(error.message.contains("limit"));
    }

    #[test]
    fn test_execution_failure_maps_to_internal_error() {
        let error = SourceError::failed("backend unreachable").to_protocol_error();
        assert_eq!(error.code, ProtocolError::INTERNAL_ERROR);
        assert!(error.message.contains("backend unreachable"));
    }

    #[test]
    fn test_missing_credential_maps_to_internal_error() {
        let error = SourceError::MissingCredential("region".to_string()).to_protocol_error();
        assert_eq!(error.code, ProtocolError::INTERNAL_ERROR);
        assert!(error.message.contains("region"));
    }

    #[test]
    fn test_forwarded_failure_text_is_sanitized() {
        let error =
            SourceError::failed("auth rejected: token=abc123 for account").to_protocol_error();
        assert!(!error.message.contains("abc123"));
        assert!(error.message.contains("token=***"));
    }
}
