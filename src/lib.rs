//! WatchTower - bounded log analysis over line-delimited JSON-RPC sources
//!
//! # Overview
//!
//! This crate implements a small agent stack for investigating production
//! incidents across heterogeneous log providers:
//! - Protocol message types and validation for the three-method lifecycle
//!   (`initialize`, `discover`, `execute`)
//! - A server engine that exposes any [`sources::LogSource`] over TCP or
//!   stdio, one JSON object per line
//! - A client and a multi-source registry that namespaces discovered
//!   functions as `<source>.<operation>`
//! - A bounded orchestration loop that alternates between a decision maker
//!   and function execution until it has an answer or runs out of budget
//!
//! # Quick Start
//!
//! ```rust
//! use watchtower::protocol::{Method, ProtocolRequest, ProtocolResponse};
//! use serde_json::json;
//!
//! // Frame an execute request the way a client puts it on the wire.
//! let request = ProtocolRequest::new(
//!     Method::Execute,
//!     json!({
//!         "operation": "fetchLogs",
//!         "arguments": {"resource": "payment-service", "filter": "ERROR", "limit": 5}
//!     }),
//! );
//! let line = serde_json::to_string(&request).unwrap();
//! assert!(line.contains("\"jsonrpc\":\"2.0\""));
//!
//! // Responses carry exactly one of result/error.
//! let response = ProtocolResponse::success(request.id.clone(), json!({"count": 5}));
//! assert!(response.is_well_formed());
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sources;
pub mod testing;

// Re-export the primary surface
pub use agent::{Analysis, AnalysisReport, WatchTowerAgent};
pub use client::SourceClient;
pub use config::WatchTowerConfig;
pub use error::{AgentError, AgentResult};
pub use protocol::*;
pub use registry::{SourceBinding, SourceRegistry};
pub use server::SourceServer;
