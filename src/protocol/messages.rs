//! Wire message types for the WatchTower source protocol
//!
//! This module defines the JSON-RPC-2.0-shaped envelope exchanged between
//! protocol clients and servers, the fixed method set, the standard error
//! codes, and the payload types carried inside `params` and `result`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Protocol version tag carried by every request and response.
pub const PROTOCOL_VERSION: &str = "2.0";

/// The fixed method set understood by every protocol server.
///
/// The wire envelope carries the method as a plain string; servers parse it
/// with [`Method::parse`] after envelope validation so that an unrecognized
/// method becomes a MethodNotFound error response rather than a
/// deserialization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Discover,
    Execute,
}

impl Method {
    /// Parse a wire method string. Unknown strings return `None`.
    pub fn parse(s: &str) -> Option<Method> {
        match s {
            "initialize" => Some(Method::Initialize),
            "discover" => Some(Method::Discover),
            "execute" => Some(Method::Execute),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Discover => "discover",
            Method::Execute => "execute",
        }
    }
}

/// A single protocol request.
///
/// One request is serialized per line, newline-terminated. Ids are strings,
/// unique per outstanding request on a connection; [`ProtocolRequest::new`]
/// allocates a fresh UUID v4 id.
///
/// # Examples
/// ```
/// use watchtower::protocol::{Method, ProtocolRequest};
/// use serde_json::json;
///
/// let request = ProtocolRequest::new(Method::Execute, json!({
///     "operation": "fetchLogs",
///     "arguments": {"resource": "payment-service", "filter": "ERROR", "limit": 5}
/// }));
/// assert_eq!(request.jsonrpc, "2.0");
/// assert_eq!(request.method, "execute");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolRequest {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,
    /// Method name: "initialize", "discover" or "execute"
    pub method: String,
    /// Method-specific parameters; null when omitted on the wire
    #[serde(default)]
    pub params: Value,
    /// Request id, echoed back untouched in the matching response
    pub id: String,
}

impl ProtocolRequest {
    /// Build a request with a freshly allocated UUID v4 id.
    pub fn new(method: Method, params: Value) -> Self {
        Self::with_id(method, params, Uuid::new_v4().to_string())
    }

    /// Build a request with an explicit id.
    pub fn with_id(method: Method, params: Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            method: method.as_str().to_string(),
            params,
            id: id.into(),
        }
    }
}

/// A single protocol response.
///
/// Exactly one of `result` and `error` is present. Responses are built
/// through [`ProtocolResponse::success`] and [`ProtocolResponse::failure`],
/// which keep that invariant; [`ProtocolResponse::is_well_formed`] checks
/// it on deserialized responses and backs the server's write-path debug
/// assertion.
///
/// The `id` echoes the originating request. It is `None` (serialized as
/// JSON null) only for error responses to requests whose id could not be
/// recovered, such as unparseable lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolResponse {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,
    /// Success payload, absent on error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
    /// Id of the originating request, null when unrecoverable
    pub id: Option<String>,
}

impl ProtocolResponse {
    /// Build a success response echoing the request id.
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            result: Some(result),
            error: None,
            id: Some(id.into()),
        }
    }

    /// Build an error response. `id` is `None` when the request id could
    /// not be recovered from the incoming line.
    pub fn failure(id: Option<String>, error: ProtocolError) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// True when exactly one of `result`/`error` is present.
    pub fn is_well_formed(&self) -> bool {
        self.result.is_some() != self.error.is_some()
    }
}

/// Error payload of a failed response.
///
/// Codes follow the JSON-RPC convention: the five standard codes are the
/// associated constants below, and values below
/// [`ProtocolError::SOURCE_ERROR_CEILING`] are reserved for source-defined
/// errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolError {
    pub code: i32,
    pub message: String,
    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProtocolError {
    /// The request line was not valid JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// The request was valid JSON but not a valid protocol envelope, or
    /// arrived in a session state that forbids it.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method is not one of the fixed method set.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// The params payload is malformed or names an unknown operation.
    pub const INVALID_PARAMS: i32 = -32602;
    /// The bound source failed while handling an otherwise valid request.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Codes strictly below this value are source-defined.
    pub const SOURCE_ERROR_CEILING: i32 = -32000;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(Self::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }

    /// True when the code sits in the source-defined range.
    pub fn is_source_defined(&self) -> bool {
        self.code < Self::SOURCE_ERROR_CEILING
    }
}

/// Params payload of `initialize`.
///
/// The credentials blob is opaque to the protocol layer; it is forwarded to
/// the bound source untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InitializeParams {
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

/// Result payload of a successful `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializeResult {
    /// Provider identity of the bound source, e.g. "AWS"
    pub provider: String,
    /// Always "initialized"
    pub status: String,
    /// Advertised operation names and limits
    pub capabilities: Vec<String>,
}

impl InitializeResult {
    pub fn new(provider: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            provider: provider.into(),
            status: "initialized".to_string(),
            capabilities,
        }
    }
}

/// Result payload of `discover`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscoverResult {
    pub functions: Vec<OperationDescriptor>,
}

/// One advertised operation, as returned by `discover`.
///
/// # Examples
/// ```
/// use watchtower::protocol::{OperationDescriptor, ParameterKind, ParameterSpec};
///
/// let descriptor = OperationDescriptor::new(
///     "fetchLogs",
///     "Fetch log entries for a resource",
///     vec![
///         ParameterSpec::required("resource", ParameterKind::String, "Logical resource name"),
///         ParameterSpec::required("limit", ParameterKind::Integer, "Maximum entries"),
///     ],
/// );
/// assert_eq!(descriptor.parameters.len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    /// Parameter list in the source's declared order
    pub parameters: Vec<ParameterSpec>,
}

impl OperationDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
        }
    }
}

/// The closed set of parameter value types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Integer,
    Boolean,
}

/// Params payload of `execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecuteParams {
    /// Unprefixed operation name, server-local
    pub operation: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ExecuteParams {
    pub fn new(operation: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }
}

/// A function invocation requested by the decision-maker.
///
/// At the registry/orchestration layer the name may be namespaced as
/// `"Source.operation"`; inside a single server it is always unprefixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of routing one [`FunctionCall`] through the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResult {
    pub function_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FunctionResult {
    pub fn ok(function_name: impl Into<String>, result: Value) -> Self {
        Self {
            function_name: function_name.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(function_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_full_envelope() {
        let request = ProtocolRequest::with_id(
            Method::Initialize,
            json!({"credentials": {"region": "us-east-1"}}),
            "req-1",
        );

        let wire: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["method"], "initialize");
        assert_eq!(wire["params"]["credentials"]["region"], "us-east-1");
        assert_eq!(wire["id"], "req-1");
    }

    #[test]
    fn test_request_new_allocates_unique_ids() {
        let a = ProtocolRequest::new(Method::Discover, json!({}));
        let b = ProtocolRequest::new(Method::Discover, json!({}));
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_empty());
    }

    #[test]
    fn test_request_missing_params_defaults_to_null() {
        let parsed: ProtocolRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"discover","id":"7"}"#).unwrap();
        assert_eq!(parsed.params, Value::Null);
        assert_eq!(parsed.id, "7");
    }

    #[test]
    fn test_method_parse_round_trip() {
        for method in [Method::Initialize, Method::Discover, Method::Execute] {
            assert_eq!(Method::parse(method.as_str()), Some(method));
        }
        assert_eq!(Method::parse("shutdown"), None);
        assert_eq!(Method::parse("Initialize"), None);
        assert_eq!(Method::parse(""), None);
    }

    #[test]
    fn test_success_response_omits_error_key() {
        let response = ProtocolResponse::success("req-9", json!({"status": "initialized"}));
        let wire = serde_json::to_string(&response).unwrap();

        assert!(wire.contains(r#""result""#));
        assert!(!wire.contains(r#""error""#));
        assert!(wire.contains(r#""id":"req-9""#));
    }

    #[test]
    fn test_error_response_omits_result_key() {
        let response = ProtocolResponse::failure(
            Some("req-9".to_string()),
            ProtocolError::method_not_found("shutdown"),
        );
        let wire = serde_json::to_string(&response).unwrap();

        assert!(wire.contains(r#""error""#));
        assert!(!wire.contains(r#""result""#));
        assert!(wire.contains("-32601"));
        assert!(wire.contains("Method not found: shutdown"));
    }

    #[test]
    fn test_unrecoverable_id_serializes_as_null() {
        let response =
            ProtocolResponse::failure(None, ProtocolError::parse_error("bad line"));
        let wire = serde_json::to_string(&response).unwrap();
        assert!(wire.contains(r#""id":null"#));
    }

    #[test]
    fn test_well_formedness_is_exactly_one_of_result_error() {
        assert!(ProtocolResponse::success("1", json!({})).is_well_formed());
        assert!(
            ProtocolResponse::failure(Some("1".into()), ProtocolError::internal_error("x"))
                .is_well_formed()
        );

        let both = ProtocolResponse {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            result: Some(json!({})),
            error: Some(ProtocolError::internal_error("x")),
            id: Some("1".to_string()),
        };
        assert!(!both.is_well_formed());

        let neither = ProtocolResponse {
            jsonrpc: PROTOCOL_VERSION.to_string(),
            result: None,
            error: None,
            id: Some("1".to_string()),
        };
        assert!(!neither.is_well_formed());
    }

    #[test]
    fn test_standard_error_codes() {
        assert_eq!(ProtocolError::PARSE_ERROR, -32700);
        assert_eq!(ProtocolError::INVALID_REQUEST, -32600);
        assert_eq!(ProtocolError::METHOD_NOT_FOUND, -32601);
        assert_eq!(ProtocolError::INVALID_PARAMS, -32602);
        assert_eq!(ProtocolError::INTERNAL_ERROR, -32603);
    }

    #[test]
    fn test_source_defined_code_range() {
        assert!(ProtocolError::new(-32001, "throttled").is_source_defined());
        assert!(!ProtocolError::internal_error("boom").is_source_defined());
        assert!(!ProtocolError::new(-32000, "edge").is_source_defined());
    }

    #[test]
    fn test_initialize_result_reports_initialized_status() {
        let result = InitializeResult::new(
            "AWS",
            vec!["fetchLogs".to_string(), "fetchMetrics".to_string()],
        );
        let wire: Value = serde_json::to_value(&result).unwrap();

        assert_eq!(wire["provider"], "AWS");
        assert_eq!(wire["status"], "initialized");
        assert_eq!(wire["capabilities"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_initialize_params_default_to_empty_credentials() {
        let parsed: InitializeParams = serde_json::from_str("{}").unwrap();
        assert!(parsed.credentials.is_empty());
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let descriptor = OperationDescriptor::new(
            "fetchMetrics",
            "Fetch metric data points",
            vec![
                ParameterSpec::required("resource", ParameterKind::String, "Resource name"),
                ParameterSpec::required("timeRange", ParameterKind::String, "Range label"),
                ParameterSpec::optional("verbose", ParameterKind::Boolean, "Include labels"),
            ],
        );

        let wire: Value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(wire["name"], "fetchMetrics");
        assert_eq!(wire["parameters"][0]["type"], "string");
        assert_eq!(wire["parameters"][0]["required"], true);
        assert_eq!(wire["parameters"][2]["type"], "boolean");
        assert_eq!(wire["parameters"][2]["required"], false);
    }

    #[test]
    fn test_parameter_kind_wire_names() {
        assert_eq!(serde_json::to_value(ParameterKind::String).unwrap(), "string");
        assert_eq!(serde_json::to_value(ParameterKind::Integer).unwrap(), "integer");
        assert_eq!(serde_json::to_value(ParameterKind::Boolean).unwrap(), "boolean");
    }

    #[test]
    fn test_execute_params_missing_arguments_default_empty() {
        let parsed: ExecuteParams =
            serde_json::from_str(r#"{"operation": "fetchLogs"}"#).unwrap();
        assert_eq!(parsed.operation, "fetchLogs");
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn test_function_result_constructors() {
        let ok = FunctionResult::ok("AWS.fetchLogs", json!({"count": 3}));
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert_eq!(ok.result.unwrap()["count"], 3);

        let failed = FunctionResult::failed("GCP.fetchLogs", "source unreachable");
        assert!(!failed.success);
        assert!(failed.result.is_none());
        assert_eq!(failed.error.unwrap(), "source unreachable");
    }

    #[test]
    fn test_response_round_trip_preserves_id() {
        let response = ProtocolResponse::success("abc-123", json!({"functions": []}));
        let wire = serde_json::to_string(&response).unwrap();
        let parsed: ProtocolResponse = serde_json::from_str(&wire).unwrap();

        assert_eq!(parsed.id.as_deref(), Some("abc-123"));
        assert_eq!(parsed, response);
    }
}
