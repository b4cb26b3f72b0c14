//! Protocol engine wrapping one source behind the three-method lifecycle
//!
//! A [`SourceServer`] enforces the session state machine
//! (Created → Initialized) and answers every request line with exactly one
//! response line. Operation dispatch is a handler map registered once at
//! construction from the bound source's advertised operations; the engine
//! itself is namespace-agnostic and only ever sees unprefixed names.
//!
//! Serving is connection-per-task: every accepted connection gets a fresh
//! engine over a fresh source instance, so no state is shared across
//! connections.

use crate::protocol::{
    DiscoverResult, ExecuteParams, InitializeParams, InitializeResult, Method,
    OperationDescriptor, ProtocolError, ProtocolRequest, ProtocolResponse, PROTOCOL_VERSION,
};
use crate::sources::{LogSource, Operation, SourceError};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Session lifecycle phase. Closed is the end of the serving loop, after
/// which the engine is dropped; no request can observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Created,
    Initialized,
}

/// Builds one fresh source per accepted connection.
pub trait SourceFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn LogSource>;
}

impl<F> SourceFactory for F
where
    F: Fn() -> Box<dyn LogSource> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn LogSource> {
        self()
    }
}

/// Server-side protocol engine for one connection.
pub struct SourceServer {
    source: Box<dyn LogSource>,
    handlers: HashMap<String, Arc<dyn Operation>>,
    catalog: Vec<OperationDescriptor>,
    phase: SessionPhase,
}

impl SourceServer {
    /// Wrap a source, registering its operation handlers into the dispatch
    /// map. The descriptor list keeps the source's natural order for
    /// `discover`.
    pub fn new(source: Box<dyn LogSource>) -> Self {
        let operations = source.operations();
        let catalog: Vec<OperationDescriptor> =
            operations.iter().map(|op| op.descriptor()).collect();
        let handlers: HashMap<String, Arc<dyn Operation>> = operations
            .into_iter()
            .map(|op| (op.descriptor().name, op))
            .collect();

        Self {
            source,
            handlers,
            catalog,
            phase: SessionPhase::Created,
        }
    }

    /// Handle one raw request line and produce the response for it. Every
    /// failure is converted to an error response here; the serving loop
    /// never terminates because of a bad request.
    pub async fn handle_line(&mut self, line: &str) -> ProtocolResponse {
        match parse_request(line) {
            Ok(request) => self.handle_request(request).await,
            Err(rejection) => ProtocolResponse::failure(rejection.id, rejection.error),
        }
    }

    async fn handle_request(&mut self, request: ProtocolRequest) -> ProtocolResponse {
        debug!(method = %request.method, id = %request.id, "handling request");

        let method = match Method::parse(&request.method) {
            Some(method) => method,
            None => {
                return ProtocolResponse::failure(
                    Some(request.id),
                    ProtocolError::method_not_found(&request.method),
                );
            }
        };

        match method {
            Method::Initialize => self.handle_initialize(request).await,
            Method::Discover => self.handle_discover(request),
            Method::Execute => self.handle_execute(request).await,
        }
    }

    /// Forward the credentials blob to the source. Re-invocation while
    /// Initialized re-runs source initialization; the phase only advances,
    /// never regresses on failure.
    async fn handle_initialize(&mut self, request: ProtocolRequest) -> ProtocolResponse {
        let params: InitializeParams = if request.params.is_null() {
            InitializeParams::default()
        } else {
            match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(e) => {
                    return ProtocolResponse::failure(
                        Some(request.id),
                        ProtocolError::invalid_params(format!("Invalid initialize params: {e}")),
                    );
                }
            }
        };

        match self.source.initialize(&params.credentials).await {
            Ok(()) => {
                self.phase = SessionPhase::Initialized;
                let result =
                    InitializeResult::new(self.source.provider(), self.source.capabilities());
                info!(provider = %result.provider, "source initialized");
                self.success(request.id, &result)
            }
            Err(e) => {
                warn!(provider = %self.source.provider(), error = %e, "source initialization failed");
                ProtocolResponse::failure(Some(request.id), e.to_protocol_error())
            }
        }
    }

    fn handle_discover(&self, request: ProtocolRequest) -> ProtocolResponse {
        if self.phase != SessionPhase::Initialized {
            return self.not_initialized(request.id);
        }

        let result = DiscoverResult {
            functions: self.catalog.clone(),
        };
        self.success(request.id, &result)
    }

    async fn handle_execute(&self, request: ProtocolRequest) -> ProtocolResponse {
        if self.phase != SessionPhase::Initialized {
            return self.not_initialized(request.id);
        }

        let params: ExecuteParams = match serde_json::from_value(request.params) {
            Ok(params) => params,
            Err(e) => {
                return ProtocolResponse::failure(
                    Some(request.id),
                    ProtocolError::invalid_params(format!("Invalid execute params: {e}")),
                );
            }
        };

        let handler = match self.handlers.get(&params.operation) {
            Some(handler) => handler,
            None => {
                return ProtocolResponse::failure(
                    Some(request.id),
                    SourceError::UnknownOperation(params.operation).to_protocol_error(),
                );
            }
        };

        match handler.invoke(&params.arguments).await {
            Ok(value) => ProtocolResponse::success(request.id, value),
            Err(e) => {
                warn!(operation = %params.operation, error = %e, "operation failed");
                ProtocolResponse::failure(Some(request.id), e.to_protocol_error())
            }
        }
    }

    fn not_initialized(&self, id: String) -> ProtocolResponse {
        ProtocolResponse::failure(Some(id), ProtocolError::invalid_request("Not initialized"))
    }

    fn success<T: serde::Serialize>(&self, id: String, result: &T) -> ProtocolResponse {
        match serde_json::to_value(result) {
            Ok(value) => ProtocolResponse::success(id, value),
            Err(e) => ProtocolResponse::failure(
                Some(id),
                ProtocolError::internal_error(format!("Failed to encode result: {e}")),
            ),
        }
    }
}

struct Rejection {
    id: Option<String>,
    error: ProtocolError,
}

/// Parse one request line, distinguishing invalid JSON (ParseError) from a
/// structurally invalid envelope (InvalidRequest). The request id is
/// recovered for the error response whenever the line carried a string id.
fn parse_request(line: &str) -> Result<ProtocolRequest, Rejection> {
    let value: Value = serde_json::from_str(line).map_err(|e| Rejection {
        id: None,
        error: ProtocolError::parse_error(format!("Invalid JSON: {e}")),
    })?;

    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let request: ProtocolRequest = serde_json::from_value(value).map_err(|e| Rejection {
        id: id.clone(),
        error: ProtocolError::invalid_request(format!("Invalid request envelope: {e}")),
    })?;

    if request.jsonrpc != PROTOCOL_VERSION {
        return Err(Rejection {
            id: Some(request.id),
            error: ProtocolError::invalid_request(format!(
                "Unsupported protocol version: {}",
                request.jsonrpc
            )),
        });
    }

    Ok(request)
}

/// Drive one session over a reader/writer pair until the peer closes.
/// Requests are handled strictly in order; the next line is not read until
/// the current response has been written.
pub async fn serve_connection<R, W>(source: Box<dyn LogSource>, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut writer = writer;
    let mut engine = SourceServer::new(source);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            debug!("peer closed connection");
            return Ok(());
        }

        let response = engine.handle_line(line.trim()).await;
        debug_assert!(
            response.is_well_formed(),
            "response must carry exactly one of result/error"
        );

        let serialized = serde_json::to_string(&response).unwrap_or_else(|e| {
            error!(error = %e, "failed to serialize response");
            r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Failed to encode response"},"id":null}"#
                .to_string()
        });

        writer.write_all(serialized.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
}

/// Accept TCP connections forever, serving each on its own task with a
/// fresh source from the factory. Callers wrap this in `tokio::select!`
/// with their shutdown signal.
pub async fn serve_tcp(listener: TcpListener, factory: impl SourceFactory) -> io::Result<()> {
    let factory = Arc::new(factory);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "accepted connection");

        let source = factory.create();
        tokio::spawn(async move {
            let (read_half, write_half) = stream.into_split();
            match serve_connection(source, read_half, write_half).await {
                Ok(()) => debug!(%peer, "session ended"),
                Err(e) => warn!(%peer, error = %e, "session ended with IO error"),
            }
        });
    }
}

/// Serve a single session over this process's stdin/stdout.
pub async fn serve_stdio(source: Box<dyn LogSource>) -> io::Result<()> {
    serve_connection(source, tokio::io::stdin(), tokio::io::stdout()).await
}
