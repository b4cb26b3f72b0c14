//! Protocol client for one bound source connection
//!
//! A [`SourceClient`] owns exactly one byte stream and speaks the
//! line-oriented protocol over it: one request line out, one response line
//! back, ids checked on every exchange. `&mut self` on every call enforces
//! the at-most-one-outstanding-request rule at compile time. The client
//! never retries; retry policy belongs to the caller.

use crate::protocol::{
    DiscoverResult, ExecuteParams, InitializeParams, InitializeResult, Method,
    OperationDescriptor, ProtocolError, ProtocolRequest, ProtocolResponse,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tokio::io::{
    split, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Client-side failures, split so callers can tell "remote said no" apart
/// from "could not talk to remote".
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport failed before or during the exchange.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The stream reached EOF before a response line arrived.
    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// The response line was not a well-formed protocol response.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The response carried an id that matches no outstanding request.
    #[error("Response id {received:?} does not match request id {expected:?}")]
    IdMismatch {
        expected: String,
        received: Option<String>,
    },

    /// The remote answered with a protocol error response.
    #[error("{0}")]
    Remote(#[from] RemoteError),
}

impl ClientError {
    /// True for failures where no well-formed response exists.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::ConnectionClosed
        )
    }
}

/// A protocol error response, typed by its code.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Remote error {code}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

/// Classification of a remote error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Code in the reserved source-defined range (below -32000)
    SourceDefined,
    /// Any other code
    Other,
}

impl RemoteErrorKind {
    fn from_code(code: i32) -> Self {
        match code {
            ProtocolError::PARSE_ERROR => Self::ParseError,
            ProtocolError::INVALID_REQUEST => Self::InvalidRequest,
            ProtocolError::METHOD_NOT_FOUND => Self::MethodNotFound,
            ProtocolError::INVALID_PARAMS => Self::InvalidParams,
            ProtocolError::INTERNAL_ERROR => Self::InternalError,
            c if c < ProtocolError::SOURCE_ERROR_CEILING => Self::SourceDefined,
            _ => Self::Other,
        }
    }
}

impl From<ProtocolError> for RemoteError {
    fn from(error: ProtocolError) -> Self {
        Self {
            kind: RemoteErrorKind::from_code(error.code),
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

trait IoStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> IoStream for T {}

type BoxedIo = Box<dyn IoStream>;

/// Client side of one protocol connection.
pub struct SourceClient {
    reader: BufReader<ReadHalf<BoxedIo>>,
    writer: WriteHalf<BoxedIo>,
}

impl SourceClient {
    /// Connect over TCP.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::over(stream))
    }

    /// Wrap an already-established byte stream. Tests use this with
    /// `tokio::io::duplex`.
    pub fn over(io: impl AsyncRead + AsyncWrite + Send + Unpin + 'static) -> Self {
        let boxed: BoxedIo = Box::new(io);
        let (read_half, write_half) = split(boxed);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Run the `initialize` method, forwarding the opaque credentials blob.
    pub async fn initialize(
        &mut self,
        credentials: &HashMap<String, String>,
    ) -> Result<InitializeResult, ClientError> {
        let params = InitializeParams {
            credentials: credentials.clone(),
        };
        let params = serde_json::to_value(params).map_err(ClientError::Encode)?;
        let result = self.call(Method::Initialize, params).await?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::MalformedResponse(format!("initialize result: {e}")))
    }

    /// Run the `discover` method and return the advertised operations in
    /// the source's order.
    pub async fn discover(&mut self) -> Result<Vec<OperationDescriptor>, ClientError> {
        let result = self.call(Method::Discover, json!({})).await?;
        let discovered: DiscoverResult = serde_json::from_value(result)
            .map_err(|e| ClientError::MalformedResponse(format!("discover result: {e}")))?;
        Ok(discovered.functions)
    }

    /// Run the `execute` method for one unprefixed, server-local operation.
    pub async fn execute(
        &mut self,
        operation: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ClientError> {
        let params = serde_json::to_value(ExecuteParams::new(operation, arguments))
            .map_err(ClientError::Encode)?;
        self.call(Method::Execute, params).await
    }

    /// Close the connection by shutting down the write half.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// One full request/response exchange: fresh id, one line out, one line
    /// in, id verified, result unwrapped or remote error surfaced.
    async fn call(&mut self, method: Method, params: Value) -> Result<Value, ClientError> {
        let request = ProtocolRequest::new(method, params);
        let line = serde_json::to_string(&request).map_err(ClientError::Encode)?;

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let mut buffer = String::new();
        let bytes_read = self.reader.read_line(&mut buffer).await?;
        if bytes_read == 0 {
            return Err(ClientError::ConnectionClosed);
        }

        let response: ProtocolResponse = serde_json::from_str(buffer.trim_end())
            .map_err(|e| ClientError::MalformedResponse(format!("invalid JSON: {e}")))?;

        match (response.result, response.error) {
            (Some(result), None) => {
                if response.id.as_deref() != Some(request.id.as_str()) {
                    return Err(ClientError::IdMismatch {
                        expected: request.id,
                        received: response.id,
                    });
                }
                Ok(result)
            }
            (None, Some(error)) => {
                // A null id on an error response means the server could not
                // recover our id; with one outstanding request it still
                // correlates unambiguously.
                if let Some(received) = &response.id {
                    if received != &request.id {
                        return Err(ClientError::IdMismatch {
                            expected: request.id,
                            received: response.id.clone(),
                        });
                    }
                }
                Err(RemoteError::from(error).into())
            }
            _ => Err(ClientError::MalformedResponse(
                "response must carry exactly one of result/error".to_string(),
            )),
        }
    }
}
