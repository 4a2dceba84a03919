//! JSON-RPC error objects and the fixed error-code taxonomy.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The fixed set of error codes understood by the engine.
///
/// The first five mirror JSON-RPC 2.0; the last two are engine-specific
/// application codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed JSON on the wire.
    ParseError,
    /// Valid JSON that is neither a request nor a response.
    InvalidRequest,
    /// No handler is registered for the requested method.
    MethodNotFound,
    /// Arity or per-parameter decode mismatch.
    InvalidParams,
    /// Internal failure while handling a request.
    InternalError,
    /// Generic application failure raised by a handler.
    Application,
    /// Application failure that must not be retried.
    Unretryable,
}

impl ErrorCode {
    /// Returns the integer code carried on the wire.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Application => -32000,
            Self::Unretryable => -32001,
        }
    }

    /// Maps a wire code back to a known variant.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(Self::ParseError),
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            -32000 => Some(Self::Application),
            -32001 => Some(Self::Unretryable),
            _ => None,
        }
    }

    /// Whether a call failing with this code may succeed if reissued.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        is_retryable_code(self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ParseError => "parse error",
            Self::InvalidRequest => "invalid request",
            Self::MethodNotFound => "method not found",
            Self::InvalidParams => "invalid params",
            Self::InternalError => "internal error",
            Self::Application => "application error",
            Self::Unretryable => "unretryable application error",
        };
        formatter.write_str(label)
    }
}

/// Retry classification as a pure function of the wire code.
///
/// `-32603` is retryable; every other code at or below `-32600` is not;
/// `-32001` is not; anything else is.
#[must_use]
pub const fn is_retryable_code(code: i64) -> bool {
    if code == ErrorCode::InternalError.code() {
        return true;
    }
    if code <= ErrorCode::InvalidRequest.code() {
        return false;
    }
    code != ErrorCode::Unretryable.code()
}

/// A JSON-RPC error object.
///
/// The code is kept as a raw integer because peers are free to send codes
/// outside [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RpcError {
    /// Wire error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Creates an error with an explicit code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Generic application error (`-32000`, retryable).
    #[must_use]
    pub fn application(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Application, message.to_string())
    }

    /// Application error that callers must not retry (`-32001`).
    #[must_use]
    pub fn unretryable(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Unretryable, message.to_string())
    }

    /// Malformed JSON (`-32700`).
    #[must_use]
    pub fn parse_error(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ParseError, message.to_string())
    }

    /// Neither a request nor a response (`-32600`).
    #[must_use]
    pub fn invalid_request(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidRequest, message.to_string())
    }

    /// Unknown method (`-32601`).
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("no such method: {method}"))
    }

    /// Arity or parameter decode mismatch (`-32602`).
    #[must_use]
    pub fn invalid_params(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidParams, message.to_string())
    }

    /// Internal failure (`-32603`).
    #[must_use]
    pub fn internal(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, message.to_string())
    }

    /// Attaches structured detail to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Converts an arbitrary application failure.
    ///
    /// An `RpcError` passes through untouched; anything else becomes a
    /// generic application error carrying the failure's message.
    #[must_use]
    pub fn from_boxed(error: Box<dyn StdError + Send + Sync>) -> Self {
        match error.downcast::<Self>() {
            Ok(rpc) => *rpc,
            Err(other) => Self::application(other),
        }
    }

    /// Returns the known code for this error, if it is one.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }

    /// Whether the call that produced this error may be reissued.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        is_retryable_code(self.code)
    }
}

impl From<std::io::Error> for RpcError {
    fn from(error: std::io::Error) -> Self {
        Self::application(error)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(error: serde_json::Error) -> Self {
        Self::application(error)
    }
}

impl From<Box<dyn StdError + Send + Sync>> for RpcError {
    fn from(error: Box<dyn StdError + Send + Sync>) -> Self {
        Self::from_boxed(error)
    }
}
