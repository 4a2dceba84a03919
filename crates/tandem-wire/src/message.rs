//! Requests, responses and their frame encoding.

use serde::Serialize;
use serde_json::Value;

use crate::error::RpcError;
use crate::id::RequestId;

/// Protocol version stamped on every outbound frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Terminator appended to every encoded frame.
pub const FRAME_DELIMITER: &[u8] = b"\r\n";

/// A call or notification.
///
/// A request without an id is a notification: the peer never answers it.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method to invoke.
    pub method: String,
    /// Positional parameters, still untyped.
    pub params: Vec<Value>,
    /// Correlation id; `None` marks a notification.
    pub id: Option<RequestId>,
}

impl Request {
    /// Creates a call expecting a response under `id`.
    #[must_use]
    pub fn call(id: RequestId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Creates a notification.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    /// Returns true when no response is expected.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Builds the response for this request, or `None` for a notification.
    #[must_use]
    pub fn respond(&self, outcome: Result<Value, RpcError>) -> Option<Response> {
        self.id.clone().map(|id| Response { id, outcome })
    }

    /// Encodes the request as a single delimited frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter cannot be serialised.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&RequestFrame {
            jsonrpc: JSONRPC_VERSION,
            method: &self.method,
            params: &self.params,
            id: self.id.as_ref(),
        })
        .map(finish_frame)
    }
}

/// The answer to a call: exactly one of a result or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Result value or error object.
    pub outcome: Result<Value, RpcError>,
}

impl Response {
    /// Creates a successful response.
    #[must_use]
    pub const fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: Ok(result),
        }
    }

    /// Creates an error response.
    #[must_use]
    pub const fn failure(id: RequestId, error: RpcError) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    /// Encodes the response as a single delimited frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the result or error data cannot be serialised.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let (result, error) = match &self.outcome {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        serde_json::to_vec(&ResponseFrame {
            jsonrpc: JSONRPC_VERSION,
            result,
            error,
            id: &self.id,
        })
        .map(finish_frame)
    }
}

/// Any well-formed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A call or notification from the peer.
    Request(Request),
    /// An answer to one of our calls.
    Response(Response),
}

impl Message {
    /// Encodes the message as a single delimited frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialised.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Request(request) => request.encode(),
            Self::Response(response) => response.encode(),
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

#[derive(Serialize)]
struct RequestFrame<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
}

#[derive(Serialize)]
struct ResponseFrame<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a RpcError>,
    id: &'a RequestId,
}

fn finish_frame(mut payload: Vec<u8>) -> Vec<u8> {
    payload.extend_from_slice(FRAME_DELIMITER);
    payload
}
