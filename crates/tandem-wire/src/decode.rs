//! Frame classification and strict decoding.
//!
//! A frame is first parsed into a generic JSON object and classified by the
//! presence of `method`, `result` and `error`. Only then is it decoded
//! strictly into the matching shape. A frame that is not JSON at all fails
//! with a parse error; valid JSON of the wrong shape fails with an invalid
//! request error.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{ErrorCode, RpcError};
use crate::id::RequestId;
use crate::message::{Message, Request, Response};

/// A frame that is neither a well-formed request nor a well-formed response.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct DecodeError {
    code: ErrorCode,
    message: String,
    id: Option<RequestId>,
}

impl DecodeError {
    fn parse(source: &serde_json::Error) -> Self {
        Self {
            code: ErrorCode::ParseError,
            message: source.to_string(),
            id: None,
        }
    }

    fn invalid(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidRequest,
            message: message.into(),
            id,
        }
    }

    /// Error code describing the failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Failure detail.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Id of the request this frame claimed to be, when recoverable.
    ///
    /// Only request-shaped frames yield an id: a malformed response is never
    /// answered.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    /// Converts the failure into the error object sent to the peer.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError::new(self.code, self.message.clone())
    }

    /// Builds the error response addressed to the recovered id.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        let error = self.to_rpc_error();
        self.id.map(|id| Response::failure(id, error))
    }
}

/// Decodes one frame.
///
/// Trailing whitespace, including the frame delimiter, is ignored.
///
/// # Errors
///
/// Returns [`DecodeError`] with [`ErrorCode::ParseError`] when the frame is
/// not JSON, and [`ErrorCode::InvalidRequest`] when it is JSON of the wrong
/// shape.
pub fn decode(frame: &[u8]) -> Result<Message, DecodeError> {
    let value: Value = serde_json::from_slice(frame).map_err(|error| DecodeError::parse(&error))?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::invalid(None, "frame is not a JSON object"));
    };

    let shape = Shape::classify(&fields)?;
    match shape {
        Shape::Request => decode_request(fields).map(Message::Request),
        Shape::Response => decode_response(fields).map(Message::Response),
    }
}

enum Shape {
    Request,
    Response,
}

impl Shape {
    fn classify(fields: &Map<String, Value>) -> Result<Self, DecodeError> {
        let has_method = fields.contains_key("method");
        if fields.get("jsonrpc").is_some_and(|version| !version.is_string()) {
            let id = if has_method { recover_id(fields) } else { None };
            return Err(DecodeError::invalid(id, "jsonrpc must be a string"));
        }

        if has_method {
            return Ok(Self::Request);
        }
        let has_result = fields.contains_key("result");
        let has_error = fields.get("error").is_some_and(|error| !error.is_null());
        if has_result || has_error {
            return Ok(Self::Response);
        }
        Err(DecodeError::invalid(
            None,
            "all valid messages have a 'method', 'result', or 'error' field",
        ))
    }
}

#[derive(Deserialize)]
struct WireRequest {
    method: String,
    #[serde(default, deserialize_with = "positional")]
    params: Vec<Value>,
    #[serde(default)]
    id: Option<RequestId>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
    id: RequestId,
}

fn decode_request(fields: Map<String, Value>) -> Result<Request, DecodeError> {
    let id = recover_id(&fields);
    let wire: WireRequest = serde_json::from_value(Value::Object(fields))
        .map_err(|error| DecodeError::invalid(id, format!("malformed request: {error}")))?;
    Ok(Request {
        method: wire.method,
        params: wire.params,
        id: wire.id,
    })
}

fn decode_response(fields: Map<String, Value>) -> Result<Response, DecodeError> {
    let wire: WireResponse = serde_json::from_value(Value::Object(fields))
        .map_err(|error| DecodeError::invalid(None, format!("malformed response: {error}")))?;

    let outcome = match (wire.result, wire.error) {
        (Some(result), Some(_)) if !result.is_null() => {
            return Err(DecodeError::invalid(
                None,
                "response carries both a result and an error",
            ));
        }
        (_, Some(error)) => Err(error),
        (Some(result), None) => Ok(result),
        (None, None) => {
            return Err(DecodeError::invalid(
                None,
                "response carries neither a result nor an error",
            ));
        }
    };
    Ok(Response {
        id: wire.id,
        outcome,
    })
}

fn recover_id(fields: &Map<String, Value>) -> Option<RequestId> {
    fields
        .get("id")
        .and_then(Value::as_str)
        .map(RequestId::new)
}

/// Treats absent and `null` params as an empty positional list.
fn positional<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Distinguishes a present `null` from an absent key.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
