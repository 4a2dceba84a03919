//! Caller side: outbound calls and notifications.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_wire::{Request, RequestId, Response, RpcError};
use tracing::debug;

use super::{ENGINE_TARGET, Engine};
use crate::errors::{CallError, EngineError};

/// Outcome of [`Engine::call`].
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    outcome: Result<Value, RpcError>,
}

impl CallResult {
    const fn failed(error: RpcError) -> Self {
        Self { outcome: Err(error) }
    }

    /// Returns true when the call produced a result.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The raw result value, if the call succeeded.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    /// The error, if the call failed.
    #[must_use]
    pub fn error(&self) -> Option<&RpcError> {
        self.outcome.as_ref().err()
    }

    /// Whether reissuing the call might succeed.
    ///
    /// Always false for a successful call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.error().is_some_and(RpcError::is_retryable)
    }

    /// Decodes the result into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Rpc`] when the call failed and
    /// [`CallError::Decode`] when the result does not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CallError> {
        let value = self.outcome.as_ref().map_err(Clone::clone)?;
        Ok(T::deserialize(value)?)
    }

    /// Unwraps into the underlying result.
    #[must_use]
    pub fn into_outcome(self) -> Result<Value, RpcError> {
        self.outcome
    }
}

impl From<Result<Value, RpcError>> for CallResult {
    fn from(outcome: Result<Value, RpcError>) -> Self {
        Self { outcome }
    }
}

impl Engine {
    /// Calls `method` on the peer and blocks until it answers.
    ///
    /// `params` must serialise to a JSON array (a tuple, slice or `Vec`), or
    /// to `null` for no parameters.
    ///
    /// A write failure abandons the call and returns an unretryable error
    /// straight away. With [`EngineConfig::with_call_timeout`] set, a call
    /// that outlives the timeout is abandoned and fails with a retryable
    /// application error; a late response is then dropped.
    ///
    /// [`EngineConfig::with_call_timeout`]: crate::EngineConfig::with_call_timeout
    pub fn call<P: Serialize>(&self, method: &str, params: P) -> CallResult {
        let params = match positional(params) {
            Ok(params) => params,
            Err(error) => return CallResult::failed(error.to_rpc_error()),
        };
        let id = self.ids.next_id();
        let (completion, receipt) = mpsc::sync_channel(1);
        if let Err(error) = self.pending.register(id.clone(), completion) {
            return CallResult::failed(error.to_rpc_error());
        }

        debug!(target: ENGINE_TARGET, method, id = %id, "sending call");
        let request = Request::call(id.clone(), method, params);
        let sent = request
            .encode()
            .map_err(EngineError::from)
            .and_then(|frame| self.write_frame(&frame));
        if let Err(error) = sent {
            self.pending.abandon(&id);
            debug!(target: ENGINE_TARGET, method, id = %id, error = %error, "call not sent");
            return CallResult::failed(error.to_rpc_error());
        }

        CallResult::from(
            self.await_response(method, &id, &receipt)
                .and_then(|response| response.outcome),
        )
    }

    /// Sends a notification to the peer.
    ///
    /// Succeeds once the frame is written; the peer never answers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Params`] for non-positional parameters and a
    /// transport error when the write fails.
    pub fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<(), EngineError> {
        let request = Request::notification(method, positional(params)?);
        debug!(target: ENGINE_TARGET, method, "sending notification");
        self.write_frame(&request.encode()?)
    }

    fn await_response(
        &self,
        method: &str,
        id: &RequestId,
        receipt: &Receiver<Response>,
    ) -> Result<Response, RpcError> {
        let closed = || EngineError::Closed.to_rpc_error();
        let Some(timeout) = self.config.call_timeout() else {
            return receipt.recv().map_err(|_| closed());
        };
        match receipt.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                if self.pending.abandon(id) {
                    return Err(timed_out(method, timeout));
                }
                // Lost the race: the completion was queued before we withdrew.
                receipt.try_recv().map_err(|_| closed())
            }
            Err(RecvTimeoutError::Disconnected) => Err(closed()),
        }
    }
}

fn timed_out(method: &str, timeout: Duration) -> RpcError {
    RpcError::application(format!(
        "call to {method} timed out after {} ms",
        timeout.as_millis()
    ))
}

fn positional<P: Serialize>(params: P) -> Result<Vec<Value>, EngineError> {
    match serde_json::to_value(params) {
        Ok(Value::Array(values)) => Ok(values),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other) => Err(EngineError::Params {
            reason: format!("expected an array, got {other}"),
        }),
        Err(error) => Err(EngineError::Params {
            reason: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;
    use tandem_wire::ErrorCode;

    use super::*;

    #[rstest]
    #[case(json!(["a", 1]), vec![json!("a"), json!(1)])]
    #[case(Value::Null, vec![])]
    fn accepts_positional_params(#[case] params: Value, #[case] expected: Vec<Value>) {
        assert_eq!(positional(params).expect("positional"), expected);
    }

    #[rstest]
    fn tuples_and_unit_are_positional() {
        assert_eq!(
            positional(("hi", 2)).expect("tuple"),
            vec![json!("hi"), json!(2)]
        );
        assert!(positional(()).expect("unit").is_empty());
    }

    #[rstest]
    #[case(json!({"named": true}))]
    #[case(json!("bare string"))]
    fn rejects_non_positional_params(#[case] params: Value) {
        let error = positional(params).expect_err("not positional");
        assert_eq!(error.to_rpc_error().kind(), Some(ErrorCode::InvalidParams));
    }

    #[rstest]
    fn decodes_typed_results() {
        let result = CallResult::from(Ok::<Value, RpcError>(json!({"a": [1, 2]})));

        let decoded: std::collections::HashMap<String, Vec<u8>> =
            result.decode().expect("typed result");
        assert_eq!(decoded.get("a"), Some(&vec![1, 2]));
        assert!(result.is_ok());
        assert!(!result.is_retryable());
    }

    #[rstest]
    fn decode_surfaces_rpc_errors() {
        let result = CallResult::from(Err::<Value, _>(RpcError::method_not_found("nope")));

        assert!(matches!(result.decode::<Value>(), Err(CallError::Rpc(_))));
        assert!(result.value().is_none());
        assert!(!result.is_retryable());
    }

    #[rstest]
    fn into_outcome_returns_the_wrapped_result() {
        let error = RpcError::unretryable("gone");
        let result = CallResult::from(Err::<Value, _>(error.clone()));

        assert_eq!(result.into_outcome(), Err(error));
    }

    #[rstest]
    fn decode_reports_shape_mismatch() {
        let result = CallResult::from(Ok::<Value, RpcError>(json!("text")));

        assert!(matches!(result.decode::<u32>(), Err(CallError::Decode(_))));
    }

    #[rstest]
    fn timeout_errors_are_retryable() {
        let error = timed_out("slow", Duration::from_millis(20));

        assert_eq!(error.kind(), Some(ErrorCode::Application));
        assert!(error.is_retryable());
        assert_eq!(error.message, "call to slow timed out after 20 ms");
    }
}
