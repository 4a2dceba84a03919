//! Diagnostic hook for failures that have no caller to report to.
//!
//! Malformed frames without a recoverable id, stray responses, failing
//! notifications and lost response writes cannot be answered over the wire.
//! The engine hands each of them to a [`DiagnosticSink`] instead of dropping
//! them silently.

use std::sync::Arc;

use tandem_wire::{DecodeError, RequestId, RpcError};

use crate::errors::EngineError;

const DIAGNOSTICS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::diagnostics");

/// Observer for engine events that cannot be reported to a peer.
pub trait DiagnosticSink: Send + Sync {
    /// A frame failed to decode and carried no id to answer.
    fn malformed_frame(&self, error: &DecodeError);

    /// A response arrived for an id with no pending call.
    fn unmatched_response(&self, id: &RequestId);

    /// A notification was not delivered, or its handler failed.
    fn notification_failed(&self, method: &str, error: &RpcError);

    /// The fallback produced a response for a notification.
    fn fallback_response_dropped(&self, method: &str);

    /// Writing the response to an inbound call failed.
    fn response_write_failed(&self, id: &RequestId, error: &EngineError);

    /// An oversize frame was skipped.
    fn frame_discarded(&self, error: &EngineError);
}

impl<T> DiagnosticSink for Arc<T>
where
    T: DiagnosticSink + ?Sized,
{
    fn malformed_frame(&self, error: &DecodeError) {
        (**self).malformed_frame(error);
    }

    fn unmatched_response(&self, id: &RequestId) {
        (**self).unmatched_response(id);
    }

    fn notification_failed(&self, method: &str, error: &RpcError) {
        (**self).notification_failed(method, error);
    }

    fn fallback_response_dropped(&self, method: &str) {
        (**self).fallback_response_dropped(method);
    }

    fn response_write_failed(&self, id: &RequestId, error: &EngineError) {
        (**self).response_write_failed(id, error);
    }

    fn frame_discarded(&self, error: &EngineError) {
        (**self).frame_discarded(error);
    }
}

/// Default sink that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl TracingDiagnostics {
    /// Builds a new sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DiagnosticSink for TracingDiagnostics {
    fn malformed_frame(&self, error: &DecodeError) {
        tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            event = "malformed_frame",
            code = error.code().code(),
            error = %error,
            "discarded malformed frame"
        );
    }

    fn unmatched_response(&self, id: &RequestId) {
        tracing::debug!(
            target: DIAGNOSTICS_TARGET,
            event = "unmatched_response",
            id = %id,
            "dropped response with no pending call"
        );
    }

    fn notification_failed(&self, method: &str, error: &RpcError) {
        tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            event = "notification_failed",
            method,
            code = error.code,
            error = %error,
            "notification was not handled"
        );
    }

    fn fallback_response_dropped(&self, method: &str) {
        tracing::debug!(
            target: DIAGNOSTICS_TARGET,
            event = "fallback_response_dropped",
            method,
            "fallback answered a notification; response discarded"
        );
    }

    fn response_write_failed(&self, id: &RequestId, error: &EngineError) {
        tracing::error!(
            target: DIAGNOSTICS_TARGET,
            event = "response_write_failed",
            id = %id,
            error = %error,
            "failed to write response"
        );
    }

    fn frame_discarded(&self, error: &EngineError) {
        tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            event = "frame_discarded",
            error = %error,
            "discarded oversize frame"
        );
    }
}
