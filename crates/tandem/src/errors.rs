//! Error types surfaced by the engine.

use std::io;

use tandem_wire::RpcError;
use thiserror::Error;

/// Failures on the engine's own transport and encoding paths.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reading from or writing to the transport failed.
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
    /// An outbound frame could not be serialised.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    /// Call parameters did not form a positional list.
    #[error("parameters must be positional: {reason}")]
    Params {
        /// What was supplied instead.
        reason: String,
    },
    /// A writer panicked mid-frame; the transport can no longer be trusted.
    #[error("transport writer poisoned by an earlier panic")]
    WriterPoisoned,
    /// An inbound frame exceeded the configured limit and was discarded.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Bytes consumed for the discarded frame.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
    /// The read loop has ended; no response can arrive any more.
    #[error("connection closed")]
    Closed,
}

impl EngineError {
    /// Converts the failure into the error a caller observes.
    ///
    /// Bad parameters map to invalid params; every transport failure is
    /// unretryable because the request may or may not have reached the peer.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Params { .. } => RpcError::invalid_params(self),
            _ => RpcError::unretryable(self),
        }
    }
}

/// Failure to obtain a typed value from a call.
#[derive(Debug, Error)]
pub enum CallError {
    /// The call itself failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// The call succeeded but its result did not match the requested type.
    #[error("failed to decode call result: {0}")]
    Decode(#[from] serde_json::Error),
}
