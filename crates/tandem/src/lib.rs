//! Bidirectional JSON-RPC over any duplex byte stream.
//!
//! Both ends of a connection run an [`Engine`] and may call each other at
//! the same time. An engine correlates each response with the call that
//! produced it, dispatches inbound calls and notifications to typed handlers,
//! and serialises every outbound frame through one writer.
//!
//! ```no_run
//! use std::os::unix::net::UnixStream;
//! use std::sync::Arc;
//!
//! use tandem::{Engine, RpcError};
//!
//! # fn main() -> std::io::Result<()> {
//! let stream = UnixStream::connect("/tmp/peer.sock")?;
//! let engine = Arc::new(
//!     Engine::builder()
//!         .request("echo", |text: String| Ok::<_, RpcError>(text))
//!         .notification("log", |line: String| tracing::info!(%line))
//!         .build(stream.try_clone()?),
//! );
//! let reader = engine.spawn(stream)?;
//!
//! let sum = engine.call("add", (2, 40));
//! if let Some(error) = sum.error() {
//!     tracing::warn!(%error, retryable = error.is_retryable(), "add failed");
//! }
//! # drop(reader);
//! # Ok(())
//! # }
//! ```

mod config;
mod diagnostics;
mod dispatch;
mod engine;
mod errors;
mod pending;
pub mod telemetry;

pub use config::{DEFAULT_MAX_FRAME_BYTES, EngineConfig, LogFormat};
pub use diagnostics::{DiagnosticSink, TracingDiagnostics};
pub use dispatch::{
    DispatchOutcome, DispatchTable, FallbackHandler, HandlerOutput, NotificationFn,
    NotificationOutput, ParamShape, RequestFn,
};
pub use engine::{CallResult, Engine, EngineBuilder};
pub use errors::{CallError, EngineError};
pub use tandem_wire::{
    DecodeError, ErrorCode, IdGenerator, Message, Request, RequestId, Response, RpcError,
    is_retryable_code,
};

#[cfg(test)]
mod tests;
