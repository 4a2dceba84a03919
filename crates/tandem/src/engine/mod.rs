//! The connection engine: read loop, routing, and the shared write path.
//!
//! An [`Engine`] owns one duplex connection. Inbound frames are handled
//! strictly in arrival order on the thread running [`Engine::serve`];
//! responses resolve pending calls, requests and notifications go through the
//! dispatch table. Every outbound frame passes through a single writer lock,
//! so concurrent calls, notifications and responses never interleave bytes.

mod call;
mod framing;

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tandem_wire::{DecodeError, IdGenerator, Message, Request, Response, decode};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};
use crate::dispatch::{DispatchOutcome, DispatchTable, FallbackHandler, NotificationFn, RequestFn};
use crate::errors::EngineError;
use crate::pending::CorrelationTable;

pub use call::CallResult;

use framing::{Frame, FrameReader};

pub(crate) const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

type SharedWriter = Mutex<Box<dyn Write + Send>>;

/// Registration phase of an [`Engine`].
///
/// Handlers can only be added here, so the dispatch table is complete before
/// any frame is read.
pub struct EngineBuilder {
    dispatch: DispatchTable,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Starts with no handlers, tracing diagnostics and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dispatch: DispatchTable::new(),
            diagnostics: None,
            config: EngineConfig::default(),
        }
    }

    /// Registers the handler answering calls to `method`.
    #[must_use]
    pub fn request<Args, H>(mut self, method: impl Into<String>, handler: H) -> Self
    where
        Args: 'static,
        H: RequestFn<Args>,
    {
        self.dispatch.register_request(method, handler);
        self
    }

    /// Registers the handler consuming notifications of `method`.
    #[must_use]
    pub fn notification<Args, H>(mut self, method: impl Into<String>, handler: H) -> Self
    where
        Args: 'static,
        H: NotificationFn<Args>,
    {
        self.dispatch.register_notification(method, handler);
        self
    }

    /// Adopts a table populated elsewhere, replacing every handler and
    /// fallback registered on this builder so far.
    #[must_use]
    pub fn dispatch_table(mut self, table: DispatchTable) -> Self {
        self.dispatch = table;
        self
    }

    /// Installs the catch-all for unregistered methods.
    #[must_use]
    pub fn fallback(mut self, handler: impl FallbackHandler) -> Self {
        self.dispatch.set_fallback(handler);
        self
    }

    /// Replaces the default [`TracingDiagnostics`] sink.
    #[must_use]
    pub fn diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Some(Arc::new(sink));
        self
    }

    /// Overrides the runtime limits.
    #[must_use]
    pub const fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Finishes registration, binding the engine to the write half of its
    /// transport.
    #[must_use]
    pub fn build(self, writer: impl Write + Send + 'static) -> Engine {
        Engine {
            dispatch: self.dispatch,
            pending: CorrelationTable::new(),
            ids: IdGenerator::new(),
            writer: Mutex::new(Box::new(writer)),
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Arc::new(TracingDiagnostics::new())),
            config: self.config,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One side of a bidirectional JSON-RPC connection.
pub struct Engine {
    dispatch: DispatchTable,
    pending: CorrelationTable,
    ids: IdGenerator,
    writer: SharedWriter,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: EngineConfig,
}

impl Engine {
    /// Starts registering handlers for a new engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Runtime limits in effect.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of calls still waiting for a response.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Runs the read loop on the current thread until end of stream.
    ///
    /// Each frame is handled to completion, handlers included, before the
    /// next is read. When the loop ends every pending call fails with an
    /// unretryable "connection closed" error, and later calls fail
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when reading from the transport fails.
    pub fn serve<R: Read>(&self, reader: R) -> Result<(), EngineError> {
        let limit = self.config.max_frame_bytes();
        let mut frames = FrameReader::new(reader, limit);
        let result = loop {
            match frames.next_frame() {
                Ok(Some(Frame::Line(frame))) => self.handle_frame(&frame),
                Ok(Some(Frame::Oversize(size))) => self.discard_frame(size),
                Ok(None) => break Ok(()),
                Err(error) => break Err(EngineError::from(error)),
            }
        };
        self.close();
        result
    }

    /// Runs [`serve`](Self::serve) on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<R>(self: &Arc<Self>, reader: R) -> std::io::Result<JoinHandle<Result<(), EngineError>>>
    where
        R: Read + Send + 'static,
    {
        let engine = Arc::clone(self);
        thread::Builder::new()
            .name("tandem-reader".to_owned())
            .spawn(move || engine.serve(reader))
    }

    /// Handles one complete inbound frame.
    ///
    /// Useful for transports that deliver frames themselves. Blank frames are
    /// ignored and frames over the configured limit are discarded.
    pub fn handle_frame(&self, frame: &[u8]) {
        if frame.len() > self.config.max_frame_bytes() {
            self.discard_frame(frame.len());
            return;
        }
        if frame.trim_ascii().is_empty() {
            debug!(target: ENGINE_TARGET, "skipped blank frame");
            return;
        }
        match decode(frame) {
            Ok(Message::Response(response)) => self.route_response(response),
            Ok(Message::Request(request)) => self.route_request(request),
            Err(error) => self.reject_frame(error),
        }
    }

    fn discard_frame(&self, size: usize) {
        let limit = self.config.max_frame_bytes();
        self.diagnostics
            .frame_discarded(&EngineError::FrameTooLarge { size, limit });
    }

    fn route_response(&self, response: Response) {
        let id = response.id.clone();
        if self.pending.resolve(response) {
            debug!(target: ENGINE_TARGET, id = %id, "resolved pending call");
        } else {
            self.diagnostics.unmatched_response(&id);
        }
    }

    fn route_request(&self, request: Request) {
        debug!(
            target: ENGINE_TARGET,
            method = %request.method,
            id = ?request.id,
            "dispatching inbound request"
        );
        match self.dispatch.dispatch(request) {
            DispatchOutcome::Reply(response) => self.send_response(&response),
            DispatchOutcome::Done => {}
            DispatchOutcome::Rejected { method, error } => {
                self.diagnostics.notification_failed(&method, &error);
            }
            DispatchOutcome::ReplyDropped { method } => {
                self.diagnostics.fallback_response_dropped(&method);
            }
        }
    }

    fn reject_frame(&self, error: DecodeError) {
        if error.id().is_none() {
            self.diagnostics.malformed_frame(&error);
            return;
        }
        debug!(
            target: ENGINE_TARGET,
            error = %error,
            "answering malformed request"
        );
        if let Some(response) = error.into_response() {
            self.send_response(&response);
        }
    }

    fn send_response(&self, response: &Response) {
        let sent = response
            .encode()
            .map_err(EngineError::from)
            .and_then(|frame| self.write_frame(&frame));
        if let Err(error) = sent {
            self.diagnostics.response_write_failed(&response.id, &error);
        }
    }

    /// Writes one encoded frame under the writer lock.
    fn write_frame(&self, frame: &[u8]) -> Result<(), EngineError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| EngineError::WriterPoisoned)?;
        writer.write_all(frame)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&self) {
        let failed = self
            .pending
            .close(&EngineError::Closed.to_rpc_error());
        if failed > 0 {
            warn!(
                target: ENGINE_TARGET,
                failed,
                "connection closed with calls still pending"
            );
        }
        debug!(target: ENGINE_TARGET, "read loop finished");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Engine")
            .field("config", &self.config)
            .field("pending_calls", &self.pending.len())
            .finish_non_exhaustive()
    }
}
