//! Test doubles shared by the engine suites.

use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mockall::mock;
use serde_json::Value;
use tandem_wire::{DecodeError, ErrorCode, RequestId, RpcError};

use crate::{DiagnosticSink, Engine, EngineBuilder, EngineError};

/// In-memory writer whose contents stay readable after the engine takes it.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Every complete frame written so far, parsed as JSON.
    pub fn frames(&self) -> Vec<Value> {
        let bytes = self.bytes.lock().expect("buffer mutex poisoned").clone();
        let text = String::from_utf8(bytes).expect("frames are utf-8");
        assert!(
            text.is_empty() || text.ends_with("\r\n"),
            "partial frame in buffer: {text:?}"
        );
        text.split_terminator("\r\n")
            .map(|line| serde_json::from_str(line).expect("frame is json"))
            .collect()
    }

    /// Blocks until at least `count` frames have been written.
    pub fn wait_for_frames(&self, count: usize) -> Vec<Value> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let frames = self.frames();
            if frames.len() >= count {
                return frames;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {count} frames, have {frames:?}"
            );
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .expect("buffer mutex poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer whose transport is already gone.
pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer hung up"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Forwards writes to a socket while keeping a copy for assertions.
///
/// The copy is taken first so it is complete by the time the peer can react.
struct Tee {
    stream: UnixStream,
    copy: SharedBuffer,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.copy.write_all(buf)?;
        self.stream.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Diagnostic events captured by [`RecordingDiagnostics`].
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    Malformed(ErrorCode),
    Unmatched(RequestId),
    NotificationFailed { method: String, code: i64 },
    FallbackDropped(String),
    WriteFailed(RequestId),
    Discarded(String),
}

/// Records diagnostic events for assertions.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .expect("diagnostics mutex poisoned")
            .clone()
    }

    fn record(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .expect("diagnostics mutex poisoned")
            .push(event);
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn malformed_frame(&self, error: &DecodeError) {
        self.record(DiagnosticEvent::Malformed(error.code()));
    }

    fn unmatched_response(&self, id: &RequestId) {
        self.record(DiagnosticEvent::Unmatched(id.clone()));
    }

    fn notification_failed(&self, method: &str, error: &RpcError) {
        self.record(DiagnosticEvent::NotificationFailed {
            method: method.to_owned(),
            code: error.code,
        });
    }

    fn fallback_response_dropped(&self, method: &str) {
        self.record(DiagnosticEvent::FallbackDropped(method.to_owned()));
    }

    fn response_write_failed(&self, id: &RequestId, _error: &EngineError) {
        self.record(DiagnosticEvent::WriteFailed(id.clone()));
    }

    fn frame_discarded(&self, error: &EngineError) {
        self.record(DiagnosticEvent::Discarded(error.to_string()));
    }
}

mock! {
    pub Sink {}
    impl DiagnosticSink for Sink {
        fn malformed_frame(&self, error: &DecodeError);
        fn unmatched_response(&self, id: &RequestId);
        fn notification_failed(&self, method: &str, error: &RpcError);
        fn fallback_response_dropped(&self, method: &str);
        fn response_write_failed(&self, id: &RequestId, error: &EngineError);
        fn frame_discarded(&self, error: &EngineError);
    }
}

/// Engine preloaded with `echo`, `add` and a `log` notification.
pub fn echo_builder() -> EngineBuilder {
    Engine::builder()
        .request("echo", |text: String| Ok::<_, RpcError>(text))
        .request("add", |a: i64, b: i64| Ok::<_, RpcError>(a + b))
        .notification("log", |_line: String| {})
}

/// Engine writing into a buffer and reporting into a recorder.
pub struct Harness {
    pub engine: Arc<Engine>,
    pub output: SharedBuffer,
    pub diagnostics: Arc<RecordingDiagnostics>,
}

impl Harness {
    pub fn new(builder: EngineBuilder) -> Self {
        let output = SharedBuffer::default();
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let engine = builder
            .diagnostics(Arc::clone(&diagnostics))
            .build(output.clone());
        Self {
            engine: Arc::new(engine),
            output,
            diagnostics,
        }
    }

    /// Feeds a JSON value to the engine as one frame.
    pub fn receive(&self, frame: &Value) {
        let mut bytes = serde_json::to_vec(frame).expect("encode frame");
        bytes.extend_from_slice(b"\r\n");
        self.engine.handle_frame(&bytes);
    }
}

/// Two engines joined by a socket pair, each running its read loop.
pub struct Peers {
    pub local: Arc<Engine>,
    pub remote: Arc<Engine>,
    /// Copy of every frame the remote engine wrote.
    pub remote_output: SharedBuffer,
    socket: UnixStream,
}

impl Peers {
    pub fn connect(local: EngineBuilder, remote: EngineBuilder) -> Self {
        let (local_socket, remote_socket) = UnixStream::pair().expect("socket pair");
        let remote_output = SharedBuffer::default();

        let local = Arc::new(local.build(local_socket.try_clone().expect("clone socket")));
        let remote = Arc::new(remote.build(Tee {
            stream: remote_socket.try_clone().expect("clone socket"),
            copy: remote_output.clone(),
        }));
        let socket = local_socket.try_clone().expect("clone socket");
        local.spawn(local_socket).expect("spawn local reader");
        remote.spawn(remote_socket).expect("spawn remote reader");

        Self {
            local,
            remote,
            remote_output,
            socket,
        }
    }
}

impl Drop for Peers {
    fn drop(&mut self) {
        let _closed = self.socket.shutdown(Shutdown::Both);
    }
}
