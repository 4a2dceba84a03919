//! `tandem-echo`: a demonstration engine served over standard streams.
//!
//! Answers `echo` and `add` calls and accepts `log` notifications. Frames are
//! read from stdin and written to stdout; logs go to stderr.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tandem::{DEFAULT_MAX_FRAME_BYTES, Engine, EngineConfig, LogFormat, RpcError, telemetry};
use tracing::{error, info};

const ECHO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::echo");

/// Command-line options for the demonstration server.
#[derive(Parser, Debug)]
#[command(name = "tandem-echo", version, about)]
struct Cli {
    /// Tracing filter directive, for example `tandem=debug`.
    #[arg(long, default_value = "info")]
    log_filter: String,
    /// Log output format (`json` or `compact`).
    #[arg(long, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
    /// Largest accepted frame in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,
    /// Seconds to wait for the peer to answer an outbound call.
    #[arg(long, value_name = "SECONDS")]
    call_timeout: Option<u64>,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::new().with_max_frame_bytes(self.max_frame_bytes);
        match self.call_timeout {
            Some(seconds) => config.with_call_timeout(Duration::from_secs(seconds)),
            None => config,
        }
    }
}

fn build_engine(config: EngineConfig) -> Engine {
    Engine::builder()
        .request("echo", |text: String| Ok::<_, RpcError>(text))
        .request("add", |left: i64, right: i64| {
            left.checked_add(right)
                .ok_or_else(|| RpcError::invalid_params("sum overflows a 64-bit integer"))
        })
        .notification("log", |line: String| {
            info!(target: ECHO_TARGET, line = %line, "peer log");
        })
        .config(config)
        .build(io::stdout())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = telemetry::initialise(&cli.log_filter, cli.log_format) {
        let _ignored = writeln!(io::stderr(), "tandem-echo: {error}");
        return ExitCode::FAILURE;
    }

    let engine = build_engine(cli.engine_config());
    info!(target: ECHO_TARGET, config = ?engine.config(), "serving on standard streams");
    match engine.serve(io::stdin().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(target: ECHO_TARGET, error = %failure, "read loop failed");
            ExitCode::FAILURE
        }
    }
}
