//! Engine and logging configuration.

use std::time::Duration;

use strum::{Display, EnumString};

/// Largest frame accepted by default, including its delimiter.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Runtime limits applied by an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    call_timeout: Option<Duration>,
    max_frame_bytes: usize,
}

impl EngineConfig {
    /// Builds the default configuration: no call timeout, 1 MiB frames.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            call_timeout: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Bounds how long [`Engine::call`](crate::Engine::call) waits for a
    /// response.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Sets the largest inbound frame the read loop accepts.
    #[must_use]
    pub const fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }

    /// Maximum wait for a call response, if bounded.
    #[must_use]
    pub const fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Largest inbound frame in bytes.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Supported logging output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn defaults_leave_calls_unbounded() {
        let config = EngineConfig::default();

        assert_eq!(config.call_timeout(), None);
        assert_eq!(config.max_frame_bytes(), DEFAULT_MAX_FRAME_BYTES);
    }

    #[rstest]
    fn builder_methods_override_defaults() {
        let config = EngineConfig::new()
            .with_call_timeout(Duration::from_millis(250))
            .with_max_frame_bytes(64);

        assert_eq!(config.call_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_frame_bytes(), 64);
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("compact", LogFormat::Compact)]
    fn parses_log_format(#[case] text: &str, #[case] expected: LogFormat) {
        assert_eq!(text.parse::<LogFormat>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_log_format() {
        assert!("pretty".parse::<LogFormat>().is_err());
    }

    #[rstest]
    fn displays_log_format_in_snake_case() {
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }
}
