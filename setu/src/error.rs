//! Error types for Setu

use std::fmt;

use crate::stub::SensorKind;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protobuf payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Incoming or outgoing frame exceeds the configured limit
    #[error("Frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge {
        /// Size announced by the length prefix
        size: usize,
        /// Configured maximum
        limit: usize,
    },

    /// The connection could not provide a stream for a remote method
    #[error("Failed to open stream {method}: {reason}")]
    StreamOpen {
        /// Remote method name
        method: &'static str,
        /// Why the stream is unavailable
        reason: String,
    },

    /// The remote finished a stream with a non-OK status
    #[error("Remote status {code}: {message}")]
    Status {
        /// Status code (see [`crate::transport::wire::status`])
        code: i32,
        /// Human-readable detail from the remote
        message: String,
    },

    /// The stream was cancelled locally
    #[error("Stream cancelled")]
    Cancelled,

    /// The result callback panicked on the listener thread
    #[error("Result listener thread panicked")]
    ListenerPanicked,

    /// One or more teardown stages failed
    #[error("Teardown failed: {}", format_failures(.0))]
    Teardown(Vec<TeardownFailure>),
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Part of the stub that was being shut down when a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStage {
    /// Joining the result listener / finalizing the download stream
    Listener,
    /// Closing the upload channel of one sensor kind
    Upload(SensorKind),
}

impl fmt::Display for TeardownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownStage::Listener => write!(f, "result listener"),
            TeardownStage::Upload(kind) => write!(f, "{} upload", kind),
        }
    }
}

/// A single failed teardown stage.
#[derive(Debug)]
pub struct TeardownFailure {
    pub stage: TeardownStage,
    pub error: Error,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.error)
    }
}

fn format_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_error_lists_every_stage() {
        let err = Error::Teardown(vec![
            TeardownFailure {
                stage: TeardownStage::Listener,
                error: Error::Status {
                    code: 14,
                    message: "gone".into(),
                },
            },
            TeardownFailure {
                stage: TeardownStage::Upload(SensorKind::Imu),
                error: Error::Cancelled,
            },
        ]);

        let text = err.to_string();
        assert!(text.contains("result listener: Remote status 14: gone"));
        assert!(text.contains("imu upload: Stream cancelled"));
    }
}
