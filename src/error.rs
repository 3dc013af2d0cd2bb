use std::io;
use thiserror::Error;

/// Error type for the resmon library.
///
/// Sampler threads never propagate these to query callers; they are logged and
/// the affected reading degrades to its sentinel value.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An OS data source could not be opened or queried.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A source was opened but required fields were missing or malformed.
    #[error("Partial data: {0}")]
    PartialData(String),

    /// Packet capture could not be set up or died mid-session.
    #[error("Capture failure: {0}")]
    CaptureFailure(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Result type alias for resmon
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        MonitorError::Config(msg.into())
    }

    /// Create a source unavailable error
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        MonitorError::SourceUnavailable(msg.into())
    }

    /// Create a partial data error
    pub fn partial_data<S: Into<String>>(msg: S) -> Self {
        MonitorError::PartialData(msg.into())
    }

    pub fn capture_failure<S: Into<String>>(msg: S) -> Self {
        MonitorError::CaptureFailure(msg.into())
    }

    pub fn unsupported_platform<S: Into<String>>(msg: S) -> Self {
        MonitorError::UnsupportedPlatform(msg.into())
    }
}
