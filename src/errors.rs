use std::time::Duration;
use thiserror::Error;

/// Failures at the capture-device boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device could not be opened or configured. Fatal to startup.
    #[error("Failed to open camera (index {index}): {reason}")]
    OpenFailed { index: u32, reason: String },
    /// A single read failed. The acquisition loop skips the frame.
    #[error("Transient frame read failure: {0}")]
    TransientReadFailure(String),
    /// The backend could not list the attached cameras
    #[error("Failed to enumerate cameras: {0}")]
    EnumerationFailed(String),
}

impl DeviceError {
    pub fn open_failed(index: u32, reason: impl Into<String>) -> Self {
        DeviceError::OpenFailed {
            index,
            reason: reason.into(),
        }
    }
}

/// Malformed input handed to the quality evaluator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid frame: {0}")]
pub struct InvalidFrame(pub String);

/// Failures of the remote analysis call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Analysis timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("Request unauthorized: {0}")]
    Unauthorized(String),
    #[error("No API key configured")]
    MissingCredential,
    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),
    #[error("Failed to encode frame for upload: {0}")]
    Encoding(String),
}

impl AnalysisError {
    /// Short human-readable category shown to the user
    pub fn category(&self) -> &'static str {
        match self {
            AnalysisError::Network(_) => "network",
            AnalysisError::Timeout(_) => "timeout",
            AnalysisError::Unauthorized(_) | AnalysisError::MissingCredential => "unauthorized",
            AnalysisError::MalformedResponse(_) => "malformed response",
            AnalysisError::Encoding(_) => "encoding",
        }
    }
}

/// Rejected or adjusted auto-capture interval input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleConfigError {
    #[error("Interval '{input}' is not a whole number of seconds; keeping {kept}s")]
    NotNumeric { input: String, kept: u64 },
    #[error("Interval '{input}' is below the minimum; clamped to {clamped}s")]
    BelowMinimum { input: String, clamped: u64 },
    #[error("Interval '{input}' is above the maximum; clamped to {clamped}s")]
    AboveMaximum { input: String, clamped: u64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Failed to write config: {0}")]
    Write(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for pipeline-level operations
#[derive(Debug, Error)]
pub enum StudyCamError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    InvalidFrame(#[from] InvalidFrame),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Schedule(#[from] ScheduleConfigError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
