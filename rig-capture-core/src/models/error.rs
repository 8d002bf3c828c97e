use thiserror::Error;

/// Errors that can occur while configuring, running or finalizing a recording.
///
/// The variants fall into four groups:
/// - configuration errors, fatal to `start_recording` and never retried;
/// - per-frame errors, recovered locally by skipping the frame;
/// - writer lifecycle errors, reported per artifact in the recording result;
/// - external permission errors from the asset library.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("depth camera not available")]
    DeviceUnavailable,

    #[error("required capture format not available")]
    FormatUnavailable,

    #[error("microphone not available")]
    MicrophoneUnavailable,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid sample: {0}")]
    InvalidSample(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("queue full: {0}")]
    QueueFull(String),

    #[error("writer state: {0}")]
    WriterState(String),

    #[error("timeout")]
    Timeout,

    #[error("asset library access denied")]
    LibraryAccessDenied,

    #[error("asset library error: {0}")]
    LibraryError(String),
}

impl CaptureError {
    /// Whether this error belongs to the configuration group that prevents a
    /// recording from starting.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceUnavailable
                | Self::FormatUnavailable
                | Self::MicrophoneUnavailable
                | Self::ConfigurationFailed(_)
        )
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        CaptureError::StorageError(e.to_string())
    }
}
