/// Desktop host errors
use stem_playback::HostError;
use thiserror::Error;

/// Result type for desktop audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Device not found
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to play stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// Failed to pause stream
    #[error("Failed to pause stream: {0}")]
    PauseError(String),

    /// Locator is neither a local path nor a file:// URL
    #[error("Unsupported locator: {0}")]
    UnsupportedLocator(String),

    /// Unsupported audio format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decoding failed
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// Loading was cancelled by release
    #[error("Loading aborted")]
    Aborted,

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::PlayError(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for AudioError {
    fn from(err: cpal::PauseStreamError) -> Self {
        AudioError::PauseError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::Unsupported(what) => {
                AudioError::UnsupportedFormat(what.to_string())
            }
            other => AudioError::DecodeError(other.to_string()),
        }
    }
}

impl From<AudioError> for HostError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::UnsupportedLocator(_) | AudioError::UnsupportedFormat(_) => {
                HostError::Unsupported(err.to_string())
            }
            other => HostError::Failed(other.to_string()),
        }
    }
}
