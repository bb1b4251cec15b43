/// Desktop backend errors
use thiserror::Error;

/// Result type for audio operations
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

    /// Resource could not be read or downloaded
    #[error("Failed to fetch {resource}: {reason}")]
    Fetch { resource: String, reason: String },

    /// Decoder failure
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unsupported audio format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// A background thread is gone
    #[error("Audio thread unavailable: {0}")]
    ThreadGone(&'static str),
}

impl AudioError {
    pub(crate) fn fetch(resource: &str, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            resource: resource.to_owned(),
            reason: reason.to_string(),
        }
    }
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
            other => AudioError::Decode(other.to_string()),
        }
    }
}

impl From<AudioError> for encore_playback::PlaybackError {
    fn from(err: AudioError) -> Self {
        encore_playback::PlaybackError::Backend(err.to_string())
    }
}
