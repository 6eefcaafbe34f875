/// Error types for the offload HAL
use crate::hardware::HardwareError;
use crate::stream::StreamState;
use soul_core::{AudioFormat, SoulError};
use thiserror::Error;

/// Result type alias for offload operations
pub type Result<T> = std::result::Result<T, OffloadError>;

/// Offload device and stream errors
#[derive(Error, Debug)]
pub enum OffloadError {
    #[error("Invalid volume: {0}. Must be between 0.0 and 1.0")]
    InvalidVolume(f32),

    #[error("Cannot {operation} while stream is {state}")]
    InvalidState {
        operation: &'static str,
        state: StreamState,
    },

    #[error("Offload device busy: a stream is already open")]
    DeviceBusy,

    #[error("Offload device not initialized")]
    NotInitialized,

    #[error("Format {0} cannot be offloaded")]
    UnsupportedFormat(AudioFormat),

    #[error("Output flags {0:#x} do not request compressed offload")]
    NotOffloadStream(u32),

    #[error("Stream is not open on this device")]
    UnknownStream,

    #[error("Stream was closed by the device and cannot reopen")]
    StreamReleased,

    #[error("{0} is not supported by the offload device")]
    Unsupported(&'static str),

    /// PCM reference or codec session could not be configured
    #[error("Hardware configuration failed: {0}")]
    Configuration(#[source] HardwareError),

    /// The hardware refused a pause/resume/stop/drain command
    #[error("Hardware command failed: {0}")]
    Command(#[source] HardwareError),

    /// Control device open or volume algorithm access failed
    #[error("Control device error: {0}")]
    Control(#[source] HardwareError),

    #[error("Render position unavailable while stream is {0}")]
    PositionUnavailable(StreamState),
}

impl From<OffloadError> for SoulError {
    fn from(err: OffloadError) -> Self {
        let msg = err.to_string();
        match err {
            OffloadError::InvalidVolume(_)
            | OffloadError::InvalidState { .. }
            | OffloadError::DeviceBusy
            | OffloadError::UnsupportedFormat(_)
            | OffloadError::UnknownStream
            | OffloadError::StreamReleased => SoulError::InvalidArgument(msg),
            OffloadError::NotInitialized => SoulError::NotReady(msg),
            OffloadError::NotOffloadStream(_)
            | OffloadError::Unsupported(_)
            | OffloadError::Command(_) => SoulError::NotSupported(msg),
            OffloadError::Configuration(_) | OffloadError::PositionUnavailable(_) => {
                SoulError::Config(msg)
            }
            OffloadError::Control(_) => {
                SoulError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg))
            }
        }
    }
}

impl OffloadError {
    /// Negative `errno` status for the HAL boundary
    pub fn status(self) -> i32 {
        SoulError::from(self).status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_mapping() {
        assert_eq!(OffloadError::InvalidVolume(1.5).status(), -22);
        assert_eq!(OffloadError::DeviceBusy.status(), -22);
        assert_eq!(OffloadError::NotInitialized.status(), -19);
        assert_eq!(OffloadError::NotOffloadStream(0x1).status(), -38);
        assert_eq!(
            OffloadError::Command(HardwareError::rejected("pause", "busy")).status(),
            -38
        );
        assert_eq!(
            OffloadError::Configuration(HardwareError::unavailable("hw:0,2", "no card")).status(),
            -22
        );
        assert_eq!(
            OffloadError::Control(HardwareError::unavailable("ctrl", "missing")).status(),
            -5
        );
    }

    #[test]
    fn state_error_message() {
        let err = OffloadError::InvalidState {
            operation: "resume",
            state: StreamState::Ready,
        };
        assert_eq!(err.to_string(), "Cannot resume while stream is ready");
    }
}
