/// Error types for the hardware equalizer effect
use soul_core::SoulError;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for effect operations
pub type Result<T> = std::result::Result<T, EffectError>;

/// Failures reported by the DSP effect runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DspError {
    #[error("DSP runtime unavailable on card {card}: {reason}")]
    RuntimeUnavailable { card: String, reason: String },

    #[error("DSP effect creation failed: {0}")]
    Create(String),

    #[error("DSP rejected parameter block: {0}")]
    SetParams(String),

    #[error("DSP effect destroy failed: {0}")]
    Destroy(String),

    #[error("Malformed DSP parameter block: {0}")]
    Malformed(String),
}

impl DspError {
    pub fn unavailable(card: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            card: card.into(),
            reason: reason.into(),
        }
    }
}

/// Equalizer, command and library errors
#[derive(Error, Debug)]
pub enum EffectError {
    #[error("Band {0} out of range")]
    InvalidBand(i32),

    #[error("Preset {0} out of range")]
    InvalidPreset(i32),

    #[error("Band count {0} does not match the equalizer")]
    BandCountMismatch(i32),

    #[error("Unknown equalizer parameter {0}")]
    UnknownParameter(i32),

    #[error("Parameter block too short: need {needed} bytes, got {actual}")]
    ParameterTooShort { needed: usize, actual: usize },

    #[error("Value buffer too small: need {needed} bytes, got {actual}")]
    ValueTooSmall { needed: usize, actual: usize },

    #[error("Bad buffer sizes for {command}: command {command_size}, reply {reply_size}")]
    CommandSize {
        command: &'static str,
        command_size: usize,
        reply_size: usize,
    },

    #[error("Unknown effect command {0}")]
    UnknownCommand(u32),

    #[error("No effect with uuid {0} in this library")]
    UnknownEffect(Uuid),

    #[error(transparent)]
    Dsp(#[from] DspError),
}

impl From<EffectError> for SoulError {
    fn from(err: EffectError) -> Self {
        let msg = err.to_string();
        match err {
            EffectError::Dsp(_) => SoulError::NotSupported(msg),
            _ => SoulError::InvalidArgument(msg),
        }
    }
}

impl EffectError {
    /// Negative `errno` status written into parameter replies
    pub fn status(self) -> i32 {
        SoulError::from(self).status()
    }
}
