/// Core error types shared by the offload HAL crates
use thiserror::Error;

/// Result type alias using `SoulError`
pub type Result<T> = std::result::Result<T, SoulError>;

/// `errno` values reported across the HAL boundary
pub mod errno {
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ENOSYS: i32 = 38;
}

/// Core error type for the audio HAL
///
/// Every crate-specific error converts into one of these kinds, which in turn
/// maps onto the negative status code the framework expects.
#[derive(Error, Debug)]
pub enum SoulError {
    /// Caller passed an out-of-range value or called in the wrong state
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation unavailable on this device, or the hardware refused it
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Allocation or hardware resource exhausted
    #[error("Out of resources: {0}")]
    NoResources(String),

    /// Device not initialized yet
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Hardware configuration or settings could not be applied
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SoulError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a not supported error
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Create a resource exhaustion error
    pub fn no_resources(msg: impl Into<String>) -> Self {
        Self::NoResources(msg.into())
    }

    /// Create a not ready error
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Negative `errno` status for this error
    pub fn status(&self) -> i32 {
        -match self {
            Self::InvalidArgument(_) | Self::Config(_) => errno::EINVAL,
            Self::NotSupported(_) => errno::ENOSYS,
            Self::NoResources(_) => errno::ENOMEM,
            Self::NotReady(_) => errno::ENODEV,
            Self::Io(_) => errno::EIO,
        }
    }
}

impl From<config::ConfigError> for SoulError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Collapse a result into the status code used at the HAL boundary (0 on success)
pub fn status_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.status(),
    }
}
