//! Soul Core
//!
//! Platform-agnostic types and error handling shared by the compressed-offload
//! output HAL (`soul-offload`) and the hardware equalizer effect (`soul-hweffect`).
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Audio Types**: `AudioFormat`, `SampleRate`, `ChannelMask`, routing masks and handles
//! - **Error Handling**: Unified `SoulError` and `Result` types with `errno` status mapping
//! - **Parameters**: `KeyValueParams`, the `key=value;...` control-plane format
//! - **Settings**: layered file + environment loading via the `config` crate
//!
//! # Example
//!
//! ```rust
//! use soul_core::{AudioFormat, KeyValueParams};
//!
//! let params = KeyValueParams::parse("music_offload_avg_bit_rate=128000;routing=2");
//! assert_eq!(params.get_int("routing").unwrap(), Some(2));
//! assert!(AudioFormat::Aac.is_offloadable());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod params;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use error::{status_of, Result, SoulError};
pub use params::KeyValueParams;

pub use types::{
    AudioFormat, ChannelMask, IoHandle, OutputDevices, OutputFlags, SampleRate, SessionId,
};
