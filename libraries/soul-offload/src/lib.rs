//! Soul Offload - compressed audio offload output
//!
//! Drives a hardware compressed-audio codec from userspace: the encoded stream
//! (MP3 or AAC) is handed to a DSP that decodes and renders it, while this
//! crate manages the session lifecycle, transfer buffer sizing, hardware
//! volume and render position.
//!
//! # Features
//!
//! - **Single-stream device**: [`OffloadDevice`] owns the one offload output
//!   and rejects concurrent opens
//! - **Stream state machine**: [`OffloadStream`] with write, pause, resume,
//!   flush, drain, standby and close
//! - **Hardware volume**: linear gain to dB attenuation codes with read-back
//!   de-duplication and deferral while the device is inactive
//! - **Codec negotiation**: [`CodecStore`] fed by `key=value` parameters
//! - **Hardware seams**: [`OffloadHardware`] and friends, with a bundled
//!   [`sim::SimulatedHardware`]
//!
//! # Example
//!
//! ```rust
//! use soul_core::{AudioFormat, ChannelMask, IoHandle, OutputDevices, OutputFlags, SampleRate};
//! use soul_offload::{sim::SimulatedHardware, CodecStore, OffloadDevice, OffloadSettings, StreamConfig};
//! use std::sync::Arc;
//!
//! let device = OffloadDevice::new(
//!     Arc::new(SimulatedHardware::new()),
//!     OffloadSettings::default(),
//!     Arc::new(CodecStore::new()),
//! );
//! device.init_check().unwrap();
//!
//! let config = StreamConfig::new(AudioFormat::Mp3, SampleRate::CD_QUALITY, ChannelMask::STEREO);
//! let stream = device
//!     .open_output_stream(IoHandle(1), OutputDevices::SPEAKER, OutputFlags::COMPRESS_OFFLOAD, &config)
//!     .unwrap();
//!
//! assert_eq!(stream.write(&[0u8; 1024]), 1024);
//! stream.set_volume(0.5, 0.5).unwrap();
//! device.close_output_stream(&stream).unwrap();
//! ```

pub mod buffer;
pub mod codec;
pub mod device;
pub mod error;
pub mod hardware;
pub mod settings;
pub mod sim;
pub mod stream;
pub mod volume;

pub use buffer::offload_buffer_size;
pub use codec::{CodecInformation, CodecKey, CodecStore};
pub use device::OffloadDevice;
pub use error::{OffloadError, Result};
pub use hardware::{
    CompressSession, ControlDevice, HardwareError, OffloadHardware, PcmReference,
};
pub use settings::OffloadSettings;
pub use stream::{OffloadStream, StreamConfig, StreamState, StreamStatus};
pub use volume::AttenuationCode;
