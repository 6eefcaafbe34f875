//! Hardware seams of the offload path
//!
//! The stream controller talks to three device nodes:
//! - a PCM reference device, opened and configured only to claim the audio path
//! - the compressed playback session, which receives the encoded stream
//! - the control device, which exposes the post-processing volume algorithm
//!
//! Each is a trait so a board backend, the bundled simulator or a test mock can
//! stand behind it. Dropping a handle releases the underlying node.

use soul_core::AudioFormat;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for hardware calls
pub type HwResult<T> = std::result::Result<T, HardwareError>;

/// Failure reported by a hardware backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("{device} unavailable: {reason}")]
    Unavailable { device: String, reason: String },

    #[error("{command} rejected: {reason}")]
    Rejected {
        command: &'static str,
        reason: String,
    },

    #[error("Compressed session is not ready")]
    NotReady,
}

impl HardwareError {
    pub fn unavailable(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            device: device.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(command: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            command,
            reason: reason.into(),
        }
    }
}

/// Compressed codec identifiers understood by the DSP firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    Mp3,
    Aac,
}

impl CodecId {
    pub fn for_format(format: AudioFormat) -> Option<Self> {
        match format {
            AudioFormat::Mp3 => Some(Self::Mp3),
            AudioFormat::Aac => Some(Self::Aac),
            _ => None,
        }
    }

    /// Numeric id in the compressed-audio driver ABI
    pub fn as_raw(&self) -> u32 {
        match self {
            Self::Mp3 => 0x1,
            Self::Aac => 0x2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecProfile {
    #[default]
    Default,
    Aac,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    #[default]
    Default,
    /// Raw access units, no ADTS/ADIF framing
    Raw,
}

/// Codec description handed to the compressed session at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub id: CodecId,
    pub channels_in: u32,
    pub channels_out: u32,
    pub sample_rate: u32,
    pub bit_rate: u32,
    pub rate_control: u32,
    pub profile: CodecProfile,
    pub level: u32,
    pub channel_mode: u32,
    pub format: StreamFormat,
}

/// Ring configuration of a compressed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressConfig {
    pub fragment_size: usize,
    pub fragments: u32,
    pub codec: CodecDescriptor,
}

impl CompressConfig {
    /// Total ring capacity in bytes
    pub fn ring_size(&self) -> usize {
        self.fragment_size * self.fragments as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmSampleFormat {
    S16Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmAccess {
    RwInterleaved,
}

/// Parameters applied to the PCM reference device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmParams {
    pub format: PcmSampleFormat,
    pub access: PcmAccess,
    pub channels: u32,
    pub rate: u32,
    pub soft_resample: bool,
    pub latency: Duration,
}

impl Default for PcmParams {
    fn default() -> Self {
        Self {
            format: PcmSampleFormat::S16Le,
            access: PcmAccess::RwInterleaved,
            channels: 2,
            rate: 48_000,
            soft_resample: true,
            latency: Duration::from_millis(500),
        }
    }
}

/// Hardware pointer snapshot of a compressed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareTimestamp {
    /// Bytes still queued in the ring
    pub available: usize,
    /// Audio rendered since the session started
    pub rendered: Duration,
}

impl HardwareTimestamp {
    pub fn rendered_ms(&self) -> u32 {
        let ms = self.rendered.as_secs() * 1000 + u64::from(self.rendered.subsec_millis());
        ms as u32
    }
}

/// One get/set request against a post-processing algorithm on the control device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgoRequest {
    pub algo_id: u8,
    pub stream_id: u8,
    pub enable: bool,
    pub param_type: u32,
    /// Parameter bytes for a set; expected reply size for a get
    pub payload: Vec<u8>,
}

/// Entry point of a board backend
#[cfg_attr(test, mockall::automock)]
pub trait OffloadHardware: Send + Sync {
    /// Open the PCM reference `hw:<card>,<device>`
    fn open_pcm_reference(&self, card_name: &str, device: u32) -> HwResult<Box<dyn PcmReference>>;

    /// Open a compressed playback session
    fn open_compress(
        &self,
        card: u32,
        device: u32,
        config: &CompressConfig,
    ) -> HwResult<Box<dyn CompressSession>>;

    fn open_control(&self, path: &Path) -> HwResult<Box<dyn ControlDevice>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait PcmReference: Send {
    fn set_params(&mut self, params: &PcmParams) -> HwResult<()>;
}

/// Compressed playback session
///
/// All calls block until the driver answers; `drain` blocks until the ring has
/// been rendered.
#[cfg_attr(test, mockall::automock)]
pub trait CompressSession: Send {
    fn is_ready(&self) -> bool;

    /// Queue encoded bytes, returning how many the ring accepted
    fn write(&mut self, data: &[u8]) -> HwResult<usize>;

    fn start(&mut self) -> HwResult<()>;
    fn stop(&mut self) -> HwResult<()>;
    fn pause(&mut self) -> HwResult<()>;
    fn resume(&mut self) -> HwResult<()>;
    fn drain(&mut self) -> HwResult<()>;
    fn timestamp(&mut self) -> HwResult<HardwareTimestamp>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ControlDevice: Send {
    /// Read an algorithm parameter block
    fn get_algo(&mut self, request: &AlgoRequest) -> HwResult<Vec<u8>>;

    fn set_algo(&mut self, request: &AlgoRequest) -> HwResult<()>;
}
