/// Offload hardware settings
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix, e.g. `SOUL_OFFLOAD__COMPRESS_CARD=3`
pub const ENV_PREFIX: &str = "SOUL_OFFLOAD";

/// Where the offload hardware lives and how sessions are sized
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OffloadSettings {
    /// Sound card hosting the PCM reference device
    #[serde(default = "default_card_name")]
    pub card_name: String,

    #[serde(default = "default_pcm_device")]
    pub pcm_device: u32,

    /// Card and device of the compressed playback node
    #[serde(default = "default_compress_card")]
    pub compress_card: u32,

    #[serde(default)]
    pub compress_device: u32,

    /// Node accepting volume algorithm get/set requests
    #[serde(default = "default_control_path")]
    pub control_path: PathBuf,

    /// Used until buffer-size negotiation has run
    #[serde(default = "default_buffer_size")]
    pub default_buffer_size: usize,

    /// Codec bit rate when the framework never supplied one
    #[serde(default = "default_bit_rate")]
    pub default_bit_rate: u32,

    #[serde(default = "default_fragments")]
    pub fragments: u32,

    #[serde(default = "default_latency_ms")]
    pub latency_ms: u32,

    /// Post-processing stream the volume algorithm targets
    #[serde(default = "default_volume_stream_id")]
    pub volume_stream_id: u8,
}

fn default_card_name() -> String {
    "cloverviewaudio".to_string()
}

fn default_pcm_device() -> u32 {
    2
}

fn default_compress_card() -> u32 {
    3
}

fn default_control_path() -> PathBuf {
    PathBuf::from("/dev/intel_sst_ctrl")
}

fn default_buffer_size() -> usize {
    crate::buffer::DEFAULT_BUFFER_SIZE
}

fn default_bit_rate() -> u32 {
    128_000
}

fn default_fragments() -> u32 {
    2
}

fn default_latency_ms() -> u32 {
    10
}

fn default_volume_stream_id() -> u8 {
    0x03
}

impl Default for OffloadSettings {
    fn default() -> Self {
        Self {
            card_name: default_card_name(),
            pcm_device: default_pcm_device(),
            compress_card: default_compress_card(),
            compress_device: 0,
            control_path: default_control_path(),
            default_buffer_size: default_buffer_size(),
            default_bit_rate: default_bit_rate(),
            fragments: default_fragments(),
            latency_ms: default_latency_ms(),
            volume_stream_id: default_volume_stream_id(),
        }
    }
}

impl OffloadSettings {
    /// Load from an optional settings file plus `SOUL_OFFLOAD__*` variables
    pub fn load(path: Option<&Path>) -> soul_core::Result<Self> {
        soul_core::settings::load(path, ENV_PREFIX)
    }

    pub fn with_card_name(mut self, card_name: impl Into<String>) -> Self {
        self.card_name = card_name.into();
        self
    }

    pub fn with_control_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.control_path = path.into();
        self
    }

    pub fn with_default_bit_rate(mut self, bit_rate: u32) -> Self {
        self.default_bit_rate = bit_rate;
        self
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(u64::from(self.latency_ms))
    }
}
