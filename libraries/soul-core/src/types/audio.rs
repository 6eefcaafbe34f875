/// Audio-related types
use serde::{Deserialize, Serialize};

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// Common sample rates
    pub const NARROWBAND: Self = Self(8_000);
    pub const WIDEBAND: Self = Self(32_000);
    pub const CD_QUALITY: Self = Self(44_100);
    pub const DVD_QUALITY: Self = Self(48_000);

    /// Create a new sample rate
    #[must_use]
    pub fn new(hz: u32) -> Self {
        Self(hz)
    }

    /// Get the sample rate as Hz
    pub fn as_hz(&self) -> u32 {
        self.0
    }

    /// Zero means "not negotiated yet"
    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::DVD_QUALITY
    }
}

/// Stream encoding as reported by the audio framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// 16-bit linear PCM
    Pcm16,
    /// MPEG-1/2 layer III
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// Anything else, kept as the raw framework value
    Other(u32),
}

impl AudioFormat {
    const RAW_PCM16: u32 = 0x0000_0001;
    const RAW_MP3: u32 = 0x0100_0000;
    const RAW_AAC: u32 = 0x0400_0000;

    /// Decode a raw framework format value
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            Self::RAW_PCM16 => Self::Pcm16,
            Self::RAW_MP3 => Self::Mp3,
            Self::RAW_AAC => Self::Aac,
            other => Self::Other(other),
        }
    }

    /// Raw framework format value
    pub fn as_raw(&self) -> u32 {
        match self {
            Self::Pcm16 => Self::RAW_PCM16,
            Self::Mp3 => Self::RAW_MP3,
            Self::Aac => Self::RAW_AAC,
            Self::Other(raw) => *raw,
        }
    }

    /// Formats the compressed-offload path can decode in hardware
    pub fn is_offloadable(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Aac)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Other(_) => "other",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "other({raw:#x})"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Output channel mask bitfield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelMask(pub u32);

impl ChannelMask {
    pub const MONO: Self = Self(0x1);
    pub const STEREO: Self = Self(0x3);

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Number of channels set in the mask
    pub fn channel_count(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_mono(&self) -> bool {
        *self == Self::MONO
    }

    pub fn is_stereo(&self) -> bool {
        *self == Self::STEREO
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::STEREO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_common_values() {
        assert_eq!(SampleRate::CD_QUALITY.as_hz(), 44_100);
        assert_eq!(SampleRate::default().as_hz(), 48_000);
        assert!(SampleRate::new(0).is_unset());
    }

    #[test]
    fn format_raw_values() {
        assert_eq!(AudioFormat::from_raw(0x0100_0000), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_raw(0x0400_0000), AudioFormat::Aac);
        assert_eq!(AudioFormat::from_raw(0x0500_0000), AudioFormat::Other(0x0500_0000));
        assert_eq!(AudioFormat::Aac.as_raw(), 0x0400_0000);
    }

    #[test]
    fn only_mp3_and_aac_offload() {
        assert!(AudioFormat::Mp3.is_offloadable());
        assert!(AudioFormat::Aac.is_offloadable());
        assert!(!AudioFormat::Pcm16.is_offloadable());
        assert!(!AudioFormat::Other(7).is_offloadable());
    }

    #[test]
    fn channel_mask_counts() {
        assert_eq!(ChannelMask::MONO.channel_count(), 1);
        assert_eq!(ChannelMask::STEREO.channel_count(), 2);
        assert!(ChannelMask::default().is_stereo());
    }
}
