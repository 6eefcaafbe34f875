//! Codec information store
//!
//! The framework learns codec details (bit rate, channel count, block align...)
//! from its parser and hands them to the HAL as key/value pairs, usually before
//! the stream exists. The store keeps the last negotiated values for the whole
//! device so the next stream open can build its hardware codec descriptor from
//! them. Values survive stream close and reopen.

use serde::{Deserialize, Serialize};
use soul_core::KeyValueParams;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Codec-specific parameter keys understood by the offload HAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKey {
    BitsPerSample,
    AvgBitRate,
    NumChannels,
    CodecId,
    BlockAlign,
    SampleRate,
    EncodeOption,
    DownSampling,
}

impl CodecKey {
    pub const ALL: [Self; 8] = [
        Self::BitsPerSample,
        Self::AvgBitRate,
        Self::NumChannels,
        Self::CodecId,
        Self::BlockAlign,
        Self::SampleRate,
        Self::EncodeOption,
        Self::DownSampling,
    ];

    /// Subset accepted at device level, ahead of any stream
    pub const DEVICE_LEVEL: [Self; 3] = [Self::AvgBitRate, Self::SampleRate, Self::NumChannels];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BitsPerSample => "music_offload_bit_per_sample",
            Self::AvgBitRate => "music_offload_avg_bit_rate",
            Self::NumChannels => "music_offload_num_channels",
            Self::CodecId => "music_offload_codec_id",
            Self::BlockAlign => "music_offload_block_align",
            Self::SampleRate => "music_offload_sample_rate",
            Self::EncodeOption => "music_offload_encode_option",
            Self::DownSampling => "music_offload_down_sampling",
        }
    }

    pub fn from_str(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl std::fmt::Display for CodecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-negotiated codec parameters
///
/// Zero means "not supplied"; consumers fall back to their own defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecInformation {
    pub format: i32,
    pub num_channels: i32,
    pub sample_rate: i32,
    pub bits_per_sample: i32,
    pub avg_bit_rate: i32,
    pub stream_number: i32,
    pub encrypted_content_flag: i32,
    pub codec_id: i32,
    pub block_align: i32,
    pub encode_option: i32,
    pub down_sampling: i32,
}

impl CodecInformation {
    pub fn set(&mut self, key: CodecKey, value: i32) {
        match key {
            CodecKey::BitsPerSample => self.bits_per_sample = value,
            CodecKey::AvgBitRate => self.avg_bit_rate = value,
            CodecKey::NumChannels => self.num_channels = value,
            CodecKey::CodecId => self.codec_id = value,
            CodecKey::BlockAlign => self.block_align = value,
            CodecKey::SampleRate => self.sample_rate = value,
            CodecKey::EncodeOption => self.encode_option = value,
            CodecKey::DownSampling => self.down_sampling = value,
        }
    }

    pub fn get(&self, key: CodecKey) -> i32 {
        match key {
            CodecKey::BitsPerSample => self.bits_per_sample,
            CodecKey::AvgBitRate => self.avg_bit_rate,
            CodecKey::NumChannels => self.num_channels,
            CodecKey::CodecId => self.codec_id,
            CodecKey::BlockAlign => self.block_align,
            CodecKey::SampleRate => self.sample_rate,
            CodecKey::EncodeOption => self.encode_option,
            CodecKey::DownSampling => self.down_sampling,
        }
    }

    /// Average bit rate, or `fallback` when never negotiated
    pub fn bit_rate_or(&self, fallback: u32) -> u32 {
        u32::try_from(self.avg_bit_rate)
            .ok()
            .filter(|rate| *rate > 0)
            .unwrap_or(fallback)
    }
}

/// Device-scoped, thread-safe holder of [`CodecInformation`]
#[derive(Debug, Default)]
pub struct CodecStore {
    info: Mutex<CodecInformation>,
}

impl CodecStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(info: CodecInformation) -> Self {
        Self {
            info: Mutex::new(info),
        }
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> CodecInformation {
        *self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut CodecInformation) -> R) -> R {
        let mut info = self.info.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut info)
    }

    /// Apply every recognised key in `params` that is listed in `accepted`
    ///
    /// Unknown keys are left for other consumers. A value that does not parse
    /// as an integer is skipped with a warning. Returns the keys applied.
    pub fn apply(&self, params: &KeyValueParams, accepted: &[CodecKey]) -> Vec<CodecKey> {
        let mut applied = Vec::new();
        let mut info = self.info.lock().unwrap_or_else(PoisonError::into_inner);

        for key in accepted {
            let value = match params.get_int(key.as_str()) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "ignoring codec parameter");
                    continue;
                }
            };
            let Ok(value) = i32::try_from(value) else {
                warn!(key = %key, value, "codec parameter out of range");
                continue;
            };
            info.set(*key, value);
            debug!(key = %key, value, "codec parameter updated");
            applied.push(*key);
        }

        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_round_trip() {
        for key in CodecKey::ALL {
            assert_eq!(CodecKey::from_str(key.as_str()), Some(key));
        }
        assert_eq!(CodecKey::from_str("routing"), None);
    }

    #[test]
    fn apply_stream_level_keys() {
        let store = CodecStore::new();
        let params = KeyValueParams::parse(
            "music_offload_avg_bit_rate=96000;music_offload_block_align=4;routing=2",
        );

        let applied = store.apply(&params, &CodecKey::ALL);
        assert_eq!(applied, vec![CodecKey::AvgBitRate, CodecKey::BlockAlign]);

        let info = store.snapshot();
        assert_eq!(info.avg_bit_rate, 96_000);
        assert_eq!(info.block_align, 4);
        assert_eq!(info.sample_rate, 0);
    }

    #[test]
    fn device_level_ignores_wma_keys() {
        let store = CodecStore::new();
        let params = KeyValueParams::parse(
            "music_offload_sample_rate=44100;music_offload_encode_option=9",
        );

        store.apply(&params, &CodecKey::DEVICE_LEVEL);

        let info = store.snapshot();
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.encode_option, 0);
    }

    #[test]
    fn malformed_value_is_skipped() {
        let store = CodecStore::new();
        let params = KeyValueParams::parse(
            "music_offload_avg_bit_rate=loud;music_offload_num_channels=2",
        );

        let applied = store.apply(&params, &CodecKey::ALL);
        assert_eq!(applied, vec![CodecKey::NumChannels]);
        assert_eq!(store.snapshot().avg_bit_rate, 0);
    }

    #[test]
    fn bit_rate_fallback() {
        let mut info = CodecInformation::default();
        assert_eq!(info.bit_rate_or(128_000), 128_000);
        info.avg_bit_rate = -5;
        assert_eq!(info.bit_rate_or(128_000), 128_000);
        info.avg_bit_rate = 320_000;
        assert_eq!(info.bit_rate_or(128_000), 320_000);
    }
}
