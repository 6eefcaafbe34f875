//! DSP effect runtime seam
//!
//! The equalizer never renders audio itself: once its session is offloaded it
//! creates an effect instance inside the DSP effect runtime and pushes
//! parameter blocks to it. Blocks are `[type u16][len u16][payload]`,
//! little-endian.

use crate::error::DspError;
use crate::presets::NUM_BANDS;
use uuid::Uuid;

pub type DspResult<T> = std::result::Result<T, DspError>;

/// Size of the `type`/`len` block header
pub const DSP_HEADER_SIZE: usize = 4;

/// Parameter type ids understood by the DSP equalizer
pub mod param_type {
    pub const EQ_ENABLE: u16 = 1;
    pub const EQ_BANDGAINS: u16 = 5;
}

/// Where in the DSP chain an effect instance is inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectPosition {
    #[default]
    Any,
    First,
    Last,
}

impl EffectPosition {
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Any => 0,
            Self::First => 1,
            Self::Last => 2,
        }
    }
}

/// Which DSP stream and device an effect instance attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectPlacement {
    pub position: EffectPosition,
    pub stream: u32,
    pub device: u32,
}

/// A parameter block sent to a DSP effect instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DspCommand {
    Enable(bool),
    /// Whole-dB gain per band
    BandGains([i32; NUM_BANDS]),
}

impl DspCommand {
    pub fn param_type(&self) -> u16 {
        match self {
            Self::Enable(_) => param_type::EQ_ENABLE,
            Self::BandGains(_) => param_type::EQ_BANDGAINS,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            Self::Enable(on) => u32::from(*on).to_le_bytes().to_vec(),
            Self::BandGains(gains) => gains.iter().flat_map(|g| g.to_le_bytes()).collect(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut out = Vec::with_capacity(DSP_HEADER_SIZE + payload.len());
        out.extend_from_slice(&self.param_type().to_le_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    pub fn decode(block: &[u8]) -> DspResult<Self> {
        if block.len() < DSP_HEADER_SIZE {
            return Err(DspError::Malformed(format!(
                "{} byte block has no header",
                block.len()
            )));
        }
        let kind = u16::from_le_bytes([block[0], block[1]]);
        let len = usize::from(u16::from_le_bytes([block[2], block[3]]));
        let payload = &block[DSP_HEADER_SIZE..];
        if payload.len() != len {
            return Err(DspError::Malformed(format!(
                "declared {len} payload bytes, carried {}",
                payload.len()
            )));
        }

        let words: Vec<[u8; 4]> = payload
            .chunks_exact(4)
            .map(|w| [w[0], w[1], w[2], w[3]])
            .collect();
        match (kind, words.as_slice()) {
            (param_type::EQ_ENABLE, [flag]) if len == 4 => {
                Ok(Self::Enable(u32::from_le_bytes(*flag) != 0))
            }
            (param_type::EQ_BANDGAINS, words) if len == 4 * NUM_BANDS => {
                let mut gains = [0i32; NUM_BANDS];
                for (gain, word) in gains.iter_mut().zip(words) {
                    *gain = i32::from_le_bytes(*word);
                }
                Ok(Self::BandGains(gains))
            }
            _ => Err(DspError::Malformed(format!(
                "unexpected type {kind} with {len} byte payload"
            ))),
        }
    }
}

/// Entry point of a DSP effect runtime
#[cfg_attr(test, mockall::automock)]
pub trait DspBackend: Send + Sync {
    /// Bring up the runtime on the named sound card
    fn init_runtime(&self, card_name: &str) -> DspResult<Box<dyn DspRuntime>>;
}

/// An initialized runtime able to host effect instances
#[cfg_attr(test, mockall::automock)]
pub trait DspRuntime: Send {
    fn create_effect(
        &mut self,
        uuid: &Uuid,
        placement: EffectPlacement,
    ) -> DspResult<Box<dyn DspEffect>>;
}

/// One effect instance inside the DSP chain
#[cfg_attr(test, mockall::automock)]
pub trait DspEffect: Send {
    /// Push one encoded parameter block
    fn set_params(&mut self, block: &[u8]) -> DspResult<()>;

    fn destroy(&mut self) -> DspResult<()>;
}
