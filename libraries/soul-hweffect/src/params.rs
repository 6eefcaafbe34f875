//! Parameter encoding for the equalizer
//!
//! The framework addresses equalizer parameters with a little-endian `i32`
//! parameter id, optionally followed by one `i32`/`u32` argument (band index,
//! frequency, preset index). Command payloads wrap these in a parameter block:
//!
//! ```text
//! [status i32][psize u32][vsize u32][param: psize bytes, padded to 4][value: vsize bytes]
//! ```

use crate::error::{EffectError, Result};

/// Size of the `status`/`psize`/`vsize` header
pub const PARAM_HEADER_SIZE: usize = 12;

/// Wire ids of the equalizer parameters
pub mod id {
    pub const NUM_BANDS: i32 = 0;
    pub const LEVEL_RANGE: i32 = 1;
    pub const BAND_LEVEL: i32 = 2;
    pub const CENTER_FREQ: i32 = 3;
    pub const BAND_FREQ_RANGE: i32 = 4;
    pub const GET_BAND: i32 = 5;
    pub const CUR_PRESET: i32 = 6;
    pub const GET_NUM_OF_PRESETS: i32 = 7;
    pub const GET_PRESET_NAME: i32 = 8;
    pub const PROPERTIES: i32 = 9;
}

/// A decoded equalizer parameter address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqParam {
    NumBands,
    LevelRange,
    BandLevel(i32),
    CenterFreq(i32),
    BandFreqRange(i32),
    /// Band containing a frequency in mHz
    GetBand(u32),
    CurPreset,
    NumPresets,
    PresetName(i32),
    Properties,
}

impl EqParam {
    pub fn id(&self) -> i32 {
        match self {
            Self::NumBands => id::NUM_BANDS,
            Self::LevelRange => id::LEVEL_RANGE,
            Self::BandLevel(_) => id::BAND_LEVEL,
            Self::CenterFreq(_) => id::CENTER_FREQ,
            Self::BandFreqRange(_) => id::BAND_FREQ_RANGE,
            Self::GetBand(_) => id::GET_BAND,
            Self::CurPreset => id::CUR_PRESET,
            Self::NumPresets => id::GET_NUM_OF_PRESETS,
            Self::PresetName(_) => id::GET_PRESET_NAME,
            Self::Properties => id::PROPERTIES,
        }
    }

    /// Decode a parameter address; the argument word is required for
    /// per-band, per-preset and frequency lookups
    pub fn decode(param: &[u8]) -> Result<Self> {
        let param_id = read_i32(param, 0)?;
        let param = match param_id {
            id::NUM_BANDS => Self::NumBands,
            id::LEVEL_RANGE => Self::LevelRange,
            id::BAND_LEVEL => Self::BandLevel(read_i32(param, 4)?),
            id::CENTER_FREQ => Self::CenterFreq(read_i32(param, 4)?),
            id::BAND_FREQ_RANGE => Self::BandFreqRange(read_i32(param, 4)?),
            id::GET_BAND => Self::GetBand(read_u32(param, 4)?),
            id::CUR_PRESET => Self::CurPreset,
            id::GET_NUM_OF_PRESETS => Self::NumPresets,
            id::GET_PRESET_NAME => Self::PresetName(read_i32(param, 4)?),
            id::PROPERTIES => Self::Properties,
            other => return Err(EffectError::UnknownParameter(other)),
        };
        Ok(param)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.id().to_le_bytes().to_vec();
        match *self {
            Self::BandLevel(arg)
            | Self::CenterFreq(arg)
            | Self::BandFreqRange(arg)
            | Self::PresetName(arg) => out.extend_from_slice(&arg.to_le_bytes()),
            Self::GetBand(freq) => out.extend_from_slice(&freq.to_le_bytes()),
            _ => {}
        }
        out
    }

    /// Minimum value buffer size for a get; `None` for variable-length names
    pub fn value_size(&self) -> Option<usize> {
        match self {
            Self::NumBands
            | Self::CurPreset
            | Self::NumPresets
            | Self::BandLevel(_)
            | Self::GetBand(_) => Some(2),
            Self::LevelRange | Self::CenterFreq(_) => Some(4),
            Self::BandFreqRange(_) => Some(8),
            Self::Properties => Some(PROPERTIES_SIZE),
            Self::PresetName(_) => None,
        }
    }
}

/// `[preset i16][band count i16][level i16 x 5]`
pub const PROPERTIES_SIZE: usize = 2 * (2 + crate::presets::NUM_BANDS);

/// Offset of the value within the parameter data, `psize` rounded up to 4
pub fn value_offset(psize: usize) -> usize {
    psize.div_ceil(4) * 4
}

/// A parameter block as carried by the get/set parameter commands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamBlock {
    pub status: i32,
    pub param: Vec<u8>,
    pub value: Vec<u8>,
}

impl ParamBlock {
    pub fn new(param: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            status: 0,
            param,
            value,
        }
    }

    /// Encoded size, header included
    pub fn encoded_len(&self) -> usize {
        PARAM_HEADER_SIZE + value_offset(self.param.len()) + self.value.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&self.status.to_le_bytes());
        out.extend_from_slice(&(self.param.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.param);
        out.resize(PARAM_HEADER_SIZE + value_offset(self.param.len()), 0);
        out.extend_from_slice(&self.value);
        out
    }

    /// Decode a block, taking `psize`/`vsize` from its header
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = ParamHeader::read(bytes)?;
        let voffset = PARAM_HEADER_SIZE + value_offset(header.psize);
        let needed = voffset + header.vsize;
        if bytes.len() < needed {
            return Err(EffectError::ParameterTooShort {
                needed,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            status: header.status,
            param: bytes[PARAM_HEADER_SIZE..PARAM_HEADER_SIZE + header.psize].to_vec(),
            value: bytes[voffset..needed].to_vec(),
        })
    }
}

/// The fixed header of a parameter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamHeader {
    pub status: i32,
    pub psize: usize,
    pub vsize: usize,
}

impl ParamHeader {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            status: read_i32(bytes, 0)?,
            psize: read_u32(bytes, 4)? as usize,
            vsize: read_u32(bytes, 8)? as usize,
        })
    }

    pub fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.status.to_le_bytes());
        out[4..8].copy_from_slice(&(self.psize as u32).to_le_bytes());
        out[8..12].copy_from_slice(&(self.vsize as u32).to_le_bytes());
    }
}

pub(crate) fn read_i32(bytes: &[u8], offset: usize) -> Result<i32> {
    let word = word_at(bytes, offset)?;
    Ok(i32::from_le_bytes(word))
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let word = word_at(bytes, offset)?;
    Ok(u32::from_le_bytes(word))
}

pub(crate) fn read_i16(bytes: &[u8], offset: usize) -> Result<i16> {
    let end = offset + 2;
    let half = bytes
        .get(offset..end)
        .ok_or(EffectError::ParameterTooShort {
            needed: end,
            actual: bytes.len(),
        })?;
    Ok(i16::from_le_bytes([half[0], half[1]]))
}

fn word_at(bytes: &[u8], offset: usize) -> Result<[u8; 4]> {
    let end = offset + 4;
    let word = bytes
        .get(offset..end)
        .ok_or(EffectError::ParameterTooShort {
            needed: end,
            actual: bytes.len(),
        })?;
    Ok([word[0], word[1], word[2], word[3]])
}
