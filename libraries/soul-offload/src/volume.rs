//! Hardware volume control
//!
//! Linear gain from the framework is converted into the attenuation code the
//! post-processing volume algorithm expects: whole decibels in [-96, 0] as a
//! two's-complement byte, with -96 dB (0xA0) meaning mute.

use crate::error::{OffloadError, Result};
use crate::hardware::{AlgoRequest, ControlDevice};
use tracing::{debug, warn};

/// Post-processing algorithm id of the codec volume control
pub const VOLUME_ALGO_ID: u8 = 0x67;
pub const VOLUME_PARAM_TYPE: u32 = 0x602;
pub const VOLUME_PARAM_SIZE: usize = 1;

/// Attenuation in whole dB, always within [-96, 0]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttenuationCode(i8);

impl AttenuationCode {
    pub const MUTE: Self = Self(-96);
    pub const UNITY: Self = Self(0);

    /// Convert a linear gain in [0.0, 1.0]
    ///
    /// 0.0 maps to [`Self::MUTE`]; anything else to `20·log10(gain)` truncated
    /// toward zero and clamped.
    pub fn from_gain(gain: f32) -> Result<Self> {
        let gain = validate_gain(gain)?;
        if gain == 0.0 {
            return Ok(Self::MUTE);
        }
        let db = (20.0 * gain.log10()).trunc() as i32;
        Ok(Self::from_db(db))
    }

    pub fn from_db(db: i32) -> Self {
        Self(db.clamp(i32::from(Self::MUTE.0), 0) as i8)
    }

    pub fn from_byte(byte: u8) -> Self {
        Self::from_db(i32::from(byte as i8))
    }

    pub fn db(self) -> i8 {
        self.0
    }

    /// Two's-complement byte written to the hardware
    pub fn to_byte(self) -> u8 {
        self.0 as u8
    }

    pub fn is_mute(self) -> bool {
        self == Self::MUTE
    }
}

/// Reject gains outside [0.0, 1.0] (NaN included)
pub fn validate_gain(gain: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&gain) {
        Ok(gain)
    } else {
        Err(OffloadError::InvalidVolume(gain))
    }
}

fn volume_request(stream_id: u8, payload: Vec<u8>) -> AlgoRequest {
    AlgoRequest {
        algo_id: VOLUME_ALGO_ID,
        stream_id,
        enable: true,
        param_type: VOLUME_PARAM_TYPE,
        payload,
    }
}

/// Read the code currently applied on the control device
pub fn read_attenuation(control: &mut dyn ControlDevice, stream_id: u8) -> Result<AttenuationCode> {
    let reply = control
        .get_algo(&volume_request(stream_id, vec![0; VOLUME_PARAM_SIZE]))
        .map_err(OffloadError::Control)?;
    match reply.first() {
        Some(byte) => Ok(AttenuationCode::from_byte(*byte)),
        None => Err(OffloadError::Control(
            crate::hardware::HardwareError::rejected("get volume", "empty reply"),
        )),
    }
}

/// Apply `code`, skipping the write when the device already holds it
///
/// Returns whether a write was issued. A failed read-back is logged and
/// followed by an unconditional write.
pub fn apply_attenuation(
    control: &mut dyn ControlDevice,
    stream_id: u8,
    code: AttenuationCode,
) -> Result<bool> {
    match read_attenuation(control, stream_id) {
        Ok(current) if current == code => {
            debug!(db = code.db(), "volume unchanged, skipping write");
            return Ok(false);
        }
        Ok(current) => debug!(from = current.db(), to = code.db(), "updating volume"),
        Err(e) => warn!(error = %e, "volume read-back failed"),
    }

    control
        .set_algo(&volume_request(stream_id, vec![code.to_byte()]))
        .map_err(OffloadError::Control)?;
    Ok(true)
}

/// Volume bookkeeping held by a stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    pub gain: f32,
    /// Set while a change waits for the control device to open
    pub pending: bool,
    pub muted: bool,
}

impl Default for VolumeState {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pending: false,
            muted: false,
        }
    }
}
