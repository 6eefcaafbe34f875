//! Five-band equalizer effect
//!
//! Holds the preset and per-band gains for one audio session. Rendering
//! happens in the DSP: while the session is offloaded the equalizer owns a DSP
//! effect instance and pushes the full gain vector to it after every
//! successful change. A failed push is reported but never rolls the change
//! back.

use crate::dsp::{DspBackend, DspCommand, DspEffect, DspRuntime};
use crate::error::{EffectError, Result};
use crate::params::{read_i16, EqParam, PROPERTIES_SIZE};
use crate::presets::{
    band_for_frequency, millibels_to_db, Preset, BAND_FREQ_RANGES_MHZ, CENTER_FREQUENCIES_HZ,
    DEFAULT_PRESET, LEVEL_RANGE_MB, NUM_BANDS, NUM_PRESETS, PRESET_CUSTOM,
};
use crate::settings::EffectSettings;
use serde::Serialize;
use soul_core::{IoHandle, SessionId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct EqState {
    enabled: bool,
    /// Preset index, or `PRESET_CUSTOM` after a per-band edit
    preset: i32,
    /// Whole dB per band
    gains: [i32; NUM_BANDS],
    /// Last configuration block accepted by `SET_CONFIG`
    config: Option<Vec<u8>>,
    offload_io: Option<IoHandle>,
    // Field order matters: the effect instance drops before its runtime
    dsp_effect: Option<Box<dyn DspEffect>>,
    runtime: Option<Box<dyn DspRuntime>>,
}

impl Default for EqState {
    fn default() -> Self {
        Self {
            enabled: false,
            preset: DEFAULT_PRESET.index(),
            gains: DEFAULT_PRESET.gains(),
            config: None,
            offload_io: None,
            dsp_effect: None,
            runtime: None,
        }
    }
}

impl EqState {
    /// Send `command` to the DSP effect, if one exists
    fn push(&mut self, command: DspCommand) -> Result<()> {
        let Some(effect) = self.dsp_effect.as_mut() else {
            return Ok(());
        };
        if let Err(e) = effect.set_params(&command.encode()) {
            warn!(?command, error = %e, "DSP parameter push failed");
            return Err(e.into());
        }
        debug!(?command, "pushed to DSP");
        Ok(())
    }

    fn push_gains(&mut self) -> Result<()> {
        self.push(DspCommand::BandGains(self.gains))
    }

    fn apply_preset(&mut self, index: i32) -> Result<()> {
        let preset = Preset::from_index(index).ok_or(EffectError::InvalidPreset(index))?;
        self.preset = index;
        self.gains = preset.gains();
        debug!(preset = preset.name(), "preset selected");
        self.push_gains()
    }

    fn apply_band_levels(&mut self, levels: &[(usize, i16)]) -> Result<()> {
        let (min, max) = LEVEL_RANGE_MB;
        for &(band, millibels) in levels {
            self.gains[band] = millibels_to_db(millibels.clamp(min, max));
        }
        self.preset = PRESET_CUSTOM;
        debug!(gains = ?self.gains, "band levels set");
        self.push_gains()
    }

    fn band_level_mb(&self, band: usize) -> i16 {
        (self.gains[band] * 100) as i16
    }
}

fn check_band(band: i32) -> Result<usize> {
    usize::try_from(band)
        .ok()
        .filter(|&b| b < NUM_BANDS)
        .ok_or(EffectError::InvalidBand(band))
}

fn put_i16(out: &mut [u8], index: usize, value: i16) {
    out[index * 2..index * 2 + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut [u8], index: usize, value: u32) {
    out[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

/// Point-in-time view of an equalizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EqualizerStatus {
    pub session: i32,
    pub enabled: bool,
    pub preset: i32,
    pub preset_name: Option<&'static str>,
    pub gains_db: [i32; NUM_BANDS],
    pub offloaded: bool,
    /// Output thread reported with the last offload notification
    pub offload_io: Option<i32>,
}

/// Equalizer instance bound to one audio session
pub struct EqualizerEffect {
    uuid: Uuid,
    session: SessionId,
    io: IoHandle,
    backend: Arc<dyn DspBackend>,
    settings: Arc<EffectSettings>,
    state: Mutex<EqState>,
}

impl std::fmt::Debug for EqualizerEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EqualizerEffect")
            .field("uuid", &self.uuid)
            .field("session", &self.session)
            .field("io", &self.io)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl EqualizerEffect {
    /// Create a disabled equalizer on the Flat preset
    ///
    /// Nothing is created in the DSP until the session is reported offloaded.
    pub fn new(
        uuid: Uuid,
        session: SessionId,
        io: IoHandle,
        backend: Arc<dyn DspBackend>,
        settings: Arc<EffectSettings>,
    ) -> Self {
        Self {
            uuid,
            session,
            io,
            backend,
            settings,
            state: Mutex::new(EqState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EqState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn io(&self) -> IoHandle {
        self.io
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Enable or disable; forwarded to the DSP effect when one exists
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut state = self.lock();
        state.enabled = enabled;
        info!(session = %self.session, enabled, "equalizer state");
        state.push(DspCommand::Enable(enabled))
    }

    /// Current preset index, or `PRESET_CUSTOM`
    pub fn current_preset(&self) -> i32 {
        self.lock().preset
    }

    pub fn set_preset(&self, index: i32) -> Result<()> {
        self.lock().apply_preset(index)
    }

    pub fn band_gains(&self) -> [i32; NUM_BANDS] {
        self.lock().gains
    }

    pub fn band_level(&self, band: i32) -> Result<i16> {
        let band = check_band(band)?;
        Ok(self.lock().band_level_mb(band))
    }

    /// Set one band from a millibel level; the preset becomes custom
    ///
    /// Levels outside [`LEVEL_RANGE_MB`] are clamped to it.
    pub fn set_band_level(&self, band: i32, millibels: i16) -> Result<()> {
        let band = check_band(band)?;
        self.lock().apply_band_levels(&[(band, millibels)])
    }

    /// Center frequency in mHz
    pub fn center_frequency(&self, band: i32) -> Result<u32> {
        let band = check_band(band)?;
        Ok(CENTER_FREQUENCIES_HZ[band] * 1000)
    }

    /// Frequency range of `band` in mHz
    pub fn band_freq_range(&self, band: i32) -> Result<(u32, u32)> {
        let band = check_band(band)?;
        Ok(BAND_FREQ_RANGES_MHZ[band])
    }

    pub fn band_for_frequency(&self, freq_mhz: u32) -> u16 {
        band_for_frequency(freq_mhz) as u16
    }

    /// Whether a DSP effect instance currently exists
    pub fn is_offloaded(&self) -> bool {
        self.lock().dsp_effect.is_some()
    }

    pub fn status(&self) -> EqualizerStatus {
        let state = self.lock();
        EqualizerStatus {
            session: self.session.0,
            enabled: state.enabled,
            preset: state.preset,
            preset_name: Preset::from_index(state.preset).map(|p| p.name()),
            gains_db: state.gains,
            offloaded: state.dsp_effect.is_some(),
            offload_io: state.offload_io.map(|io| io.0),
        }
    }

    pub(crate) fn set_config(&self, config: &[u8]) {
        self.lock().config = Some(config.to_vec());
    }

    pub(crate) fn config(&self) -> Option<Vec<u8>> {
        self.lock().config.clone()
    }

    /// React to the session moving onto or off the offload path
    ///
    /// Onto: bring up the DSP runtime if needed, create the effect instance if
    /// absent and push the current gains. Off: destroy the instance; if that
    /// fails the instance is kept and the error returned.
    pub fn set_offloaded(&self, offloaded: bool, io: IoHandle) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;

        if !offloaded {
            if let Some(mut effect) = state.dsp_effect.take() {
                if let Err(e) = effect.destroy() {
                    warn!(session = %self.session, error = %e, "DSP effect destroy failed");
                    state.dsp_effect = Some(effect);
                    return Err(e.into());
                }
                info!(session = %self.session, %io, "DSP equalizer destroyed");
            }
            state.offload_io = None;
            return Ok(());
        }

        state.offload_io = Some(io);
        if state.dsp_effect.is_none() {
            let runtime = match state.runtime.take() {
                Some(runtime) => runtime,
                None => self
                    .backend
                    .init_runtime(&self.settings.card_name)
                    .map_err(|e| {
                        warn!(card = %self.settings.card_name, error = %e, "DSP runtime init failed");
                        e
                    })?,
            };
            let runtime = state.runtime.insert(runtime);
            let effect = runtime
                .create_effect(&self.uuid, self.settings.placement())
                .map_err(|e| {
                    warn!(error = %e, "DSP effect create failed");
                    e
                })?;
            state.dsp_effect = Some(effect);
            info!(
                session = %self.session,
                %io,
                stream = self.settings.compress_device,
                "DSP equalizer created"
            );
        }
        state.push_gains()
    }

    /// Destroy any DSP effect instance ahead of dropping the equalizer
    pub fn release(self) -> Result<()> {
        let effect = self.lock().dsp_effect.take();
        if let Some(mut effect) = effect {
            effect.destroy()?;
            info!(session = %self.session, "DSP equalizer released");
        }
        Ok(())
    }

    /// Read one parameter into `value`, returning the bytes written
    ///
    /// `value` is validated against the parameter's size before anything is
    /// written.
    pub fn get_parameter(&self, param: &[u8], value: &mut [u8]) -> Result<usize> {
        let param = EqParam::decode(param)?;
        let needed = param.value_size().unwrap_or(1);
        if value.len() < needed {
            return Err(EffectError::ValueTooSmall {
                needed,
                actual: value.len(),
            });
        }

        let state = self.lock();
        match param {
            EqParam::NumBands => {
                put_i16(value, 0, NUM_BANDS as i16);
                Ok(2)
            }
            EqParam::LevelRange => {
                put_i16(value, 0, LEVEL_RANGE_MB.0);
                put_i16(value, 1, LEVEL_RANGE_MB.1);
                Ok(4)
            }
            EqParam::BandLevel(band) => {
                let level = state.band_level_mb(check_band(band)?);
                put_i16(value, 0, level);
                Ok(2)
            }
            EqParam::CenterFreq(band) => {
                put_u32(value, 0, self.center_frequency(band)?);
                Ok(4)
            }
            EqParam::BandFreqRange(band) => {
                let (min, max) = self.band_freq_range(band)?;
                put_u32(value, 0, min);
                put_u32(value, 1, max);
                Ok(8)
            }
            EqParam::GetBand(freq) => {
                let band = self.band_for_frequency(freq);
                value[..2].copy_from_slice(&band.to_le_bytes());
                Ok(2)
            }
            EqParam::CurPreset => {
                put_i16(value, 0, state.preset as i16);
                Ok(2)
            }
            EqParam::NumPresets => {
                put_i16(value, 0, NUM_PRESETS as i16);
                Ok(2)
            }
            EqParam::PresetName(index) => {
                let preset = Preset::from_index(index).ok_or(EffectError::InvalidPreset(index))?;
                let name = preset.name().as_bytes();
                let len = name.len().min(value.len() - 1);
                value[..len].copy_from_slice(&name[..len]);
                value[len] = 0;
                Ok(len + 1)
            }
            EqParam::Properties => {
                put_i16(value, 0, state.preset as i16);
                put_i16(value, 1, NUM_BANDS as i16);
                for band in 0..NUM_BANDS {
                    put_i16(value, 2 + band, state.band_level_mb(band));
                }
                Ok(PROPERTIES_SIZE)
            }
        }
    }

    /// Apply one settable parameter
    pub fn set_parameter(&self, param: &[u8], value: &[u8]) -> Result<()> {
        match EqParam::decode(param)? {
            EqParam::CurPreset => {
                let preset = read_i16(value, 0)? as u16;
                self.set_preset(i32::from(preset))
            }
            EqParam::BandLevel(band) => self.set_band_level(band, read_i16(value, 0)?),
            EqParam::Properties => {
                let preset = i32::from(read_i16(value, 0)?);
                if preset >= NUM_PRESETS as i32 {
                    return Err(EffectError::InvalidPreset(preset));
                }
                if preset >= 0 {
                    return self.set_preset(preset);
                }

                let bands = i32::from(read_i16(value, 2)?);
                if bands != NUM_BANDS as i32 {
                    return Err(EffectError::BandCountMismatch(bands));
                }
                let mut levels = [(0usize, 0i16); NUM_BANDS];
                for (band, level) in levels.iter_mut().enumerate() {
                    *level = (band, read_i16(value, 4 + band * 2)?);
                }
                self.lock().apply_band_levels(&levels)
            }
            other => Err(EffectError::UnknownParameter(other.id())),
        }
    }
}

impl Drop for EqualizerEffect {
    fn drop(&mut self) {
        if let Some(mut effect) = self.lock().dsp_effect.take() {
            if let Err(e) = effect.destroy() {
                warn!(session = %self.session, error = %e, "DSP effect leaked on drop");
            }
        }
    }
}
