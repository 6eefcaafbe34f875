//! Offload audio device
//!
//! Owns the single compressed-offload output. At most one stream is open at a
//! time; the reference count and the active stream live behind the device
//! mutex, which is held across the eager hardware open of a new stream.

use crate::buffer::offload_buffer_size;
use crate::codec::{CodecKey, CodecStore};
use crate::error::{OffloadError, Result};
use crate::hardware::OffloadHardware;
use crate::settings::OffloadSettings;
use crate::stream::{OffloadStream, StreamConfig};
use soul_core::{AudioFormat, ChannelMask, IoHandle, KeyValueParams, OutputDevices, OutputFlags};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Fixed capture buffer size reported to the framework
pub const INPUT_BUFFER_SIZE: usize = 320;

#[derive(Debug, Default)]
struct DeviceInner {
    initialized: bool,
    /// Last negotiated transfer buffer size, 0 until negotiated
    buffer_size: usize,
    ref_count: u32,
    active: Option<Arc<OffloadStream>>,
}

/// The compressed-offload output device
pub struct OffloadDevice {
    hardware: Arc<dyn OffloadHardware>,
    settings: Arc<OffloadSettings>,
    codec: Arc<CodecStore>,
    inner: Mutex<DeviceInner>,
}

impl std::fmt::Debug for OffloadDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadDevice")
            .field("settings", &self.settings)
            .field("inner", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl OffloadDevice {
    pub fn new(
        hardware: Arc<dyn OffloadHardware>,
        settings: OffloadSettings,
        codec: Arc<CodecStore>,
    ) -> Self {
        Self {
            hardware,
            settings: Arc::new(settings),
            codec,
            inner: Mutex::new(DeviceInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the device usable; streams cannot open before this
    pub fn init_check(&self) -> Result<()> {
        self.lock().initialized = true;
        info!(card = %self.settings.card_name, "offload device initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn settings(&self) -> &OffloadSettings {
        &self.settings
    }

    pub fn codec_store(&self) -> &Arc<CodecStore> {
        &self.codec
    }

    /// Output routes the offload path can drive
    pub fn supported_devices(&self) -> OutputDevices {
        OutputDevices::SPEAKER | OutputDevices::WIRED_HEADSET | OutputDevices::WIRED_HEADPHONE
    }

    /// Whether a stream of `format` could be offloaded right now
    pub fn is_offload_supported(&self, format: AudioFormat) -> bool {
        if !self.is_initialized() {
            warn!("offload queried before init_check");
            return false;
        }
        let supported = format.is_offloadable();
        if !supported {
            debug!(%format, "format not offloadable");
        }
        supported
    }

    /// Open the offload stream and claim the hardware
    ///
    /// The session is opened eagerly; on failure no stream is created.
    pub fn open_output_stream(
        &self,
        handle: IoHandle,
        devices: OutputDevices,
        flags: OutputFlags,
        config: &StreamConfig,
    ) -> Result<Arc<OffloadStream>> {
        if !flags.contains(OutputFlags::COMPRESS_OFFLOAD) {
            debug!(flags = flags.0, "not an offload stream");
            return Err(OffloadError::NotOffloadStream(flags.0));
        }

        let mut inner = self.lock();
        if !inner.initialized {
            return Err(OffloadError::NotInitialized);
        }
        if inner.ref_count >= 1 {
            warn!(%handle, "offload stream already open");
            return Err(OffloadError::DeviceBusy);
        }
        if !config.format.is_offloadable() {
            return Err(OffloadError::UnsupportedFormat(config.format));
        }

        let buffer_size = match inner.buffer_size {
            0 => self.settings.default_buffer_size,
            negotiated => negotiated,
        };
        let stream = Arc::new(OffloadStream::new(
            handle,
            *config,
            buffer_size,
            Arc::clone(&self.hardware),
            Arc::clone(&self.settings),
            Arc::clone(&self.codec),
        ));
        stream.open()?;

        inner.ref_count = 1;
        inner.active = Some(Arc::clone(&stream));
        info!(
            %handle,
            requested_devices = devices.bits(),
            format = %config.format,
            buffer_size,
            "offload stream opened"
        );
        Ok(stream)
    }

    /// Close `stream` and release the device for the next open
    pub fn close_output_stream(&self, stream: &Arc<OffloadStream>) -> Result<()> {
        let mut inner = self.lock();
        match &inner.active {
            Some(active) if Arc::ptr_eq(active, stream) => {}
            _ => return Err(OffloadError::UnknownStream),
        }
        stream.release();
        inner.active = None;
        inner.ref_count = 0;
        info!(handle = %stream.handle(), "offload stream closed");
        Ok(())
    }

    pub fn active_stream(&self) -> Option<Arc<OffloadStream>> {
        self.lock().active.clone()
    }

    pub fn open_stream_count(&self) -> u32 {
        self.lock().ref_count
    }

    /// Device-level codec hints: average bit rate, sample rate, channel count
    pub fn set_parameters(&self, kvpairs: &str) -> Result<()> {
        let params = KeyValueParams::parse(kvpairs);
        let applied = self.codec.apply(&params, &CodecKey::DEVICE_LEVEL);
        debug!(?applied, "device parameters");
        Ok(())
    }

    /// No device-level values are reported
    pub fn get_parameters(&self, _keys: &str) -> String {
        String::new()
    }

    /// Negotiate the transfer buffer size for an upcoming stream
    ///
    /// Also records the stream's bit rate, sample rate and channel count in
    /// the codec store for the next session open.
    pub fn offload_buffer_size(
        &self,
        bit_rate: u32,
        sample_rate: u32,
        channel_mask: ChannelMask,
    ) -> usize {
        let bit_rate_hint = i32::try_from(bit_rate);
        let sample_rate_hint = i32::try_from(sample_rate);
        self.codec.update(|info| {
            match bit_rate_hint {
                Ok(value) => info.avg_bit_rate = value,
                Err(_) => warn!(bit_rate, "bit rate out of range, hint not stored"),
            }
            match sample_rate_hint {
                Ok(value) => info.sample_rate = value,
                Err(_) => warn!(sample_rate, "sample rate out of range, hint not stored"),
            }
            info.num_channels = channel_mask.channel_count() as i32;
        });

        let size = offload_buffer_size(bit_rate, sample_rate, channel_mask);
        self.lock().buffer_size = size;
        debug!(bit_rate, sample_rate, mask = channel_mask.bits(), size, "buffer size negotiated");
        size
    }

    /// Negotiated buffer size, or the default before negotiation
    pub fn buffer_size(&self) -> usize {
        match self.lock().buffer_size {
            0 => self.settings.default_buffer_size,
            size => size,
        }
    }

    pub fn input_buffer_size(
        &self,
        _sample_rate: u32,
        _format: AudioFormat,
        _channel_count: u32,
    ) -> usize {
        INPUT_BUFFER_SIZE
    }

    pub fn set_voice_volume(&self, _volume: f32) -> Result<()> {
        Err(OffloadError::Unsupported("voice volume"))
    }

    pub fn set_master_volume(&self, _volume: f32) -> Result<()> {
        Err(OffloadError::Unsupported("master volume"))
    }

    /// Audio mode changes need no action on the offload path
    pub fn set_mode(&self, mode: i32) -> Result<()> {
        debug!(mode, "audio mode change");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHardware;
    use soul_core::SampleRate;

    fn device(sim: &SimulatedHardware) -> OffloadDevice {
        OffloadDevice::new(
            Arc::new(sim.clone()),
            OffloadSettings::default(),
            Arc::new(CodecStore::new()),
        )
    }

    fn mp3() -> StreamConfig {
        StreamConfig::new(AudioFormat::Mp3, SampleRate::CD_QUALITY, ChannelMask::STEREO)
    }

    #[test]
    fn test_offload_support_needs_init() {
        let sim = SimulatedHardware::new();
        let dev = device(&sim);
        assert!(!dev.is_offload_supported(AudioFormat::Mp3));

        dev.init_check().unwrap();
        assert!(dev.is_offload_supported(AudioFormat::Mp3));
        assert!(dev.is_offload_supported(AudioFormat::Aac));
        assert!(!dev.is_offload_supported(AudioFormat::Pcm16));
    }

    #[test]
    fn test_open_before_init_is_not_ready() {
        let sim = SimulatedHardware::new();
        let dev = device(&sim);
        let err = dev
            .open_output_stream(
                IoHandle(1),
                OutputDevices::SPEAKER,
                OutputFlags::COMPRESS_OFFLOAD,
                &mp3(),
            )
            .unwrap_err();
        assert!(matches!(err, OffloadError::NotInitialized));
    }

    #[test]
    fn test_non_offload_flags_rejected() {
        let sim = SimulatedHardware::new();
        let dev = device(&sim);
        dev.init_check().unwrap();
        let err = dev
            .open_output_stream(IoHandle(1), OutputDevices::SPEAKER, OutputFlags::DIRECT, &mp3())
            .unwrap_err();
        assert!(matches!(err, OffloadError::NotOffloadStream(0x1)));
        assert_eq!(sim.live_handles(), (0, 0, 0));
    }

    #[test]
    fn test_pcm_format_rejected() {
        let sim = SimulatedHardware::new();
        let dev = device(&sim);
        dev.init_check().unwrap();
        let config = StreamConfig::new(AudioFormat::Pcm16, SampleRate::CD_QUALITY, ChannelMask::STEREO);
        let err = dev
            .open_output_stream(
                IoHandle(1),
                OutputDevices::SPEAKER,
                OutputFlags::COMPRESS_OFFLOAD,
                &config,
            )
            .unwrap_err();
        assert!(matches!(err, OffloadError::UnsupportedFormat(AudioFormat::Pcm16)));
    }

    #[test]
    fn test_buffer_size_negotiation_updates_store() {
        let sim = SimulatedHardware::new();
        let dev = device(&sim);
        assert_eq!(dev.buffer_size(), 64 * 1024);

        assert_eq!(dev.offload_buffer_size(128_000, 44_100, ChannelMask::STEREO), 65_536);
        assert_eq!(dev.offload_buffer_size(0, 48_000, ChannelMask::STEREO), 32_768);
        assert_eq!(dev.buffer_size(), 32_768);

        let info = dev.codec_store().snapshot();
        assert_eq!(info.avg_bit_rate, 0);
        assert_eq!(info.sample_rate, 48_000);
        assert_eq!(info.num_channels, 2);
    }

    #[test]
    fn test_out_of_range_hints_not_stored() {
        let sim = SimulatedHardware::new();
        let dev = device(&sim);
        dev.offload_buffer_size(128_000, 44_100, ChannelMask::STEREO);

        dev.offload_buffer_size(u32::MAX, u32::MAX, ChannelMask::MONO);
        let info = dev.codec_store().snapshot();
        assert_eq!(info.avg_bit_rate, 128_000);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.num_channels, 1);
    }

    #[test]
    fn test_fixed_answers() {
        let sim = SimulatedHardware::new();
        let dev = device(&sim);
        assert_eq!(dev.input_buffer_size(8_000, AudioFormat::Pcm16, 1), 320);
        assert_eq!(dev.supported_devices().bits(), 0xE);
        assert!(matches!(
            dev.set_voice_volume(0.5),
            Err(OffloadError::Unsupported("voice volume"))
        ));
        assert!(dev.set_master_volume(0.5).is_err());
        assert!(dev.set_mode(2).is_ok());
        assert_eq!(dev.get_parameters("routing"), "");
    }
}
