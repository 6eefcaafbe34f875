//! Compressed offload output stream
//!
//! One `OffloadStream` drives one hardware compressed session through
//!
//! ```text
//! Closed -> Ready -> Running <-> Pausing
//!                       ^           |
//!                       +-Resuming--+
//! ```
//!
//! Every operation takes the stream mutex for its whole duration, hardware
//! calls included, so framework threads calling write, pause and set_volume
//! concurrently always observe a consistent state.

use crate::codec::{CodecKey, CodecStore};
use crate::error::{OffloadError, Result};
use crate::hardware::{
    CodecDescriptor, CodecId, CodecProfile, CompressConfig, CompressSession, ControlDevice,
    HardwareError, OffloadHardware, PcmParams, PcmReference, StreamFormat,
};
use crate::settings::OffloadSettings;
use crate::volume::{apply_attenuation, AttenuationCode, VolumeState};
use serde::Serialize;
use soul_core::{AudioFormat, ChannelMask, IoHandle, KeyValueParams, OutputDevices, SampleRate};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Parameter key carrying the output routing
pub const ROUTING_KEY: &str = "routing";

/// Stream lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// No hardware session
    Closed,
    /// Session configured, not started
    Ready,
    /// Started, writes flowing
    Running,
    /// Paused by the framework
    Pausing,
    /// Resume command in flight
    Resuming,
}

impl StreamState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Pausing => "pausing",
            Self::Resuming => "resuming",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Framework-requested stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub format: AudioFormat,
    pub sample_rate: SampleRate,
    pub channel_mask: ChannelMask,
}

impl StreamConfig {
    pub fn new(format: AudioFormat, sample_rate: SampleRate, channel_mask: ChannelMask) -> Self {
        Self {
            format,
            sample_rate,
            channel_mask,
        }
    }
}

/// Point-in-time view of a stream, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamStatus {
    pub state: StreamState,
    pub session_open: bool,
    pub render_offset_ms: u32,
    pub paused_position_ms: u32,
    pub volume: f32,
    pub volume_pending: bool,
    pub muted: bool,
    pub device_output: u32,
}

/// Hardware handles held while the stream is not Closed
struct Session {
    compress: Box<dyn CompressSession>,
    control: Box<dyn ControlDevice>,
    // Held only to keep the audio path claimed.
    _pcm: Box<dyn PcmReference>,
}

struct StreamInner {
    state: StreamState,
    session: Option<Session>,
    render_offset_ms: u32,
    paused_position_ms: u32,
    volume: VolumeState,
    device_output: OutputDevices,
    /// Closed by the device; never reopens
    released: bool,
}

/// A compressed-offload output stream
pub struct OffloadStream {
    handle: IoHandle,
    format: AudioFormat,
    sample_rate: SampleRate,
    channel_mask: ChannelMask,
    buffer_size: usize,
    hardware: Arc<dyn OffloadHardware>,
    settings: Arc<OffloadSettings>,
    codec: Arc<CodecStore>,
    inner: Mutex<StreamInner>,
}

impl std::fmt::Debug for OffloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadStream")
            .field("handle", &self.handle)
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .field("buffer_size", &self.buffer_size)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl OffloadStream {
    /// Create a Closed stream; [`open`](Self::open) claims the hardware
    pub fn new(
        handle: IoHandle,
        config: StreamConfig,
        buffer_size: usize,
        hardware: Arc<dyn OffloadHardware>,
        settings: Arc<OffloadSettings>,
        codec: Arc<CodecStore>,
    ) -> Self {
        Self {
            handle,
            format: config.format,
            sample_rate: config.sample_rate,
            channel_mask: config.channel_mask,
            buffer_size,
            hardware,
            settings,
            codec,
            inner: Mutex::new(StreamInner {
                state: StreamState::Closed,
                session: None,
                render_offset_ms: 0,
                paused_position_ms: 0,
                volume: VolumeState::default(),
                device_output: OutputDevices::SPEAKER,
                released: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle(&self) -> IoHandle {
        self.handle
    }

    pub fn state(&self) -> StreamState {
        self.lock().state
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Configured sample rate, or 48 kHz when the framework left it unset
    pub fn sample_rate(&self) -> SampleRate {
        if self.sample_rate.is_unset() {
            SampleRate::default()
        } else {
            self.sample_rate
        }
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.channel_mask
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn latency_ms(&self) -> u32 {
        self.settings.latency_ms
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume.gain
    }

    pub fn paused_position_ms(&self) -> u32 {
        self.lock().paused_position_ms
    }

    pub fn device_output(&self) -> OutputDevices {
        self.lock().device_output
    }

    /// Whether the device has closed this stream for good
    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    pub fn status(&self) -> StreamStatus {
        let inner = self.lock();
        StreamStatus {
            state: inner.state,
            session_open: inner.session.is_some(),
            render_offset_ms: inner.render_offset_ms,
            paused_position_ms: inner.paused_position_ms,
            volume: inner.volume.gain,
            volume_pending: inner.volume.pending,
            muted: inner.volume.muted,
            device_output: inner.device_output.bits(),
        }
    }

    /// Hardware codec description for the next session
    pub fn codec_descriptor(&self) -> Result<CodecDescriptor> {
        let id =
            CodecId::for_format(self.format).ok_or(OffloadError::UnsupportedFormat(self.format))?;
        let channels = if self.channel_mask.is_stereo() { 2 } else { 1 };
        let bit_rate = self
            .codec
            .snapshot()
            .bit_rate_or(self.settings.default_bit_rate);
        let (profile, format) = match id {
            CodecId::Mp3 => (CodecProfile::Default, StreamFormat::Default),
            CodecId::Aac => (CodecProfile::Aac, StreamFormat::Raw),
        };

        Ok(CodecDescriptor {
            id,
            channels_in: channels,
            channels_out: channels,
            sample_rate: self.sample_rate().as_hz(),
            bit_rate,
            rate_control: 0,
            profile,
            level: 0,
            channel_mode: 0,
            format,
        })
    }

    fn open_session(&self) -> Result<Session> {
        let settings = &self.settings;

        let mut pcm = self
            .hardware
            .open_pcm_reference(&settings.card_name, settings.pcm_device)
            .map_err(OffloadError::Configuration)?;
        pcm.set_params(&PcmParams::default())
            .map_err(OffloadError::Configuration)?;

        let config = CompressConfig {
            fragment_size: self.buffer_size,
            fragments: settings.fragments,
            codec: self.codec_descriptor()?,
        };
        debug!(?config, "opening compressed session");
        let compress = self
            .hardware
            .open_compress(settings.compress_card, settings.compress_device, &config)
            .map_err(OffloadError::Configuration)?;
        if !compress.is_ready() {
            return Err(OffloadError::Configuration(HardwareError::NotReady));
        }

        let control = self
            .hardware
            .open_control(&settings.control_path)
            .map_err(OffloadError::Control)?;

        Ok(Session {
            compress,
            control,
            _pcm: pcm,
        })
    }

    fn open_locked(&self, inner: &mut StreamInner) -> Result<()> {
        if inner.released {
            return Err(OffloadError::StreamReleased);
        }
        if inner.state != StreamState::Closed {
            return Err(OffloadError::InvalidState {
                operation: "open",
                state: inner.state,
            });
        }
        // Handles opened before a failure are dropped on the way out.
        inner.session = Some(self.open_session()?);
        inner.state = StreamState::Ready;
        info!(handle = %self.handle, format = %self.format, "offload session opened");
        Ok(())
    }

    /// Claim the hardware and configure the codec session
    ///
    /// Only legal while Closed and not released.
    pub fn open(&self) -> Result<()> {
        let mut inner = self.lock();
        self.open_locked(&mut inner)
    }

    fn close_locked(&self, inner: &mut StreamInner) {
        if inner.session.take().is_some() {
            // Hardware volume resets with the control device.
            inner.volume.pending = true;
            debug!(handle = %self.handle, "offload session released");
        }
        inner.state = StreamState::Closed;
    }

    /// Release every hardware handle; safe in any state
    pub fn close(&self) {
        let mut inner = self.lock();
        self.close_locked(&mut inner);
    }

    /// Close for good; later writes and opens are refused
    pub(crate) fn release(&self) {
        let mut inner = self.lock();
        self.close_locked(&mut inner);
        inner.released = true;
    }

    /// Release the hardware while keeping the stream usable
    ///
    /// The rendered position is folded into the render offset so positions
    /// keep increasing after the next write reopens the session.
    pub fn standby(&self) {
        let mut inner = self.lock();
        if inner.session.is_none() {
            return;
        }
        match render_position_locked(&mut inner) {
            Ok(position) => inner.render_offset_ms = position,
            Err(e) => warn!(error = %e, "position lost on standby"),
        }
        self.close_locked(&mut inner);
        info!(handle = %self.handle, offset_ms = inner.render_offset_ms, "stream in standby");
    }

    /// Submit encoded bytes, returning how many the hardware accepted
    ///
    /// Transient failures are absorbed and reported as 0 bytes. An empty
    /// write while Running drains the session.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut inner = self.lock();

        if data.is_empty() {
            if inner.state == StreamState::Running {
                if let Some(session) = inner.session.as_mut() {
                    if let Err(e) = session.compress.drain() {
                        warn!(error = %e, "drain on empty write failed");
                    }
                }
            }
            return 0;
        }

        match inner.state {
            StreamState::Closed if inner.released => {
                warn!(handle = %self.handle, bytes = data.len(), "write to released stream");
                0
            }
            StreamState::Closed => {
                if let Err(e) = self.open_locked(&mut inner) {
                    error!(error = %e, "reopening offload session failed");
                    self.close_locked(&mut inner);
                    return 0;
                }
                self.start_locked(&mut inner, data)
            }
            StreamState::Ready => self.start_locked(&mut inner, data),
            StreamState::Running => {
                self.apply_pending_volume(&mut inner);
                submit(&mut inner, data)
            }
            StreamState::Pausing | StreamState::Resuming => {
                warn!(state = %inner.state, bytes = data.len(), "write ignored");
                0
            }
        }
    }

    fn start_locked(&self, inner: &mut StreamInner, data: &[u8]) -> usize {
        self.apply_pending_volume(inner);
        let sent = submit(inner, data);

        let Some(session) = inner.session.as_mut() else {
            return 0;
        };
        if let Err(e) = session.compress.start() {
            error!(error = %e, "compressed session start failed");
            return 0;
        }
        inner.state = StreamState::Running;
        info!(handle = %self.handle, sent, "playback started");
        sent
    }

    fn apply_pending_volume(&self, inner: &mut StreamInner) {
        if inner.volume.pending {
            let gain = inner.volume.gain;
            if let Err(e) = self.set_volume_locked(inner, gain) {
                warn!(error = %e, gain, "deferred volume not applied");
            }
        }
    }

    fn set_volume_locked(&self, inner: &mut StreamInner, gain: f32) -> Result<()> {
        let code = AttenuationCode::from_gain(gain)?;

        let Some(session) = inner.session.as_mut() else {
            inner.volume.gain = gain;
            inner.volume.pending = true;
            debug!(gain, "volume deferred until the device is active");
            return Ok(());
        };

        inner.volume.gain = gain;
        inner.volume.pending = false;
        inner.volume.muted = code.is_mute();
        let written = apply_attenuation(
            session.control.as_mut(),
            self.settings.volume_stream_id,
            code,
        )?;
        debug!(gain, db = code.db(), written, "volume applied");
        Ok(())
    }

    /// Set the stream volume; only the left channel gain is used
    pub fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        if left != right {
            debug!(left, right, "unbalanced volume, using left gain");
        }
        let mut inner = self.lock();
        self.set_volume_locked(&mut inner, left)
    }

    /// Pause a Running stream; any other state is a no-op
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != StreamState::Running {
            debug!(state = %inner.state, "pause ignored");
            return Ok(());
        }

        match render_position_locked(&mut inner) {
            Ok(position) => inner.paused_position_ms = position,
            Err(e) => warn!(error = %e, "position unavailable at pause"),
        }

        let Some(session) = inner.session.as_mut() else {
            return Ok(());
        };
        session.compress.pause().map_err(OffloadError::Command)?;
        inner.state = StreamState::Pausing;
        debug!(paused_at_ms = inner.paused_position_ms, "stream paused");
        Ok(())
    }

    /// Resume a paused stream
    ///
    /// If the hardware refuses, the session is torn down and the stream goes
    /// back to Closed; the next write reopens it.
    pub fn resume(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            StreamState::Pausing => {}
            StreamState::Running => return Ok(()),
            state => {
                return Err(OffloadError::InvalidState {
                    operation: "resume",
                    state,
                })
            }
        }

        inner.state = StreamState::Resuming;
        let result = match inner.session.as_mut() {
            Some(session) => session.compress.resume(),
            None => Err(HardwareError::NotReady),
        };

        match result {
            Ok(()) => {
                inner.state = StreamState::Running;
                debug!("stream resumed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "resume failed, closing session");
                inner.render_offset_ms = inner.paused_position_ms;
                self.close_locked(&mut inner);
                Err(OffloadError::Command(e))
            }
        }
    }

    /// Discard queued data
    ///
    /// Running keeps its render offset, Pausing and every other state reset
    /// it. A failed stop still leaves the stream Ready.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            StreamState::Running => {}
            StreamState::Pausing => inner.render_offset_ms = 0,
            _ => {
                inner.render_offset_ms = 0;
                return Ok(());
            }
        }

        let result = match inner.session.as_mut() {
            Some(session) => session.compress.stop(),
            None => Ok(()),
        };
        inner.state = StreamState::Ready;
        result.map_err(|e| {
            error!(error = %e, "stop during flush failed");
            OffloadError::Command(e)
        })
    }

    /// Block until queued data has been rendered
    pub fn drain(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.session.as_mut() {
            Some(session) => session.compress.drain().map_err(OffloadError::Command),
            None => Ok(()),
        }
    }

    /// Rendered position in milliseconds
    pub fn render_position(&self) -> Result<u32> {
        let mut inner = self.lock();
        render_position_locked(&mut inner)
    }

    /// Apply `key=value` pairs: codec hints and `routing`
    pub fn set_parameters(&self, kvpairs: &str) -> Result<()> {
        let params = KeyValueParams::parse(kvpairs);
        self.codec.apply(&params, &CodecKey::ALL);

        match params.get_int(ROUTING_KEY) {
            Ok(Some(routing)) => match u32::try_from(routing) {
                Ok(bits) => {
                    let devices = OutputDevices(bits);
                    self.lock().device_output = devices;
                    debug!(routing = devices.bits(), "stream routing updated");
                }
                Err(_) => warn!(routing, "ignoring out of range routing"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring routing"),
        }
        Ok(())
    }

    /// Answer a `key;key` query; only `routing` carries a value
    pub fn get_parameters(&self, keys: &str) -> String {
        let mut params = KeyValueParams::parse(keys);
        if params.contains_key(ROUTING_KEY) {
            params.insert_int(ROUTING_KEY, i64::from(self.lock().device_output.bits()));
        }
        params.to_string()
    }
}

fn submit(inner: &mut StreamInner, data: &[u8]) -> usize {
    let Some(session) = inner.session.as_mut() else {
        return 0;
    };
    match session.compress.write(data) {
        Ok(sent) => sent,
        Err(e) => {
            error!(error = %e, state = %inner.state, "compressed write failed");
            0
        }
    }
}

fn render_position_locked(inner: &mut StreamInner) -> Result<u32> {
    let offset = inner.render_offset_ms;
    let state = inner.state;
    let Some(session) = inner.session.as_mut() else {
        return Ok(offset);
    };

    match state {
        StreamState::Running | StreamState::Ready | StreamState::Pausing => {
            let timestamp = session
                .compress
                .timestamp()
                .map_err(OffloadError::Configuration)?;
            Ok(offset.wrapping_add(timestamp.rendered_ms()))
        }
        other => Err(OffloadError::PositionUnavailable(other)),
    }
}
