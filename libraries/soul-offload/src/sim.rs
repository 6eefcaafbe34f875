//! Simulated offload hardware
//!
//! Always available so integration tests and the simulator binary can drive
//! the full state machine without a DSP. Every call is recorded as a
//! [`SimEvent`], open handles are counted, and each command can be made to
//! fail through [`FailurePlan`].

use crate::hardware::{
    AlgoRequest, CompressConfig, CompressSession, ControlDevice, HardwareError, HardwareTimestamp,
    HwResult, OffloadHardware, PcmParams, PcmReference,
};
use crate::volume::VOLUME_ALGO_ID;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One recorded hardware interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    PcmOpened { card_name: String, device: u32 },
    PcmConfigured(PcmParams),
    PcmClosed,
    CompressOpened { card: u32, device: u32, config: CompressConfig },
    CompressClosed,
    ControlOpened,
    ControlClosed,
    Write { requested: usize, accepted: usize },
    Start,
    Stop,
    Pause,
    Resume,
    Drain,
    VolumeRead { stream_id: u8 },
    VolumeWrite { stream_id: u8, code: u8 },
}

/// Which simulated calls fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePlan {
    pub pcm_open: bool,
    pub pcm_params: bool,
    pub compress_open: bool,
    /// Session opens but reports not ready
    pub compress_not_ready: bool,
    pub control_open: bool,
    pub write: bool,
    pub start: bool,
    pub stop: bool,
    pub pause: bool,
    pub resume: bool,
    pub drain: bool,
    pub timestamp: bool,
    pub volume_read: bool,
    pub volume_write: bool,
}

#[derive(Debug, Default)]
struct SimState {
    events: Vec<SimEvent>,
    failures: FailurePlan,
    live_pcm: usize,
    live_compress: usize,
    live_control: usize,
    volume_register: u8,
    write_limit: Option<usize>,
    bytes_accepted: usize,
    rendered: Duration,
    running: bool,
    paused: bool,
}

/// Shared simulated board; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct SimulatedHardware {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the failure plan
    pub fn inject(&self, f: impl FnOnce(&mut FailurePlan)) {
        f(&mut lock(&self.state).failures);
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures = FailurePlan::default();
    }

    pub fn events(&self) -> Vec<SimEvent> {
        lock(&self.state).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    /// Number of recorded events matching `pred`
    pub fn count(&self, pred: impl Fn(&SimEvent) -> bool) -> usize {
        lock(&self.state).events.iter().filter(|e| pred(e)).count()
    }

    /// Open (pcm, compress, control) handles
    pub fn live_handles(&self) -> (usize, usize, usize) {
        let state = lock(&self.state);
        (state.live_pcm, state.live_compress, state.live_control)
    }

    /// Raw byte currently held by the volume algorithm
    pub fn volume_register(&self) -> u8 {
        lock(&self.state).volume_register
    }

    pub fn set_volume_register(&self, code: u8) {
        lock(&self.state).volume_register = code;
    }

    /// Cap the bytes accepted by a single write
    pub fn set_write_limit(&self, limit: Option<usize>) {
        lock(&self.state).write_limit = limit;
    }

    pub fn bytes_accepted(&self) -> usize {
        lock(&self.state).bytes_accepted
    }

    /// Let the DSP render for `elapsed`, if a session is started and not paused
    pub fn advance(&self, elapsed: Duration) {
        let mut state = lock(&self.state);
        if state.running && !state.paused {
            state.rendered += elapsed;
        }
    }
}

impl OffloadHardware for SimulatedHardware {
    fn open_pcm_reference(&self, card_name: &str, device: u32) -> HwResult<Box<dyn PcmReference>> {
        let mut state = lock(&self.state);
        if state.failures.pcm_open {
            return Err(HardwareError::unavailable(
                format!("{card_name},{device}"),
                "no such card",
            ));
        }
        state.events.push(SimEvent::PcmOpened {
            card_name: card_name.to_string(),
            device,
        });
        state.live_pcm += 1;
        Ok(Box::new(SimPcm {
            state: Arc::clone(&self.state),
        }))
    }

    fn open_compress(
        &self,
        card: u32,
        device: u32,
        config: &CompressConfig,
    ) -> HwResult<Box<dyn CompressSession>> {
        let mut state = lock(&self.state);
        if state.failures.compress_open {
            return Err(HardwareError::unavailable(
                format!("compress {card}:{device}"),
                "open failed",
            ));
        }
        state.events.push(SimEvent::CompressOpened {
            card,
            device,
            config: *config,
        });
        state.live_compress += 1;
        state.rendered = Duration::ZERO;
        state.running = false;
        state.paused = false;
        Ok(Box::new(SimCompress {
            state: Arc::clone(&self.state),
            ring_size: config.ring_size(),
            ready: !state.failures.compress_not_ready,
        }))
    }

    fn open_control(&self, path: &Path) -> HwResult<Box<dyn ControlDevice>> {
        let mut state = lock(&self.state);
        if state.failures.control_open {
            return Err(HardwareError::unavailable(
                path.display().to_string(),
                "permission denied",
            ));
        }
        state.events.push(SimEvent::ControlOpened);
        state.live_control += 1;
        Ok(Box::new(SimControl {
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimPcm {
    state: Arc<Mutex<SimState>>,
}

impl PcmReference for SimPcm {
    fn set_params(&mut self, params: &PcmParams) -> HwResult<()> {
        let mut state = lock(&self.state);
        if state.failures.pcm_params {
            return Err(HardwareError::rejected("pcm set_params", "invalid rate"));
        }
        state.events.push(SimEvent::PcmConfigured(*params));
        Ok(())
    }
}

impl Drop for SimPcm {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.live_pcm -= 1;
        state.events.push(SimEvent::PcmClosed);
    }
}

struct SimCompress {
    state: Arc<Mutex<SimState>>,
    ring_size: usize,
    ready: bool,
}

impl SimCompress {
    fn command(
        &self,
        name: &'static str,
        fail: impl Fn(&FailurePlan) -> bool,
        event: SimEvent,
        apply: impl FnOnce(&mut SimState),
    ) -> HwResult<()> {
        let mut state = lock(&self.state);
        if fail(&state.failures) {
            return Err(HardwareError::rejected(name, "simulated failure"));
        }
        state.events.push(event);
        apply(&mut state);
        Ok(())
    }
}

impl CompressSession for SimCompress {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn write(&mut self, data: &[u8]) -> HwResult<usize> {
        let mut state = lock(&self.state);
        if state.failures.write {
            return Err(HardwareError::rejected("write", "ring overrun"));
        }
        let limit = state.write_limit.unwrap_or(self.ring_size);
        let accepted = data.len().min(limit);
        state.bytes_accepted += accepted;
        state.events.push(SimEvent::Write {
            requested: data.len(),
            accepted,
        });
        Ok(accepted)
    }

    fn start(&mut self) -> HwResult<()> {
        self.command("start", |f| f.start, SimEvent::Start, |s| {
            s.running = true;
            s.paused = false;
        })
    }

    fn stop(&mut self) -> HwResult<()> {
        self.command("stop", |f| f.stop, SimEvent::Stop, |s| {
            s.running = false;
            s.paused = false;
        })
    }

    fn pause(&mut self) -> HwResult<()> {
        self.command("pause", |f| f.pause, SimEvent::Pause, |s| s.paused = true)
    }

    fn resume(&mut self) -> HwResult<()> {
        self.command("resume", |f| f.resume, SimEvent::Resume, |s| s.paused = false)
    }

    fn drain(&mut self) -> HwResult<()> {
        self.command("drain", |f| f.drain, SimEvent::Drain, |_| {})
    }

    fn timestamp(&mut self) -> HwResult<HardwareTimestamp> {
        let state = lock(&self.state);
        if state.failures.timestamp {
            return Err(HardwareError::rejected("timestamp", "simulated failure"));
        }
        Ok(HardwareTimestamp {
            available: 0,
            rendered: state.rendered,
        })
    }
}

impl Drop for SimCompress {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.live_compress -= 1;
        state.running = false;
        state.paused = false;
        state.events.push(SimEvent::CompressClosed);
    }
}

struct SimControl {
    state: Arc<Mutex<SimState>>,
}

impl ControlDevice for SimControl {
    fn get_algo(&mut self, request: &AlgoRequest) -> HwResult<Vec<u8>> {
        let mut state = lock(&self.state);
        if state.failures.volume_read || request.algo_id != VOLUME_ALGO_ID {
            return Err(HardwareError::rejected("get algo", "simulated failure"));
        }
        state.events.push(SimEvent::VolumeRead {
            stream_id: request.stream_id,
        });
        Ok(vec![state.volume_register])
    }

    fn set_algo(&mut self, request: &AlgoRequest) -> HwResult<()> {
        let mut state = lock(&self.state);
        if state.failures.volume_write || request.algo_id != VOLUME_ALGO_ID {
            return Err(HardwareError::rejected("set algo", "simulated failure"));
        }
        let code = request.payload.first().copied().unwrap_or_default();
        state.volume_register = code;
        state.events.push(SimEvent::VolumeWrite {
            stream_id: request.stream_id,
            code,
        });
        Ok(())
    }
}

impl Drop for SimControl {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.live_control -= 1;
        state.events.push(SimEvent::ControlClosed);
    }
}
