//! Simulated DSP effect runtime
//!
//! Records every runtime, effect and parameter interaction as a [`DspEvent`]
//! and decodes each pushed block, so tests see exactly what the DSP would
//! have received. Individual calls can be made to fail through [`DspFailures`].

use crate::dsp::{DspBackend, DspCommand, DspEffect, DspResult, DspRuntime, EffectPlacement};
use crate::error::DspError;
use crate::presets::NUM_BANDS;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DspEvent {
    RuntimeStarted { card_name: String },
    RuntimeStopped,
    EffectCreated { uuid: Uuid, placement: EffectPlacement },
    Params(DspCommand),
    EffectDestroyed,
}

/// Which simulated DSP calls fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DspFailures {
    pub runtime_init: bool,
    pub create: bool,
    pub set_params: bool,
    pub destroy: bool,
}

#[derive(Debug, Default)]
struct DspState {
    events: Vec<DspEvent>,
    failures: DspFailures,
    live_runtimes: usize,
    live_effects: usize,
}

/// Shared simulated DSP; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct SimulatedDsp {
    state: Arc<Mutex<DspState>>,
}

fn lock(state: &Mutex<DspState>) -> MutexGuard<'_, DspState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedDsp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, f: impl FnOnce(&mut DspFailures)) {
        f(&mut lock(&self.state).failures);
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures = DspFailures::default();
    }

    pub fn events(&self) -> Vec<DspEvent> {
        lock(&self.state).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    /// Decoded parameter blocks, oldest first
    pub fn commands(&self) -> Vec<DspCommand> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|e| match e {
                DspEvent::Params(command) => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// Gains most recently pushed to any effect instance
    pub fn last_gains(&self) -> Option<[i32; NUM_BANDS]> {
        self.commands().into_iter().rev().find_map(|c| match c {
            DspCommand::BandGains(gains) => Some(gains),
            DspCommand::Enable(_) => None,
        })
    }

    /// Live (runtimes, effect instances)
    pub fn live(&self) -> (usize, usize) {
        let state = lock(&self.state);
        (state.live_runtimes, state.live_effects)
    }
}

impl DspBackend for SimulatedDsp {
    fn init_runtime(&self, card_name: &str) -> DspResult<Box<dyn DspRuntime>> {
        let mut state = lock(&self.state);
        if state.failures.runtime_init {
            return Err(DspError::unavailable(card_name, "simulated failure"));
        }
        state.events.push(DspEvent::RuntimeStarted {
            card_name: card_name.to_string(),
        });
        state.live_runtimes += 1;
        Ok(Box::new(SimRuntime {
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimRuntime {
    state: Arc<Mutex<DspState>>,
}

impl DspRuntime for SimRuntime {
    fn create_effect(
        &mut self,
        uuid: &Uuid,
        placement: EffectPlacement,
    ) -> DspResult<Box<dyn DspEffect>> {
        let mut state = lock(&self.state);
        if state.failures.create {
            return Err(DspError::Create("simulated failure".into()));
        }
        state.events.push(DspEvent::EffectCreated {
            uuid: *uuid,
            placement,
        });
        state.live_effects += 1;
        Ok(Box::new(SimEffect {
            state: Arc::clone(&self.state),
        }))
    }
}

impl Drop for SimRuntime {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.live_runtimes -= 1;
        state.events.push(DspEvent::RuntimeStopped);
    }
}

struct SimEffect {
    state: Arc<Mutex<DspState>>,
}

impl DspEffect for SimEffect {
    fn set_params(&mut self, block: &[u8]) -> DspResult<()> {
        let command = DspCommand::decode(block)?;
        let mut state = lock(&self.state);
        if state.failures.set_params {
            return Err(DspError::SetParams("simulated failure".into()));
        }
        state.events.push(DspEvent::Params(command));
        Ok(())
    }

    fn destroy(&mut self) -> DspResult<()> {
        let mut state = lock(&self.state);
        if state.failures.destroy {
            return Err(DspError::Destroy("simulated failure".into()));
        }
        state.events.push(DspEvent::EffectDestroyed);
        state.live_effects -= 1;
        Ok(())
    }
}
