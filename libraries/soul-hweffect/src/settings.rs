/// DSP effect placement settings
use crate::dsp::{EffectPlacement, EffectPosition};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment prefix, e.g. `SOUL_EFFECT__COMPRESS_DEVICE=1`
pub const ENV_PREFIX: &str = "SOUL_EFFECT";

/// Which card hosts the DSP runtime and which stream effects attach to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EffectSettings {
    #[serde(default = "default_card_name")]
    pub card_name: String,

    /// Compressed playback device whose DSP stream carries the effect
    #[serde(default)]
    pub compress_device: u32,

    /// DSP output device id (0 = local)
    #[serde(default)]
    pub dsp_device: u32,
}

fn default_card_name() -> String {
    "cloverviewaudio".to_string()
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            card_name: default_card_name(),
            compress_device: 0,
            dsp_device: 0,
        }
    }
}

impl EffectSettings {
    /// Load from an optional settings file plus `SOUL_EFFECT__*` variables
    pub fn load(path: Option<&Path>) -> soul_core::Result<Self> {
        soul_core::settings::load(path, ENV_PREFIX)
    }

    pub fn with_card_name(mut self, card_name: impl Into<String>) -> Self {
        self.card_name = card_name.into();
        self
    }

    pub fn with_compress_device(mut self, device: u32) -> Self {
        self.compress_device = device;
        self
    }

    pub fn placement(&self) -> EffectPlacement {
        EffectPlacement {
            position: EffectPosition::Any,
            stream: self.compress_device,
            device: self.dsp_device,
        }
    }
}
