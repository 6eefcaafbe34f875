/// Simulator configuration
use serde::Deserialize;
use soul_hweffect::EffectSettings;
use soul_offload::OffloadSettings;
use std::path::Path;

/// Environment prefix, e.g. `SOUL_SIM__OFFLOAD__LATENCY_MS=20`
pub const ENV_PREFIX: &str = "SOUL_SIM";

/// `[offload]` and `[effect]` sections of the simulator settings file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub offload: OffloadSettings,

    #[serde(default)]
    pub effect: EffectSettings,
}

impl SimConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Ok(soul_core::settings::load(path, ENV_PREFIX)?)
    }
}
