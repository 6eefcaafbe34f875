/// Effect library entry points
use crate::descriptor::EffectDescriptor;
use crate::dsp::DspBackend;
use crate::equalizer::EqualizerEffect;
use crate::error::{EffectError, Result};
use crate::settings::EffectSettings;
use soul_core::{IoHandle, SessionId};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Effect library exposing the DSP equalizer
pub struct EffectLibrary {
    backend: Arc<dyn DspBackend>,
    settings: Arc<EffectSettings>,
    descriptors: Vec<EffectDescriptor>,
}

impl EffectLibrary {
    pub const NAME: &'static str = "Soul Offload EQ Library";
    pub const IMPLEMENTOR: &'static str = "Soul Audio";

    pub fn new(backend: Arc<dyn DspBackend>, settings: EffectSettings) -> Self {
        Self {
            backend,
            settings: Arc::new(settings),
            descriptors: vec![EffectDescriptor::offload_equalizer()],
        }
    }

    pub fn descriptors(&self) -> &[EffectDescriptor] {
        &self.descriptors
    }

    /// Descriptor of the implementation registered under `uuid`
    pub fn get_descriptor(&self, uuid: &Uuid) -> Result<EffectDescriptor> {
        self.descriptors
            .iter()
            .find(|desc| desc.uuid == *uuid)
            .cloned()
            .ok_or(EffectError::UnknownEffect(*uuid))
    }

    /// Create an equalizer for `session` playing on `io`
    pub fn create_effect(
        &self,
        uuid: &Uuid,
        session: SessionId,
        io: IoHandle,
    ) -> Result<EqualizerEffect> {
        let descriptor = self.get_descriptor(uuid)?;
        info!(name = descriptor.name, %session, %io, "effect created");
        Ok(EqualizerEffect::new(
            descriptor.uuid,
            session,
            io,
            Arc::clone(&self.backend),
            Arc::clone(&self.settings),
        ))
    }

    /// Release an effect, destroying its DSP instance if it has one
    pub fn release_effect(&self, effect: EqualizerEffect) -> Result<()> {
        let session = effect.session();
        effect.release()?;
        debug!(%session, "effect released");
        Ok(())
    }
}

impl std::fmt::Debug for EffectLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectLibrary")
            .field("name", &Self::NAME)
            .field("settings", &self.settings)
            .field("descriptors", &self.descriptors)
            .finish_non_exhaustive()
    }
}
