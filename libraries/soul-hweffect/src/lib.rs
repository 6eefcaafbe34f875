//! Soul HW Effect - DSP-backed equalizer
//!
//! A five-band, ten-preset equalizer whose audio processing runs inside the
//! offload DSP. The host side keeps the preset and band gains, answers the
//! framework's parameter queries and, while the session's audio is offloaded,
//! mirrors every change into a DSP effect instance.
//!
//! # Features
//!
//! - **Parameter store**: [`EqualizerEffect`] with presets, per-band levels in
//!   millibels and the bulk properties block
//! - **Command interface**: [`EqualizerEffect::command`] with per-command size
//!   validation
//! - **DSP seam**: [`DspBackend`] / [`DspRuntime`] / [`DspEffect`] and the
//!   `[type][len][payload]` block codec, with a bundled [`sim::SimulatedDsp`]
//! - **Library**: [`EffectLibrary`] descriptor lookup, create and release
//!
//! # Example
//!
//! ```rust
//! use soul_core::{IoHandle, SessionId};
//! use soul_hweffect::{sim::SimulatedDsp, EffectLibrary, EffectSettings, OFFLOAD_EQUALIZER_UUID};
//! use std::sync::Arc;
//!
//! let dsp = SimulatedDsp::new();
//! let library = EffectLibrary::new(Arc::new(dsp.clone()), EffectSettings::default());
//! let eq = library
//!     .create_effect(&OFFLOAD_EQUALIZER_UUID, SessionId(7), IoHandle(1))
//!     .unwrap();
//!
//! eq.set_preset(9).unwrap();
//! eq.set_offloaded(true, IoHandle(1)).unwrap();
//! assert_eq!(dsp.last_gains(), Some([10, 6, -1, 8, 10]));
//!
//! library.release_effect(eq).unwrap();
//! ```

pub mod command;
pub mod descriptor;
pub mod dsp;
pub mod equalizer;
pub mod error;
pub mod library;
pub mod params;
pub mod presets;
pub mod settings;
pub mod sim;

pub use command::EffectCommand;
pub use descriptor::{EffectDescriptor, EffectFlags, EQUALIZER_TYPE_UUID, OFFLOAD_EQUALIZER_UUID};
pub use dsp::{DspBackend, DspCommand, DspEffect, DspRuntime, EffectPlacement};
pub use equalizer::{EqualizerEffect, EqualizerStatus};
pub use error::{DspError, EffectError, Result};
pub use library::EffectLibrary;
pub use params::{EqParam, ParamBlock};
pub use presets::{Preset, NUM_BANDS, NUM_PRESETS, PRESET_CUSTOM};
pub use settings::EffectSettings;
