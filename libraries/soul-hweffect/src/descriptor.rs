/// Effect descriptor advertised to the framework
use serde::Serialize;
use uuid::Uuid;

/// Effect capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EffectFlags(pub u32);

impl EffectFlags {
    pub const TYPE_INSERT: Self = Self(0);
    pub const INSERT_LAST: Self = Self(2 << 3);
    pub const VOLUME_CTRL: Self = Self(1 << 6);
    pub const HW_ACC_TUNNEL: Self = Self(2 << 16);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for EffectFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// `major.minor` packed as `major << 16 | minor`
pub const fn api_version(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

pub const EFFECT_CONTROL_API_VERSION: u32 = api_version(2, 0);

/// Standard equalizer effect type
pub const EQUALIZER_TYPE_UUID: Uuid = Uuid::from_u128(0x0bed4300_ddd6_11db_8f34_0002a5d5c51b);

/// This DSP-backed equalizer implementation
pub const OFFLOAD_EQUALIZER_UUID: Uuid = Uuid::from_u128(0xf7a247c1_1a7b_11e0_bb0d_2a30dfd72045);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectDescriptor {
    pub type_uuid: Uuid,
    pub uuid: Uuid,
    pub api_version: u32,
    pub flags: EffectFlags,
    /// Tenths of MIPS
    pub cpu_load: u16,
    /// KiB
    pub memory_usage: u16,
    pub name: &'static str,
    pub implementor: &'static str,
}

impl EffectDescriptor {
    /// Insert-last equalizer with volume control, rendered in the DSP
    pub fn offload_equalizer() -> Self {
        Self {
            type_uuid: EQUALIZER_TYPE_UUID,
            uuid: OFFLOAD_EQUALIZER_UUID,
            api_version: EFFECT_CONTROL_API_VERSION,
            flags: EffectFlags::TYPE_INSERT
                | EffectFlags::INSERT_LAST
                | EffectFlags::VOLUME_CTRL
                | EffectFlags::HW_ACC_TUNNEL,
            cpu_load: 0,
            memory_usage: 1,
            name: "Equalizer",
            implementor: "Soul Audio",
        }
    }
}
