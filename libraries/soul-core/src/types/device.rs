/// Output routing and stream identity types
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Output device bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutputDevices(pub u32);

impl OutputDevices {
    pub const NONE: Self = Self(0);
    pub const EARPIECE: Self = Self(0x1);
    pub const SPEAKER: Self = Self(0x2);
    pub const WIRED_HEADSET: Self = Self(0x4);
    pub const WIRED_HEADPHONE: Self = Self(0x8);

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set here
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for OutputDevices {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Output stream flags requested by the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutputFlags(pub u32);

impl OutputFlags {
    pub const NONE: Self = Self(0);
    pub const DIRECT: Self = Self(0x1);
    pub const PRIMARY: Self = Self(0x2);
    pub const COMPRESS_OFFLOAD: Self = Self(0x10);
    pub const NON_BLOCKING: Self = Self(0x20);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OutputFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Framework handle identifying a mixer / output thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IoHandle(pub i32);

/// Audio session an effect is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionId(pub i32);

impl std::fmt::Display for IoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "io:{}", self.0)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_mask_union() {
        let all = OutputDevices::SPEAKER | OutputDevices::WIRED_HEADSET;
        assert_eq!(all.bits(), 0x6);
        assert!(all.contains(OutputDevices::SPEAKER));
        assert!(!all.contains(OutputDevices::WIRED_HEADPHONE));
    }

    #[test]
    fn offload_flag_detection() {
        let flags = OutputFlags::DIRECT | OutputFlags::COMPRESS_OFFLOAD;
        assert!(flags.contains(OutputFlags::COMPRESS_OFFLOAD));
        assert!(!OutputFlags::PRIMARY.contains(OutputFlags::COMPRESS_OFFLOAD));
    }
}
