//! Equalizer presets and band tables
//!
//! Five fixed bands. Gains are whole decibels; the framework talks in
//! millibels and frequencies in millihertz.

use serde::{Deserialize, Serialize};

pub const NUM_BANDS: usize = 5;
pub const NUM_PRESETS: usize = 10;

/// Current-preset value reported once a band has been edited by hand
pub const PRESET_CUSTOM: i32 = -1;

/// Preset selected when an effect is created
pub const DEFAULT_PRESET: Preset = Preset::Flat;

/// Reported band level range in millibels
pub const LEVEL_RANGE_MB: (i16, i16) = (-1500, 1500);

/// Center frequency of each band (Hz)
pub const CENTER_FREQUENCIES_HZ: [u32; NUM_BANDS] = [50, 200, 800, 3_000, 15_000];

/// Frequency range covered by each band (mHz)
pub const BAND_FREQ_RANGES_MHZ: [(u32, u32); NUM_BANDS] = [
    (0, 88_000),
    (110_000, 360_000),
    (500_000, 1_300_000),
    (1_800_000, 6_000_000),
    (7_000_000, 19_500_000),
];

/// Built-in equalizer preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Preset {
    Normal,
    Classical,
    Dance,
    #[default]
    Flat,
    Folk,
    HeavyMetal,
    HipHop,
    Jazz,
    Pop,
    Rock,
}

impl Preset {
    /// Presets in framework index order
    pub const ALL: [Self; NUM_PRESETS] = [
        Self::Normal,
        Self::Classical,
        Self::Dance,
        Self::Flat,
        Self::Folk,
        Self::HeavyMetal,
        Self::HipHop,
        Self::Jazz,
        Self::Pop,
        Self::Rock,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(&self) -> i32 {
        Self::ALL.iter().position(|p| p == self).unwrap_or_default() as i32
    }

    /// Band gains in dB
    pub fn gains(&self) -> [i32; NUM_BANDS] {
        match self {
            Self::Normal => [3, 0, 0, 0, 3],
            Self::Classical => [8, 5, -3, 5, 6],
            Self::Dance => [15, -6, 7, 13, 10],
            Self::Flat => [0, 0, 0, 0, 0],
            Self::Folk => [6, -2, -2, 6, -3],
            Self::HeavyMetal => [8, -8, 13, -1, -4],
            Self::HipHop => [10, 6, -4, 5, 8],
            Self::Jazz => [8, 5, -4, 5, 9],
            Self::Pop => [-6, 4, 9, 4, -5],
            Self::Rock => [10, 6, -1, 8, 10],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Classical => "Classical",
            Self::Dance => "Dance",
            Self::Flat => "Flat",
            Self::Folk => "Folk",
            Self::HeavyMetal => "Heavy Metal",
            Self::HipHop => "Hip Hop",
            Self::Jazz => "Jazz",
            Self::Pop => "Pop",
            Self::Rock => "Rock",
        }
    }
}

/// Band whose range contains `freq_mhz`
///
/// The lower bound of a band is exclusive except for the very first band,
/// which starts at 0 mHz. Frequencies in the gaps between bands and above the
/// last band resolve to band 0.
pub fn band_for_frequency(freq_mhz: u32) -> usize {
    if freq_mhz == BAND_FREQ_RANGES_MHZ[0].0 {
        return 0;
    }
    BAND_FREQ_RANGES_MHZ
        .iter()
        .rposition(|&(min, max)| freq_mhz > min && freq_mhz <= max)
        .unwrap_or(0)
}

/// Millibels to whole decibels, rounding half away from zero
pub fn millibels_to_db(millibels: i16) -> i32 {
    let mb = i32::from(millibels);
    if mb > 0 {
        (mb + 50) / 100
    } else {
        (mb - 50) / 100
    }
}
