//! Audio domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common errors:
//! - `SampleRateHz`: only the standard PCM rates the framework can advertise
//! - `SampleFormat`: the three FIFO sample layouts the PCM block supports
//! - `RateSet` / `FormatSet`: capability masks, intersected with the codec's
//! - `Direction`: playback vs capture, never a bare bool

use bitflags::bitflags;

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── Direction ────────────────────────────────────────────────────────────────

/// Stream direction of a subchannel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Memory to FIFO (TX).
    Playback,
    /// FIFO to memory (RX).
    Capture,
}

impl Direction {
    /// The opposite direction.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Playback => Self::Capture,
            Self::Capture => Self::Playback,
        }
    }

    /// Human-readable name for log lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Playback => "Playback",
            Self::Capture => "Capture",
        }
    }
}

// ── SampleRateHz ─────────────────────────────────────────────────────────────

/// Standard PCM rates, ascending. Each has a bit in [`RateSet`].
pub const STANDARD_RATES: [u32; 15] = [
    5_512, 8_000, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 64_000, 88_200, 96_000,
    176_400, 192_000, 352_800, 384_000,
];

/// Sample rate in Hz, restricted to [`STANDARD_RATES`].
///
/// Non-standard rates have no capability flag, so the framework could never
/// negotiate them; rejecting them at the option boundary keeps the
/// advertised rate mask non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleRateHz(u32);

impl SampleRateHz {
    /// Create a `SampleRateHz`, returning an error if `hz` is not a standard rate.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] spanning the standard-rate table.
    pub fn try_new(hz: u32) -> Result<Self, OutOfRangeError> {
        if STANDARD_RATES.contains(&hz) {
            Ok(Self(hz))
        } else {
            Err(OutOfRangeError {
                value: hz,
                min: 5_512,
                max: 384_000,
            })
        }
    }

    /// Return the rate in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

// ── RateSet ──────────────────────────────────────────────────────────────────

bitflags! {
    /// Set of standard sample rates, one bit per entry of [`STANDARD_RATES`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RateSet: u32 {
        /// 5512 Hz
        const HZ_5512 = 1 << 0;
        /// 8 kHz
        const HZ_8000 = 1 << 1;
        /// 11.025 kHz
        const HZ_11025 = 1 << 2;
        /// 16 kHz
        const HZ_16000 = 1 << 3;
        /// 22.05 kHz
        const HZ_22050 = 1 << 4;
        /// 32 kHz
        const HZ_32000 = 1 << 5;
        /// 44.1 kHz
        const HZ_44100 = 1 << 6;
        /// 48 kHz
        const HZ_48000 = 1 << 7;
        /// 64 kHz
        const HZ_64000 = 1 << 8;
        /// 88.2 kHz
        const HZ_88200 = 1 << 9;
        /// 96 kHz
        const HZ_96000 = 1 << 10;
        /// 176.4 kHz
        const HZ_176400 = 1 << 11;
        /// 192 kHz
        const HZ_192000 = 1 << 12;
        /// 352.8 kHz
        const HZ_352800 = 1 << 13;
        /// 384 kHz
        const HZ_384000 = 1 << 14;
    }
}

impl RateSet {
    /// Flag for a single rate; empty if `hz` is not a standard rate.
    pub fn from_rate(hz: u32) -> Self {
        STANDARD_RATES
            .iter()
            .position(|&r| r == hz)
            .map_or(Self::empty(), |bit| Self::from_bits_truncate(1 << bit))
    }

    /// All standard rates within `[min, max]` (inclusive).
    pub fn between(min: u32, max: u32) -> Self {
        STANDARD_RATES
            .iter()
            .filter(|&&r| r >= min && r <= max)
            .fold(Self::empty(), |set, &r| set | Self::from_rate(r))
    }

    /// Lowest rate in the set, if any.
    pub fn min_rate(self) -> Option<u32> {
        STANDARD_RATES.iter().copied().find(|&r| self.contains(Self::from_rate(r)))
    }

    /// Highest rate in the set, if any.
    pub fn max_rate(self) -> Option<u32> {
        STANDARD_RATES.iter().rev().copied().find(|&r| self.contains(Self::from_rate(r)))
    }
}

// ── SampleFormat ─────────────────────────────────────────────────────────────

/// Sample layout in the DMA buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// Signed 16-bit, two samples packed per FIFO word.
    S16,
    /// Signed 24-bit in the low bits of a 32-bit container.
    S24In32,
    /// Signed 32-bit.
    S32,
}

impl SampleFormat {
    /// Build from a sample width option (16, 24 or 32 bits).
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] for any other width.
    pub fn from_bits(bits: u32) -> Result<Self, OutOfRangeError> {
        match bits {
            16 => Ok(Self::S16),
            24 => Ok(Self::S24In32),
            32 => Ok(Self::S32),
            _ => Err(OutOfRangeError {
                value: bits,
                min: 16,
                max: 32,
            }),
        }
    }

    /// Significant bits per sample (channel width on the wire).
    pub fn bit_width(self) -> u32 {
        match self {
            Self::S16 => 16,
            Self::S24In32 => 24,
            Self::S32 => 32,
        }
    }

    /// Bytes per sample in memory.
    pub fn byte_width(self) -> u32 {
        match self {
            Self::S16 => 2,
            Self::S24In32 | Self::S32 => 4,
        }
    }

    /// The matching capability flag.
    pub fn flag(self) -> FormatSet {
        match self {
            Self::S16 => FormatSet::S16,
            Self::S24In32 => FormatSet::S24_IN_32,
            Self::S32 => FormatSet::S32,
        }
    }
}

bitflags! {
    /// Set of sample formats.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatSet: u32 {
        /// Signed 16-bit.
        const S16 = 1 << 0;
        /// Signed 24-bit in 32-bit container.
        const S24_IN_32 = 1 << 1;
        /// Signed 32-bit.
        const S32 = 1 << 2;
    }
}

// ── ChannelPosition ──────────────────────────────────────────────────────────

/// Speaker position of one interleaved channel (channel map entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelPosition {
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
}
