//! Clock sources feeding the BCM2711 clock manager.
//!
//! The PCM bit clock and the PWM sample clock are both divided down from one
//! of these references by a fractional (MASH) divider. Source selector values
//! are the `SRC` field encodings from the clock manager CTL registers.

/// Reference clock for a clock-manager unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// 54 MHz crystal oscillator (SRC = 1).
    Oscillator,
    /// PLLD peripheral clock, 750 MHz (SRC = 6).
    PllD,
}

impl ClockSource {
    /// Source frequency in Hz.
    pub const fn frequency_hz(self) -> u32 {
        match self {
            Self::Oscillator => 54_000_000,
            Self::PllD => 750_000_000,
        }
    }

    /// CTL.SRC field value.
    pub const fn selector(self) -> u32 {
        match self {
            Self::Oscillator => 1,
            Self::PllD => 6,
        }
    }
}

/// Who drives the bit clock and frame sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockMode {
    /// BCLK and FS are outputs generated from the clock manager.
    Master,
    /// BCLK and FS are inputs from the codec; the clock manager is not used.
    Slave,
}
