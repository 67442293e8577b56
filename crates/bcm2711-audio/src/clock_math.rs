//! Clock-manager divisor and PWM precision calculations.
//!
//! The BCM2711 clock manager divides a reference clock by a 12.12 fixed
//! point divisor; the fractional part is dithered by the MASH filter.
//!
//! # PCM bit clock
//!
//!   BCLK = rate x 2 channels x bit width
//!   DIV  = (source << 12) / BCLK          (truncated)
//!
//! At 48 kHz / 32-bit from the 54 MHz oscillator:
//!   BCLK = 3 072 000 Hz, DIV = 72 000 (integer 17, fraction 2304/4096)
//!
//! # PWM sample clock
//!
//! The PWM serializer needs `1 << precision` clock cycles per sample. The
//! clock comes from PLLD (750 MHz) and may not exceed 375 MHz, so the
//! precision is the largest value <= 10 with `rate << precision <= 375 MHz`.
//!
//!   44.1 kHz: 44 100 << 10 = 45 158 400 Hz, precision 10
//!
//! References:
//! - BCM2711 ARM Peripherals, S5.4 (general purpose clock dividers)

// Every shift widens a u32 into u64 by at most 12 bits first.
#![allow(clippy::arithmetic_side_effects)]

/// Fractional bits of the clock-manager divisor.
pub const DIVISOR_FRAC_BITS: u32 = 12;

/// Width of the DIV register field.
pub const DIVISOR_MASK: u32 = 0x00FF_FFFF;

/// Highest PWM precision (bits per sample period).
pub const PWM_MAX_PRECISION: u32 = 10;

/// Highest clock the PWM block accepts.
pub const PWM_MAX_CLOCK_HZ: u64 = 375_000_000;

/// Fixed-point divisor `floor((source << 12) / target)`.
///
/// `None` for a zero target or a divisor wider than the 24-bit DIV field.
pub fn divisor(source_hz: u32, target_hz: u32) -> Option<u32> {
    let scaled = u64::from(source_hz) << DIVISOR_FRAC_BITS;
    let div = scaled.checked_div(u64::from(target_hz))?;
    u32::try_from(div).ok().filter(|&d| d <= DIVISOR_MASK)
}

/// Frequency produced by dividing `source_hz` by `div` (12.12 fixed point).
pub fn divided_hz(source_hz: u32, div: u32) -> Option<u32> {
    let scaled = u64::from(source_hz) << DIVISOR_FRAC_BITS;
    u32::try_from(scaled.checked_div(u64::from(div))?).ok()
}

/// PCM bit clock for a stereo frame of `bit_width`-bit slots.
pub fn pcm_bit_clock(rate: u32, bit_width: u32) -> u32 {
    rate.saturating_mul(2).saturating_mul(bit_width)
}

/// Largest PWM precision keeping `rate << precision` at or below 375 MHz.
pub fn pwm_precision(rate: u32) -> u32 {
    (1..=PWM_MAX_PRECISION)
        .rev()
        .find(|&prec| u64::from(rate) << prec <= PWM_MAX_CLOCK_HZ)
        .unwrap_or(0)
}

/// PWM clock for `rate` at `precision`.
pub fn pwm_clock(rate: u32, precision: u32) -> u32 {
    let clock = u64::from(rate) << precision.min(PWM_MAX_PRECISION);
    u32::try_from(clock).unwrap_or(u32::MAX)
}
