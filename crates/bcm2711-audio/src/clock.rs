//! BCM2711 clock manager (CM) for the PCM and PWM clock units.

// CTL/DIV fields are constant shifts of values masked to their width.
#![allow(clippy::arithmetic_side_effects)]

use embedded_hal::delay::DelayNs;
use platform::{ClockSource, RegisterBlock};

use crate::clock_math::{divisor, DIVISOR_MASK};
use crate::poll::poll_while;

/// ARM physical address of the clock manager.
pub const CM_BASE: u64 = 0xFE10_1000;

/// Size of the clock manager window.
pub const CM_WINDOW_SIZE: usize = 0x100;

const PASSWORD: u32 = 0x5a << 24;

const CTL_MASH_MASK: u32 = 0x3 << 9;
const CTL_BUSY: u32 = 1 << 7;
const CTL_ENAB: u32 = 1 << 4;
const CTL_SRC_MASK: u32 = 0xf;

const fn ctl_mash(mash: u32) -> u32 {
    (mash & 0x3) << 9
}

const BUSY_POLL_TRIES: u32 = 100;
const BUSY_POLL_STEP_US: u32 = 1;

/// Clock generator driving one peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockUnit {
    /// PCM bit clock (CM_PCMCTL / CM_PCMDIV).
    Pcm,
    /// PWM serializer clock (CM_PWMCTL / CM_PWMDIV).
    Pwm,
}

impl ClockUnit {
    /// Unit number in the clock manager.
    pub const fn number(self) -> usize {
        match self {
            Self::Pcm => 19,
            Self::Pwm => 20,
        }
    }

    const fn ctl(self) -> usize {
        self.number() * 8
    }

    const fn div(self) -> usize {
        self.ctl() + 4
    }
}

/// The clock manager register window.
#[derive(Debug)]
pub struct ClockManager<B> {
    regs: B,
}

impl<B: RegisterBlock> ClockManager<B> {
    /// Wrap the mapped clock-manager window.
    pub fn new(regs: B) -> Self {
        Self { regs }
    }

    /// Program `unit` to produce `target_hz` from `source` with MASH level
    /// `mash`.
    ///
    /// The generator is only touched when the divisor, the MASH level or the
    /// source differ from what is latched. It is disabled, waited on until not
    /// busy, given the new divisor and re-enabled.
    pub fn configure(
        &self,
        unit: ClockUnit,
        target_hz: u32,
        source: ClockSource,
        mash: u32,
        delay: &mut dyn DelayNs,
    ) {
        let Some(div) = divisor(source.frequency_hz(), target_hz) else {
            error!("No clock divisor for {} Hz from {} Hz", target_hz, source.frequency_hz());
            return;
        };
        let ctl_off = unit.ctl();
        let div_off = unit.div();
        let ctl = self.regs.read(ctl_off);
        let src = source.selector() & CTL_SRC_MASK;
        if self.regs.read(div_off) & DIVISOR_MASK != div
            || ctl & CTL_MASH_MASK != ctl_mash(mash)
            || ctl & CTL_SRC_MASK != src
        {
            let ctl = ctl & !CTL_ENAB;
            self.regs.write(ctl_off, PASSWORD | ctl);
            let idle = poll_while(delay, BUSY_POLL_TRIES, BUSY_POLL_STEP_US, || {
                self.regs.any_set(ctl_off, CTL_BUSY)
            });
            if idle.is_err() {
                warn!("Clock unit {} still busy after disable", unit.number());
            }
            self.regs.write(div_off, PASSWORD | div);
            self.regs.write(
                ctl_off,
                PASSWORD
                    | CTL_ENAB
                    | (ctl & !(CTL_MASH_MASK | CTL_SRC_MASK))
                    | ctl_mash(mash)
                    | src,
            );
        }
        debug!(
            "Clock unit {}: {} Hz from {} Hz, div {}.{}, mash {}, ctl {:#x}",
            unit.number(),
            target_hz,
            source.frequency_hz(),
            div >> 12,
            div & 0xfff,
            mash,
            self.regs.read(ctl_off)
        );
    }
}
