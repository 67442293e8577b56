//! PWM controller register map.

/// ARM physical address of PWM0.
pub const PWM0_BASE: u64 = 0xFE20_C000;

/// ARM physical address of PWM1.
pub const PWM1_BASE: u64 = 0xFE20_C800;

/// Size of a PWM window.
pub const PWM_WINDOW_SIZE: usize = 0x28;

pub(crate) const CTL: usize = 0x00;
pub(crate) const STA: usize = 0x04;
pub(crate) const DMAC: usize = 0x08;
pub(crate) const RNG1: usize = 0x10;
pub(crate) const FIF1: u64 = 0x18;
pub(crate) const RNG2: usize = 0x20;

// CTL
pub(crate) const CTL_MSEN2: u32 = 1 << 15;
pub(crate) const CTL_USEF2: u32 = 1 << 13;
pub(crate) const CTL_PWEN2: u32 = 1 << 8;
pub(crate) const CTL_MSEN1: u32 = 1 << 7;
pub(crate) const CTL_CLRF: u32 = 1 << 6;
pub(crate) const CTL_USEF1: u32 = 1 << 5;
pub(crate) const CTL_PWEN1: u32 = 1 << 0;

// STA
pub(crate) const STA_STA2: u32 = 1 << 10;
pub(crate) const STA_STA1: u32 = 1 << 9;
pub(crate) const STA_BERR: u32 = 1 << 8;
pub(crate) const STA_GAPO2: u32 = 1 << 5;
pub(crate) const STA_GAPO1: u32 = 1 << 4;
pub(crate) const STA_RERR1: u32 = 1 << 3;
pub(crate) const STA_WERR1: u32 = 1 << 2;
pub(crate) const STA_EMPT1: u32 = 1 << 1;

/// Write-1-to-clear error flags.
pub(crate) const STA_ALL_ERR: u32 = STA_BERR | STA_GAPO2 | STA_GAPO1 | STA_RERR1 | STA_WERR1;

// DMAC
pub(crate) const DMAC_ENAB: u32 = 1 << 31;

pub(crate) const fn dmac(panic: u32, dreq: u32) -> u32 {
    DMAC_ENAB | ((panic & 0xff) << 8) | (dreq & 0xff)
}
