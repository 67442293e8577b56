//! DMA1 engine (channels 0-10).
//!
//! Legacy engine addressing memory through the VideoCore bus view: SDRAM
//! through the uncached `0xC000_0000` alias, peripherals at `0x7E00_0000`.

// Register fields are built with constant shifts of masked values and bus
// addresses are narrowed to the 32-bit legacy bus, which is all DMA1 sees.
#![allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]

use embedded_hal::delay::DelayNs;
use platform::dma_safety::is_peripheral_address;
use platform::{Direction, RegisterBlock};

use super::{abort_chain, AddressWidth, ControlBlock, DmaEngine, DmaStatus};

// ── Registers ────────────────────────────────────────────────────────────────

const CS: usize = 0x00;
const CONBLK_AD: usize = 0x04;
const TXFR_LEN: usize = 0x14;
const NEXTCONBK: usize = 0x1c;

const CS_RESET: u32 = 1 << 31;
const CS_ERROR: u32 = 1 << 8;
const CS_INT: u32 = 1 << 2;
const CS_END: u32 = 1 << 1;
const CS_ACTIVE: u32 = 1 << 0;

const TI_SRC_DREQ: u32 = 1 << 10;
const TI_SRC_INC: u32 = 1 << 8;
const TI_DST_DREQ: u32 = 1 << 6;
const TI_DST_INC: u32 = 1 << 4;
const TI_WAIT_RESP: u32 = 1 << 3;
const TI_INTEN: u32 = 1 << 0;

const fn ti_permap(dreq: u32) -> u32 {
    (dreq & 0x1f) << 16
}

/// ARM physical address to legacy bus address.
fn bus_address(phys: u64) -> u32 {
    let bus = if is_peripheral_address(phys) {
        phys & !(0x8 << 28)
    } else {
        phys | (0xc << 28)
    };
    bus as u32
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// DMA1 engine operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dma1Engine;

impl DmaEngine for Dma1Engine {
    fn width(&self) -> AddressWidth {
        AddressWidth::Legacy28
    }

    fn start(&self, hw: &dyn RegisterBlock, cb_phys: u64) {
        let cs = hw.read(CS);
        hw.set_bits(CS, CS_RESET);
        hw.write(CONBLK_AD, bus_address(cb_phys));
        hw.set_bits(CS, CS_ACTIVE);
        debug!("DMA1 start CS {:#x} -> {:#x}", cs, hw.read(CS));
    }

    fn abort(&self, hw: &dyn RegisterBlock, delay: &mut dyn DelayNs) {
        abort_chain(hw, delay, NEXTCONBK);
        hw.set_bits(CS, CS_RESET);
    }

    fn ack(&self, hw: &dyn RegisterBlock) -> DmaStatus {
        let cs = hw.read(CS);
        if cs & CS_INT == 0 {
            return DmaStatus::empty();
        }
        if cs & CS_ERROR != 0 {
            hw.set_bits(CS, CS_INT | CS_END | CS_ERROR);
            DmaStatus::INTERRUPT | DmaStatus::ERROR
        } else {
            hw.set_bits(CS, CS_INT | CS_END);
            DmaStatus::INTERRUPT
        }
    }

    fn setcb(&self, cb: &mut ControlBlock, ti: u32, src: u64, dst: u64, len: u32, next: u64) {
        let next = if next == 0 { 0 } else { bus_address(next) };
        cb.set_words([ti, bus_address(src), bus_address(dst), len, 0, next, 0, 0]);
    }

    fn len(&self, hw: &dyn RegisterBlock) -> u32 {
        hw.read(TXFR_LEN)
    }

    fn transfer_info(&self, direction: Direction, dreq: u32) -> u32 {
        let pacing = match direction {
            Direction::Playback => TI_SRC_INC | TI_DST_DREQ,
            Direction::Capture => TI_DST_INC | TI_SRC_DREQ,
        };
        TI_INTEN | TI_WAIT_RESP | pacing | ti_permap(dreq)
    }
}
