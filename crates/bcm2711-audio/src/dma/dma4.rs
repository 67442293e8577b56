//! DMA4 engine (channels 11-14).
//!
//! "Lite-plus" engine with 40-bit addressing: SDRAM at its physical
//! address, peripherals through the `0x4_7C00_0000` window. Addresses are
//! split into a low word and 8 high bits carried in the SRCI/DESTI info
//! words; control-block pointers are stored shifted right by 5.

// Address splitting narrows 40-bit bus addresses into register words.
#![allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]

use embedded_hal::delay::DelayNs;
use platform::dma_safety::is_peripheral_address;
use platform::{Direction, RegisterBlock};

use super::{abort_chain, AddressWidth, ControlBlock, DmaEngine, DmaStatus};

// ── Registers ────────────────────────────────────────────────────────────────

const CS: usize = 0x00;
const CB: usize = 0x04;
const DEBUG: usize = 0x0c;
const LEN: usize = 0x24;
const NEXT_CB: usize = 0x28;

const CS_BUSY: u32 = 1 << 24;
const CS_ERROR: u32 = 1 << 10;
const CS_INT: u32 = 1 << 2;
const CS_END: u32 = 1 << 1;
const CS_ACTIVE: u32 = 1 << 0;

const DEBUG_RESET: u32 = 1 << 23;
const DEBUG_READ_CB_ERROR: u32 = 1 << 3;
const DEBUG_READ_ERROR: u32 = 1 << 2;
const DEBUG_FIFO_ERROR: u32 = 1 << 1;
const DEBUG_WRITE_ERROR: u32 = 1 << 0;
const DEBUG_ERRORS: u32 = DEBUG_READ_CB_ERROR | DEBUG_READ_ERROR | DEBUG_FIFO_ERROR | DEBUG_WRITE_ERROR;

const TI_D_DREQ: u32 = 1 << 15;
const TI_S_DREQ: u32 = 1 << 14;
const TI_WAIT_RD_RESP: u32 = 1 << 3;
const TI_WAIT_WR_RESP: u32 = 1 << 2;
const TI_INTEN: u32 = 1 << 0;

// SRCI.INC and DESTI.INC share a bit position.
const INFO_INC: u32 = 1 << 12;

const fn ti_permap(dreq: u32) -> u32 {
    (dreq & 0x1f) << 9
}

const PERIPHERAL_WINDOW: u64 = 0x4_0000_0000;

/// ARM physical address to 40-bit bus address.
fn bus_address(phys: u64) -> u64 {
    if is_peripheral_address(phys) {
        PERIPHERAL_WINDOW | (phys & !(0x8 << 28))
    } else {
        phys
    }
}

/// Control-block pointer encoding (256-bit aligned, stored >> 5).
fn cb_pointer(phys: u64) -> u32 {
    (bus_address(phys) >> 5) as u32
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// DMA4 engine operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dma4Engine;

impl DmaEngine for Dma4Engine {
    fn width(&self) -> AddressWidth {
        AddressWidth::Full40
    }

    fn start(&self, hw: &dyn RegisterBlock, cb_phys: u64) {
        let cs = hw.read(CS);
        hw.set_bits(DEBUG, DEBUG_RESET);
        hw.write(CB, cb_pointer(cb_phys));
        hw.set_bits(CS, CS_ACTIVE);
        debug!("DMA4 start CS {:#x} -> {:#x}", cs, hw.read(CS));
    }

    fn abort(&self, hw: &dyn RegisterBlock, delay: &mut dyn DelayNs) {
        abort_chain(hw, delay, NEXT_CB);
        hw.set_bits(DEBUG, DEBUG_RESET);
    }

    fn ack(&self, hw: &dyn RegisterBlock) -> DmaStatus {
        let cs = hw.read(CS);
        if cs & (CS_BUSY | CS_INT) == 0 {
            return DmaStatus::empty();
        }
        let mut status = DmaStatus::INTERRUPT;
        if cs & CS_ERROR != 0 {
            hw.set_bits(DEBUG, DEBUG_ERRORS);
            status |= DmaStatus::ERROR;
        }
        hw.set_bits(CS, CS_INT | CS_END);
        status
    }

    fn setcb(&self, cb: &mut ControlBlock, ti: u32, src: u64, dst: u64, len: u32, next: u64) {
        let src = bus_address(src);
        let dst = bus_address(dst);
        let mut srci = (src >> 32) as u32;
        if ti & TI_D_DREQ != 0 {
            srci |= INFO_INC;
        }
        let mut desti = (dst >> 32) as u32;
        if ti & TI_S_DREQ != 0 {
            desti |= INFO_INC;
        }
        let next = if next == 0 { 0 } else { cb_pointer(next) };
        cb.set_words([ti, src as u32, srci, dst as u32, desti, len, next, 0]);
    }

    fn len(&self, hw: &dyn RegisterBlock) -> u32 {
        hw.read(LEN)
    }

    fn transfer_info(&self, direction: Direction, dreq: u32) -> u32 {
        let pacing = match direction {
            Direction::Playback => TI_WAIT_WR_RESP | TI_D_DREQ,
            Direction::Capture => TI_WAIT_RD_RESP | TI_S_DREQ,
        };
        TI_INTEN | pacing | ti_permap(dreq)
    }
}
