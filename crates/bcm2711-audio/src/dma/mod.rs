//! BCM2711 DMA engines
//!
//! The BCM2711 has two generations of DMA channel behind one register
//! bank at `0xFE00_7000`:
//!
//! | Channels | Engine | Bus view                | IRQ                 |
//! |----------|--------|-------------------------|---------------------|
//! | 0..=6    | DMA1   | legacy 32-bit (VC bus)  | 112 + n             |
//! | 7..=8    | DMA1   | legacy 32-bit (VC bus)  | 119 (shared)        |
//! | 9..=10   | DMA1   | legacy 32-bit (VC bus)  | 120 (shared)        |
//! | 11..=14  | DMA4   | full 40-bit             | 121 + (n - 11)      |
//!
//! Both generations are driven through [`DmaEngine`] so the audio core is
//! engine-agnostic. A channel is resolved once from [`CHANNEL_TABLE`] and
//! owned through a [`DmaChannel`] lease from a [`ChannelRegistry`].
//!
//! Audio streams run a closed ring of [`ControlBlock`]s, one per fragment
//! (see [`chain::build_ring`]).

use bitflags::bitflags;
use embedded_hal::delay::DelayNs;
use platform::{Direction, RegisterBlock};

use crate::error::DmaError;
use crate::poll::poll_while;

pub mod chain;
mod dma1;
mod dma4;
pub mod registry;

pub use chain::{build_ring, ControlBlock, Transfer};
pub use dma1::Dma1Engine;
pub use dma4::Dma4Engine;
pub use registry::{ChannelRegistry, DmaChannel, StaticChannelRegistry, CHANNEL_REGISTRY};

// ── Address map ──────────────────────────────────────────────────────────────

/// ARM physical address of channel 0.
pub const DMA_BASE: u64 = 0xFE00_7000;

/// Distance between consecutive channel windows.
pub const DMA_CHANNEL_STRIDE: u64 = 0x100;

/// Size of one channel register window.
pub const DMA_WINDOW_SIZE: usize = 0x100;

/// Number of channels usable by the audio drivers (0..=14).
pub const DMA_CHANNEL_COUNT: usize = 15;

// ── DREQ peripheral numbers ──────────────────────────────────────────────────

/// PCM transmit FIFO.
pub const DREQ_PCM_TX: u32 = 2;
/// PCM receive FIFO.
pub const DREQ_PCM_RX: u32 = 3;
/// PWM0 FIFO.
pub const DREQ_PWM0: u32 = 5;
/// PWM1 FIFO.
pub const DREQ_PWM1: u32 = 1;

// ── Engine interface ─────────────────────────────────────────────────────────

bitflags! {
    /// Result of [`DmaEngine::ack`]. Empty means "not our interrupt".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DmaStatus: u32 {
        /// The channel raised an interrupt (a control block completed).
        const INTERRUPT = 1 << 0;
        /// The channel also reported a transfer error.
        const ERROR = 1 << 1;
    }
}

/// Bus address width of an engine generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressWidth {
    /// DMA1: 32-bit legacy (VideoCore) bus addresses, 28 significant bits.
    Legacy28,
    /// DMA4: 40-bit addresses split over a word and an info word.
    Full40,
}

/// Operations of one DMA engine generation.
///
/// `hw` is the register window of the channel being driven. Control-block
/// addresses are ARM physical addresses; each engine translates them to
/// its own bus view.
#[allow(clippy::len_without_is_empty)] // `len` is remaining transfer bytes
pub trait DmaEngine {
    /// Address width of this generation.
    fn width(&self) -> AddressWidth;

    /// Reset the channel, load the chain head at `cb_phys` and start it.
    fn start(&self, hw: &dyn RegisterBlock, cb_phys: u64);

    /// Abort the running chain.
    ///
    /// Must be called while the channel is still enabled. Waits up to 50 µs
    /// for ACTIVE to clear, logs a timeout, and resets the channel either way.
    fn abort(&self, hw: &dyn RegisterBlock, delay: &mut dyn DelayNs);

    /// Acknowledge a pending interrupt and report what happened.
    fn ack(&self, hw: &dyn RegisterBlock) -> DmaStatus;

    /// Fill one control block. A `next` of 0 terminates the chain.
    fn setcb(&self, cb: &mut ControlBlock, ti: u32, src: u64, dst: u64, len: u32, next: u64);

    /// Bytes left in the control block currently in flight.
    fn len(&self, hw: &dyn RegisterBlock) -> u32;

    /// Transfer-information word for a paced transfer to (`Playback`) or
    /// from (`Capture`) the peripheral behind `dreq`.
    fn transfer_info(&self, direction: Direction, dreq: u32) -> u32;
}

// ── Shared abort sequence ────────────────────────────────────────────────────

// CS layout common to both generations.
const CS: usize = 0x00;
const CS_ABORT: u32 = 1 << 30;
const CS_ACTIVE: u32 = 1 << 0;

const ABORT_POLL_TRIES: u32 = 50;
const ABORT_POLL_STEP_US: u32 = 1;

/// Pause, cut the chain after the current block, abort and wait for ACTIVE
/// to drop. The caller resets the channel afterwards.
fn abort_chain(hw: &dyn RegisterBlock, delay: &mut dyn DelayNs, next_cb: usize) {
    let cs = hw.read(CS);
    hw.clear_bits(CS, CS_ACTIVE);
    hw.write(next_cb, 0);
    hw.set_bits(CS, CS_ABORT);
    hw.set_bits(CS, CS_ACTIVE);
    match poll_while(delay, ABORT_POLL_TRIES, ABORT_POLL_STEP_US, || hw.any_set(CS, CS_ACTIVE)) {
        Ok(waited_us) => info!("CS_ACTIVE cleared in {}us, DMA CS {:#x} -> {:#x}", waited_us, cs, hw.read(CS)),
        Err(_) => error!("Abort timed out waiting for CS_ACTIVE to clear, DMA CS {:#x}", cs),
    }
}

// ── Channel table ────────────────────────────────────────────────────────────

/// One hardware DMA channel.
pub struct DmaChannelConfig {
    /// Channel number.
    pub index: u32,
    /// ARM physical address of the channel's register window.
    pub base: u64,
    /// Interrupt line.
    pub irq: u32,
    /// Engine generation driving this channel.
    pub engine: &'static (dyn DmaEngine + Sync),
}

impl core::fmt::Debug for DmaChannelConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DmaChannelConfig")
            .field("index", &self.index)
            .field("base", &self.base)
            .field("irq", &self.irq)
            .field("width", &self.engine.width())
            .finish()
    }
}

const DMA1: &(dyn DmaEngine + Sync) = &Dma1Engine;
const DMA4: &(dyn DmaEngine + Sync) = &Dma4Engine;

const fn channel(index: u32, irq: u32, engine: &'static (dyn DmaEngine + Sync)) -> DmaChannelConfig {
    // `u64::from` is not const.
    #[allow(clippy::arithmetic_side_effects, clippy::cast_lossless)] // Safety: index <= 14, no overflow
    let base = DMA_BASE + index as u64 * DMA_CHANNEL_STRIDE;
    DmaChannelConfig { index, base, irq, engine }
}

/// Every channel the drivers may use, indexed by channel number.
pub static CHANNEL_TABLE: [DmaChannelConfig; DMA_CHANNEL_COUNT] = [
    channel(0, 112, DMA1),
    channel(1, 113, DMA1),
    channel(2, 114, DMA1),
    channel(3, 115, DMA1),
    channel(4, 116, DMA1),
    channel(5, 117, DMA1),
    channel(6, 118, DMA1),
    channel(7, 119, DMA1),
    channel(8, 119, DMA1),
    channel(9, 120, DMA1),
    channel(10, 120, DMA1),
    channel(11, 121, DMA4),
    channel(12, 122, DMA4),
    channel(13, 123, DMA4),
    channel(14, 124, DMA4),
];

/// Resolve a channel by number, or by the base address of its window.
pub fn resolve(chan: u32) -> Result<&'static DmaChannelConfig, DmaError> {
    let by_index = usize::try_from(chan).ok().and_then(|i| CHANNEL_TABLE.get(i));
    by_index
        .or_else(|| CHANNEL_TABLE.iter().find(|c| c.base == u64::from(chan)))
        .ok_or(DmaError::InvalidChannel(chan))
}
