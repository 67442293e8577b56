//! DMA safety marker traits and address-map constants for the BCM2711.
//!
//! ## Address views on the BCM2711
//!
//! | View                 | Peripherals            | SDRAM            | Used by            |
//! |----------------------|------------------------|------------------|--------------------|
//! | ARM physical (low)   | 0xFC00_0000..0xFF80_0000 | 0x0 ..         | CPU, this crate    |
//! | Legacy bus (VC)      | 0x7C00_0000..0x7F80_0000 | 0xC000_0000 .. | DMA1 (channels 0-10) |
//! | Full 35-bit bus      | 0x4_7C00_0000..        | 0x0 ..           | DMA4 (channels 11-14) |
//!
//! DMA1 engines only see the first 1 GB of SDRAM through the uncached
//! 0xC000_0000 alias. Buffers handed to them must come from the framework's
//! DMA-safe allocator, which honours that limit.
//!
//! ## Usage
//! ```rust
//! use platform::dma_safety::{is_peripheral_address, LOW_PERIPHERAL_BASE};
//!
//! assert!(is_peripheral_address(LOW_PERIPHERAL_BASE + 0x20_3000));
//! ```

// ── Memory region addresses ──────────────────────────────────────────────────

/// Base of the "low peripheral" window in the ARM physical map.
pub const LOW_PERIPHERAL_BASE: u64 = 0xFC00_0000;

/// Mask selecting the top six address bits that identify the peripheral window.
pub const PERIPHERAL_WINDOW_MASK: u64 = 0xFC00_0000;

/// Size of one DMA control block in bytes (both engine generations).
pub const CONTROL_BLOCK_SIZE: usize = 32;

/// Control blocks must be 256-bit aligned; the engines ignore the low 5 bits.
pub const CONTROL_BLOCK_ALIGN: usize = 32;

/// Returns `true` if `phys` lies in the low peripheral window.
pub const fn is_peripheral_address(phys: u64) -> bool {
    phys & PERIPHERAL_WINDOW_MASK == PERIPHERAL_WINDOW_MASK
}

// ── Marker traits ────────────────────────────────────────────────────────────

/// Marker trait: plain-old-data that may be viewed directly in DMA memory.
///
/// # Safety
/// Only implement for `#[repr(C)]` types with no padding-sensitive
/// invariants, for which every bit pattern is a valid value. The DMA engine
/// and the CPU both write these bytes; a type with a niche or a reference
/// field would be undefined behaviour to read back.
pub unsafe trait DmaPod: Sized {}

// SAFETY: integers accept every bit pattern and have no padding.
unsafe impl DmaPod for u8 {}
// SAFETY: as above.
unsafe impl DmaPod for u16 {}
// SAFETY: as above.
unsafe impl DmaPod for u32 {}
// SAFETY: as above.
unsafe impl DmaPod for i32 {}
