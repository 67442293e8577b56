//! Memory-mapped register access.
//!
//! Every peripheral window the drivers touch (PCM, PWM, DMA channel, clock
//! manager, GPIO) is reached through [`RegisterBlock`]. Drivers never
//! dereference raw device pointers, and tests substitute a fake block
//! (see `mocks::FakeRegisters`).
//!
//! Offsets are byte offsets from the start of the window, matching the
//! register tables in the BCM2711 ARM Peripherals datasheet.

use core::ptr::NonNull;

/// A window of 32-bit device registers.
///
/// Implementations must not merge, elide or reorder accesses: every call is
/// one bus transaction in program order.
pub trait RegisterBlock {
    /// Read the 32-bit register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the 32-bit register at `offset`.
    fn write(&self, offset: usize, value: u32);

    /// Read-modify-write: OR `mask` into the register.
    ///
    /// Like the hardware `|=` idiom, any write-1-to-clear bits that read as
    /// set are written back as well.
    fn set_bits(&self, offset: usize, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value | mask);
    }

    /// Read-modify-write: clear `mask` in the register.
    fn clear_bits(&self, offset: usize, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value & !mask);
    }

    /// Returns `true` if any bit of `mask` reads as set.
    fn any_set(&self, offset: usize, mask: u32) -> bool {
        self.read(offset) & mask != 0
    }
}

impl<T: RegisterBlock + ?Sized> RegisterBlock for &T {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value);
    }
}

/// Maps physical peripheral windows to register blocks.
///
/// Drivers call this once per window at init (the device block, the clock
/// manager, the GPIO bank and each DMA channel they own).
pub trait RegisterMapper {
    /// Register block type produced for every window.
    type Block: RegisterBlock;

    /// Map `len` bytes of device registers at ARM physical address `phys`.
    ///
    /// Returns `None` if the window cannot be mapped.
    fn map(&mut self, phys: u64, len: usize) -> Option<Self::Block>;
}

impl<T: RegisterMapper + ?Sized> RegisterMapper for &mut T {
    type Block = T::Block;

    fn map(&mut self, phys: u64, len: usize) -> Option<Self::Block> {
        (**self).map(phys, len)
    }
}

/// Volatile view over a mapped peripheral window.
///
/// Accesses outside the window, or at an offset that is not word aligned,
/// read as zero and drop writes; in debug builds they trip an assertion.
#[derive(Debug)]
pub struct MmioRegion {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the window is device memory, not thread-affine; exclusive use is
// enforced by whoever owns the region (the driver's device mutex).
unsafe impl Send for MmioRegion {}

impl MmioRegion {
    /// Wrap a mapped register window of `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point to a device mapping of at least `len` bytes that
    /// stays mapped for the lifetime of the returned region, and no Rust
    /// reference may alias it.
    #[must_use]
    pub const unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        Self { base, len }
    }

    /// Size of the window in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length window.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn word(&self, offset: usize) -> Option<*mut u32> {
        let in_window = offset.checked_add(4).is_some_and(|end| end <= self.len);
        if !in_window || offset % 4 != 0 {
            debug_assert!(false, "register offset {offset:#x} outside window");
            return None;
        }
        // SAFETY: offset + 4 <= len and the window is mapped per `new`.
        Some(unsafe { self.base.as_ptr().cast::<u8>().add(offset).cast::<u32>() })
    }
}

impl RegisterBlock for MmioRegion {
    fn read(&self, offset: usize) -> u32 {
        match self.word(offset) {
            // SAFETY: `word` only yields aligned pointers inside the mapping.
            Some(ptr) => unsafe { ptr.read_volatile() },
            None => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        if let Some(ptr) = self.word(offset) {
            // SAFETY: `word` only yields aligned pointers inside the mapping.
            unsafe { ptr.write_volatile(value) }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mmio_region_reads_back_writes() {
        let mut backing = [0u32; 4];
        let base = NonNull::new(backing.as_mut_ptr()).unwrap();
        // SAFETY: `backing` outlives `regs` and is only touched through it.
        let regs = unsafe { MmioRegion::new(base, 16) };

        regs.write(0x4, 0xdead_beef);
        regs.set_bits(0x8, 0b1010);
        regs.set_bits(0x8, 0b0001);
        regs.clear_bits(0x8, 0b1000);

        assert_eq!(regs.read(0x4), 0xdead_beef);
        assert_eq!(regs.read(0x8), 0b0011);
        assert!(regs.any_set(0x8, 0b0010));
        assert!(!regs.any_set(0x8, 0b1000));
    }

    #[test]
    fn register_block_is_usable_through_a_reference() {
        let mut backing = [0u32; 2];
        let base = NonNull::new(backing.as_mut_ptr()).unwrap();
        // SAFETY: `backing` outlives `regs`.
        let regs = unsafe { MmioRegion::new(base, 8) };
        let by_ref: &dyn RegisterBlock = &regs;
        by_ref.write(0, 7);
        assert_eq!((&regs).read(0), 7);
    }
}
