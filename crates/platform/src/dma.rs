//! DMA memory abstraction layer
//!
//! Buffers and control-block arrays handed to the DMA engines live in
//! physically contiguous, DMA-coherent memory owned by the upstream audio
//! framework. [`DmaRegion`] carries both views of such a mapping: the CPU
//! pointer the driver writes through, and the ARM physical address the
//! engines are programmed with.

use core::ptr::NonNull;

use crate::dma_safety::DmaPod;

/// A physically contiguous DMA-coherent mapping.
///
/// Owned by whoever allocated it; the driver returns it to the framework on
/// release (`buf_free` / `munmap_phys`).
#[derive(Debug, PartialEq, Eq)]
pub struct DmaRegion {
    virt: NonNull<u8>,
    phys: u64,
    len: usize,
}

// SAFETY: the mapping is plain memory with no thread affinity; the region is
// the unique owner of it per `DmaRegion::new`.
unsafe impl Send for DmaRegion {}

impl DmaRegion {
    /// Wrap a mapping of `len` bytes at CPU address `virt`, physical `phys`.
    ///
    /// # Safety
    ///
    /// `virt` must be valid for reads and writes of `len` bytes for as long
    /// as the region exists, nothing else may access it except the DMA
    /// engine, and `phys` must be the ARM physical address of `virt`.
    #[must_use]
    pub const unsafe fn new(virt: NonNull<u8>, phys: u64, len: usize) -> Self {
        Self { virt, phys, len }
    }

    /// ARM physical address of the first byte.
    pub fn phys_addr(&self) -> u64 {
        self.phys
    }

    /// View the region as an array of `T`.
    ///
    /// Returns `None` if the mapping is not aligned for `T`. Trailing bytes
    /// that do not fill a whole `T` are not part of the view.
    pub fn as_mut_slice_of<T: DmaPod>(&mut self) -> Option<&mut [T]> {
        let size = core::mem::size_of::<T>();
        if size == 0 || self.virt.as_ptr().align_offset(core::mem::align_of::<T>()) != 0 {
            return None;
        }
        let count = self.len.checked_div(size)?;
        // SAFETY: alignment checked above; `count * size <= len`; `T: DmaPod`
        // guarantees every bit pattern is a valid `T`.
        Some(unsafe { core::slice::from_raw_parts_mut(self.virt.as_ptr().cast::<T>(), count) })
    }
}
