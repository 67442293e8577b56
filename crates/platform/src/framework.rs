//! Upstream audio framework interface.
//!
//! The framework owns client connections and the stream lifecycle. The
//! driver consumes four services from it: DMA buffer allocation, anonymous
//! DMA-coherent mappings for control blocks, and per-fragment completion
//! notification.

use bitflags::bitflags;

use crate::dma::DmaRegion;

bitflags! {
    /// Allocation attributes for DMA memory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferFlags: u32 {
        /// Physically contiguous and reachable by the DMA engines.
        const DMA_SAFE = 1 << 0;
        /// CPU-cacheable (framework performs cache maintenance).
        const CACHE = 1 << 1;
    }
}

/// Allocation failures reported by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocError {
    /// No memory satisfying the requested flags.
    #[error("out of DMA-safe memory")]
    OutOfMemory,
    /// The request itself is invalid (zero or oversized length).
    #[error("invalid DMA allocation size")]
    InvalidSize,
}

/// Services the upstream audio framework provides to a driver.
///
/// Methods take `&self`: the framework is shared between stream callbacks
/// and interrupt handlers.
pub trait AudioFramework {
    /// Opaque handle of one open subchannel (stream).
    type Subchannel: Copy + PartialEq;

    /// Allocate the sample buffer for a stream.
    fn buf_alloc(&self, size: usize, flags: BufferFlags) -> Result<DmaRegion, AllocError>;

    /// Return a sample buffer obtained from [`buf_alloc`](Self::buf_alloc).
    fn buf_free(&self, region: DmaRegion);

    /// Map anonymous physically contiguous memory (control-block arrays).
    fn mmap_phys(&self, size: usize, flags: BufferFlags) -> Result<DmaRegion, AllocError>;

    /// Unmap memory obtained from [`mmap_phys`](Self::mmap_phys).
    fn munmap_phys(&self, region: DmaRegion);

    /// One fragment of `subchannel` has been transferred.
    ///
    /// Called without the device mutex held.
    fn dma_interrupt(&self, subchannel: Self::Subchannel);
}

impl<F: AudioFramework + ?Sized> AudioFramework for &F {
    type Subchannel = F::Subchannel;

    fn buf_alloc(&self, size: usize, flags: BufferFlags) -> Result<DmaRegion, AllocError> {
        (**self).buf_alloc(size, flags)
    }

    fn buf_free(&self, region: DmaRegion) {
        (**self).buf_free(region);
    }

    fn mmap_phys(&self, size: usize, flags: BufferFlags) -> Result<DmaRegion, AllocError> {
        (**self).mmap_phys(size, flags)
    }

    fn munmap_phys(&self, region: DmaRegion) {
        (**self).munmap_phys(region);
    }

    fn dma_interrupt(&self, subchannel: Self::Subchannel) {
        (**self).dma_interrupt(subchannel);
    }
}
