//! Control blocks and the circular fragment chain.

use core::sync::atomic::{fence, Ordering};

use platform::dma_safety::{DmaPod, CONTROL_BLOCK_SIZE};

use super::DmaEngine;

/// One hardware DMA descriptor: eight 32-bit words, 256-bit aligned.
///
/// The word layout depends on the engine generation; only
/// [`DmaEngine::setcb`] writes it.
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlBlock {
    words: [u32; 8],
}

const _: () = assert!(core::mem::size_of::<ControlBlock>() == CONTROL_BLOCK_SIZE);

// SAFETY: `repr(C)` array of `u32` with no padding; every bit pattern is a
// valid control block.
unsafe impl DmaPod for ControlBlock {}

impl ControlBlock {
    /// Raw descriptor words.
    pub fn words(&self) -> &[u32; 8] {
        &self.words
    }

    pub(crate) fn set_words(&mut self, words: [u32; 8]) {
        self.words = words;
    }
}

/// Endpoints of a fragment ring, as ARM physical addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transfer {
    /// Playback: each fragment of `buffer` is written to `fifo`.
    ToDevice {
        /// Sample buffer.
        buffer: u64,
        /// Peripheral FIFO register.
        fifo: u64,
    },
    /// Capture: `fifo` is read into each fragment of `buffer`.
    FromDevice {
        /// Peripheral FIFO register.
        fifo: u64,
        /// Sample buffer.
        buffer: u64,
    },
}

impl Transfer {
    /// Source and destination of the fragment starting at `offset`.
    fn endpoints(self, offset: u64) -> (u64, u64) {
        match self {
            Self::ToDevice { buffer, fifo } => (buffer.wrapping_add(offset), fifo),
            Self::FromDevice { fifo, buffer } => (fifo, buffer.wrapping_add(offset)),
        }
    }
}

/// Fill `blocks` (mapped at `ring_phys`) as a closed ring, one block per
/// fragment of `frag_size` bytes.
///
/// Block `i` links to block `(i + 1) % N`, so the last block links back to
/// the first and the stream runs until aborted.
pub fn build_ring(
    engine: &dyn DmaEngine,
    blocks: &mut [ControlBlock],
    ring_phys: u64,
    ti: u32,
    transfer: Transfer,
    frag_size: u32,
) {
    let count = blocks.len() as u64;
    let cb_size = CONTROL_BLOCK_SIZE as u64;
    for (block, index) in blocks.iter_mut().zip(0u64..) {
        let next_index = index.wrapping_add(1).checked_rem(count).unwrap_or(0);
        let next = ring_phys.wrapping_add(next_index.wrapping_mul(cb_size));
        let (src, dst) = transfer.endpoints(index.wrapping_mul(u64::from(frag_size)));
        engine.setcb(block, ti, src, dst, frag_size, next);
    }
    // Descriptors must be visible before the engine is started on them.
    fence(Ordering::Release);
}
