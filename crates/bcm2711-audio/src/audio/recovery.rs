//! FIFO under/overrun recovery bookkeeping.
//!
//! # Background
//!
//! A PCM FIFO underrun (TXERR) or overrun (RXERR) can leave the left and
//! right channels swapped: the FIFO carries interleaved words with no
//! frame marker, so one dropped or repeated word shifts every frame after
//! it. The only way back into alignment is a full disable/enable cycle of
//! the direction, which clears the FIFO and restarts the DMA ring at its
//! head. The PWM block has the same failure modes (GAPO, RERR, WERR).
//!
//! # This Module
//!
//! [`ErrorCounters`] decides, per interrupt, whether the handler must
//! resynchronize and whether to log. Only the first FIFO error since the
//! last prepare is logged; a sustained underrun would otherwise log on
//! every fragment.
//!
//! # Usage Pattern
//!
//! ```rust,ignore
//! counters.record_dma(status);
//! if let FifoAction::Resync { first } = counters.on_fifo_flag(regs.any_set(CS, CS_TXERR)) {
//!     if first {
//!         error!("TXERR detected");
//!     }
//!     disable(); // then enable() if still active
//! }
//! ```

use crate::dma::DmaStatus;

// ── FifoAction ───────────────────────────────────────────────────────────────

/// What the interrupt handler does about the FIFO error flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FifoAction {
    /// FIFO healthy.
    Continue,
    /// FIFO error flagged: cycle the direction to realign the channels.
    Resync {
        /// First FIFO error since the counters were reset; log it.
        first: bool,
    },
}

// ── ErrorCounters ────────────────────────────────────────────────────────────

/// Per-direction error counts since the last prepare.
///
/// Both counters saturate at [`u32::MAX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    /// Interrupts whose DMA acknowledgement reported a transfer error.
    pub dma: u32,
    /// FIFO under/overruns, each followed by a resync.
    pub fifo: u32,
}

impl ErrorCounters {
    /// Count a DMA transfer error reported by the ack.
    pub fn record_dma(&mut self, status: DmaStatus) {
        if status.contains(DmaStatus::ERROR) {
            self.dma = self.dma.saturating_add(1);
        }
    }

    /// Update after reading the FIFO error flag in an interrupt.
    pub fn on_fifo_flag(&mut self, flagged: bool) -> FifoAction {
        if !flagged {
            return FifoAction::Continue;
        }
        let first = self.fifo == 0;
        self.fifo = self.fifo.saturating_add(1);
        FifoAction::Resync { first }
    }

    /// Returns `true` if either counter is non-zero.
    pub fn any(&self) -> bool {
        self.dma != 0 || self.fifo != 0
    }

    /// Start counting afresh (prepare).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
