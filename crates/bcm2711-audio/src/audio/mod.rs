//! Stream types shared by the PCM and PWM drivers.
//!
//! Both drivers expose the same lifecycle to the upstream framework, per
//! direction:
//!
//! ```text
//! capabilities -> acquire -> prepare -> trigger(Go) -> ... -> trigger(Stop) -> release
//!                                ^                               |
//!                                +-------------------------------+
//! ```
//!
//! The per-direction state behind it lives in [`subchannel`]; FIFO error
//! bookkeeping in [`recovery`].

use platform::{ChannelPosition, FormatSet, RateSet};

use crate::error::ConfigError;

pub mod recovery;
pub(crate) mod subchannel;

pub use recovery::{ErrorCounters, FifoAction};

// ── StreamConfig ─────────────────────────────────────────────────────────────

/// Stream parameters negotiated by the upstream framework at acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Sample rate in Hz.
    pub rate: u32,
    /// Bytes per fragment (one DMA control block).
    pub frag_size: u32,
    /// Fragments in the circular buffer.
    pub frags: u32,
}

impl StreamConfig {
    /// Size of the circular buffer in bytes.
    ///
    /// Rejects an empty layout or one that overflows 32 bits.
    pub fn buffer_size(&self) -> Result<u32, ConfigError> {
        let invalid = ConfigError::Fragments { frag_size: self.frag_size, frags: self.frags };
        if self.frag_size == 0 || self.frags == 0 {
            return Err(invalid);
        }
        self.frag_size.checked_mul(self.frags).ok_or(invalid)
    }
}

// ── Trigger ──────────────────────────────────────────────────────────────────

/// Stream start/stop command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// Start streaming from the beginning of the ring.
    Go,
    /// Stop streaming and let the FIFO drain.
    Stop,
}

/// Duration of one fragment in microseconds, for logging.
///
/// `frame_bytes` is the size of one interleaved frame.
pub(crate) fn frag_time_us(frag_size: u32, frame_bytes: u32, rate: u32) -> u64 {
    let bytes_per_second = u64::from(frame_bytes).saturating_mul(u64::from(rate));
    u64::from(frag_size).saturating_mul(1_000_000).checked_div(bytes_per_second).unwrap_or(0)
}

// ── Capabilities ─────────────────────────────────────────────────────────────

/// What a direction can currently be opened with.
///
/// The [`Default`] value is all zero: no further opens possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Sample formats.
    pub formats: FormatSet,
    /// Sample rates.
    pub rates: RateSet,
    /// Lowest rate in `rates` (0 if none).
    pub min_rate: u32,
    /// Highest rate in `rates` (0 if none).
    pub max_rate: u32,
    /// Fewest interleaved channels.
    pub min_voices: u32,
    /// Most interleaved channels.
    pub max_voices: u32,
    /// Smallest fragment in bytes.
    pub min_frag_size: u32,
    /// Largest fragment in bytes.
    pub max_frag_size: u32,
    /// Most fragments per buffer.
    pub max_frags: u32,
    /// Speaker position of each interleaved channel.
    pub chmap: [ChannelPosition; 2],
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            formats: FormatSet::empty(),
            rates: RateSet::empty(),
            min_rate: 0,
            max_rate: 0,
            min_voices: 0,
            max_voices: 0,
            min_frag_size: 0,
            max_frag_size: 0,
            max_frags: 0,
            chmap: [ChannelPosition::FrontLeft, ChannelPosition::FrontRight],
        }
    }
}

impl Capabilities {
    /// Returns `true` if nothing can be opened.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty() || self.rates.is_empty()
    }

    /// Restrict the rates to the single `rate` another direction is locked to.
    #[must_use]
    pub fn locked_to(mut self, rate: u32) -> Self {
        self.rates = RateSet::from_rate(rate);
        self.min_rate = rate;
        self.max_rate = rate;
        self
    }

    /// Intersect with what the codec supports.
    #[must_use]
    pub fn masked(mut self, rates: RateSet, formats: FormatSet) -> Self {
        self.rates &= rates;
        self.formats &= formats;
        self.min_rate = self.rates.min_rate().unwrap_or(0);
        self.max_rate = self.rates.max_rate().unwrap_or(0);
        self
    }
}
