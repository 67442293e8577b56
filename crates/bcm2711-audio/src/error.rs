//! Driver error types.
//!
//! Only failures surfaced synchronously to the caller live here: resource
//! contention, configuration conflicts, allocation failures and invalid
//! options. Transient hardware faults (FIFO under/overrun, DMA error flags)
//! are recovered in the interrupt handlers and only show up in
//! [`ErrorCounters`](crate::ErrorCounters); timeouts are logged and the
//! operation proceeds.

use platform::AllocError;

// ── DmaError ─────────────────────────────────────────────────────────────────

/// DMA channel resolution and arbitration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// Neither a channel index nor a channel base address.
    #[error("no DMA channel {0:#x}")]
    InvalidChannel(u32),
    /// Another consumer owns the channel.
    #[error("DMA channel {0} is busy")]
    Busy(u32),
}

// ── ConfigError ──────────────────────────────────────────────────────────────

/// A rejected driver option.
///
/// Returned by `validate()` on the option structs before any register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Voice count other than 0 (direction unused) or 2.
    #[error("unsupported voice count {0}")]
    Voices(u32),
    /// DMA channel number above 14.
    #[error("unsupported DMA channel {0}")]
    DmaChannel(u32),
    /// Playback and capture configured on the same DMA channel.
    #[error("tx_dma and rx_dma share the same value {0}")]
    SameDmaChannel(u32),
    /// MASH level above 3.
    #[error("unsupported clk_mash value {0}")]
    Mash(u32),
    /// Rate bound that is not a standard PCM rate.
    #[error("unsupported rate {0}")]
    Rate(u32),
    /// Minimum rate above maximum rate.
    #[error("min rate {min} higher than max rate {max}")]
    RateOrder {
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },
    /// Sample width other than 16, 24 or 32 bits.
    #[error("unsupported bits value {0}")]
    Bits(u32),
    /// Clock or frame-sync polarity other than 0 or 1.
    #[error("unsupported polarity value {0}")]
    Polarity(u32),
    /// DREQ or panic threshold above the register field maximum.
    #[error("unsupported threshold {0}")]
    Threshold(u32),
    /// PWM controller that is neither 0, 1 nor a controller base address.
    #[error("unsupported PWM module index or base address {0:#x}")]
    PwmIndex(u32),
    /// Zero fragment size or count, or a buffer that overflows 32 bits.
    #[error("invalid fragment layout {frag_size} x {frags}")]
    Fragments {
        /// Fragment size in bytes.
        frag_size: u32,
        /// Fragment count.
        frags: u32,
    },
}

// ── AudioError ───────────────────────────────────────────────────────────────

/// Reason code handed back to the upstream framework on a failed acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WhyFailed {
    /// No subchannel available in this direction.
    NoChannel,
    /// Requested rate conflicts with the other direction.
    BadRate,
}

/// Errors returned by the PCM and PWM drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioError {
    /// This direction already has an open subchannel, or is not configured.
    #[error("no channel available")]
    NoChannel,
    /// The other direction is open at a different rate.
    #[error("requested rate {requested} Hz conflicts with rate {locked} Hz of the other direction")]
    BadRate {
        /// Rate asked for.
        requested: u32,
        /// Rate the device is locked to.
        locked: u32,
    },
    /// Sample buffer or control-block allocation failed.
    #[error("allocation failed: {0}")]
    Alloc(AllocError),
    /// The transmitter did not start.
    #[error("transmitter failed to start")]
    Io,
    /// A register window could not be mapped.
    #[error("failed to map registers at {0:#x}")]
    Map(u64),
    /// Invalid driver option.
    #[error("invalid configuration: {0}")]
    Config(ConfigError),
    /// DMA channel unavailable.
    #[error("DMA: {0}")]
    Dma(DmaError),
    /// The codec supports none of the configured rates or formats.
    #[error("configured format or rate not supported by codec")]
    Unsupported,
}

impl AudioError {
    /// Upstream reason code for an acquire failure, if the error has one.
    pub fn why_failed(&self) -> Option<WhyFailed> {
        match self {
            Self::NoChannel => Some(WhyFailed::NoChannel),
            Self::BadRate { .. } => Some(WhyFailed::BadRate),
            _ => None,
        }
    }
}

impl From<AllocError> for AudioError {
    fn from(err: AllocError) -> Self {
        Self::Alloc(err)
    }
}

impl From<ConfigError> for AudioError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<DmaError> for AudioError {
    fn from(err: DmaError) -> Self {
        Self::Dma(err)
    }
}
