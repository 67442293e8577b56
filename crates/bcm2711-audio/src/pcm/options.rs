//! PCM driver options.

use platform::{ClockMode, ClockSource, PinFunction, SampleFormat, SampleRateHz};

use crate::dma::DMA_CHANNEL_COUNT;
use crate::error::ConfigError;

/// Channels per frame when a direction is configured.
pub const PCM_CHANNELS: u32 = 2;

const MASH_MAX: u32 = 3;
const THRESHOLD_MAX: u32 = 0x7f;

/// GPIO pins carrying the PCM/I2S interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PcmPinGroup {
    /// GPIO 18-21 on ALT0.
    #[default]
    Primary,
    /// GPIO 28-31 on ALT2.
    Secondary,
}

impl PcmPinGroup {
    /// Bit clock, frame sync, data in and data out, in that order.
    pub const fn pins(self) -> [u8; 4] {
        match self {
            Self::Primary => [18, 19, 20, 21],
            Self::Secondary => [28, 29, 30, 31],
        }
    }

    /// Alternate function routing the pins to the PCM block.
    pub const fn function(self) -> PinFunction {
        match self {
            Self::Primary => PinFunction::Alt0,
            Self::Secondary => PinFunction::Alt2,
        }
    }
}

/// PCM driver configuration.
///
/// The [`Default`] is 32-bit I2S playback on DMA channel 2, clocked as
/// master from the oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PcmOptions {
    /// Playback voices: 0 (playback unused) or 2.
    pub tx_voices: u32,
    /// Capture voices: 0 (capture unused) or 2.
    pub rx_voices: u32,
    /// DMA channel for playback.
    pub tx_dma: u32,
    /// DMA channel for capture.
    pub rx_dma: u32,
    /// Pins the interface is routed to.
    pub gpio: PcmPinGroup,
    /// Clock manager source.
    pub clk_src: ClockSource,
    /// Clock manager MASH level, 0-3.
    pub clk_mash: u32,
    /// Whether the PCM block drives bit clock and frame sync.
    pub clk_mode: ClockMode,
    /// Lowest sample rate offered.
    pub rate_min: u32,
    /// Highest sample rate offered.
    pub rate_max: u32,
    /// Sample width: 16, 24 or 32.
    pub bits: u32,
    /// Bit clocks between frame sync and the first data bit (1 for I2S).
    pub bit_delay: u32,
    /// Bit clock polarity, 0 for I2S.
    pub clk_pol: u32,
    /// Frame sync polarity, 0 for I2S.
    pub fs_pol: u32,
    /// TX FIFO level below which a DMA request is raised.
    pub tx_dreq: u32,
    /// TX FIFO level below which a panic request is raised.
    pub tx_panic: u32,
    /// RX FIFO level above which a DMA request is raised.
    pub rx_dreq: u32,
    /// RX FIFO level above which a panic request is raised.
    pub rx_panic: u32,
}

impl Default for PcmOptions {
    fn default() -> Self {
        Self {
            tx_voices: PCM_CHANNELS,
            rx_voices: 0,
            tx_dma: 2,
            rx_dma: 3,
            gpio: PcmPinGroup::Primary,
            clk_src: ClockSource::Oscillator,
            clk_mash: 1,
            clk_mode: ClockMode::Master,
            rate_min: 8_000,
            rate_max: 192_000,
            bits: 32,
            bit_delay: 1,
            clk_pol: 0,
            fs_pol: 0,
            tx_dreq: 48,
            tx_panic: 16,
            rx_dreq: 32,
            rx_panic: 48,
        }
    }
}

impl PcmOptions {
    /// Whether playback is configured.
    pub fn playback(&self) -> bool {
        self.tx_voices != 0
    }

    /// Whether capture is configured.
    pub fn capture(&self) -> bool {
        self.rx_voices != 0
    }

    /// Sample format selected by [`bits`](Self::bits).
    pub fn format(&self) -> Result<SampleFormat, ConfigError> {
        SampleFormat::from_bits(self.bits).map_err(|_| ConfigError::Bits(self.bits))
    }

    /// Check every option against what the hardware supports.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for voices in [self.tx_voices, self.rx_voices] {
            if voices != 0 && voices != PCM_CHANNELS {
                return Err(ConfigError::Voices(voices));
            }
        }
        for chan in [self.tx_dma, self.rx_dma] {
            if usize::try_from(chan).map_or(true, |c| c >= DMA_CHANNEL_COUNT) {
                return Err(ConfigError::DmaChannel(chan));
            }
        }
        if self.tx_dma == self.rx_dma {
            return Err(ConfigError::SameDmaChannel(self.tx_dma));
        }
        if self.clk_mash > MASH_MAX {
            return Err(ConfigError::Mash(self.clk_mash));
        }
        for rate in [self.rate_min, self.rate_max] {
            SampleRateHz::try_new(rate).map_err(|_| ConfigError::Rate(rate))?;
        }
        if self.rate_min > self.rate_max {
            return Err(ConfigError::RateOrder { min: self.rate_min, max: self.rate_max });
        }
        self.format()?;
        for pol in [self.clk_pol, self.fs_pol] {
            if pol > 1 {
                return Err(ConfigError::Polarity(pol));
            }
        }
        for threshold in [self.tx_dreq, self.tx_panic, self.rx_dreq, self.rx_panic] {
            if threshold > THRESHOLD_MAX {
                return Err(ConfigError::Threshold(threshold));
            }
        }
        Ok(())
    }
}
