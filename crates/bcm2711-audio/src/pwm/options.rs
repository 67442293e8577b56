//! PWM driver options.

use platform::{PinFunction, SampleRateHz};

use super::regs::{FIF1, PWM0_BASE, PWM1_BASE};
use crate::dma::{DMA_CHANNEL_COUNT, DREQ_PWM0, DREQ_PWM1};
use crate::error::ConfigError;

const MASH_MAX: u32 = 3;
const THRESHOLD_MAX: u32 = 0xff;

/// One of the two PWM controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmController {
    /// PWM0 on GPIO 18/19, ALT5.
    Pwm0,
    /// PWM1 on GPIO 40/41, ALT0 (the Pi 4 headphone jack).
    Pwm1,
}

impl PwmController {
    /// Resolve a controller index (0 or 1) or base address.
    pub fn from_index_or_base(value: u32) -> Result<Self, ConfigError> {
        match u64::from(value) {
            0 | PWM0_BASE => Ok(Self::Pwm0),
            1 | PWM1_BASE => Ok(Self::Pwm1),
            _ => Err(ConfigError::PwmIndex(value)),
        }
    }

    /// ARM physical address of the register window.
    pub const fn base(self) -> u64 {
        match self {
            Self::Pwm0 => PWM0_BASE,
            Self::Pwm1 => PWM1_BASE,
        }
    }

    /// Physical address of FIFO 1, the destination of every transfer.
    pub const fn fifo(self) -> u64 {
        // Both windows are 2 KiB aligned.
        self.base() | FIF1
    }

    /// DREQ line pacing the DMA.
    pub const fn dreq(self) -> u32 {
        match self {
            Self::Pwm0 => DREQ_PWM0,
            Self::Pwm1 => DREQ_PWM1,
        }
    }

    /// Left and right output pins.
    pub const fn pins(self) -> [u8; 2] {
        match self {
            Self::Pwm0 => [18, 19],
            Self::Pwm1 => [40, 41],
        }
    }

    /// Alternate function routing the pins to this controller.
    pub const fn function(self) -> PinFunction {
        match self {
            Self::Pwm0 => PinFunction::Alt5,
            Self::Pwm1 => PinFunction::Alt0,
        }
    }
}

/// PWM driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmOptions {
    /// Controller index (0, 1) or base address.
    pub pwm: u32,
    /// DMA channel.
    pub dma: u32,
    /// Lowest sample rate offered.
    pub rate_min: u32,
    /// Highest sample rate offered.
    pub rate_max: u32,
    /// Clock manager MASH level, 0-3.
    pub clk_mash: u32,
    /// Mark-space mode instead of the PWM algorithm.
    pub msen: bool,
    /// FIFO level below which a DMA request is raised.
    pub dreq: u32,
    /// FIFO level below which a panic request is raised.
    pub panic: u32,
}

impl Default for PwmOptions {
    fn default() -> Self {
        Self { pwm: 1, dma: 2, rate_min: 44_100, rate_max: 48_000, clk_mash: 1, msen: true, dreq: 32, panic: 4 }
    }
}

impl PwmOptions {
    /// The selected controller.
    pub fn controller(&self) -> Result<PwmController, ConfigError> {
        PwmController::from_index_or_base(self.pwm)
    }

    /// Check every option against what the hardware supports.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller()?;
        if usize::try_from(self.dma).map_or(true, |c| c >= DMA_CHANNEL_COUNT) {
            return Err(ConfigError::DmaChannel(self.dma));
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
        for threshold in [self.dreq, self.panic] {
            if threshold > THRESHOLD_MAX {
                return Err(ConfigError::Threshold(threshold));
            }
        }
        Ok(())
    }
}
