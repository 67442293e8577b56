//! PWM audio driver.
//!
//! Plays 2-channel 32-bit audio through the two serializers of one PWM
//! controller, fed from FIFO 1 by a single DMA channel. Each sample is
//! turned into an unsigned duty cycle of `precision` bits by
//! [`reconstitute`] before it reaches the DMA buffer; the PWM clock runs at
//! `rate << precision` so one duty cycle lasts exactly one sample period.
//!
//! The transmitter occasionally fails to start on enable. Enable checks
//! STA1/STA2 and toggles PWEN a few times before giving up with
//! [`AudioError::Io`].

mod options;
mod regs;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use platform::{
    AudioFramework, ChannelPosition, ClockSource, Direction, FormatSet, RateSet, RegisterBlock, RegisterMapper,
};

pub use options::{PwmController, PwmOptions};
pub use regs::{PWM0_BASE, PWM1_BASE, PWM_WINDOW_SIZE};

use regs::{
    dmac, CTL, CTL_CLRF, CTL_MSEN1, CTL_MSEN2, CTL_PWEN1, CTL_PWEN2, CTL_USEF1, CTL_USEF2, DMAC, RNG1, RNG2, STA,
    STA_ALL_ERR, STA_EMPT1, STA_STA1, STA_STA2,
};

use crate::audio::subchannel::{map_window, DmaBinding, Subchannel};
use crate::audio::{frag_time_us, Capabilities, ErrorCounters, StreamConfig, Trigger};
use crate::clock::{ClockManager, ClockUnit, CM_BASE, CM_WINDOW_SIZE};
use crate::clock_math::{pwm_clock, pwm_precision};
use crate::dma::ChannelRegistry;
use crate::error::AudioError;
use crate::gpio::{configure_pins, Bcm2711Gpio, GPIO_BASE, GPIO_WINDOW_SIZE};
use crate::poll::poll_while;

/// Channels per frame.
pub const PWM_CHANNELS: u32 = 2;

/// Bytes per interleaved frame (two 32-bit samples).
const FRAME_BYTES: u32 = 8;

const MIN_FRAG_SIZE: u32 = 64;
const MAX_FRAG_SIZE: u32 = 64 * 1024;
const MAX_FRAGS: u32 = 128;

const PRIME_POLL_TRIES: u32 = 200;
const DRAIN_POLL_TRIES: u32 = 100;
const FIFO_POLL_STEP_US: u32 = 5;
const START_SETTLE_US: u32 = 2;
const START_RETRIES: u32 = 5;

/// The PWM clock is always derived from PLLD.
const CLOCK_SOURCE: ClockSource = ClockSource::PllD;

/// Convert signed 32-bit samples in place into unsigned duty cycles of
/// `precision` bits.
///
/// The top `precision` bits are kept and the sign bit of the result is
/// flipped, moving the signed range onto `0..1 << precision`.
pub fn reconstitute(samples: &mut [u32], precision: u32) {
    if precision == 0 || precision > 32 {
        return;
    }
    let shift = 32u32.saturating_sub(precision);
    let sign = 1u32.checked_shl(precision.saturating_sub(1)).unwrap_or(0);
    for sample in samples {
        *sample = sample.checked_shr(shift).unwrap_or(0) ^ sign;
    }
}

// ── PwmDevice ────────────────────────────────────────────────────────────────

/// One PWM controller driven as a stereo playback device.
pub struct PwmDevice<B, F, D, M = CriticalSectionRawMutex>
where
    B: RegisterBlock,
    F: AudioFramework,
    D: DelayNs,
    M: RawMutex,
{
    framework: F,
    inner: Mutex<M, RefCell<PwmInner<B, F::Subchannel, D>>>,
}

struct PwmInner<B, H, D> {
    regs: B,
    clock: ClockManager<B>,
    delay: D,
    clk_mash: u32,
    fifo: u64,
    /// 0 until the first acquire.
    rate: u32,
    /// Duty-cycle width in bits for the current rate.
    precision: u32,
    caps: Capabilities,
    stream: Subchannel<B, H>,
}

impl<B, F, D, M> PwmDevice<B, F, D, M>
where
    B: RegisterBlock,
    F: AudioFramework,
    D: DelayNs,
    M: RawMutex,
{
    /// Bring up the controller selected by `options`.
    pub fn new<Mp>(
        options: PwmOptions,
        mapper: &mut Mp,
        registry: &'static (dyn ChannelRegistry + Sync),
        framework: F,
        delay: D,
    ) -> Result<Self, AudioError>
    where
        Mp: RegisterMapper<Block = B>,
    {
        options.validate()?;
        let pwm = options.controller()?;

        let gpio = map_window(mapper, GPIO_BASE, GPIO_WINDOW_SIZE)?;
        configure_pins(&mut Bcm2711Gpio::new(gpio), &pwm.pins(), pwm.function());

        let dma = DmaBinding::bind(mapper, registry, options.dma, Direction::Playback, pwm.dreq())?;

        let regs = map_window(mapper, pwm.base(), PWM_WINDOW_SIZE)?;
        regs.write(CTL, 0);
        regs.write(DMAC, 0);
        let clock = ClockManager::new(map_window(mapper, CM_BASE, CM_WINDOW_SIZE)?);

        regs.write(DMAC, dmac(options.panic, options.dreq));
        let msen = if options.msen { CTL_MSEN1 | CTL_MSEN2 } else { 0 };
        regs.write(CTL, CTL_CLRF | CTL_USEF1 | CTL_USEF2 | msen);

        debug!(
            "pwm {:#x} dma {} dreq {} irq {}",
            pwm.base(),
            options.dma,
            pwm.dreq(),
            dma.irq()
        );

        let caps = Capabilities {
            formats: FormatSet::S32,
            rates: RateSet::between(options.rate_min, options.rate_max),
            min_rate: options.rate_min,
            max_rate: options.rate_max,
            min_voices: PWM_CHANNELS,
            max_voices: PWM_CHANNELS,
            min_frag_size: MIN_FRAG_SIZE,
            max_frag_size: MAX_FRAG_SIZE,
            max_frags: MAX_FRAGS,
            chmap: [ChannelPosition::FrontRight, ChannelPosition::FrontLeft],
        };

        Ok(Self {
            framework,
            inner: Mutex::new(RefCell::new(PwmInner {
                regs,
                clock,
                delay,
                clk_mash: options.clk_mash,
                fifo: pwm.fifo(),
                rate: 0,
                precision: 0,
                caps,
                stream: Subchannel::new(Some(dma)),
            })),
        })
    }

    /// Zeroed while a stream is open.
    pub fn capabilities(&self) -> Capabilities {
        self.inner.lock(|cell| {
            let inner = cell.borrow();
            if inner.stream.is_open() {
                Capabilities::default()
            } else {
                inner.caps
            }
        })
    }

    /// Open the stream `handle`.
    pub fn acquire(&self, handle: F::Subchannel, config: &StreamConfig) -> Result<(), AudioError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let inner = &mut *inner;
            if inner.stream.is_open() {
                return Err(AudioError::NoChannel);
            }
            config.buffer_size()?;
            if inner.rate != config.rate {
                inner.rate = config.rate;
                inner.configure_clock();
            }
            let fifo = inner.fifo;
            inner.stream.open(&self.framework, handle, config, Direction::Playback, fifo)?;
            debug!(
                "config rate {} frag_size {} frags {} time {}us",
                config.rate,
                config.frag_size,
                config.frags,
                frag_time_us(config.frag_size, FRAME_BYTES, config.rate)
            );
            Ok(())
        })
    }

    /// Close the stream, stopping it first if it is running.
    pub fn release(&self) {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if inner.stream.active {
                inner.stream.active = false;
                inner.disable();
            }
            inner.stream.close(&self.framework);
        });
    }

    /// Rewind to the start of the buffer.
    pub fn prepare(&self) -> Result<(), AudioError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if !inner.stream.is_open() {
                return Err(AudioError::NoChannel);
            }
            inner.stream.prepare();
            Ok(())
        })
    }

    /// Start or stop the stream. A failed start leaves it stopped.
    pub fn trigger(&self, command: Trigger) -> Result<(), AudioError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if !inner.stream.is_open() {
                return Err(AudioError::NoChannel);
            }
            match command {
                Trigger::Go => {
                    inner.enable()?;
                    inner.stream.active = true;
                }
                Trigger::Stop => {
                    inner.stream.active = false;
                    inner.disable();
                    let errors = inner.stream.errors;
                    if errors.any() {
                        debug!("DMA errors = {}, PWM errors = {}", errors.dma, errors.fifo);
                    }
                }
            }
            Ok(())
        })
    }

    /// Byte offset the hardware has reached in the buffer.
    pub fn position(&self) -> u32 {
        self.inner.lock(|cell| cell.borrow().stream.position())
    }

    /// DMA errors and PWM error flags seen since the last prepare.
    pub fn error_counters(&self) -> ErrorCounters {
        self.inner.lock(|cell| cell.borrow().stream.errors)
    }

    /// Duty-cycle width for the current rate, 0 before the first acquire.
    pub fn precision(&self) -> u32 {
        self.inner.lock(|cell| cell.borrow().precision)
    }

    /// Interrupt line of the DMA channel.
    pub fn irq(&self) -> Option<u32> {
        self.inner.lock(|cell| cell.borrow().stream.irq())
    }

    /// Convert a fragment of signed samples for the current precision.
    pub fn reconstitute(&self, samples: &mut [u32]) {
        reconstitute(samples, self.precision());
    }

    /// DMA interrupt handler. A no-op when the channel has nothing pending.
    pub fn handle_interrupt(&self) {
        let acked = self.inner.lock(|cell| {
            let inner = cell.borrow();
            let status = inner.stream.ack();
            if status.is_empty() {
                trace!("Not our interrupt");
                return None;
            }
            let Some(handle) = inner.stream.active_handle() else {
                trace!("Unexpected interrupt");
                return None;
            };
            Some((status, handle))
        });
        let Some((status, handle)) = acked else {
            return;
        };

        self.framework.dma_interrupt(handle);

        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.stream.errors.record_dma(status);
            let errors = inner.regs.read(STA) & STA_ALL_ERR;
            if errors != 0 {
                error!("PWM error status {:#x}", errors);
                inner.regs.write(STA, errors);
                inner.stream.errors.fifo = inner.stream.errors.fifo.saturating_add(1);
            }
            inner.stream.advance();
        });
    }
}

impl<B, F, D, M> Drop for PwmDevice<B, F, D, M>
where
    B: RegisterBlock,
    F: AudioFramework,
    D: DelayNs,
    M: RawMutex,
{
    fn drop(&mut self) {
        let inner = self.inner.get_mut().get_mut();
        if inner.stream.active {
            inner.stream.active = false;
            inner.stream.abort(&mut inner.delay);
        }
        inner.stream.close(&self.framework);
        inner.regs.write(CTL, 0);
        inner.regs.write(DMAC, 0);
    }
}

// ── PwmInner ─────────────────────────────────────────────────────────────────

impl<B, H, D> PwmInner<B, H, D>
where
    B: RegisterBlock,
    H: Copy,
    D: DelayNs,
{
    /// Pick the precision for the rate, clock the serializers and set both
    /// ranges to one full duty cycle.
    fn configure_clock(&mut self) {
        if self.rate == 0 {
            return;
        }
        self.precision = pwm_precision(self.rate);
        let sysclk = pwm_clock(self.rate, self.precision);
        debug!("rate {}, prec {}, sysclk {}", self.rate, self.precision, sysclk);
        self.clock.configure(ClockUnit::Pwm, sysclk, CLOCK_SOURCE, self.clk_mash, &mut self.delay);
        let range = 1u32.checked_shl(self.precision).unwrap_or(0);
        self.regs.write(RNG1, range);
        self.regs.write(RNG2, range);
    }

    fn transmitting(&self) -> bool {
        self.regs.read(STA) & (STA_STA1 | STA_STA2) == STA_STA1 | STA_STA2
    }

    fn enable(&mut self) -> Result<(), AudioError> {
        self.regs.set_bits(CTL, CTL_CLRF);
        self.stream.start();
        match poll_while(&mut self.delay, PRIME_POLL_TRIES, FIFO_POLL_STEP_US, || {
            self.regs.any_set(STA, STA_EMPT1)
        }) {
            Ok(us) => debug!(
                "FIFO data in {}us, ctl = {:#x} sta = {:#x}",
                us,
                self.regs.read(CTL),
                self.regs.read(STA)
            ),
            Err(us) => error!(
                "Timed out ({}us) waiting for FIFO to go non-empty, ctl = {:#x}, sta = {:#x}",
                us,
                self.regs.read(CTL),
                self.regs.read(STA)
            ),
        }

        self.regs.set_bits(CTL, CTL_PWEN1 | CTL_PWEN2);
        self.delay.delay_us(START_SETTLE_US);

        for _ in 0..START_RETRIES {
            if self.transmitting() {
                return Ok(());
            }
            error!("Transmitter failed to start, toggling enable");
            self.regs.clear_bits(CTL, CTL_PWEN1 | CTL_PWEN2);
            self.regs.set_bits(CTL, CTL_PWEN1 | CTL_PWEN2);
            self.delay.delay_us(START_SETTLE_US);
        }
        error!("Failed to enable transmitter");
        self.disable();
        Err(AudioError::Io)
    }

    fn disable(&mut self) {
        self.stream.abort(&mut self.delay);
        match poll_while(&mut self.delay, DRAIN_POLL_TRIES, FIFO_POLL_STEP_US, || {
            !self.regs.any_set(STA, STA_EMPT1)
        }) {
            Ok(us) => debug!(
                "FIFO emptied in {}us, ctl = {:#x} sta = {:#x}",
                us,
                self.regs.read(CTL),
                self.regs.read(STA)
            ),
            Err(us) => error!(
                "Timed out ({}us) waiting for FIFO to empty, ctl = {:#x}, sta = {:#x}",
                us,
                self.regs.read(CTL),
                self.regs.read(STA)
            ),
        }
        self.regs.clear_bits(CTL, CTL_PWEN1 | CTL_PWEN2);
        let errors = self.regs.read(STA) & STA_ALL_ERR;
        if errors != 0 {
            self.regs.write(STA, errors);
        }
    }
}
