//! PCM/I2S audio driver.
//!
//! Streams 2-channel frames through the PCM FIFO, one DMA channel per
//! configured direction. Playback and capture share the bit clock, so once
//! one direction is open the other is locked to its sample rate.
//!
//! # Enable / disable sequencing
//!
//! ```text
//! enable(playback):  EN, TXERR|TXCLR, 4us, DMA start, wait !TXW, TXON
//! enable(capture):   EN, RXERR|RXCLR, 4us, DMA start, RXON
//! disable(playback): DMA abort, wait TXE, clear TXON
//! disable(capture):  DMA abort, clear RXON
//! then:              clear EN if neither TXON nor RXON
//! ```
//!
//! Playback waits for the FIFO to prime before TXON so no silence is
//! clocked out ahead of the first fragment, and drains it before clearing
//! TXON so the tail of the stream is not cut. Capture must abort its DMA
//! while RXON is still set or the abort never completes.

mod options;
mod regs;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use platform::{
    AudioCodec, AudioFramework, ClockMode, ClockSource, Direction, RateSet, RegisterBlock, RegisterMapper,
    SampleFormat,
};

pub use options::{PcmOptions, PcmPinGroup, PCM_CHANNELS};
pub use regs::{PCM_BASE, PCM_FIFO_PHYS, PCM_WINDOW_SIZE};

use regs::{
    channel_config, cs_rxthr, cs_txthr, dreq_thresholds, mode_flen, mode_fslen, CS, CS_DMAEN, CS_EN, CS_RXCLR,
    CS_RXERR, CS_RXON, CS_RXSEX, CS_TXCLR, CS_TXE, CS_TXERR, CS_TXON, CS_TXW, DREQ, MODE, MODE_CLKI, MODE_CLKM,
    MODE_CLK_DIS, MODE_FRXP, MODE_FSI, MODE_FSM, MODE_FTXP, RXC, TXC,
};

use crate::audio::subchannel::{map_window, DmaBinding, Subchannel};
use crate::audio::{frag_time_us, Capabilities, ErrorCounters, FifoAction, StreamConfig, Trigger};
use crate::clock::{ClockManager, ClockUnit, CM_BASE, CM_WINDOW_SIZE};
use crate::clock_math::pcm_bit_clock;
use crate::dma::{ChannelRegistry, DREQ_PCM_RX, DREQ_PCM_TX};
use crate::error::AudioError;
use crate::gpio::{configure_pins, Bcm2711Gpio, GPIO_BASE, GPIO_WINDOW_SIZE};
use crate::poll::poll_while;

const MIN_FRAG_SIZE: u32 = 64;
const MAX_FRAG_SIZE: u32 = 64 * 1024;

/// Control blocks of both directions share one 4 KiB page.
const MAX_FRAGS_SHARED: u32 = 64;
const MAX_FRAGS_SINGLE: u32 = 128;

const FIFO_CLEAR_US: u32 = 4;
const FIFO_POLL_TRIES: u32 = 200;
const FIFO_POLL_STEP_US: u32 = 5;

// ── PcmDevice ────────────────────────────────────────────────────────────────

/// One PCM/I2S controller and its playback and capture subchannels.
///
/// Every stream callback and both interrupt handlers lock the same mutex;
/// the hardware spin-waits of enable, disable and DMA abort run with it
/// held. Upstream notifications are made with it released.
pub struct PcmDevice<B, F, C, D, M = CriticalSectionRawMutex>
where
    B: RegisterBlock,
    F: AudioFramework,
    C: AudioCodec,
    D: DelayNs,
    M: RawMutex,
{
    framework: F,
    inner: Mutex<M, RefCell<PcmInner<B, F::Subchannel, C, D>>>,
}

struct PcmInner<B, H, C, D> {
    regs: B,
    /// Present in master mode only.
    clock: Option<ClockManager<B>>,
    codec: C,
    delay: D,
    format: SampleFormat,
    clk_src: ClockSource,
    clk_mash: u32,
    /// Shared by both directions; 0 until the first acquire.
    rate: u32,
    caps: Capabilities,
    playback: Subchannel<B, H>,
    capture: Subchannel<B, H>,
}

impl<B, F, C, D, M> PcmDevice<B, F, C, D, M>
where
    B: RegisterBlock,
    F: AudioFramework,
    C: AudioCodec,
    D: DelayNs,
    M: RawMutex,
{
    /// Bring up the controller.
    ///
    /// Validates `options`, routes the pins, claims a DMA channel per
    /// configured direction, configures the interface and mutes the codec.
    /// Fails with [`AudioError::Unsupported`] if the codec accepts none of
    /// the configured rates or formats.
    pub fn new<Mp>(
        options: PcmOptions,
        mapper: &mut Mp,
        registry: &'static (dyn ChannelRegistry + Sync),
        framework: F,
        mut codec: C,
        delay: D,
    ) -> Result<Self, AudioError>
    where
        Mp: RegisterMapper<Block = B>,
    {
        options.validate()?;
        let format = options.format()?;

        let gpio = map_window(mapper, GPIO_BASE, GPIO_WINDOW_SIZE)?;
        configure_pins(&mut Bcm2711Gpio::new(gpio), &options.gpio.pins(), options.gpio.function());

        let regs = map_window(mapper, PCM_BASE, PCM_WINDOW_SIZE)?;
        let playback = if options.playback() {
            Some(DmaBinding::bind(mapper, registry, options.tx_dma, Direction::Playback, DREQ_PCM_TX)?)
        } else {
            None
        };
        let capture = if options.capture() {
            Some(DmaBinding::bind(mapper, registry, options.rx_dma, Direction::Capture, DREQ_PCM_RX)?)
        } else {
            None
        };
        let clock = match options.clk_mode {
            ClockMode::Master => Some(ClockManager::new(map_window(mapper, CM_BASE, CM_WINDOW_SIZE)?)),
            ClockMode::Slave => None,
        };

        configure_interface(&regs, &options, format);

        let caps = Capabilities {
            formats: format.flag(),
            rates: RateSet::between(options.rate_min, options.rate_max),
            min_rate: options.rate_min,
            max_rate: options.rate_max,
            min_voices: PCM_CHANNELS,
            max_voices: PCM_CHANNELS,
            min_frag_size: MIN_FRAG_SIZE,
            max_frag_size: MAX_FRAG_SIZE,
            max_frags: if options.playback() && options.capture() { MAX_FRAGS_SHARED } else { MAX_FRAGS_SINGLE },
            ..Capabilities::default()
        };

        // Muted until the first trigger.
        codec.off(Direction::Playback);
        codec.off(Direction::Capture);
        let codec_rates = codec.supported_rates();
        let codec_formats = codec.supported_formats();
        let caps = caps.masked(codec_rates, codec_formats);

        let device = Self {
            framework,
            inner: Mutex::new(RefCell::new(PcmInner {
                regs,
                clock,
                codec,
                delay,
                format,
                clk_src: options.clk_src,
                clk_mash: options.clk_mash,
                rate: 0,
                caps,
                playback: Subchannel::new(playback),
                capture: Subchannel::new(capture),
            })),
        };

        if caps.is_empty() {
            error!(
                "Configured format or rate not supported by codec - codec formats {:#x} rates {:#x}",
                codec_formats.bits(),
                codec_rates.bits()
            );
            return Err(AudioError::Unsupported);
        }
        Ok(device)
    }

    /// What `direction` can be opened with right now.
    ///
    /// Zeroed while the direction is open (or not configured); locked to
    /// the running rate while the other direction is open.
    pub fn capabilities(&self, direction: Direction) -> Capabilities {
        self.inner.lock(|cell| {
            let inner = cell.borrow();
            let sub = inner.sub(direction);
            if !sub.is_configured() || sub.is_open() {
                Capabilities::default()
            } else if inner.sub(direction.other()).is_open() {
                inner.caps.locked_to(inner.rate)
            } else {
                inner.caps
            }
        })
    }

    /// Open `direction` for the stream `handle`.
    ///
    /// Changes the shared rate (codec and bit clock) if needed, allocates
    /// the sample buffer and the control-block ring and links the ring.
    pub fn acquire(&self, direction: Direction, handle: F::Subchannel, config: &StreamConfig) -> Result<(), AudioError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let inner = &mut *inner;
            let sub = inner.sub(direction);
            if !sub.is_configured() || sub.is_open() {
                error!("no channel available");
                return Err(AudioError::NoChannel);
            }
            if inner.sub(direction.other()).is_open() && config.rate != inner.rate {
                error!(
                    "mismatch between requested rate {} and rate configured for other dir {}",
                    config.rate, inner.rate
                );
                return Err(AudioError::BadRate { requested: config.rate, locked: inner.rate });
            }
            config.buffer_size()?;

            if inner.rate != config.rate {
                inner.rate = config.rate;
                inner.codec.set_rate(config.rate);
                inner.configure_clock();
            }

            inner.sub_mut(direction).open(&self.framework, handle, config, direction, PCM_FIFO_PHYS)?;
            debug!(
                "config rate {} frag_size {} frags {} time {}us",
                config.rate,
                config.frag_size,
                config.frags,
                frag_time_us(config.frag_size, PCM_CHANNELS.saturating_mul(inner.format.byte_width()), config.rate)
            );
            Ok(())
        })
    }

    /// Close `direction` and return its buffers to the framework.
    ///
    /// A running stream is stopped first.
    pub fn release(&self, direction: Direction) {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if inner.sub(direction).active {
                inner.stop(direction);
            }
            inner.sub_mut(direction).close(&self.framework);
        });
    }

    /// Rewind `direction` to the start of its buffer and clear its error
    /// counters. No hardware access.
    pub fn prepare(&self, direction: Direction) -> Result<(), AudioError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let sub = inner.sub_mut(direction);
            if !sub.is_open() {
                return Err(AudioError::NoChannel);
            }
            sub.prepare();
            Ok(())
        })
    }

    /// Start or stop `direction`.
    pub fn trigger(&self, direction: Direction, command: Trigger) -> Result<(), AudioError> {
        debug!("{} trigger {}", direction.name(), command_name(command));
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if !inner.sub(direction).is_open() {
                return Err(AudioError::NoChannel);
            }
            match command {
                Trigger::Go => {
                    inner.enable(direction);
                    inner.codec.on(direction);
                    inner.sub_mut(direction).active = true;
                }
                Trigger::Stop => {
                    inner.stop(direction);
                    let errors = inner.sub(direction).errors;
                    if errors.any() {
                        debug!("DMA errors = {}, FIFO errors = {}", errors.dma, errors.fifo);
                    }
                }
            }
            Ok(())
        })
    }

    /// Byte offset the hardware has reached in the buffer of `direction`.
    pub fn position(&self, direction: Direction) -> u32 {
        self.inner.lock(|cell| cell.borrow().sub(direction).position())
    }

    /// DMA and FIFO errors of `direction` since its last prepare.
    pub fn error_counters(&self, direction: Direction) -> ErrorCounters {
        self.inner.lock(|cell| cell.borrow().sub(direction).errors)
    }

    /// Shared sample rate, 0 before the first acquire.
    pub fn sample_rate(&self) -> u32 {
        self.inner.lock(|cell| cell.borrow().rate)
    }

    /// Interrupt line of the DMA channel serving `direction`.
    pub fn irq(&self, direction: Direction) -> Option<u32> {
        self.inner.lock(|cell| cell.borrow().sub(direction).irq())
    }

    /// DMA interrupt handler for `direction`.
    ///
    /// A no-op when the channel has nothing pending, so it can sit on a
    /// shared interrupt line.
    pub fn handle_interrupt(&self, direction: Direction) {
        match direction {
            Direction::Playback => self.playback_interrupt(),
            Direction::Capture => self.capture_interrupt(),
        }
    }

    // Notifies upstream before the FIFO check, with the lock released.
    fn playback_interrupt(&self) {
        let acked = self.inner.lock(|cell| {
            let inner = cell.borrow();
            let status = inner.playback.ack();
            if status.is_empty() {
                trace!("Not our interrupt");
                return None;
            }
            let Some(handle) = inner.playback.active_handle() else {
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
            inner.playback.errors.record_dma(status);
            inner.recover_fifo(Direction::Playback);
            inner.playback.advance();
        });
    }

    // Notifies upstream after the FIFO check and position advance.
    fn capture_interrupt(&self) {
        let notify = self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let status = inner.capture.ack();
            if status.is_empty() {
                trace!("Not our interrupt");
                return None;
            }
            let Some(handle) = inner.capture.active_handle() else {
                trace!("Unexpected interrupt");
                return None;
            };
            inner.capture.errors.record_dma(status);
            inner.recover_fifo(Direction::Capture);
            inner.capture.advance();
            Some(handle)
        });
        if let Some(handle) = notify {
            self.framework.dma_interrupt(handle);
        }
    }
}

impl<B, F, C, D, M> Drop for PcmDevice<B, F, C, D, M>
where
    B: RegisterBlock,
    F: AudioFramework,
    C: AudioCodec,
    D: DelayNs,
    M: RawMutex,
{
    fn drop(&mut self) {
        let inner = self.inner.get_mut().get_mut();
        for direction in [Direction::Playback, Direction::Capture] {
            if inner.sub(direction).active {
                inner.sub_mut(direction).active = false;
                inner.abort_dma(direction);
            }
            inner.sub_mut(direction).close(&self.framework);
        }
        inner.regs.clear_bits(CS, CS_TXON | CS_RXON | CS_EN | CS_DMAEN);
        inner.regs.set_bits(MODE, MODE_CLK_DIS);
        debug!("PCM unconfigured");
    }
}

// ── PcmInner ─────────────────────────────────────────────────────────────────

impl<B, H, C, D> PcmInner<B, H, C, D>
where
    B: RegisterBlock,
    H: Copy,
    C: AudioCodec,
    D: DelayNs,
{
    fn sub(&self, direction: Direction) -> &Subchannel<B, H> {
        match direction {
            Direction::Playback => &self.playback,
            Direction::Capture => &self.capture,
        }
    }

    fn sub_mut(&mut self, direction: Direction) -> &mut Subchannel<B, H> {
        match direction {
            Direction::Playback => &mut self.playback,
            Direction::Capture => &mut self.capture,
        }
    }

    fn configure_clock(&mut self) {
        if self.rate == 0 {
            return;
        }
        let Some(clock) = &self.clock else {
            return;
        };
        let sysclk = pcm_bit_clock(self.rate, self.format.bit_width());
        debug!("rate {}, bits {}, sysclk {}", self.rate, self.format.bit_width(), sysclk);
        clock.configure(ClockUnit::Pcm, sysclk, self.clk_src, self.clk_mash, &mut self.delay);
    }

    fn abort_dma(&mut self, direction: Direction) {
        match direction {
            Direction::Playback => self.playback.abort(&mut self.delay),
            Direction::Capture => self.capture.abort(&mut self.delay),
        }
    }

    fn enable(&mut self, direction: Direction) {
        debug!("{} enable", direction.name());
        self.regs.set_bits(CS, CS_EN);
        match direction {
            Direction::Playback => {
                self.regs.set_bits(CS, CS_TXERR | CS_TXCLR);
                self.delay.delay_us(FIFO_CLEAR_US);
                self.playback.start();
                match poll_while(&mut self.delay, FIFO_POLL_TRIES, FIFO_POLL_STEP_US, || {
                    self.regs.any_set(CS, CS_TXW)
                }) {
                    Ok(us) => debug!("TX FIFO primed in {}us", us),
                    Err(_) => error!("Failed to prime TX FIFO"),
                }
                self.regs.set_bits(CS, CS_TXON);
            }
            Direction::Capture => {
                self.regs.set_bits(CS, CS_RXERR | CS_RXCLR);
                self.delay.delay_us(FIFO_CLEAR_US);
                self.capture.start();
                self.regs.set_bits(CS, CS_RXON);
            }
        }
    }

    fn disable(&mut self, direction: Direction) {
        debug!("{} disable", direction.name());
        match direction {
            Direction::Playback => {
                self.playback.abort(&mut self.delay);
                match poll_while(&mut self.delay, FIFO_POLL_TRIES, FIFO_POLL_STEP_US, || {
                    !self.regs.any_set(CS, CS_TXE)
                }) {
                    Ok(us) => debug!("TX Drain completed in {}us", us),
                    Err(_) => error!("Failed to drain TX FIFO"),
                }
                self.regs.clear_bits(CS, CS_TXON);
            }
            Direction::Capture => {
                self.capture.abort(&mut self.delay);
                self.regs.clear_bits(CS, CS_RXON);
            }
        }
        if !self.regs.any_set(CS, CS_TXON | CS_RXON) {
            self.regs.clear_bits(CS, CS_EN);
        }
    }

    /// Trigger(Stop) body: inactive first, then mute, then disable.
    fn stop(&mut self, direction: Direction) {
        self.sub_mut(direction).active = false;
        self.codec.off(direction);
        self.disable(direction);
    }

    /// Cycle `direction` if its FIFO under/overran, to restore L/R alignment.
    fn recover_fifo(&mut self, direction: Direction) {
        let (flag, name) = match direction {
            Direction::Playback => (CS_TXERR, "TXERR"),
            Direction::Capture => (CS_RXERR, "RXERR"),
        };
        let flagged = self.regs.any_set(CS, flag);
        if let FifoAction::Resync { first } = self.sub_mut(direction).errors.on_fifo_flag(flagged) {
            if first {
                error!("{} detected", name);
            }
            self.disable(direction);
            if self.sub(direction).active {
                self.enable(direction);
            }
        }
    }
}

// ── Interface configuration ──────────────────────────────────────────────────

/// Program MODE, the channel layout, the DREQ levels and CS.
///
/// DMAEN serves both directions and is set once here.
fn configure_interface(regs: &impl RegisterBlock, options: &PcmOptions, format: SampleFormat) {
    let bits = format.bit_width();
    regs.write(CS, 0);

    let mut mode = mode_flen(bits.saturating_mul(PCM_CHANNELS).saturating_sub(1)) | mode_fslen(bits);
    if options.clk_pol == 0 {
        mode |= MODE_CLKI;
    }
    if options.fs_pol == 0 {
        mode |= MODE_FSI;
    }
    if options.clk_mode == ClockMode::Slave {
        mode |= MODE_CLKM | MODE_FSM;
    }
    let mut cs = 0;

    regs.write(DREQ, dreq_thresholds(options.tx_panic, options.tx_dreq, options.rx_panic, options.rx_dreq));

    if options.playback() {
        if format == SampleFormat::S16 {
            mode |= MODE_FTXP;
        }
        regs.write(TXC, channel_config(bits, options.bit_delay));
        // TXW holds while the TX FIFO is under 3/4 full.
        cs |= cs_txthr(2);
    }
    if options.capture() {
        match format {
            SampleFormat::S16 => mode |= MODE_FRXP,
            SampleFormat::S24In32 => cs |= CS_RXSEX,
            SampleFormat::S32 => {}
        }
        regs.write(RXC, channel_config(bits, options.bit_delay));
        cs |= cs_rxthr(0);
    }
    regs.write(MODE, mode);
    regs.write(CS, cs | CS_DMAEN);
    debug!("PCM MODE {:#x} CS {:#x}", regs.read(MODE), regs.read(CS));
}

fn command_name(command: Trigger) -> &'static str {
    match command {
        Trigger::Go => "Go",
        Trigger::Stop => "Stop",
    }
}
