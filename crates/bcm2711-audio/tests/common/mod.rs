//! Hardware models shared by the integration tests.
//!
//! Each model is a [`FakeRegisters`] window with just enough behaviour for
//! the drivers' spin-waits to terminate the way real silicon would:
//!
//! - a DMA channel is ACTIVE from start until abort or reset,
//! - the PCM TX FIFO needs data (TXW) and is empty (TXE) exactly while its
//!   DMA channel is not feeding it,
//! - the PWM FIFO is empty while its DMA is idle and the serializers report
//!   STA1/STA2 once enabled with data flowing.
//!
//! Windows are installed on a [`FakeBus`] before the device maps them.

#![allow(dead_code, clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bcm2711_audio::dma::{StaticChannelRegistry, DMA_BASE, DMA_CHANNEL_COUNT, DMA_CHANNEL_STRIDE, DMA_WINDOW_SIZE};
use bcm2711_audio::pcm::{PcmDevice, PCM_BASE, PCM_WINDOW_SIZE};
use bcm2711_audio::pwm::{PwmDevice, PWM_WINDOW_SIZE};
use platform::mocks::{CountingDelay, FakeBus, FakeFramework, FakeRegisters, MockCodec};

pub type TestPcm = PcmDevice<FakeRegisters, FakeFramework, MockCodec, CountingDelay>;
pub type TestPwm = PwmDevice<FakeRegisters, FakeFramework, CountingDelay>;

// ── Register maps ────────────────────────────────────────────────────────────

/// DMA channel registers (DMA1 layout, CS shared with DMA4).
pub mod dma {
    pub const CS: usize = 0x00;
    pub const CONBLK_AD: usize = 0x04;
    pub const TXFR_LEN: usize = 0x14;
    pub const NEXTCONBK: usize = 0x1c;

    pub const CS_RESET: u32 = 1 << 31;
    pub const CS_ABORT: u32 = 1 << 30;
    pub const CS_ERROR: u32 = 1 << 8;
    pub const CS_INT: u32 = 1 << 2;
    pub const CS_END: u32 = 1 << 1;
    pub const CS_ACTIVE: u32 = 1 << 0;

    /// DMA4 only.
    pub const DMA4_CB: usize = 0x04;
    pub const DMA4_DEBUG: usize = 0x0c;
    pub const DMA4_LEN: usize = 0x24;
    pub const DMA4_DEBUG_RESET: u32 = 1 << 23;
}

/// PCM block registers.
pub mod pcm {
    pub const CS: usize = 0x00;
    pub const MODE: usize = 0x08;

    pub const CS_TXE: u32 = 1 << 21;
    pub const CS_TXW: u32 = 1 << 17;
    pub const CS_RXERR: u32 = 1 << 16;
    pub const CS_TXERR: u32 = 1 << 15;
    pub const CS_DMAEN: u32 = 1 << 9;
    pub const CS_RXCLR: u32 = 1 << 4;
    pub const CS_TXCLR: u32 = 1 << 3;
    pub const CS_TXON: u32 = 1 << 2;
    pub const CS_RXON: u32 = 1 << 1;
    pub const CS_EN: u32 = 1 << 0;

    pub const MODE_CLK_DIS: u32 = 1 << 28;
}

/// PWM controller registers.
pub mod pwm {
    pub const CTL: usize = 0x00;
    pub const STA: usize = 0x04;
    pub const DMAC: usize = 0x08;
    pub const RNG1: usize = 0x10;
    pub const RNG2: usize = 0x20;

    pub const CTL_MSEN2: u32 = 1 << 15;
    pub const CTL_USEF2: u32 = 1 << 13;
    pub const CTL_PWEN2: u32 = 1 << 8;
    pub const CTL_MSEN1: u32 = 1 << 7;
    pub const CTL_CLRF: u32 = 1 << 6;
    pub const CTL_USEF1: u32 = 1 << 5;
    pub const CTL_PWEN1: u32 = 1 << 0;

    pub const STA_STA2: u32 = 1 << 10;
    pub const STA_STA1: u32 = 1 << 9;
    pub const STA_BERR: u32 = 1 << 8;
    pub const STA_GAPO1: u32 = 1 << 4;
    pub const STA_EMPT1: u32 = 1 << 1;
    pub const STA_ERRORS: u32 = 0x13c;
}

/// Clock manager registers of the PCM and PWM units.
pub mod cm {
    pub const PCM_CTL: usize = 0x98;
    pub const PCM_DIV: usize = 0x9c;
    pub const PWM_CTL: usize = 0xa0;
    pub const PWM_DIV: usize = 0xa4;
    pub const DIV_MASK: u32 = 0x00ff_ffff;
    pub const CTL_ENAB: u32 = 1 << 4;
}

/// ARM physical address of DMA channel `chan`.
pub fn dma_base(chan: u32) -> u64 {
    DMA_BASE + u64::from(chan) * DMA_CHANNEL_STRIDE
}

/// Legacy (DMA1) bus address of RAM at `phys`.
pub fn dma1_ram(phys: u64) -> u32 {
    u32::try_from(phys | 0xC000_0000).unwrap()
}

/// A fresh registry so tests do not contend for channels.
pub fn registry() -> &'static StaticChannelRegistry {
    Box::leak(Box::new(StaticChannelRegistry::new()))
}

// ── Models ───────────────────────────────────────────────────────────────────

/// A DMA channel: INT/END/ERROR write-1-to-clear, RESET clears the channel
/// and an ABORT completes (drops ACTIVE) on the next ACTIVE write.
pub fn dma_channel() -> FakeRegisters {
    let mut aborting = false;
    FakeRegisters::new(DMA_WINDOW_SIZE)
        .with_w1c(dma::CS, dma::CS_INT | dma::CS_END | dma::CS_ERROR)
        .on_write(dma::CS, move |written, next| {
            if written & dma::CS_RESET != 0 {
                aborting = false;
                return 0;
            }
            if written & dma::CS_ABORT != 0 {
                aborting = true;
            }
            let mut next = next & !dma::CS_ABORT;
            if aborting && next & dma::CS_ACTIVE != 0 {
                aborting = false;
                next &= !dma::CS_ACTIVE;
            }
            next
        })
}

fn feeding(dma: &FakeRegisters) -> bool {
    dma.get(dma::CS) & dma::CS_ACTIVE != 0
}

/// The PCM block, its TX FIFO fed by `tx_dma`.
pub fn pcm_block(tx_dma: FakeRegisters) -> FakeRegisters {
    FakeRegisters::new(PCM_WINDOW_SIZE)
        .with_w1c(pcm::CS, pcm::CS_TXERR | pcm::CS_RXERR)
        .with_self_clearing(pcm::CS, pcm::CS_TXCLR | pcm::CS_RXCLR)
        .with_read_only(pcm::CS, pcm::CS_TXW | pcm::CS_TXE)
        .on_read(pcm::CS, move |cs| {
            *cs &= !(pcm::CS_TXW | pcm::CS_TXE);
            if !feeding(&tx_dma) {
                *cs |= pcm::CS_TXW | pcm::CS_TXE;
            }
        })
}

/// PWM controller model. `start_failures` rising edges of PWEN1 fail to
/// start the serializers before they start reliably.
pub struct PwmModel {
    pub regs: FakeRegisters,
    pub start_failures: Arc<AtomicU32>,
}

pub fn pwm_block(dma: FakeRegisters) -> PwmModel {
    let start_failures = Arc::new(AtomicU32::new(0));
    let running = Arc::new(AtomicBool::new(false));
    let ctl_shadow = Arc::new(AtomicU32::new(0));

    let failures = Arc::clone(&start_failures);
    let started = Arc::clone(&running);
    let regs = FakeRegisters::new(PWM_WINDOW_SIZE)
        .with_self_clearing(pwm::CTL, pwm::CTL_CLRF)
        .on_write(pwm::CTL, move |_written, next| {
            let before = ctl_shadow.swap(next, Ordering::SeqCst);
            if next & pwm::CTL_PWEN1 == 0 {
                started.store(false, Ordering::SeqCst);
            } else if before & pwm::CTL_PWEN1 == 0 {
                let failed = failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
                started.store(!failed, Ordering::SeqCst);
            }
            next
        })
        .with_w1c(pwm::STA, pwm::STA_ERRORS)
        .with_read_only(pwm::STA, pwm::STA_EMPT1 | pwm::STA_STA1 | pwm::STA_STA2)
        .on_read(pwm::STA, move |sta| {
            *sta &= !(pwm::STA_EMPT1 | pwm::STA_STA1 | pwm::STA_STA2);
            let fed = feeding(&dma);
            if !fed {
                *sta |= pwm::STA_EMPT1;
            }
            if fed && running.load(Ordering::SeqCst) {
                *sta |= pwm::STA_STA1 | pwm::STA_STA2;
            }
        });
    PwmModel { regs, start_failures }
}

/// A bus with every DMA channel modelled and the PCM block fed by
/// `tx_chan`.
pub fn pcm_bus(tx_chan: u32) -> FakeBus {
    let bus = dma_bus();
    let tx_dma = bus.window(dma_base(tx_chan)).unwrap();
    bus.install(PCM_BASE, pcm_block(tx_dma));
    bus
}

/// A bus with every DMA channel modelled and the PWM controller at `base`
/// fed by `chan`.
pub fn pwm_bus(base: u64, chan: u32) -> (FakeBus, PwmModel) {
    let bus = dma_bus();
    let model = pwm_block(bus.window(dma_base(chan)).unwrap());
    bus.install(base, model.regs.clone());
    (bus, model)
}

fn dma_bus() -> FakeBus {
    let bus = FakeBus::new();
    for chan in 0..u32::try_from(DMA_CHANNEL_COUNT).unwrap() {
        bus.install(dma_base(chan), dma_channel());
    }
    bus
}

/// Signal a completed control block on `dma`, optionally with an error.
pub fn complete_block(dma: &FakeRegisters, error: bool) {
    let mut flags = dma::CS_INT | dma::CS_END;
    if error {
        flags |= dma::CS_ERROR;
    }
    dma.raise(dma::CS, flags);
}

// ── Log capture ──────────────────────────────────────────────────────────────

/// Collects formatted `tracing` output of the code run under it.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with this capture as the thread's subscriber.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn text(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.text().lines().filter(|line| line.contains(needle)).count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Rigs ─────────────────────────────────────────────────────────────────────

/// Everything a PCM device is built from, with handles kept for inspection.
pub struct PcmRig {
    pub bus: FakeBus,
    pub framework: FakeFramework,
    pub codec: MockCodec,
    pub delay: CountingDelay,
    pub registry: &'static StaticChannelRegistry,
}

impl PcmRig {
    /// PCM fed by the default playback channel 2.
    pub fn new() -> Self {
        Self::with_tx_channel(2)
    }

    pub fn with_tx_channel(chan: u32) -> Self {
        Self {
            bus: pcm_bus(chan),
            framework: FakeFramework::new(),
            codec: MockCodec::new(),
            delay: CountingDelay::new(),
            registry: registry(),
        }
    }

    pub fn with_codec(mut self, codec: MockCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn device(&mut self, options: bcm2711_audio::pcm::PcmOptions) -> Result<TestPcm, bcm2711_audio::AudioError> {
        PcmDevice::new(
            options,
            &mut self.bus,
            self.registry,
            self.framework.clone(),
            self.codec.clone(),
            self.delay.clone(),
        )
    }

    pub fn pcm(&self) -> FakeRegisters {
        self.bus.window(PCM_BASE).unwrap()
    }

    pub fn dma(&self, chan: u32) -> FakeRegisters {
        self.bus.window(dma_base(chan)).unwrap()
    }
}

/// Everything a PWM device is built from.
pub struct PwmRig {
    pub bus: FakeBus,
    pub model: PwmModel,
    pub framework: FakeFramework,
    pub delay: CountingDelay,
    pub registry: &'static StaticChannelRegistry,
    pub base: u64,
    pub chan: u32,
}

impl PwmRig {
    /// PWM controller at `base` fed by DMA channel `chan`.
    pub fn new(base: u64, chan: u32) -> Self {
        let (bus, model) = pwm_bus(base, chan);
        Self { bus, model, framework: FakeFramework::new(), delay: CountingDelay::new(), registry: registry(), base, chan }
    }

    pub fn device(&mut self, options: bcm2711_audio::pwm::PwmOptions) -> Result<TestPwm, bcm2711_audio::AudioError> {
        PwmDevice::new(options, &mut self.bus, self.registry, self.framework.clone(), self.delay.clone())
    }

    pub fn pwm(&self) -> FakeRegisters {
        self.model.regs.clone()
    }

    pub fn dma(&self) -> FakeRegisters {
        self.bus.window(dma_base(self.chan)).unwrap()
    }
}
