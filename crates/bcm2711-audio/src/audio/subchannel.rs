//! Per-direction stream state.
//!
//! A [`Subchannel`] exists for every direction a device was configured
//! with. It holds the DMA channel bound to that direction for the device
//! lifetime, and, while a client has the direction open, the sample buffer
//! and the control-block ring of the current stream.

use embedded_hal::delay::DelayNs;
use platform::{AllocError, AudioFramework, BufferFlags, Direction, DmaRegion, RegisterBlock, RegisterMapper};

use super::recovery::ErrorCounters;
use super::StreamConfig;
use crate::dma::{build_ring, ChannelRegistry, ControlBlock, DmaChannel, DmaEngine, DmaStatus, Transfer, DMA_WINDOW_SIZE};
use crate::error::AudioError;

/// Map a register window, logging a refusal.
pub(crate) fn map_window<Mp: RegisterMapper>(mapper: &mut Mp, phys: u64, len: usize) -> Result<Mp::Block, AudioError> {
    mapper.map(phys, len).ok_or_else(|| {
        error!("Failed to map registers at {:#x}", phys);
        AudioError::Map(phys)
    })
}

// ── DmaBinding ───────────────────────────────────────────────────────────────

/// A DMA channel owned by one direction, with its mapped registers and
/// transfer-information template.
pub(crate) struct DmaBinding<B> {
    channel: DmaChannel,
    regs: B,
    ti: u32,
}

impl<B: RegisterBlock> DmaBinding<B> {
    pub(crate) fn new(channel: DmaChannel, regs: B, ti: u32) -> Self {
        Self { channel, regs, ti }
    }

    /// Claim DMA channel `chan` for paced transfers in `direction` with the
    /// peripheral behind `dreq`, and map its registers.
    pub(crate) fn bind<Mp>(
        mapper: &mut Mp,
        registry: &'static (dyn ChannelRegistry + Sync),
        chan: u32,
        direction: Direction,
        dreq: u32,
    ) -> Result<Self, AudioError>
    where
        Mp: RegisterMapper<Block = B>,
    {
        let channel = DmaChannel::acquire(registry, chan).map_err(|err| {
            error!("Unavailable dma channel {}", chan);
            err
        })?;
        let config = channel.config();
        let ti = config.engine.transfer_info(direction, dreq);
        let regs = map_window(mapper, config.base, DMA_WINDOW_SIZE)?;
        Ok(Self::new(channel, regs, ti))
    }

    fn engine(&self) -> &'static (dyn DmaEngine + Sync) {
        self.channel.config().engine
    }

    pub(crate) fn ti(&self) -> u32 {
        self.ti
    }

    pub(crate) fn irq(&self) -> u32 {
        self.channel.config().irq
    }

    fn start(&self, ring_phys: u64) {
        self.engine().start(&self.regs, ring_phys);
    }

    fn abort(&self, delay: &mut dyn DelayNs) {
        self.engine().abort(&self.regs, delay);
    }

    fn ack(&self) -> DmaStatus {
        self.engine().ack(&self.regs)
    }

    fn remaining(&self) -> u32 {
        self.engine().len(&self.regs)
    }
}

// ── Stream ───────────────────────────────────────────────────────────────────

struct Stream<H> {
    handle: H,
    config: StreamConfig,
    size: u32,
    buffer: DmaRegion,
    ring: DmaRegion,
}

// ── Subchannel ───────────────────────────────────────────────────────────────

/// One direction of a device.
pub(crate) struct Subchannel<B, H> {
    dma: Option<DmaBinding<B>>,
    stream: Option<Stream<H>>,
    /// Byte offset of the fragment in flight, always `< size`.
    position: u32,
    pub(crate) active: bool,
    pub(crate) errors: ErrorCounters,
}

impl<B: RegisterBlock, H: Copy> Subchannel<B, H> {
    /// A direction bound to `dma`, or an unconfigured one for `None`.
    pub(crate) fn new(dma: Option<DmaBinding<B>>) -> Self {
        Self { dma, stream: None, position: 0, active: false, errors: ErrorCounters::default() }
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.dma.is_some()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The open stream's handle while it is active.
    pub(crate) fn active_handle(&self) -> Option<H> {
        self.stream.as_ref().filter(|_| self.active).map(|s| s.handle)
    }

    /// Allocate the buffer and ring for a new stream and link the ring.
    ///
    /// `fifo` is the bus-side end of every transfer. On failure nothing
    /// stays allocated.
    pub(crate) fn open<F>(
        &mut self,
        framework: &F,
        handle: H,
        config: &StreamConfig,
        direction: Direction,
        fifo: u64,
    ) -> Result<(), AudioError>
    where
        F: AudioFramework<Subchannel = H>,
    {
        let dma = self.dma.as_ref().ok_or(AudioError::NoChannel)?;
        let size = config.buffer_size()?;
        let buffer_len = usize::try_from(size).map_err(|_| AllocError::InvalidSize)?;
        let ring_len = usize::try_from(config.frags)
            .ok()
            .and_then(|n| n.checked_mul(core::mem::size_of::<ControlBlock>()))
            .ok_or(AllocError::InvalidSize)?;

        let buffer = framework
            .buf_alloc(buffer_len, BufferFlags::DMA_SAFE | BufferFlags::CACHE)
            .map_err(|err| {
                error!("buf_alloc failure");
                err
            })?;
        let mut ring = match framework.mmap_phys(ring_len, BufferFlags::DMA_SAFE) {
            Ok(ring) => ring,
            Err(err) => {
                framework.buf_free(buffer);
                error!("mmap_phys failure");
                return Err(err.into());
            }
        };

        let transfer = match direction {
            Direction::Playback => Transfer::ToDevice { buffer: buffer.phys_addr(), fifo },
            Direction::Capture => Transfer::FromDevice { fifo, buffer: buffer.phys_addr() },
        };
        let ring_phys = ring.phys_addr();
        let Some(blocks) = ring.as_mut_slice_of::<ControlBlock>() else {
            framework.munmap_phys(ring);
            framework.buf_free(buffer);
            error!("Control block memory misaligned");
            return Err(AllocError::InvalidSize.into());
        };
        build_ring(dma.engine(), blocks, ring_phys, dma.ti(), transfer, config.frag_size);

        self.stream = Some(Stream { handle, config: *config, size, buffer, ring });
        self.position = 0;
        self.active = false;
        Ok(())
    }

    /// Return the stream's memory to the framework.
    pub(crate) fn close<F>(&mut self, framework: &F)
    where
        F: AudioFramework<Subchannel = H>,
    {
        if let Some(stream) = self.stream.take() {
            framework.munmap_phys(stream.ring);
            framework.buf_free(stream.buffer);
        }
        self.active = false;
    }

    /// Rewind to the head of the ring and clear the error counters.
    pub(crate) fn prepare(&mut self) {
        self.errors.reset();
        self.position = 0;
    }

    /// Start the DMA ring at its head.
    pub(crate) fn start(&self) {
        if let (Some(dma), Some(stream)) = (&self.dma, &self.stream) {
            dma.start(stream.ring.phys_addr());
        }
    }

    pub(crate) fn abort(&self, delay: &mut dyn DelayNs) {
        if let Some(dma) = &self.dma {
            dma.abort(delay);
        }
    }

    /// Acknowledge this direction's DMA interrupt. Empty if not ours.
    pub(crate) fn ack(&self) -> DmaStatus {
        self.dma.as_ref().map_or(DmaStatus::empty(), DmaBinding::ack)
    }

    /// One fragment completed.
    pub(crate) fn advance(&mut self) {
        if let Some(stream) = &self.stream {
            self.position = wrap(self.position.saturating_add(stream.config.frag_size), stream.size);
        }
    }

    /// Current byte offset in the buffer.
    ///
    /// While running, interpolated inside the fragment in flight from the
    /// DMA's remaining length.
    pub(crate) fn position(&self) -> u32 {
        let Some(stream) = &self.stream else {
            return 0;
        };
        let mut position = self.position;
        if self.active {
            if let Some(dma) = &self.dma {
                let done = stream.config.frag_size.saturating_sub(dma.remaining());
                position = position.saturating_add(done);
            }
        }
        wrap(position, stream.size)
    }

    pub(crate) fn irq(&self) -> Option<u32> {
        self.dma.as_ref().map(|dma| dma.channel.config().irq)
    }
}

fn wrap(position: u32, size: u32) -> u32 {
    if position >= size {
        0
    } else {
        position
    }
}
