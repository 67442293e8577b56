//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests. Every mock is a cheap `Clone`
//! handle over shared state, so a test can move one copy into the driver
//! and keep another to inspect or poke.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::missing_panics_doc)]

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::boxed::Box;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::*;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── FakeRegisters ────────────────────────────────────────────────────────────

/// Write hook: `(written, next_stored) -> stored`.
pub type WriteHook = Box<dyn FnMut(u32, u32) -> u32 + Send>;

/// Read hook: may update the stored value before it is returned.
pub type ReadHook = Box<dyn FnMut(&mut u32) + Send>;

#[derive(Default)]
struct RegisterModel {
    w1c: u32,
    self_clearing: u32,
    read_only: u32,
    on_write: Option<WriteHook>,
    on_read: Option<ReadHook>,
}

struct FakeState {
    words: Vec<u32>,
    models: HashMap<usize, RegisterModel>,
    writes: Vec<(usize, u32)>,
}

/// In-memory register window with simple hardware semantics.
///
/// Per register, bits can be modelled as write-1-to-clear, self-clearing
/// (strobe bits that always read back as zero) or read-only. Arbitrary
/// behaviour (a DMA abort clearing ACTIVE, a FIFO filling up) is modelled
/// with write and read hooks.
#[derive(Clone)]
pub struct FakeRegisters {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRegisters {
    /// Create a zeroed window of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                words: std::vec![0; size / 4],
                models: HashMap::new(),
                writes: Vec::new(),
            })),
        }
    }

    fn model(&self, offset: usize, f: impl FnOnce(&mut RegisterModel)) -> Self {
        f(lock(&self.state).models.entry(offset).or_default());
        self.clone()
    }

    /// Bits in `mask` at `offset` are cleared by writing 1 and kept by writing 0.
    #[must_use]
    pub fn with_w1c(self, offset: usize, mask: u32) -> Self {
        self.model(offset, |m| m.w1c |= mask)
    }

    /// Bits in `mask` at `offset` act on write and always read back as 0.
    #[must_use]
    pub fn with_self_clearing(self, offset: usize, mask: u32) -> Self {
        self.model(offset, |m| m.self_clearing |= mask)
    }

    /// Bits in `mask` at `offset` ignore writes (use [`set`](Self::set) to change them).
    #[must_use]
    pub fn with_read_only(self, offset: usize, mask: u32) -> Self {
        self.model(offset, |m| m.read_only |= mask)
    }

    /// Install a write hook for `offset`, run after the bit models.
    #[must_use]
    pub fn on_write(self, offset: usize, hook: impl FnMut(u32, u32) -> u32 + Send + 'static) -> Self {
        self.model(offset, |m| m.on_write = Some(Box::new(hook)))
    }

    /// Install a read hook for `offset`.
    #[must_use]
    pub fn on_read(self, offset: usize, hook: impl FnMut(&mut u32) + Send + 'static) -> Self {
        self.model(offset, |m| m.on_read = Some(Box::new(hook)))
    }

    /// Test-side poke: store `value` bypassing all models and hooks.
    pub fn set(&self, offset: usize, value: u32) {
        if let Some(word) = lock(&self.state).words.get_mut(offset / 4) {
            *word = value;
        }
    }

    /// Test-side poke: OR `mask` into the stored value.
    pub fn raise(&self, offset: usize, mask: u32) {
        if let Some(word) = lock(&self.state).words.get_mut(offset / 4) {
            *word |= mask;
        }
    }

    /// Test-side peek: the stored value, without running read hooks.
    pub fn get(&self, offset: usize) -> u32 {
        lock(&self.state).words.get(offset / 4).copied().unwrap_or(0)
    }

    /// Every driver write so far, in order, as `(offset, value)`.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        lock(&self.state).writes.clone()
    }

    /// Driver writes to one register, in order.
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Forget the write log.
    pub fn clear_log(&self) {
        lock(&self.state).writes.clear();
    }
}

impl RegisterBlock for FakeRegisters {
    fn read(&self, offset: usize) -> u32 {
        let mut state = lock(&self.state);
        let FakeState { words, models, .. } = &mut *state;
        let Some(word) = words.get_mut(offset / 4) else {
            return 0;
        };
        if let Some(hook) = models.get_mut(&offset).and_then(|m| m.on_read.as_mut()) {
            hook(word);
        }
        *word
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = lock(&self.state);
        let FakeState { words, models, writes } = &mut *state;
        writes.push((offset, value));
        let Some(word) = words.get_mut(offset / 4) else {
            return;
        };
        let old = *word;
        let mut next = value;
        if let Some(model) = models.get_mut(&offset) {
            next = (next & !model.w1c) | (old & model.w1c & !value);
            next &= !model.self_clearing;
            next = (next & !model.read_only) | (old & model.read_only);
            if let Some(hook) = model.on_write.as_mut() {
                next = hook(value, next);
            }
        }
        *word = next;
    }
}

// ── FakeBus ──────────────────────────────────────────────────────────────────

/// [`RegisterMapper`] handing out [`FakeRegisters`] per physical window.
///
/// Windows can be pre-installed with hardware models before the driver maps
/// them; anything else is created zeroed on first map. Tests fetch a window
/// by its base address to inspect it afterwards.
#[derive(Clone, Default)]
pub struct FakeBus {
    windows: Arc<Mutex<HashMap<u64, FakeRegisters>>>,
    refused: Arc<Mutex<Vec<u64>>>,
    maps: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl FakeBus {
    /// Create a bus with no windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-install a modelled window at `phys`.
    pub fn install(&self, phys: u64, regs: FakeRegisters) {
        lock(&self.windows).insert(phys, regs);
    }

    /// Make mapping `phys` fail.
    pub fn refuse(&self, phys: u64) {
        lock(&self.refused).push(phys);
    }

    /// The window mapped (or installed) at `phys`.
    pub fn window(&self, phys: u64) -> Option<FakeRegisters> {
        lock(&self.windows).get(&phys).cloned()
    }

    /// Every successful `map` call as `(phys, len)`, in order.
    pub fn maps(&self) -> Vec<(u64, usize)> {
        lock(&self.maps).clone()
    }

    /// Total driver writes across all windows.
    pub fn total_writes(&self) -> usize {
        lock(&self.windows).values().map(|w| w.writes().len()).sum()
    }
}

impl RegisterMapper for FakeBus {
    type Block = FakeRegisters;

    fn map(&mut self, phys: u64, len: usize) -> Option<FakeRegisters> {
        if lock(&self.refused).contains(&phys) {
            return None;
        }
        lock(&self.maps).push((phys, len));
        Some(
            lock(&self.windows)
                .entry(phys)
                .or_insert_with(|| FakeRegisters::new(len))
                .clone(),
        )
    }
}

// ── MockCodec ────────────────────────────────────────────────────────────────

/// One recorded codec callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecEvent {
    /// `set_rate(rate)`
    SetRate(u32),
    /// `on(direction)`
    On(Direction),
    /// `off(direction)`
    Off(Direction),
}

/// Mock codec that records every callback.
#[derive(Clone)]
pub struct MockCodec {
    events: Arc<Mutex<Vec<CodecEvent>>>,
    rates: RateSet,
    formats: FormatSet,
}

impl MockCodec {
    /// Codec accepting every rate and format.
    pub fn new() -> Self {
        Self::with_support(RateSet::all(), FormatSet::all())
    }

    /// Codec restricted to `rates` and `formats`.
    pub fn with_support(rates: RateSet, formats: FormatSet) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            rates,
            formats,
        }
    }

    /// Recorded callbacks, oldest first.
    pub fn events(&self) -> Vec<CodecEvent> {
        lock(&self.events).clone()
    }

    /// Forget recorded callbacks.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCodec for MockCodec {
    fn set_rate(&mut self, rate: u32) {
        lock(&self.events).push(CodecEvent::SetRate(rate));
    }

    fn on(&mut self, direction: Direction) {
        lock(&self.events).push(CodecEvent::On(direction));
    }

    fn off(&mut self, direction: Direction) {
        lock(&self.events).push(CodecEvent::Off(direction));
    }

    fn supported_rates(&self) -> RateSet {
        self.rates
    }

    fn supported_formats(&self) -> FormatSet {
        self.formats
    }
}

// ── FakeFramework ────────────────────────────────────────────────────────────

struct Allocation {
    ptr: NonNull<u8>,
    layout: Layout,
    is_mapping: bool,
}

// SAFETY: the allocation is plain heap memory owned by the framework state.
unsafe impl Send for Allocation {}

#[derive(Default)]
struct FrameworkState {
    live: HashMap<u64, Allocation>,
    next_phys: u64,
    notifications: Vec<u32>,
    fail_buf_alloc: bool,
    fail_mmap: bool,
    buf_allocs: usize,
    mmaps: usize,
}

/// Heap-backed stand-in for the upstream audio framework.
///
/// Regions are zeroed, 64-byte aligned and given fake physical addresses
/// from a bump counter starting at `0x1000_0000`. Subchannel handles are
/// plain `u32`s chosen by the test.
#[derive(Clone, Default)]
pub struct FakeFramework {
    state: Arc<Mutex<FrameworkState>>,
}

impl FakeFramework {
    /// Physical address of the first allocation.
    pub const PHYS_BASE: u64 = 0x1000_0000;

    /// Create a framework with no allocations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `buf_alloc` fail (or succeed again).
    pub fn fail_buf_alloc(&self, fail: bool) {
        lock(&self.state).fail_buf_alloc = fail;
    }

    /// Make every following `mmap_phys` fail (or succeed again).
    pub fn fail_mmap(&self, fail: bool) {
        lock(&self.state).fail_mmap = fail;
    }

    /// Sample buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        lock(&self.state).live.values().filter(|a| !a.is_mapping).count()
    }

    /// Control-block mappings currently mapped.
    pub fn live_mappings(&self) -> usize {
        lock(&self.state).live.values().filter(|a| a.is_mapping).count()
    }

    /// Successful `buf_alloc` calls so far.
    pub fn buf_alloc_count(&self) -> usize {
        lock(&self.state).buf_allocs
    }

    /// Successful `mmap_phys` calls so far.
    pub fn mmap_count(&self) -> usize {
        lock(&self.state).mmaps
    }

    /// Subchannels notified via `dma_interrupt`, oldest first.
    pub fn notifications(&self) -> Vec<u32> {
        lock(&self.state).notifications.clone()
    }

    /// Physical address of the most recent live mapping, if any.
    pub fn last_mapping_phys(&self) -> Option<u64> {
        lock(&self.state)
            .live
            .iter()
            .filter(|(_, a)| a.is_mapping)
            .map(|(phys, _)| *phys)
            .max()
    }

    /// Physical address of the most recent live sample buffer, if any.
    pub fn last_buffer_phys(&self) -> Option<u64> {
        lock(&self.state)
            .live
            .iter()
            .filter(|(_, a)| !a.is_mapping)
            .map(|(phys, _)| *phys)
            .max()
    }

    /// Copy the 32-bit words of the live allocation at `phys`.
    pub fn read_words(&self, phys: u64) -> Vec<u32> {
        let state = lock(&self.state);
        let Some(alloc) = state.live.get(&phys) else {
            return Vec::new();
        };
        let count = alloc.layout.size() / 4;
        // SAFETY: the allocation is live, 64-byte aligned and `count * 4`
        // bytes long; the driver does not write to it concurrently in tests.
        unsafe { std::slice::from_raw_parts(alloc.ptr.as_ptr().cast::<u32>(), count) }.to_vec()
    }

    fn allocate(&self, size: usize, is_mapping: bool) -> Result<DmaRegion, AllocError> {
        let mut state = lock(&self.state);
        let failing = if is_mapping { state.fail_mmap } else { state.fail_buf_alloc };
        if failing {
            return Err(AllocError::OutOfMemory);
        }
        if size == 0 {
            return Err(AllocError::InvalidSize);
        }
        let layout = Layout::from_size_align(size, 64).map_err(|_| AllocError::InvalidSize)?;
        // SAFETY: `layout` has non-zero size.
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(AllocError::OutOfMemory)?;
        if state.next_phys == 0 {
            state.next_phys = Self::PHYS_BASE;
        }
        let phys = state.next_phys;
        let span = u64::try_from(size).map_err(|_| AllocError::InvalidSize)?;
        state.next_phys = phys.saturating_add(span.next_multiple_of(0x1000));
        state.live.insert(phys, Allocation { ptr, layout, is_mapping });
        if is_mapping {
            state.mmaps = state.mmaps.saturating_add(1);
        } else {
            state.buf_allocs = state.buf_allocs.saturating_add(1);
        }
        // SAFETY: freshly allocated, `size` bytes, freed only via `release`.
        Ok(unsafe { DmaRegion::new(ptr, phys, size) })
    }

    fn release(&self, region: &DmaRegion) {
        if let Some(alloc) = lock(&self.state).live.remove(&region.phys_addr()) {
            // SAFETY: allocated in `allocate` with this layout and removed
            // from the live set exactly once.
            unsafe { dealloc(alloc.ptr.as_ptr(), alloc.layout) };
        }
    }
}

impl Drop for FrameworkState {
    fn drop(&mut self) {
        for (_, alloc) in self.live.drain() {
            // SAFETY: every live allocation came from `alloc_zeroed` with `layout`.
            unsafe { dealloc(alloc.ptr.as_ptr(), alloc.layout) };
        }
    }
}

impl AudioFramework for FakeFramework {
    type Subchannel = u32;

    fn buf_alloc(&self, size: usize, _flags: BufferFlags) -> Result<DmaRegion, AllocError> {
        self.allocate(size, false)
    }

    fn buf_free(&self, region: DmaRegion) {
        self.release(&region);
    }

    fn mmap_phys(&self, size: usize, _flags: BufferFlags) -> Result<DmaRegion, AllocError> {
        self.allocate(size, true)
    }

    fn munmap_phys(&self, region: DmaRegion) {
        self.release(&region);
    }

    fn dma_interrupt(&self, subchannel: u32) {
        lock(&self.state).notifications.push(subchannel);
    }
}

// ── CountingDelay ────────────────────────────────────────────────────────────

/// `DelayNs` that returns immediately and accumulates the requested time.
#[derive(Clone, Default)]
pub struct CountingDelay {
    total_ns: Arc<AtomicU64>,
    calls: Arc<AtomicU64>,
}

impl CountingDelay {
    /// Create a delay with nothing accumulated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total nanoseconds requested so far.
    pub fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed)
    }

    /// Number of delay calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Reset both counters.
    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.calls.store(0, Ordering::Relaxed);
    }
}

impl embedded_hal::delay::DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.fetch_add(u64::from(ns), Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

// ── RecordingPinMux ──────────────────────────────────────────────────────────

/// Pin mux that records each `configure` call.
#[derive(Clone, Default)]
pub struct RecordingPinMux {
    calls: Arc<Mutex<Vec<(u8, PinFunction, Pull)>>>,
}

impl RecordingPinMux {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(pin, function, pull)` triples, oldest first.
    pub fn calls(&self) -> Vec<(u8, PinFunction, Pull)> {
        lock(&self.calls).clone()
    }
}

impl PinMux for RecordingPinMux {
    fn configure(&mut self, pin: u8, function: PinFunction, pull: Pull) {
        lock(&self.calls).push((pin, function, pull));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn fake_registers_model_w1c_and_strobe_bits() {
        let regs = FakeRegisters::new(0x10)
            .with_w1c(0, 0b0100)
            .with_self_clearing(0, 0b1000)
            .with_read_only(0, 0b1_0000);
        regs.set(0, 0b1_0100);

        regs.write(0, 0b1001);
        assert_eq!(regs.get(0), 0b1_0101, "INT kept, strobe dropped, RO kept");

        regs.write(0, 0b0100);
        assert_eq!(regs.get(0), 0b1_0000, "writing 1 clears the w1c bit");
        assert_eq!(regs.writes_to(0), std::vec![0b1001, 0b0100]);
    }

    #[test]
    fn fake_registers_hooks_see_written_value() {
        let regs = FakeRegisters::new(0x10).on_write(4, |written, next| {
            if written & 1 != 0 {
                next | 0x100
            } else {
                next
            }
        });
        regs.write(4, 1);
        assert_eq!(regs.read(4), 0x101);

        let mut polls = 0;
        let regs = regs.on_read(8, move |v| {
            polls += 1;
            if polls >= 3 {
                *v = 0;
            }
        });
        regs.set(8, 1);
        assert_eq!(regs.read(8), 1);
        assert_eq!(regs.read(8), 1);
        assert_eq!(regs.read(8), 0);
    }

    #[test]
    fn fake_bus_shares_windows_with_the_test() {
        let mut bus = FakeBus::new();
        bus.install(0x1000, FakeRegisters::new(0x10).with_w1c(0, 1));
        bus.refuse(0x3000);

        let installed = bus.map(0x1000, 0x10).unwrap();
        installed.write(4, 9);
        assert_eq!(bus.window(0x1000).unwrap().get(4), 9);

        assert!(bus.map(0x2000, 0x20).is_some());
        assert!(bus.map(0x3000, 0x20).is_none());
        assert_eq!(bus.maps(), std::vec![(0x1000, 0x10), (0x2000, 0x20)]);
        assert_eq!(bus.total_writes(), 1);
    }

    #[test]
    fn fake_framework_tracks_allocations() {
        let fw = FakeFramework::new();
        let buf = fw.buf_alloc(4096, BufferFlags::DMA_SAFE).unwrap();
        let map = fw.mmap_phys(256, BufferFlags::DMA_SAFE).unwrap();
        assert_eq!(buf.phys_addr(), FakeFramework::PHYS_BASE);
        assert_eq!(map.phys_addr(), FakeFramework::PHYS_BASE + 0x1000);
        assert_eq!((fw.live_buffers(), fw.live_mappings()), (1, 1));

        fw.buf_free(buf);
        fw.munmap_phys(map);
        assert_eq!((fw.live_buffers(), fw.live_mappings()), (0, 0));

        fw.fail_mmap(true);
        assert_eq!(
            fw.mmap_phys(64, BufferFlags::DMA_SAFE).unwrap_err(),
            AllocError::OutOfMemory
        );
    }

    #[test]
    fn mock_codec_records_callbacks() {
        let codec = MockCodec::new();
        let mut handle = codec.clone();
        handle.set_rate(48_000);
        handle.on(Direction::Playback);
        handle.off(Direction::Capture);
        assert_eq!(
            codec.events(),
            std::vec![
                CodecEvent::SetRate(48_000),
                CodecEvent::On(Direction::Playback),
                CodecEvent::Off(Direction::Capture),
            ]
        );
    }

    #[test]
    fn counting_delay_accumulates() {
        use embedded_hal::delay::DelayNs;
        let delay = CountingDelay::new();
        let mut d = delay.clone();
        d.delay_us(5);
        d.delay_ns(250);
        assert_eq!(delay.total_ns(), 5_250);
        assert_eq!(delay.calls(), 2);
    }
}
