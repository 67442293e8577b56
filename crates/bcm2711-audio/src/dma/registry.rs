//! System-wide DMA channel ownership.
//!
//! The BCM2711 DMA channels are shared with firmware and other drivers.
//! Ownership goes through a [`ChannelRegistry`]; the drivers take the
//! registry as an argument so tests can use a private one.

use core::sync::atomic::{AtomicU16, Ordering};

use super::{resolve, DmaChannelConfig};
use crate::error::DmaError;

/// Channel ownership arbiter.
pub trait ChannelRegistry {
    /// Claim channel `index`. Fails with [`DmaError::Busy`] if it is owned.
    fn attach(&self, index: u32) -> Result<(), DmaError>;

    /// Give channel `index` back.
    fn detach(&self, index: u32);
}

/// Bitmask registry usable from a `static`.
#[derive(Debug, Default)]
pub struct StaticChannelRegistry {
    owned: AtomicU16,
}

impl StaticChannelRegistry {
    /// A registry with every channel free.
    pub const fn new() -> Self {
        Self { owned: AtomicU16::new(0) }
    }

    /// Returns `true` if channel `index` is currently owned.
    pub fn is_owned(&self, index: u32) -> bool {
        Self::bit(index).is_some_and(|bit| self.owned.load(Ordering::Acquire) & bit != 0)
    }

    fn bit(index: u32) -> Option<u16> {
        1u16.checked_shl(index)
    }
}

impl ChannelRegistry for StaticChannelRegistry {
    fn attach(&self, index: u32) -> Result<(), DmaError> {
        let bit = Self::bit(index).ok_or(DmaError::InvalidChannel(index))?;
        let before = self.owned.fetch_or(bit, Ordering::AcqRel);
        if before & bit == 0 {
            Ok(())
        } else {
            Err(DmaError::Busy(index))
        }
    }

    fn detach(&self, index: u32) {
        if let Some(bit) = Self::bit(index) {
            self.owned.fetch_and(!bit, Ordering::AcqRel);
        }
    }
}

/// Process-wide registry for hardware builds.
pub static CHANNEL_REGISTRY: StaticChannelRegistry = StaticChannelRegistry::new();

/// An owned DMA channel. Dropping it detaches the channel.
pub struct DmaChannel {
    config: &'static DmaChannelConfig,
    registry: &'static (dyn ChannelRegistry + Sync),
}

impl DmaChannel {
    /// Resolve `chan` (an index or a window base address) and claim it.
    pub fn acquire(registry: &'static (dyn ChannelRegistry + Sync), chan: u32) -> Result<Self, DmaError> {
        let config = resolve(chan)?;
        if let Err(err) = registry.attach(config.index) {
            error!("DMA channel {} attach failure", config.index);
            return Err(err);
        }
        info!("DMA channel {} attached (irq {})", config.index, config.irq);
        Ok(Self { config, registry })
    }

    /// Static description of the channel.
    pub fn config(&self) -> &'static DmaChannelConfig {
        self.config
    }
}

impl core::fmt::Debug for DmaChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DmaChannel").field("config", self.config).finish_non_exhaustive()
    }
}

impl Drop for DmaChannel {
    fn drop(&mut self) {
        self.registry.detach(self.config.index);
        info!("DMA channel {} detached", self.config.index);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> &'static StaticChannelRegistry {
        Box::leak(Box::new(StaticChannelRegistry::new()))
    }

    #[test]
    fn second_attach_is_busy() {
        let reg = registry();
        let first = DmaChannel::acquire(reg, 2).unwrap();
        assert_eq!(DmaChannel::acquire(reg, 2).unwrap_err(), DmaError::Busy(2));
        assert!(reg.is_owned(2));
        drop(first);
        assert!(!reg.is_owned(2));
        assert!(DmaChannel::acquire(reg, 2).is_ok());
    }

    #[test]
    fn base_address_and_index_claim_the_same_channel() {
        let reg = registry();
        let _lease = DmaChannel::acquire(reg, 0xFE00_7300).unwrap();
        assert_eq!(DmaChannel::acquire(reg, 3).unwrap_err(), DmaError::Busy(3));
    }

    #[test]
    fn unknown_channel_claims_nothing() {
        let reg = registry();
        assert_eq!(DmaChannel::acquire(reg, 99).unwrap_err(), DmaError::InvalidChannel(99));
        assert!((0..15).all(|n| !reg.is_owned(n)));
    }
}
