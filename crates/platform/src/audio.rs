//! Audio codec abstraction
//!
//! The streaming engine calls into the codec at fixed points of the stream
//! lifecycle: `set_rate` when the shared sample rate changes, `on` after a
//! direction starts, `off` before it stops (and once per direction at init
//! to start muted). The supported sets restrict the advertised capabilities.

use crate::audio_types::{Direction, FormatSet, RateSet};

/// Codec callback table
///
/// Callbacks run with the device mutex held, possibly from interrupt
/// context, so implementations must not block.
pub trait AudioCodec {
    /// The shared sample rate changed.
    fn set_rate(&mut self, rate: u32);

    /// A direction started streaming (unmute).
    fn on(&mut self, direction: Direction);

    /// A direction stopped streaming (mute).
    fn off(&mut self, direction: Direction);

    /// Rates the codec can clock.
    fn supported_rates(&self) -> RateSet {
        RateSet::all()
    }

    /// Formats the codec accepts.
    fn supported_formats(&self) -> FormatSet {
        FormatSet::all()
    }
}

/// No codec registered: every callback is a no-op and nothing is masked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoCodec;

impl AudioCodec for NoCodec {
    fn set_rate(&mut self, _rate: u32) {}

    fn on(&mut self, _direction: Direction) {}

    fn off(&mut self, _direction: Direction) {}
}

impl<C: AudioCodec> AudioCodec for Option<C> {
    fn set_rate(&mut self, rate: u32) {
        if let Some(codec) = self {
            codec.set_rate(rate);
        }
    }

    fn on(&mut self, direction: Direction) {
        if let Some(codec) = self {
            codec.on(direction);
        }
    }

    fn off(&mut self, direction: Direction) {
        if let Some(codec) = self {
            codec.off(direction);
        }
    }

    fn supported_rates(&self) -> RateSet {
        self.as_ref().map_or(RateSet::all(), AudioCodec::supported_rates)
    }

    fn supported_formats(&self) -> FormatSet {
        self.as_ref().map_or(FormatSet::all(), AudioCodec::supported_formats)
    }
}
