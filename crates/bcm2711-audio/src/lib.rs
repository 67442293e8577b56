//! BCM2711 audio streaming engines
//!
//! DMA-driven PCM/I2S and PWM audio drivers for the Raspberry Pi 4. Both
//! drivers stream a circular sample buffer through a ring of DMA control
//! blocks, one block per fragment, and report each completed fragment to
//! the upstream audio framework from their DMA interrupt handlers.
//!
//! # Architecture
//!
//! ```text
//! Upstream audio framework (platform::AudioFramework)
//!         ↓ capabilities / acquire / prepare / trigger / position / release
//! PcmDevice, PwmDevice (pcm, pwm)
//!         ↓
//! Subchannel core (audio): position, error counters, FIFO recovery
//!         ↓
//! DMA engines (dma): Dma1Engine, Dma4Engine, control-block ring
//!         ↓
//! Register windows (platform::RegisterBlock)
//! ```
//!
//! All state of one device sits behind a single blocking mutex shared by
//! the stream callbacks and the interrupt handlers. Hardware waits are
//! bounded spin-waits on an injected [`embedded_hal::delay::DelayNs`].
//!
//! # Features
//!
//! - `defmt`: log through `defmt` instead of `tracing` (hardware builds)
//!
//! # Example
//!
//! ```no_run
//! use bcm2711_audio::dma::CHANNEL_REGISTRY;
//! use bcm2711_audio::pcm::{PcmDevice, PcmOptions};
//! use bcm2711_audio::{AudioError, StreamConfig, Trigger};
//! use embedded_hal::delay::DelayNs;
//! use platform::{AudioCodec, AudioFramework, Direction, RegisterMapper};
//!
//! fn start<M, F, C, D>(
//!     mut bus: M,
//!     framework: F,
//!     codec: C,
//!     delay: D,
//!     subchannel: F::Subchannel,
//! ) -> Result<(), AudioError>
//! where
//!     M: RegisterMapper,
//!     M::Block: Send,
//!     F: AudioFramework,
//!     F::Subchannel: Send,
//!     C: AudioCodec + Send,
//!     D: DelayNs + Send,
//! {
//!     let pcm: PcmDevice<_, _, _, _> =
//!         PcmDevice::new(PcmOptions::default(), &mut bus, &CHANNEL_REGISTRY, framework, codec, delay)?;
//!     let config = StreamConfig { rate: 48_000, frag_size: 4096, frags: 8 };
//!     pcm.acquire(Direction::Playback, subchannel, &config)?;
//!     pcm.prepare(Direction::Playback)?;
//!     pcm.trigger(Direction::Playback, Trigger::Go)
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)]

#[macro_use]
mod log;

pub mod audio;
pub mod clock;
pub mod clock_math;
pub mod dma;
pub mod error;
pub mod gpio;
pub mod pcm;
mod poll;
pub mod pwm;

pub use audio::{Capabilities, ErrorCounters, StreamConfig, Trigger};
pub use error::{AudioError, ConfigError, DmaError, WhyFailed};
