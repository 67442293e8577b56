//! Hardware Abstraction Layer (HAL) for the BCM2711 audio drivers
//!
//! This crate provides trait-based abstractions for every hardware seam the
//! audio drivers touch, enabling development and testing without a
//! Raspberry Pi 4.
//!
//! # Architecture Layers
//!
//! ```text
//! Upstream audio framework (buffer allocation, fragment notification)
//!         ↓
//! Driver crate (bcm2711-audio: PCM/I2S + PWM streaming engines)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Memory-mapped peripherals (MmioRegion)
//! ```
//!
//! # Abstraction Levels
//!
//! ## Hardware seams
//! - [`RegisterBlock`] - 32-bit register window (volatile MMIO or fake)
//! - [`RegisterMapper`] - maps physical peripheral windows at init
//! - [`AudioFramework`] - DMA buffer allocation and fragment notification
//! - [`AudioCodec`] - Codec rate/power callbacks
//! - [`PinMux`] - GPIO alternate-function selection
//!
//! ## Domain types
//! - [`audio_types`] - sample formats, rate and format sets, directions
//! - [`clock_config`] - clock sources and clock mode
//! - [`dma`] - DMA-coherent memory regions
//!
//! # Features
//!
//! - `std`: Enable the [`mocks`] module (for testing)
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{AudioCodec, Direction};
//!
//! fn mute_all<C: AudioCodec>(codec: &mut C) {
//!     codec.off(Direction::Playback);
//!     codec.off(Direction::Capture);
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
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(feature = "std")]
extern crate std;

pub mod audio;
pub mod audio_types;
pub mod clock_config;
pub mod dma;
pub mod dma_safety;
pub mod framework;
pub mod gpio;
pub mod mmio;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export main high-level traits
pub use audio::{AudioCodec, NoCodec};
pub use framework::{AllocError, AudioFramework, BufferFlags};
pub use gpio::{PinFunction, PinMux, Pull};
pub use mmio::{MmioRegion, RegisterBlock, RegisterMapper};

// Re-export domain types
pub use audio_types::{
    ChannelPosition, Direction, FormatSet, OutOfRangeError, RateSet, SampleFormat, SampleRateHz,
};
pub use clock_config::{ClockMode, ClockSource};

// Re-export DMA types
pub use dma::DmaRegion;
