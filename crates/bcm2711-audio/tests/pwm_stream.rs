//! PWM stream lifecycle against modelled hardware.
// Integration test file: unwrap/expect/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
//!
//! Run with: cargo test -p bcm2711-audio --test pwm_stream

mod common;

use std::sync::atomic::Ordering;

use bcm2711_audio::clock::CM_BASE;
use bcm2711_audio::gpio::GPIO_BASE;
use bcm2711_audio::pwm::{PwmOptions, PWM0_BASE, PWM1_BASE};
use bcm2711_audio::{AudioError, Capabilities, ConfigError, StreamConfig, Trigger};
use common::{cm, complete_block, dma, dma1_ram, pwm, LogCapture, PwmRig};
use platform::{ChannelPosition, FormatSet, RateSet};

const HANDLE: u32 = 4;

fn config(rate: u32) -> StreamConfig {
    StreamConfig { rate, frag_size: 2048, frags: 16 }
}

/// Default options: PWM1 (headphone jack) on DMA channel 2.
fn jack() -> PwmRig {
    PwmRig::new(PWM1_BASE, 2)
}

// ── Test A: bring-up ──

#[test]
fn test_bring_up_programs_dma_pacing_and_mode() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    let regs = rig.pwm();

    assert_eq!(regs.writes_to(pwm::DMAC), vec![0, 0x8000_0420]);
    let ctl = pwm::CTL_CLRF | pwm::CTL_USEF1 | pwm::CTL_USEF2 | pwm::CTL_MSEN1 | pwm::CTL_MSEN2;
    assert_eq!(regs.writes_to(pwm::CTL), vec![0, ctl]);

    // GPIO 40/41 on ALT0.
    let gpio = rig.bus.window(GPIO_BASE).unwrap();
    assert_eq!(gpio.get(0x10) & 0x3f, 0b100_100);

    let caps = device.capabilities();
    assert_eq!(caps.formats, FormatSet::S32);
    assert_eq!(caps.rates, RateSet::HZ_44100 | RateSet::HZ_48000);
    assert_eq!((caps.min_voices, caps.max_voices), (2, 2));
    assert_eq!(caps.max_frags, 128);
    assert_eq!(caps.chmap, [ChannelPosition::FrontRight, ChannelPosition::FrontLeft]);
    assert_eq!(device.irq(), Some(114));
    assert_eq!(device.precision(), 0);
}

#[test]
fn test_pwm0_routes_its_pins_and_dreq() {
    let mut rig = PwmRig::new(PWM0_BASE, 5);
    let options = PwmOptions { pwm: 0, dma: 5, msen: false, ..PwmOptions::default() };
    let device = rig.device(options).unwrap();
    let ctl = pwm::CTL_CLRF | pwm::CTL_USEF1 | pwm::CTL_USEF2;
    assert_eq!(rig.pwm().writes_to(pwm::CTL).last(), Some(&ctl));

    // GPIO 18/19 on ALT5.
    let gpio = rig.bus.window(GPIO_BASE).unwrap();
    assert_eq!(gpio.get(0x04) >> 24, 0b010_010);

    device.acquire(HANDLE, &config(48_000)).unwrap();
    let ring = rig.framework.last_mapping_phys().unwrap();
    let words = rig.framework.read_words(ring);
    // TI: INTEN | WAIT_RESP | SRC_INC | DST_DREQ | PERMAP(5)
    assert_eq!(words[0], 0x0005_0149);
    assert_eq!(words[2], 0x7E20_C018);
}

#[test]
fn test_bad_options_fail_before_any_mapping() {
    let mut rig = jack();
    let err = rig.device(PwmOptions { pwm: 3, ..PwmOptions::default() }).err().unwrap();
    assert_eq!(err, AudioError::Config(ConfigError::PwmIndex(3)));
    let err = rig.device(PwmOptions { rate_max: 12_345, ..PwmOptions::default() }).err().unwrap();
    assert_eq!(err, AudioError::Config(ConfigError::Rate(12_345)));
    assert!(rig.bus.maps().is_empty());
}

// ── Test B: full playback lifecycle ──

#[test]
fn test_playback_48k_lifecycle() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    let regs = rig.pwm();
    let chan = rig.dma();

    device.acquire(HANDLE, &config(48_000)).unwrap();
    assert_eq!(device.precision(), 10);
    assert_eq!(regs.get(pwm::RNG1), 1024);
    assert_eq!(regs.get(pwm::RNG2), 1024);
    // PLLD 750 MHz / (48 kHz << 10)
    let clock = rig.bus.window(CM_BASE).unwrap();
    assert_eq!(clock.get(cm::PWM_DIV) & cm::DIV_MASK, 62_500);
    assert_eq!(clock.get(cm::PWM_CTL) & 0xf, 6);
    assert_eq!(device.capabilities(), Capabilities::default());
    assert_eq!(device.acquire(HANDLE, &config(48_000)), Err(AudioError::NoChannel));

    let ring = rig.framework.last_mapping_phys().unwrap();
    let words = rig.framework.read_words(ring);
    assert_eq!(words[0], 0x0001_0149);
    assert_eq!(words[2], 0x7E20_C818);
    assert_eq!(words[15 * 8 + 5], dma1_ram(ring));

    let mut samples = [0x8000_0000, 0, 0x7FFF_FFFF];
    device.reconstitute(&mut samples);
    assert_eq!(samples, [0, 0x200, 0x3FF]);

    let logs = LogCapture::new();
    logs.run(|| {
        device.prepare().unwrap();
        device.trigger(Trigger::Go).unwrap();
    });
    assert_eq!(logs.count("toggling enable"), 0);
    assert_ne!(chan.get(dma::CS) & dma::CS_ACTIVE, 0);
    assert_eq!(regs.get(pwm::CTL) & (pwm::CTL_PWEN1 | pwm::CTL_PWEN2), pwm::CTL_PWEN1 | pwm::CTL_PWEN2);

    chan.set(dma::TXFR_LEN, 2048);
    for _ in 0..17 {
        complete_block(&chan, false);
        device.handle_interrupt();
    }
    assert_eq!(device.position(), 2048);
    assert_eq!(rig.framework.notifications(), vec![HANDLE; 17]);

    device.trigger(Trigger::Stop).unwrap();
    assert_eq!(chan.get(dma::CS) & dma::CS_ACTIVE, 0);
    assert_eq!(regs.get(pwm::CTL) & (pwm::CTL_PWEN1 | pwm::CTL_PWEN2), 0);

    device.release();
    assert_eq!(rig.framework.live_buffers(), 0);
    assert_eq!(rig.framework.live_mappings(), 0);
    assert_ne!(device.capabilities(), Capabilities::default());

    drop(device);
    assert_eq!(regs.writes_to(pwm::CTL).last(), Some(&0));
    assert_eq!(regs.writes_to(pwm::DMAC).last(), Some(&0));
    assert!(!rig.registry.is_owned(2));
}

#[test]
fn test_highest_rate_drops_a_bit_of_precision() {
    let mut rig = jack();
    let device = rig.device(PwmOptions { rate_max: 384_000, ..PwmOptions::default() }).unwrap();
    device.acquire(HANDLE, &config(384_000)).unwrap();
    assert_eq!(device.precision(), 9);
    assert_eq!(rig.pwm().get(pwm::RNG1), 512);
    let clock = rig.bus.window(CM_BASE).unwrap();
    assert_eq!(clock.get(cm::PWM_DIV) & cm::DIV_MASK, 15_625);

    let mut samples = [0xFFFF_FFFF];
    device.reconstitute(&mut samples);
    assert_eq!(samples, [0xFF]);
}

// ── Test C: error flags ──

#[test]
fn test_error_flags_are_logged_counted_and_cleared() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    let regs = rig.pwm();
    let chan = rig.dma();
    device.acquire(HANDLE, &config(44_100)).unwrap();
    device.prepare().unwrap();
    device.trigger(Trigger::Go).unwrap();

    let logs = LogCapture::new();
    logs.run(|| {
        for _ in 0..2 {
            complete_block(&chan, false);
            regs.raise(pwm::STA, pwm::STA_GAPO1);
            device.handle_interrupt();
        }
        complete_block(&chan, true);
        device.handle_interrupt();
    });
    assert_eq!(logs.count("PWM error status 0x10"), 2);
    assert_eq!(regs.get(pwm::STA) & pwm::STA_ERRORS, 0);
    let errors = device.error_counters();
    assert_eq!((errors.dma, errors.fifo), (1, 2));
    assert_eq!(rig.framework.notifications().len(), 3);

    regs.raise(pwm::STA, pwm::STA_BERR);
    device.trigger(Trigger::Stop).unwrap();
    assert_eq!(regs.get(pwm::STA) & pwm::STA_BERR, 0);

    device.prepare().unwrap();
    assert!(!device.error_counters().any());
}

#[test]
fn test_interrupt_without_pending_status_is_a_no_op() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    let regs = rig.pwm();
    device.acquire(HANDLE, &config(48_000)).unwrap();
    device.trigger(Trigger::Go).unwrap();

    let writes = regs.writes().len();
    device.handle_interrupt();
    assert!(rig.framework.notifications().is_empty());
    assert_eq!(regs.writes().len(), writes);
}

// ── Test D: transmitter start-up retries ──

#[test]
fn test_stuck_transmitter_is_toggled_until_it_starts() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    rig.model.start_failures.store(2, Ordering::SeqCst);
    device.acquire(HANDLE, &config(48_000)).unwrap();

    let logs = LogCapture::new();
    logs.run(|| device.trigger(Trigger::Go)).unwrap();
    assert_eq!(logs.count("toggling enable"), 2);
    assert_eq!(logs.count("Failed to enable transmitter"), 0);
    assert_ne!(rig.dma().get(dma::CS) & dma::CS_ACTIVE, 0);
}

#[test]
fn test_transmitter_that_never_starts_fails_the_trigger() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    let regs = rig.pwm();
    let chan = rig.dma();
    rig.model.start_failures.store(6, Ordering::SeqCst);
    device.acquire(HANDLE, &config(48_000)).unwrap();

    let logs = LogCapture::new();
    let result = logs.run(|| device.trigger(Trigger::Go));
    assert_eq!(result, Err(AudioError::Io));
    assert_eq!(logs.count("toggling enable"), 5);
    assert_eq!(logs.count("Failed to enable transmitter"), 1);
    assert_eq!(chan.get(dma::CS) & dma::CS_ACTIVE, 0);
    assert_eq!(regs.get(pwm::CTL) & (pwm::CTL_PWEN1 | pwm::CTL_PWEN2), 0);

    // The stream stayed stopped.
    complete_block(&chan, false);
    device.handle_interrupt();
    assert!(rig.framework.notifications().is_empty());

    device.trigger(Trigger::Go).unwrap();
    assert_ne!(chan.get(dma::CS) & dma::CS_ACTIVE, 0);
}

#[test]
fn test_transmitter_starting_on_the_last_toggle_still_fails() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    let regs = rig.pwm();
    // The first enable and four toggles fail; the fifth toggle would start.
    rig.model.start_failures.store(5, Ordering::SeqCst);
    device.acquire(HANDLE, &config(48_000)).unwrap();

    let logs = LogCapture::new();
    let result = logs.run(|| device.trigger(Trigger::Go));
    assert_eq!(result, Err(AudioError::Io));
    assert_eq!(logs.count("toggling enable"), 5);
    assert_eq!(logs.count("Failed to enable transmitter"), 1);
    assert_eq!(regs.get(pwm::CTL) & (pwm::CTL_PWEN1 | pwm::CTL_PWEN2), 0);
}

#[test]
fn test_transmitter_starting_on_the_fourth_toggle_succeeds() {
    let mut rig = jack();
    let device = rig.device(PwmOptions::default()).unwrap();
    rig.model.start_failures.store(4, Ordering::SeqCst);
    device.acquire(HANDLE, &config(48_000)).unwrap();

    let logs = LogCapture::new();
    logs.run(|| device.trigger(Trigger::Go)).unwrap();
    assert_eq!(logs.count("toggling enable"), 4);
    assert_eq!(logs.count("Failed to enable transmitter"), 0);
}
