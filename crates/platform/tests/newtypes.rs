//! Type system enforcement tests for audio domain newtypes.
//! These newtypes keep bad rates and sample widths out at the option boundary.

#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]

// ── SampleRateHz ─────────────────────────────────────────────────────────────

#[test]
fn sample_rate_try_new_accepts_standard_rates() {
    use platform::audio_types::STANDARD_RATES;
    use platform::SampleRateHz;
    for hz in STANDARD_RATES {
        assert_eq!(SampleRateHz::try_new(hz).map(SampleRateHz::get), Ok(hz));
    }
}

#[test]
fn sample_rate_try_new_rejects_non_standard_rates() {
    use platform::{OutOfRangeError, SampleRateHz};
    assert_eq!(
        SampleRateHz::try_new(12_345),
        Err(OutOfRangeError { value: 12_345, min: 5_512, max: 384_000 })
    );
    assert!(SampleRateHz::try_new(0).is_err());
    assert!(SampleRateHz::try_new(768_000).is_err());
}

#[test]
fn sample_rates_order_by_frequency() {
    use platform::SampleRateHz;
    let low = SampleRateHz::try_new(44_100).unwrap();
    let high = SampleRateHz::try_new(48_000).unwrap();
    assert!(low < high);
}

// ── SampleFormat ─────────────────────────────────────────────────────────────

#[test]
fn sample_format_from_bits_covers_three_widths() {
    use platform::SampleFormat;
    assert_eq!(SampleFormat::from_bits(16), Ok(SampleFormat::S16));
    assert_eq!(SampleFormat::from_bits(24), Ok(SampleFormat::S24In32));
    assert_eq!(SampleFormat::from_bits(32), Ok(SampleFormat::S32));
    assert!(SampleFormat::from_bits(8).is_err());
    assert!(SampleFormat::from_bits(20).is_err());
}

#[test]
fn sample_format_widths() {
    use platform::SampleFormat;
    assert_eq!(SampleFormat::S16.bit_width(), 16);
    assert_eq!(SampleFormat::S16.byte_width(), 2);
    // 24-bit samples travel in a 32-bit container.
    assert_eq!(SampleFormat::S24In32.bit_width(), 24);
    assert_eq!(SampleFormat::S24In32.byte_width(), 4);
    assert_eq!(SampleFormat::S32.byte_width(), 4);
}

#[test]
fn sample_format_flags_are_distinct() {
    use platform::{FormatSet, SampleFormat};
    let all = SampleFormat::S16.flag() | SampleFormat::S24In32.flag() | SampleFormat::S32.flag();
    assert_eq!(all, FormatSet::all());
    assert_eq!(SampleFormat::S24In32.flag(), FormatSet::S24_IN_32);
}

// ── Direction ────────────────────────────────────────────────────────────────

#[test]
fn direction_other_is_an_involution() {
    use platform::Direction;
    assert_eq!(Direction::Playback.other(), Direction::Capture);
    assert_eq!(Direction::Capture.other(), Direction::Playback);
    assert_eq!(Direction::Playback.other().other(), Direction::Playback);
    assert_eq!(Direction::Capture.name(), "Capture");
}

// ── RateSet ──────────────────────────────────────────────────────────────────

#[test]
fn rate_set_from_rate_maps_single_flags() {
    use platform::RateSet;
    assert_eq!(RateSet::from_rate(48_000), RateSet::HZ_48000);
    assert_eq!(RateSet::from_rate(5_512), RateSet::HZ_5512);
    assert_eq!(RateSet::from_rate(384_000), RateSet::HZ_384000);
    assert!(RateSet::from_rate(12_345).is_empty());
}

#[test]
fn rate_set_between_is_inclusive() {
    use platform::RateSet;
    assert_eq!(RateSet::between(44_100, 48_000), RateSet::HZ_44100 | RateSet::HZ_48000);
    assert_eq!(RateSet::between(8_000, 8_000), RateSet::HZ_8000);
    assert!(RateSet::between(48_001, 63_999).is_empty());
    assert_eq!(RateSet::between(0, u32::MAX), RateSet::all());
}

#[test]
fn rate_set_min_and_max() {
    use platform::RateSet;
    let set = RateSet::HZ_16000 | RateSet::HZ_96000 | RateSet::HZ_44100;
    assert_eq!(set.min_rate(), Some(16_000));
    assert_eq!(set.max_rate(), Some(96_000));
    assert_eq!(RateSet::empty().min_rate(), None);
    assert_eq!(RateSet::empty().max_rate(), None);
}

// ── Clock and pin encodings ──────────────────────────────────────────────────

#[test]
fn clock_sources_match_cm_selectors() {
    use platform::ClockSource;
    assert_eq!(ClockSource::Oscillator.selector(), 1);
    assert_eq!(ClockSource::PllD.selector(), 6);
    assert_eq!(ClockSource::PllD.frequency_hz() % 48_000, 0);
}

#[test]
fn pin_function_fsel_encodings() {
    use platform::{PinFunction, Pull};
    assert_eq!(PinFunction::Input.fsel_bits(), 0b000);
    assert_eq!(PinFunction::Alt0.fsel_bits(), 0b100);
    assert_eq!(PinFunction::Alt5.fsel_bits(), 0b010);
    assert_eq!(Pull::None.bits(), 0b00);
}
