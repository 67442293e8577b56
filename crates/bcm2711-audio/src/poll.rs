//! Bounded spin-waits.

use embedded_hal::delay::DelayNs;

/// Wait while `busy()` holds, checking up to `tries` times `step_us` apart.
///
/// Returns `Ok(waited_us)` once `busy()` is false, or `Err(waited_us)` after
/// the full budget was spent. The condition is checked before every delay
/// and not again after the last one, so a budget fully consumed is always
/// a timeout.
pub(crate) fn poll_while(
    delay: &mut dyn DelayNs,
    tries: u32,
    step_us: u32,
    mut busy: impl FnMut() -> bool,
) -> Result<u32, u32> {
    let mut waited_us = 0u32;
    for _ in 0..tries {
        if !busy() {
            return Ok(waited_us);
        }
        delay.delay_us(step_us);
        waited_us = waited_us.saturating_add(step_us);
    }
    Err(waited_us)
}
