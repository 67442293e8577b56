//! BCM2711 GPIO function select and pull control.

// Field offsets and shifts are derived from pin numbers below 58.
#![allow(clippy::arithmetic_side_effects)]

use platform::{PinFunction, PinMux, Pull, RegisterBlock};

/// ARM physical address of the GPIO bank.
pub const GPIO_BASE: u64 = 0xFE20_0000;

/// Size of the GPIO window.
pub const GPIO_WINDOW_SIZE: usize = 0x100;

const GPFSEL0: usize = 0x00;
const GPIO_PUP_PDN_CNTRL0: usize = 0xe4;

/// GPIO bank driven through its register window.
#[derive(Debug)]
pub struct Bcm2711Gpio<B> {
    regs: B,
}

impl<B: RegisterBlock> Bcm2711Gpio<B> {
    /// Wrap the mapped GPIO window.
    pub fn new(regs: B) -> Self {
        Self { regs }
    }
}

impl<B: RegisterBlock> PinMux for Bcm2711Gpio<B> {
    fn configure(&mut self, pin: u8, function: PinFunction, pull: Pull) {
        let fsel = GPFSEL0 + usize::from(pin / 10) * 4;
        let shift = 3 * u32::from(pin % 10);
        let value = self.regs.read(fsel) & !(0x7 << shift);
        self.regs.write(fsel, value | (function.fsel_bits() << shift));

        let pud = GPIO_PUP_PDN_CNTRL0 + usize::from(pin / 16) * 4;
        let shift = 2 * u32::from(pin % 16);
        let value = self.regs.read(pud) & !(0x3 << shift);
        self.regs.write(pud, value | (pull.bits() << shift));
    }
}

/// Route `pins` to `function` with pulls disabled.
pub fn configure_pins(mux: &mut impl PinMux, pins: &[u8], function: PinFunction) {
    for &pin in pins {
        mux.configure(pin, function, Pull::None);
    }
    debug!("GPIO {} pins from {} set to {}", pins.len(), pins.first().copied().unwrap_or(0), function.fsel_bits());
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::mocks::{FakeRegisters, RecordingPinMux};

    #[test]
    fn pcm_pins_alt0() {
        let regs = FakeRegisters::new(GPIO_WINDOW_SIZE);
        regs.set(0x04, 0xffff_ffff);
        regs.set(0xe4, 0xffff_ffff);
        let mut gpio = Bcm2711Gpio::new(regs.clone());
        configure_pins(&mut gpio, &[18, 19, 20, 21], PinFunction::Alt0);

        // GPFSEL1 holds pins 10-19, GPFSEL2 pins 20-29.
        assert_eq!(regs.get(0x04), (0xffff_ffff & !(0o77 << 24)) | (0o44 << 24));
        assert_eq!(regs.get(0x08) & 0o77, 0o44);
        // Pulls for 16-31 live in the second pull register.
        assert_eq!(regs.get(0xe8) & (0xff << 4), 0);
        assert_eq!(regs.get(0xe4), 0xffff_ffff);
    }

    #[test]
    fn pwm1_pins_land_in_gpfsel4() {
        let regs = FakeRegisters::new(GPIO_WINDOW_SIZE);
        let mut gpio = Bcm2711Gpio::new(regs.clone());
        gpio.configure(40, PinFunction::Alt0, Pull::None);
        gpio.configure(41, PinFunction::Alt0, Pull::None);
        assert_eq!(regs.get(0x10), 0o44);
    }

    #[test]
    fn configure_pins_disables_pulls() {
        let mut mux = RecordingPinMux::new();
        configure_pins(&mut mux, &[18, 19], PinFunction::Alt5);
        assert_eq!(
            mux.calls(),
            [(18, PinFunction::Alt5, Pull::None), (19, PinFunction::Alt5, Pull::None)]
        );
    }
}
