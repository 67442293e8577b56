//! GPIO pin-mux abstraction
//!
//! Audio pins are configured once, before the interface is enabled: each
//! pin gets an alternate function and its pull resistor disabled.

/// Pin function select (FSEL) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinFunction {
    /// Plain input.
    Input,
    /// Plain output.
    Output,
    /// Alternate function 0.
    Alt0,
    /// Alternate function 1.
    Alt1,
    /// Alternate function 2.
    Alt2,
    /// Alternate function 3.
    Alt3,
    /// Alternate function 4.
    Alt4,
    /// Alternate function 5.
    Alt5,
}

impl PinFunction {
    /// 3-bit FSEL field encoding (BCM2711 peripherals §5.2).
    pub const fn fsel_bits(self) -> u32 {
        match self {
            Self::Input => 0b000,
            Self::Output => 0b001,
            Self::Alt0 => 0b100,
            Self::Alt1 => 0b101,
            Self::Alt2 => 0b110,
            Self::Alt3 => 0b111,
            Self::Alt4 => 0b011,
            Self::Alt5 => 0b010,
        }
    }
}

/// Pull resistor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// No pull resistor.
    None,
    /// Pull up.
    Up,
    /// Pull down.
    Down,
}

impl Pull {
    /// 2-bit GPIO_PUP_PDN_CNTRL field encoding.
    pub const fn bits(self) -> u32 {
        match self {
            Self::None => 0b00,
            Self::Up => 0b01,
            Self::Down => 0b10,
        }
    }
}

/// Pin multiplexer
pub trait PinMux {
    /// Select `function` and `pull` for `pin`.
    fn configure(&mut self, pin: u8, function: PinFunction, pull: Pull);
}

impl<T: PinMux + ?Sized> PinMux for &mut T {
    fn configure(&mut self, pin: u8, function: PinFunction, pull: Pull) {
        (**self).configure(pin, function, pull);
    }
}
