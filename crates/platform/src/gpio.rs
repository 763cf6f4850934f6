//! GPIO pin identifiers and boot-time pin tables.
//!
//! Board pin configuration is compiled-in data: an ordered slice of
//! [`GpioInitEntry`] values that a [`GpioController`] applies front to back.
//! Tables are trusted; applying an entry has no failure path.

/// Kinetis GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    /// PORTA / PTA
    A,
    /// PORTB / PTB
    B,
    /// PORTC / PTC
    C,
    /// PORTD / PTD
    D,
    /// PORTE / PTE
    E,
}

impl Port {
    /// Zero-based port index (A = 0).
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
            Self::E => 4,
        }
    }
}

/// A single pin: port plus pin number (0..=31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    /// Port
    pub port: Port,
    /// Pin number within the port
    pub pin: u8,
}

impl PinId {
    /// Shorthand constructor for table literals.
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }

    /// Bit mask of this pin within its port's data registers.
    pub const fn mask(self) -> u32 {
        1u32.wrapping_shl((self.pin & 0x1F) as u32)
    }
}

/// Pin state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    /// High (logic 1)
    High,
    /// Low (logic 0)
    Low,
}

impl From<bool> for PinState {
    fn from(value: bool) -> Self {
        if value {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<PinState> for bool {
    fn from(value: PinState) -> Self {
        matches!(value, PinState::High)
    }
}

/// Input pull resistor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// No pull resistor
    Floating,
    /// Pull-up
    Up,
    /// Pull-down
    Down,
}

/// Boot-time pin configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// GPIO output driven to `initial` as soon as the direction is set.
    Output {
        /// Level latched before the pin becomes an output
        initial: PinState,
    },
    /// GPIO input
    Input {
        /// Pull configuration
        pull: Pull,
    },
    /// Peripheral function on mux slot `alt` (ALT2..ALT7)
    Alternate(u8),
    /// Analog (pin mux disabled)
    Analog,
}

impl PinMode {
    /// Output held low: the safe state for actuator pins before arming.
    pub const OUTPUT_LOW: Self = Self::Output {
        initial: PinState::Low,
    };

    /// Output held high (inactive chip selects, enable lines).
    pub const OUTPUT_HIGH: Self = Self::Output {
        initial: PinState::High,
    };
}

/// One row of a board pin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpioInitEntry {
    /// Pin to configure
    pub pin: PinId,
    /// Mode it is put in
    pub mode: PinMode,
}

impl GpioInitEntry {
    /// Table literal helper.
    pub const fn new(pin: PinId, mode: PinMode) -> Self {
        Self { pin, mode }
    }
}

/// Pin configuration and level control.
pub trait GpioController {
    /// Put `entry.pin` into `entry.mode`.
    fn configure(&mut self, entry: &GpioInitEntry);

    /// Drive a configured output.
    fn write(&mut self, pin: PinId, state: PinState);

    /// Sample a pin.
    fn read(&mut self, pin: PinId) -> PinState;

    /// Apply a whole table in order. A later entry for the same pin wins.
    fn configure_all(&mut self, entries: &[GpioInitEntry]) {
        for entry in entries {
            self.configure(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_mask_matches_pin_number() {
        assert_eq!(PinId::new(Port::C, 0).mask(), 0x1);
        assert_eq!(PinId::new(Port::C, 31).mask(), 0x8000_0000);
    }

    #[test]
    fn pin_state_bool_conversions() {
        assert_eq!(PinState::from(true), PinState::High);
        assert!(!bool::from(PinState::Low));
    }

    #[test]
    fn output_low_is_low() {
        assert_eq!(
            PinMode::OUTPUT_LOW,
            PinMode::Output {
                initial: PinState::Low
            }
        );
    }
}
