//! Tri-color status LED.

/// LED channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedColor {
    /// Red: fault
    Red,
    /// Green
    Green,
    /// Blue
    Blue,
}

impl LedColor {
    /// All channels, in the order the board driver numbers them.
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Blue];

    /// Color asserted when bring-up aborts.
    pub const FAULT: Self = Self::Red;
}

/// On/off state of each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IndicatorState {
    /// Red channel lit
    pub red: bool,
    /// Green channel lit
    pub green: bool,
    /// Blue channel lit
    pub blue: bool,
}

impl IndicatorState {
    /// Everything dark.
    pub const OFF: Self = Self {
        red: false,
        green: false,
        blue: false,
    };

    /// Update one channel.
    pub fn set(&mut self, color: LedColor, on: bool) {
        match color {
            LedColor::Red => self.red = on,
            LedColor::Green => self.green = on,
            LedColor::Blue => self.blue = on,
        }
    }

    /// Whether a channel is lit.
    pub fn is_on(&self, color: LedColor) -> bool {
        match color {
            LedColor::Red => self.red,
            LedColor::Green => self.green,
            LedColor::Blue => self.blue,
        }
    }

    /// `true` when no channel is lit.
    pub fn all_off(&self) -> bool {
        *self == Self::OFF
    }
}

/// Status indicator. Best effort: no errors, no timing guarantees.
pub trait StatusLed {
    /// Start the LED driver. Called once, before the first `set`.
    fn start(&mut self);

    /// Switch one channel.
    fn set(&mut self, color: LedColor, on: bool);

    /// Switch every channel off.
    fn all_off(&mut self) {
        for color in LedColor::ALL {
            self.set(color, false);
        }
    }
}
