//! Switched power rails and USB VBUS sensing.
//!
//! Rails are declared once at board-definition time and only ever toggled.
//! There is no readiness feedback on this board: a rail counts as live once
//! its enable line has been written, and ordering between rails and the buses
//! they feed is enforced by the sequencer, not by polling.

use embedded_hal::digital::{InputPin, OutputPin};

/// Switched supplies on the fmuk66 board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RailId {
    /// 3V3 sensor rail (IMUs, barometer, magnetometer)
    Sensors,
    /// 3V3 micro-SD card socket
    SdCard,
    /// Ethernet PHY supply
    Ethernet,
    /// 3V3 Spektrum satellite receiver
    Spektrum,
}

impl RailId {
    /// Short label for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sensors => "VDD_3V3_SENSORS",
            Self::SdCard => "VDD_3V3_SD_CARD",
            Self::Ethernet => "VDD_ETH",
            Self::Spektrum => "VDD_3V3_SPEKTRUM",
        }
    }
}

/// Power rail switching.
pub trait RailControl {
    /// Drive `rail` on or off. Repeating the current state is a no-op apart
    /// from the repeated enable-line write.
    fn set_rail(&mut self, rail: RailId, on: bool);

    /// Switch `rail` on.
    fn enable_rail(&mut self, rail: RailId) {
        self.set_rail(rail, true);
    }

    /// Switch `rail` off.
    fn disable_rail(&mut self, rail: RailId) {
        self.set_rail(rail, false);
    }
}

/// One rail and the GPIO that gates it.
pub struct RailPin<P> {
    /// Rail gated by this pin
    pub rail: RailId,
    /// Enable line
    pub pin: P,
    /// `true` when driving the pin low switches the rail on
    pub active_low: bool,
}

/// Rails gated by plain GPIO enable lines.
pub struct GpioRails<P, const N: usize> {
    rails: [RailPin<P>; N],
}

impl<P: OutputPin, const N: usize> GpioRails<P, N> {
    /// Bind each rail to its enable line.
    pub fn new(rails: [RailPin<P>; N]) -> Self {
        Self { rails }
    }

    /// Borrow the enable line of `rail`, if the board has one.
    pub fn pin_mut(&mut self, rail: RailId) -> Option<&mut P> {
        self.rails
            .iter_mut()
            .find(|r| r.rail == rail)
            .map(|r| &mut r.pin)
    }
}

impl<P: OutputPin, const N: usize> RailControl for GpioRails<P, N> {
    fn set_rail(&mut self, rail: RailId, on: bool) {
        if let Some(entry) = self.rails.iter_mut().find(|r| r.rail == rail) {
            let high = on != entry.active_low;
            // Board GPIO writes are infallible on this target.
            let _ = if high {
                entry.pin.set_high()
            } else {
                entry.pin.set_low()
            };
        }
    }
}

/// USB VBUS presence.
pub trait VbusSense {
    /// `true` when USB bus power is present.
    fn vbus_present(&mut self) -> bool;
}

/// VBUS sensed on a digital input.
pub struct GpioVbusSense<P> {
    pin: P,
    active_high: bool,
}

impl<P: InputPin> GpioVbusSense<P> {
    /// Wrap the sense input; `active_high` is `true` when a high level means
    /// VBUS is present.
    pub fn new(pin: P, active_high: bool) -> Self {
        Self { pin, active_high }
    }
}

impl<P: InputPin> VbusSense for GpioVbusSense<P> {
    fn vbus_present(&mut self) -> bool {
        // An unreadable sense line is reported as "not connected".
        match self.pin.is_high() {
            Ok(high) => high == self.active_high,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockPin;

    #[test]
    fn enable_drives_active_high_pin_high() {
        let mut rails = GpioRails::new([RailPin {
            rail: RailId::SdCard,
            pin: MockPin::new(false),
            active_low: false,
        }]);
        rails.enable_rail(RailId::SdCard);
        assert!(rails.pin_mut(RailId::SdCard).unwrap().level());
    }

    #[test]
    fn enable_drives_active_low_pin_low() {
        let mut rails = GpioRails::new([RailPin {
            rail: RailId::Ethernet,
            pin: MockPin::new(true),
            active_low: true,
        }]);
        rails.enable_rail(RailId::Ethernet);
        assert!(!rails.pin_mut(RailId::Ethernet).unwrap().level());
    }

    #[test]
    fn enable_is_idempotent() {
        let mut rails = GpioRails::new([RailPin {
            rail: RailId::Sensors,
            pin: MockPin::new(false),
            active_low: false,
        }]);
        rails.enable_rail(RailId::Sensors);
        rails.enable_rail(RailId::Sensors);
        let pin = rails.pin_mut(RailId::Sensors).unwrap();
        assert!(pin.level());
        assert_eq!(pin.writes(), 2, "repeat enable is only a repeated write");
    }

    #[test]
    fn unknown_rail_is_ignored() {
        let mut rails = GpioRails::new([RailPin {
            rail: RailId::Sensors,
            pin: MockPin::new(false),
            active_low: false,
        }]);
        rails.enable_rail(RailId::Spektrum);
        assert_eq!(rails.pin_mut(RailId::Sensors).unwrap().writes(), 0);
    }

    #[test]
    fn vbus_follows_polarity() {
        assert!(GpioVbusSense::new(MockPin::new(true), true).vbus_present());
        assert!(!GpioVbusSense::new(MockPin::new(false), true).vbus_present());
        assert!(GpioVbusSense::new(MockPin::new(false), false).vbus_present());
    }
}
