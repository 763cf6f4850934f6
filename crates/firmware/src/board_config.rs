//! Compiled-in board configuration for the fmuk66-v3.
//!
//! Everything here is pure data: pin tables, rail wiring, timings and the
//! optional-stage switches. Tables are trusted and applied in order; there is
//! no validation pass at runtime.
//!
//! # Bring-up order
//!
//! [`BRINGUP_SEQUENCE_STEPS`] documents the order the host runtime drives the
//! board through on a cold boot. Its application stages are named after
//! [`BringUpStage`](crate::BringUpStage) and listed in the orchestrator's
//! execution order.
//!
//! `on_reset` with a non-negative status is not part of booting: the host
//! calls it on the way into a system reset.

use embassy_time::Duration;
use platform::register::uart_base;
use platform::{GpioInitEntry, LedColor, PinId, PinMode, Port, Pull, RailId};

/// Ordered bring-up sequence, from reset vector to `Ready`.
///
/// # Correctness Invariants
///
/// - PWM outputs are forced low before anything else so no actuator sees a
///   floating or high line while the board powers up.
/// - SD-card and sensor rails are live before their buses are touched.
/// - The high-resolution timebase is running before the serial DMA poll is
///   registered against it.
/// - The LED driver is started before the first fault can be signalled.
pub const BRINGUP_SEQUENCE_STEPS: &[&str] = &[
    "1. board_initialize: PWM outputs to GPIO output-low (bootloader variant, no settle delay)",
    "2. board_initialize: LED pins, GPIO init table, board timers, Spektrum rail on",
    "3. RailsEnabling: SD card rail, sensors rail, SPI chip selects, ethernet rail",
    "4. LanguageRuntimePrep: static constructors",
    "5. ParamStoreInit: load parameters",
    "6. TimebaseInit: high-resolution timer",
    "7. DmaAllocInit: DMA buffer pool (failure is logged, not fatal)",
    "8. CpuLoadInstrumentInit: CPU load accounting (optional)",
    "9. SerialPollRegister: 1 ms serial DMA poll (optional)",
    "10. LedInit: start LED driver, all channels off",
    "11. SdInit: SDHC controller + card (fatal on failure)",
    "12. AutomountInit: SD automounter (optional)",
    "13. SpiInit: SPI buses (optional, fatal on failure)",
];

/// Settle time after parking the PWM outputs on a normal reset.
pub const RESET_SETTLE_MS: u32 = 6;

/// Period of the serial DMA poll. The first poll also fires one period after
/// registration.
pub const SERIAL_DMA_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default duration `reset_peripheral_rail` holds the rail off.
pub const PERIPHERAL_RESET_DEFAULT_MS: u32 = 10;

/// Rails cycled by `reset_peripheral_rail`.
pub const PERIPHERAL_RESET_RAILS: &[RailId] = &[RailId::Sensors];

/// UART carrying the RC receiver input; its RX/TX lines get inverted for
/// S.BUS.
pub const RC_UART_BASE: usize = uart_base::UART1;

/// FlexTimer PWM outputs (FMU_CH1..FMU_CH6).
pub const PWM_RESET_PINS: &[PinId] = &[
    PinId::new(Port::C, 1),  // FTM0_CH0
    PinId::new(Port::A, 4),  // FTM0_CH1
    PinId::new(Port::D, 4),  // FTM0_CH4
    PinId::new(Port::D, 5),  // FTM0_CH5
    PinId::new(Port::E, 11), // FTM3_CH6
    PinId::new(Port::E, 12), // FTM3_CH7
];

/// Switched rails on the board.
pub const RAIL_COUNT: usize = 4;

/// Rail enable lines: `(rail, pin, active_low)`.
pub const RAIL_ENABLE_PINS: [(RailId, PinId, bool); RAIL_COUNT] = [
    (RailId::Sensors, PinId::new(Port::B, 8), false),
    (RailId::SdCard, PinId::new(Port::D, 6), false),
    (RailId::Ethernet, PinId::new(Port::A, 29), false),
    (RailId::Spektrum, PinId::new(Port::A, 7), false),
];

/// Status LED channels. All are driven low to light.
pub const LED_PINS: &[(LedColor, PinId)] = &[
    (LedColor::Red, PinId::new(Port::D, 1)),
    (LedColor::Green, PinId::new(Port::C, 9)),
    (LedColor::Blue, PinId::new(Port::D, 11)),
];

/// LED pre-initialisation table: every channel an output, dark.
pub const LED_INIT_TABLE: &[GpioInitEntry] = &[
    GpioInitEntry::new(PinId::new(Port::D, 1), PinMode::OUTPUT_HIGH),
    GpioInitEntry::new(PinId::new(Port::C, 9), PinMode::OUTPUT_HIGH),
    GpioInitEntry::new(PinId::new(Port::D, 11), PinMode::OUTPUT_HIGH),
];

/// USB VBUS valid input.
pub const VBUS_SENSE_PIN: PinId = PinId::new(Port::E, 8);

/// The VBUS sense input reads high when bus power is present.
pub const VBUS_SENSE_ACTIVE_HIGH: bool = true;

/// SD card detect input (low when a card is inserted).
pub const SD_CARD_DETECT_PIN: PinId = PinId::new(Port::D, 10);

/// SPI chip selects, inactive high.
pub const SPI_CHIP_SELECTS: &[PinId] = &[
    PinId::new(Port::C, 2), // SPI0 PCS2: gyro
    PinId::new(Port::C, 3), // SPI0 PCS1: accel/mag
    PinId::new(Port::B, 9), // SPI1 PCS1: barometer
    PinId::new(Port::B, 10), // SPI1 PCS0: FRAM
];

/// Board GPIO initialisation table, applied once by `board_initialize`.
///
/// Rail enables start low: rails come up under sequencer control, not as a
/// side effect of pin configuration.
pub const GPIO_INIT_TABLE: &[GpioInitEntry] = &[
    // Rail enables
    GpioInitEntry::new(PinId::new(Port::B, 8), PinMode::OUTPUT_LOW),
    GpioInitEntry::new(PinId::new(Port::D, 6), PinMode::OUTPUT_LOW),
    GpioInitEntry::new(PinId::new(Port::A, 29), PinMode::OUTPUT_LOW),
    GpioInitEntry::new(PinId::new(Port::A, 7), PinMode::OUTPUT_LOW),
    // Sense inputs
    GpioInitEntry::new(
        PinId::new(Port::E, 8),
        PinMode::Input {
            pull: Pull::Floating,
        },
    ),
    GpioInitEntry::new(PinId::new(Port::D, 10), PinMode::Input { pull: Pull::Up }),
    // Chip selects parked inactive
    GpioInitEntry::new(PinId::new(Port::C, 2), PinMode::OUTPUT_HIGH),
    GpioInitEntry::new(PinId::new(Port::C, 3), PinMode::OUTPUT_HIGH),
    GpioInitEntry::new(PinId::new(Port::B, 9), PinMode::OUTPUT_HIGH),
    GpioInitEntry::new(PinId::new(Port::B, 10), PinMode::OUTPUT_HIGH),
    // RC input: UART1_RX
    GpioInitEntry::new(PinId::new(Port::E, 1), PinMode::Alternate(3)),
];

/// Optional bring-up stages.
///
/// Each flag maps to a build-time switch on other boards in the family; here
/// they are runtime data so a single image can be exercised with any subset.
/// A disabled stage is recorded as skipped, never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(clippy::struct_excessive_bools)] // independent stage switches
pub struct BringUpOptions {
    /// Start CPU load accounting.
    pub cpu_load: bool,
    /// Register the 1 ms serial DMA poll.
    pub serial_dma_poll: bool,
    /// Start the SD automounter after the card is up.
    pub automount: bool,
    /// Bring up the SPI buses.
    pub spi: bool,
}

impl BringUpOptions {
    /// fmuk66-v3 production configuration: every stage enabled.
    pub const FMUK66_V3: Self = Self {
        cpu_load: true,
        serial_dma_poll: true,
        automount: true,
        spi: true,
    };

    /// Only the mandatory stages.
    pub const MINIMAL: Self = Self {
        cpu_load: false,
        serial_dma_poll: false,
        automount: false,
        spi: false,
    };
}

impl Default for BringUpOptions {
    fn default() -> Self {
        Self::FMUK66_V3
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn settle_delay_is_six_ms() {
        assert_eq!(RESET_SETTLE_MS, 6);
    }

    #[test]
    fn poll_interval_is_one_ms() {
        assert_eq!(SERIAL_DMA_POLL_INTERVAL, Duration::from_millis(1));
    }

    #[test]
    fn every_rail_has_an_enable_pin() {
        for rail in [
            RailId::Sensors,
            RailId::SdCard,
            RailId::Ethernet,
            RailId::Spektrum,
        ] {
            assert!(
                RAIL_ENABLE_PINS.iter().any(|(r, _, _)| *r == rail),
                "{} has no enable pin",
                rail.name()
            );
        }
    }

    #[test]
    fn rail_enables_start_low() {
        for (_, pin, active_low) in RAIL_ENABLE_PINS {
            let entry = GPIO_INIT_TABLE.iter().find(|e| e.pin == pin).unwrap();
            let expected = if active_low {
                PinMode::OUTPUT_HIGH
            } else {
                PinMode::OUTPUT_LOW
            };
            assert_eq!(entry.mode, expected, "rail pin {:?} must start off", pin);
        }
    }

    #[test]
    fn chip_selects_start_inactive() {
        for cs in SPI_CHIP_SELECTS {
            let entry = GPIO_INIT_TABLE.iter().find(|e| e.pin == *cs).unwrap();
            assert_eq!(entry.mode, PinMode::OUTPUT_HIGH);
        }
    }

    #[test]
    fn pwm_pins_are_not_in_gpio_table() {
        for pin in PWM_RESET_PINS {
            assert!(GPIO_INIT_TABLE.iter().all(|e| e.pin != *pin));
        }
    }

    #[test]
    fn led_table_matches_led_pins() {
        assert_eq!(LED_INIT_TABLE.len(), LED_PINS.len());
        for ((_, pin), entry) in LED_PINS.iter().zip(LED_INIT_TABLE) {
            assert_eq!(entry.pin, *pin);
        }
    }

    #[test]
    fn default_options_enable_everything() {
        assert_eq!(BringUpOptions::default(), BringUpOptions::FMUK66_V3);
    }

    #[test]
    fn sequence_steps_start_with_board_initialize() {
        assert!(BRINGUP_SEQUENCE_STEPS[0].starts_with("1. board_initialize: PWM"));
        assert!(BRINGUP_SEQUENCE_STEPS[1].starts_with("2. board_initialize:"));
        assert!(BRINGUP_SEQUENCE_STEPS.iter().all(|s| !s.contains("on_reset")));
    }

    #[test]
    fn sequence_steps_list_stages_in_execution_order() {
        use crate::bringup::BringUpStage;

        assert_eq!(BRINGUP_SEQUENCE_STEPS.len(), 2 + BringUpStage::COUNT);
        for (index, (step, stage)) in BRINGUP_SEQUENCE_STEPS[2..]
            .iter()
            .zip(BringUpStage::ALL)
            .enumerate()
        {
            let (number, rest) = step.split_once(". ").unwrap();
            assert_eq!(number, (index + 3).to_string());
            let name = rest.split(':').next().unwrap();
            assert_eq!(name, stage.name(), "step {step}");
        }
    }
}
