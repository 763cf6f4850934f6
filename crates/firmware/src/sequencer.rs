//! Power sequencer: parks the PWM outputs, configures the board pins and
//! switches the rails on in dependency order.
//!
//! The sequencer is a typestate. Each stage consumes the previous state, so
//! the order is enforced by the compiler:
//!
//! ```text
//! PowerSequencer<Reset>
//!     │ early_init()             PWM park, LED pins, GPIO table, timers, Spektrum rail
//!     ▼
//! PowerSequencer<EarlyInit>
//!     │ enable_application_rails()   SD card, sensors, chip selects, ethernet
//!     ▼
//! PowerSequencer<RailsLive>      proof the bus initializer requires
//! ```
//!
//! None of these steps can fail: pin tables are trusted and rails have no
//! readiness feedback on this board.

use core::marker::PhantomData;

use platform::{
    GpioController, GpioInitEntry, PeripheralBus, PinId, PinMode, RailControl, RailId,
    SystemServices,
};

use crate::board_config::{GPIO_INIT_TABLE, LED_INIT_TABLE, PWM_RESET_PINS};

/// State: nothing configured since reset.
pub struct Reset;

/// State: board pins configured, only the receiver rail live.
pub struct EarlyInit;

/// State: every application rail enabled. Buses may be touched.
pub struct RailsLive;

/// Typestate power sequencer.
pub struct PowerSequencer<S> {
    _state: PhantomData<S>,
}

impl PowerSequencer<Reset> {
    /// Start from reset.
    pub const fn new() -> Self {
        Self {
            _state: PhantomData,
        }
    }

    /// Early board initialisation.
    ///
    /// Parks the PWM outputs low (no settle delay: this is the same pass the
    /// bootloader variant of `on_reset` performs), pre-initialises the LED
    /// pins, applies [`GPIO_INIT_TABLE`], configures the board timers and
    /// powers the Spektrum receiver so it can bind early.
    pub fn early_init<B>(self, board: &mut B) -> PowerSequencer<EarlyInit>
    where
        B: GpioController + RailControl + SystemServices + ?Sized,
    {
        reset_outputs(board, PWM_RESET_PINS);
        apply_gpio_table(board, LED_INIT_TABLE);
        apply_gpio_table(board, GPIO_INIT_TABLE);
        board.init_board_timers();
        enable_rail(board, RailId::Spektrum);
        log_debug!("early board init done");
        PowerSequencer {
            _state: PhantomData,
        }
    }
}

impl Default for PowerSequencer<Reset> {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSequencer<EarlyInit> {
    /// Switch on the SD card and sensor rails, park the SPI chip selects,
    /// then switch on the ethernet PHY.
    pub fn enable_application_rails<B>(self, board: &mut B) -> PowerSequencer<RailsLive>
    where
        B: RailControl + PeripheralBus + ?Sized,
    {
        enable_rail(board, RailId::SdCard);
        enable_rail(board, RailId::Sensors);
        board.configure_chip_selects();
        enable_rail(board, RailId::Ethernet);
        PowerSequencer {
            _state: PhantomData,
        }
    }
}

/// Force every pin in `pins` to a GPIO output driven low.
///
/// Whatever alternate function the pin had (PWM timer channel, typically) is
/// dropped.
pub fn reset_outputs<G: GpioController + ?Sized>(gpio: &mut G, pins: &[PinId]) {
    for pin in pins {
        gpio.configure(&GpioInitEntry::new(*pin, PinMode::OUTPUT_LOW));
    }
}

/// Apply a pin table in order. A later entry for the same pin wins.
pub fn apply_gpio_table<G: GpioController + ?Sized>(gpio: &mut G, entries: &[GpioInitEntry]) {
    gpio.configure_all(entries);
}

/// Switch one rail on. Idempotent.
pub fn enable_rail<R: RailControl + ?Sized>(rails: &mut R, rail: RailId) {
    log_debug!("rail {} on", rail.name());
    rails.enable_rail(rail);
}
