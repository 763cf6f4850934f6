//! Peripheral bus initializer.
//!
//! Brings up the SDHC controller and the SPI buses. Construction requires a
//! `PowerSequencer<RailsLive>`, so a bus can only be touched once its supply
//! is known to be on. Either failure is fatal for bring-up; the driver's code
//! is forwarded unchanged inside the matching [`BringUpError`] variant.

use platform::PeripheralBus;

use crate::bringup::BringUpError;
use crate::sequencer::{PowerSequencer, RailsLive};

/// Bus bring-up, gated on live rails.
pub struct BusInitializer<'r> {
    _rails: &'r PowerSequencer<RailsLive>,
}

impl<'r> BusInitializer<'r> {
    /// Bind to the proof that every application rail is on.
    pub fn new(rails: &'r PowerSequencer<RailsLive>) -> Self {
        Self { _rails: rails }
    }

    /// Bring up the SD/MMC controller and card.
    pub fn init_sdcard<B: PeripheralBus + ?Sized>(&self, bus: &mut B) -> Result<(), BringUpError> {
        bus.init_sdcard().map_err(BringUpError::StorageInit)
    }

    /// Bring up the SPI bus controllers.
    pub fn init_spi_bus<B: PeripheralBus + ?Sized>(&self, bus: &mut B) -> Result<(), BringUpError> {
        bus.init_spi_bus().map_err(BringUpError::BusInit)
    }
}
