//! Peripheral bus controllers brought up during boot.
//!
//! The drivers behind this trait (SPI enumeration, SDHC card init) live in
//! the host RTOS. Their failures come back as the driver's own negated errno,
//! which bring-up forwards untouched.

use crate::error::ErrorCode;

/// SPI and SD/MMC controller bring-up.
pub trait PeripheralBus {
    /// Configure SPI chip-select lines to their inactive level.
    ///
    /// Pure pin configuration; no bus traffic, no failure path.
    fn configure_chip_selects(&mut self);

    /// Bring up the SDHC controller and probe the card.
    fn init_sdcard(&mut self) -> Result<(), ErrorCode>;

    /// Bring up the SPI bus controllers and register the devices on them.
    fn init_spi_bus(&mut self) -> Result<(), ErrorCode>;
}
