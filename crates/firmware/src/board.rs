//! Entry points called by the host runtime.
//!
//! | Hook                        | When                                      |
//! |-----------------------------|-------------------------------------------|
//! | [`on_reset`]                | entry to a system reset or bootloader jump |
//! | [`board_initialize`]        | early, before the application-init hook   |
//! | [`board_bootstrap`]         | application-init hook                     |
//! | [`read_vbus_state`]         | any time                                  |
//! | [`set_uart_line_inversion`] | RC input driver, protocol switch          |
//! | [`reset_peripheral_rail`]   | sensor recovery                           |
//!
//! A cold boot runs [`board_initialize`] then [`board_bootstrap`]; the PWM
//! outputs are parked once, inside `board_initialize`. [`on_reset`] is not
//! a boot step.
//!
//! [`rail_switches`] and [`vbus_sense`] bind the board wiring in
//! `board_config` to any `embedded-hal` pin type.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use platform::power::RailPin;
use platform::{
    with_critical_section, Callout, ErrorCode, GpioController, GpioRails, GpioVbusSense, PinId,
    RailControl, RegisterAccess, SystemServices, UartRegisters, VbusSense,
};

use crate::board_config::{
    BringUpOptions, PERIPHERAL_RESET_RAILS, PWM_RESET_PINS, RAIL_COUNT, RAIL_ENABLE_PINS,
    RESET_SETTLE_MS, VBUS_SENSE_ACTIVE_HIGH, VBUS_SENSE_PIN,
};
use crate::bringup::{Board, Orchestrator};
use crate::sequencer::{reset_outputs, EarlyInit, PowerSequencer};

/// Park every PWM output as a GPIO driven low.
///
/// `status >= 0` is a normal reset and waits [`RESET_SETTLE_MS`] for the ESCs
/// to see the low level; a negative status means the bootloader is about to
/// take over and there is no delay.
pub fn on_reset<G, D>(status: i32, gpio: &mut G, delay: &mut D)
where
    G: GpioController + ?Sized,
    D: DelayNs + ?Sized,
{
    reset_outputs(gpio, PWM_RESET_PINS);
    if status >= 0 {
        delay.delay_ms(RESET_SETTLE_MS);
    }
}

/// USB VBUS state in the host's convention: `0` when VBUS is present,
/// `1` otherwise.
pub fn read_vbus_state<S: VbusSense + ?Sized>(sense: &mut S) -> i32 {
    if sense.vbus_present() {
        0
    } else {
        1
    }
}

/// Set or clear RX and TX data inversion on the UART at `base`.
///
/// Both bits change inside one critical section, so the UART interrupt
/// handler never observes one inverted and the other not.
pub fn set_uart_line_inversion<R: RegisterAccess + ?Sized>(regs: &R, invert: bool, base: usize) {
    let uart = UartRegisters::new(regs, base);
    with_critical_section(|cs| uart.set_line_inversion(cs, invert));
}

/// Power-cycle the peripheral rails: off, hold for `ms`, back on.
///
/// Blocks the caller for the whole hold time.
pub fn reset_peripheral_rail<R, D>(rails: &mut R, delay: &mut D, ms: u32)
where
    R: RailControl + ?Sized,
    D: DelayNs + ?Sized,
{
    for rail in PERIPHERAL_RESET_RAILS {
        rails.disable_rail(*rail);
    }
    delay.delay_ms(ms);
    log_info!("reset done, {} ms", ms);
    for rail in PERIPHERAL_RESET_RAILS {
        rails.enable_rail(*rail);
    }
}

/// The board's rail switches, one enable line per entry of
/// [`RAIL_ENABLE_PINS`], each built by `pin`.
pub fn rail_switches<P, F>(mut pin: F) -> GpioRails<P, RAIL_COUNT>
where
    P: OutputPin,
    F: FnMut(PinId) -> P,
{
    GpioRails::new(RAIL_ENABLE_PINS.map(|(rail, id, active_low)| RailPin {
        rail,
        pin: pin(id),
        active_low,
    }))
}

/// The VBUS detector on [`VBUS_SENSE_PIN`], read through `pin`.
pub fn vbus_sense<P, F>(pin: F) -> GpioVbusSense<P>
where
    P: InputPin,
    F: FnOnce(PinId) -> P,
{
    GpioVbusSense::new(pin(VBUS_SENSE_PIN), VBUS_SENSE_ACTIVE_HIGH)
}

/// Early board initialisation: PWM park, LED and GPIO tables, board timers,
/// receiver rail.
///
/// Returns the sequencer [`board_bootstrap`] continues from.
pub fn board_initialize<B>(board: &mut B) -> PowerSequencer<EarlyInit>
where
    B: GpioController + RailControl + SystemServices + ?Sized,
{
    PowerSequencer::new().early_init(board)
}

/// Application-init hook: run the bring-up orchestrator.
///
/// `Ok(())` when every stage succeeded; otherwise the failing driver's code,
/// with the fault LED lit.
pub fn board_bootstrap<B: Board + ?Sized>(
    sequencer: PowerSequencer<EarlyInit>,
    board: &mut B,
    options: BringUpOptions,
    serial_poll: Callout,
) -> Result<(), ErrorCode> {
    Orchestrator::new(options, serial_poll)
        .run(sequencer, board)
        .result()
        .map_err(|err| err.code())
}
