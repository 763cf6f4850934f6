//! Integration test: host runtime entry points.
//!
//! Tests that:
//!   1. on_reset parks every PWM output low, and only delays on a normal reset
//!   2. read_vbus_state follows the host convention (0 = present)
//!   3. UART line inversion round-trips without touching other bits, also
//!      while a simulated UART interrupt updates the same registers
//!   4. reset_peripheral_rail holds the sensor rail off for the requested time
//!   5. board_initialize configures pins before powering the receiver
//!   6. A cold boot (board_initialize + board_bootstrap, as the hardware entry
//!      point runs it) parks each PWM pin exactly once, with no settle delay
//!
//! Run with: cargo test -p firmware --test integration_board_entry

// Integration test file -- intentional test patterns permitted.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
)]

use embassy_time::Instant;
use firmware::board_config::{
    GPIO_INIT_TABLE, LED_INIT_TABLE, PWM_RESET_PINS, RC_UART_BASE, RESET_SETTLE_MS,
};
use firmware::{
    board_bootstrap, board_initialize, on_reset, read_vbus_state, reset_peripheral_rail,
    set_uart_line_inversion, BringUpOptions,
};
use platform::mocks::{BoardEvent, MockBoard, MockDelay, MockRegisterFile};
use platform::register::{modify8, UART_C3_OFFSET, UART_C3_TXINV, UART_S2_OFFSET, UART_S2_RXINV};
use platform::{with_critical_section, GpioInitEntry, PinMode, PinState, RailId};

// -- on_reset --------------------------------------------------------------

#[test]
fn on_reset_parks_pwm_low_for_any_status() {
    for status in [-1, 0, 1] {
        let mut board = MockBoard::new();
        let mut delay = MockDelay::new();
        on_reset(status, &mut board, &mut delay);
        for pin in PWM_RESET_PINS {
            assert_eq!(board.pin_level(*pin), Some(PinState::Low));
            assert_eq!(
                board.count(&BoardEvent::GpioConfigured(GpioInitEntry::new(
                    *pin,
                    PinMode::OUTPUT_LOW
                ))),
                1
            );
        }
    }
}

#[test]
fn on_reset_delay_depends_on_status_sign() {
    for (status, expected_ns) in [
        (-100, 0u64),
        (-1, 0),
        (0, u64::from(RESET_SETTLE_MS) * 1_000_000),
        (7, u64::from(RESET_SETTLE_MS) * 1_000_000),
    ] {
        let mut board = MockBoard::new();
        let mut delay = MockDelay::new();
        on_reset(status, &mut board, &mut delay);
        assert_eq!(delay.total_ns(), expected_ns, "status {status}");
    }
}

// -- VBUS ------------------------------------------------------------------

#[test]
fn vbus_state_zero_iff_present() {
    let mut board = MockBoard::new();
    for present in [true, false] {
        board.set_vbus(present);
        assert_eq!(read_vbus_state(&mut board) == 0, present);
    }
}

#[test]
fn vbus_state_from_board_sense_line() {
    use firmware::vbus_sense;
    use platform::mocks::MockPin;

    let mut sense = vbus_sense(|_| MockPin::new(true));
    assert_eq!(read_vbus_state(&mut sense), 0);
    let mut sense = vbus_sense(|_| MockPin::new(false));
    assert_eq!(read_vbus_state(&mut sense), 1);
}

// -- UART line inversion ---------------------------------------------------

#[test]
fn inversion_round_trip_restores_registers() {
    let regs = MockRegisterFile::new(RC_UART_BASE);
    let s2 = RC_UART_BASE + UART_S2_OFFSET;
    let c3 = RC_UART_BASE + UART_C3_OFFSET;
    regs.poke(s2, 0b1100_0001);
    regs.poke(c3, 0b0010_0100);

    set_uart_line_inversion(&regs, true, RC_UART_BASE);
    assert_eq!(regs.peek(s2), 0b1100_0001 | UART_S2_RXINV);
    assert_eq!(regs.peek(c3), 0b0010_0100 | UART_C3_TXINV);

    set_uart_line_inversion(&regs, false, RC_UART_BASE);
    assert_eq!(regs.peek(s2), 0b1100_0001);
    assert_eq!(regs.peek(c3), 0b0010_0100);
}

proptest::proptest! {
    /// On then off leaves every other bit as it was and the inversion bits
    /// clear, whatever the registers held before.
    #[test]
    fn inversion_on_off_keeps_other_bits(s2 in 0u8..=255u8, c3 in 0u8..=255u8) {
        let regs = MockRegisterFile::new(RC_UART_BASE);
        let s2_addr = RC_UART_BASE + UART_S2_OFFSET;
        let c3_addr = RC_UART_BASE + UART_C3_OFFSET;
        regs.poke(s2_addr, s2);
        regs.poke(c3_addr, c3);

        set_uart_line_inversion(&regs, true, RC_UART_BASE);
        proptest::prop_assert_eq!(regs.peek(s2_addr), s2 | UART_S2_RXINV);
        proptest::prop_assert_eq!(regs.peek(c3_addr), c3 | UART_C3_TXINV);

        set_uart_line_inversion(&regs, false, RC_UART_BASE);
        proptest::prop_assert_eq!(regs.peek(s2_addr), s2 & !UART_S2_RXINV);
        proptest::prop_assert_eq!(regs.peek(c3_addr), c3 & !UART_C3_TXINV);
    }
}

#[test]
fn inversion_survives_concurrent_interrupt_writes() {
    const ROUNDS: usize = 1_000;
    let regs = MockRegisterFile::new(RC_UART_BASE);
    let c3 = RC_UART_BASE + UART_C3_OFFSET;

    std::thread::scope(|scope| {
        // "Interrupt": toggles C3 bit 0 under the critical section.
        scope.spawn(|| {
            for _ in 0..ROUNDS {
                with_critical_section(|cs| modify8(&regs, cs, c3, |v| v ^ 0x01));
            }
        });
        for _ in 0..ROUNDS {
            set_uart_line_inversion(&regs, true, RC_UART_BASE);
        }
    });

    // Even number of toggles: bit 0 back to 0; the inversion bit never lost.
    assert_eq!(regs.peek(c3) & 0x01, 0);
    assert_eq!(regs.peek(c3) & UART_C3_TXINV, UART_C3_TXINV);
    assert_eq!(regs.peek(RC_UART_BASE + UART_S2_OFFSET) & UART_S2_RXINV, UART_S2_RXINV);
}

// -- Peripheral rail reset -------------------------------------------------

#[test]
fn peripheral_reset_holds_rail_off_for_duration() {
    let mut board = MockBoard::new();
    let mut delay = board.delay();
    reset_peripheral_rail(&mut board, &mut delay, 50);

    let off = board.position(&BoardEvent::Rail(RailId::Sensors, false)).unwrap();
    let wait = board.position(&BoardEvent::Delay { ns: 50_000_000 }).unwrap();
    let on = board.position(&BoardEvent::Rail(RailId::Sensors, true)).unwrap();
    assert!(off < wait && wait < on);
    assert_eq!(board.rail_enabled(RailId::Sensors), Some(true));
}

// -- board_initialize ------------------------------------------------------

#[test]
fn board_initialize_applies_tables_once_in_order() {
    let mut board = MockBoard::new();
    let _sequencer = board_initialize(&mut board);

    let configured: Vec<GpioInitEntry> = board
        .events()
        .into_iter()
        .filter_map(|e| match e {
            BoardEvent::GpioConfigured(entry) => Some(entry),
            _ => None,
        })
        .collect();

    let expected: Vec<GpioInitEntry> = PWM_RESET_PINS
        .iter()
        .map(|p| GpioInitEntry::new(*p, PinMode::OUTPUT_LOW))
        .chain(LED_INIT_TABLE.iter().copied())
        .chain(GPIO_INIT_TABLE.iter().copied())
        .collect();
    assert_eq!(configured, expected);

    let timers = board.position(&BoardEvent::BoardTimers).unwrap();
    let spektrum = board.position(&BoardEvent::Rail(RailId::Spektrum, true)).unwrap();
    assert!(timers < spektrum);
    assert_eq!(board.rail_enabled(RailId::SdCard), None);
}

// -- Cold boot -------------------------------------------------------------

fn noop_poll(_: Instant) {}

#[test]
fn cold_boot_parks_each_pwm_pin_once_without_delay() {
    let mut board = MockBoard::new();

    // Same sequence as the hardware entry point.
    let sequencer = board_initialize(&mut board);
    board_bootstrap(sequencer, &mut board, BringUpOptions::FMUK66_V3, noop_poll).unwrap();

    for pin in PWM_RESET_PINS {
        let parked = BoardEvent::GpioConfigured(GpioInitEntry::new(*pin, PinMode::OUTPUT_LOW));
        assert_eq!(board.count(&parked), 1, "PWM pin {:?} parked more than once", pin);
        assert_eq!(board.pin_level(*pin), Some(PinState::Low));
    }
    assert_eq!(board.total_delay_ns(), 0);
}

#[test]
fn reset_hook_after_boot_adds_one_park_pass() {
    let mut board = MockBoard::new();
    let sequencer = board_initialize(&mut board);
    board_bootstrap(sequencer, &mut board, BringUpOptions::FMUK66_V3, noop_poll).unwrap();

    let mut delay = board.delay();
    on_reset(0, &mut board, &mut delay);

    for pin in PWM_RESET_PINS {
        let parked = BoardEvent::GpioConfigured(GpioInitEntry::new(*pin, PinMode::OUTPUT_LOW));
        assert_eq!(board.count(&parked), 2);
    }
    assert_eq!(board.total_delay_ns(), u64::from(RESET_SETTLE_MS) * 1_000_000);
}
