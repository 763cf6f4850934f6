//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests.
//!
//! [`MockBoard`] implements every collaborator trait the bring-up sequence
//! needs and appends each call to a shared [`Journal`], so tests can assert
//! on ordering across rails, buses, services and the LED. [`MockDelay`] writes
//! into the same journal.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::missing_panics_doc)] // RefCell borrows in single-threaded mocks

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::vec::Vec;

use embassy_time::Duration;

use crate::error::{AllocError, ErrorCode};
use crate::gpio::{GpioController, GpioInitEntry, PinId, PinMode, PinState};
use crate::led::{IndicatorState, LedColor, StatusLed};
use crate::peripheral::PeripheralBus;
use crate::power::{RailControl, RailId, VbusSense};
use crate::register::RegisterAccess;
use crate::services::SystemServices;
use crate::timer::{Callout, PeriodicPollHandle, PeriodicRegistrar, PeriodicScheduler, ScheduleError};

// ── Registers ────────────────────────────────────────────────────────────────

/// Size of the register window a [`MockRegisterFile`] models.
pub const MOCK_REGISTER_WINDOW: usize = 256;

/// A window of byte registers starting at `base`.
///
/// Each cell is an atomic byte so the file can be shared with a second
/// thread standing in for interrupt context. Individual loads and stores are
/// atomic; read-modify-write sequences are not, exactly like the hardware.
pub struct MockRegisterFile {
    base: usize,
    cells: [AtomicU8; MOCK_REGISTER_WINDOW],
    writes: AtomicUsize,
}

impl MockRegisterFile {
    /// All registers zero.
    pub fn new(base: usize) -> Self {
        Self {
            base,
            cells: core::array::from_fn(|_| AtomicU8::new(0)),
            writes: AtomicUsize::new(0),
        }
    }

    fn cell(&self, addr: usize) -> Option<&AtomicU8> {
        addr.checked_sub(self.base).and_then(|i| self.cells.get(i))
    }

    /// Read without going through [`RegisterAccess`].
    pub fn peek(&self, addr: usize) -> u8 {
        self.cell(addr).map_or(0, |c| c.load(Ordering::SeqCst))
    }

    /// Preload a register without counting a write.
    pub fn poke(&self, addr: usize, value: u8) {
        if let Some(cell) = self.cell(addr) {
            cell.store(value, Ordering::SeqCst);
        }
    }

    /// Number of `write8` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RegisterAccess for MockRegisterFile {
    fn read8(&self, addr: usize) -> u8 {
        self.peek(addr)
    }

    fn write8(&self, addr: usize, value: u8) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.poke(addr, value);
    }
}

// ── Pins ─────────────────────────────────────────────────────────────────────

/// Single GPIO usable as an input or an output.
#[derive(Debug, Default)]
pub struct MockPin {
    high: bool,
    writes: usize,
}

impl MockPin {
    /// Pin at the given level.
    pub fn new(high: bool) -> Self {
        Self { high, writes: 0 }
    }

    /// Current level.
    pub fn level(&self) -> bool {
        self.high
    }

    /// Number of `set_high`/`set_low` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }
}

impl embedded_hal::digital::InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

// ── Board ────────────────────────────────────────────────────────────────────

/// One observable action on the mock board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    /// `GpioController::configure`
    GpioConfigured(GpioInitEntry),
    /// `GpioController::write`
    GpioWritten(PinId, PinState),
    /// `RailControl::set_rail`
    Rail(RailId, bool),
    /// `PeripheralBus::configure_chip_selects`
    ChipSelectsConfigured,
    /// `PeripheralBus::init_sdcard`
    SdCardInit,
    /// `PeripheralBus::init_spi_bus`
    SpiBusInit,
    /// `SystemServices::init_board_timers`
    BoardTimers,
    /// `SystemServices::init_language_runtime`
    LanguageRuntime,
    /// `SystemServices::init_param_store`
    ParamStore,
    /// `SystemServices::init_timebase`
    Timebase,
    /// `SystemServices::init_dma_allocator`
    DmaAllocator,
    /// `SystemServices::init_cpu_load`
    CpuLoad,
    /// `SystemServices::init_automount`
    Automount,
    /// `StatusLed::start`
    LedStarted,
    /// `StatusLed::set`
    Led(LedColor, bool),
    /// `PeriodicRegistrar::call_every`
    PeriodicRegistered {
        /// First expiry
        delay: Duration,
        /// Period
        interval: Duration,
    },
    /// `DelayNs::delay_ns` on a [`MockDelay`]
    Delay {
        /// Requested delay
        ns: u32,
    },
}

/// Event log shared between a [`MockBoard`] and its [`MockDelay`]s.
pub type Journal = Rc<RefCell<Vec<BoardEvent>>>;

/// Every collaborator of the bring-up sequence, recording into a journal.
pub struct MockBoard {
    journal: Journal,
    pins: Vec<(PinId, PinState)>,
    indicator: IndicatorState,
    vbus: bool,
    /// Callout table backing `PeriodicRegistrar`.
    pub scheduler: PeriodicScheduler<4>,
    /// Injected `init_sdcard` failure
    pub fail_sdcard: Option<ErrorCode>,
    /// Injected `init_spi_bus` failure
    pub fail_spi: Option<ErrorCode>,
    /// Injected `init_dma_allocator` failure
    pub fail_dma: Option<AllocError>,
    /// Injected `call_every` failure
    pub fail_registration: Option<ScheduleError>,
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBoard {
    /// Healthy board: every stage succeeds, VBUS absent.
    pub fn new() -> Self {
        Self {
            journal: Rc::new(RefCell::new(Vec::new())),
            pins: Vec::new(),
            indicator: IndicatorState::OFF,
            vbus: false,
            scheduler: PeriodicScheduler::new(),
            fail_sdcard: None,
            fail_spi: None,
            fail_dma: None,
            fail_registration: None,
        }
    }

    fn record(&self, event: BoardEvent) {
        self.journal.borrow_mut().push(event);
    }

    /// A delay provider writing into this board's journal.
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            journal: Rc::clone(&self.journal),
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<BoardEvent> {
        self.journal.borrow().clone()
    }

    /// Forget recorded events (state is kept).
    pub fn clear_events(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Position of the first occurrence of `event`.
    pub fn position(&self, event: &BoardEvent) -> Option<usize> {
        self.journal.borrow().iter().position(|e| e == event)
    }

    /// How many times `event` was recorded.
    pub fn count(&self, event: &BoardEvent) -> usize {
        self.journal.borrow().iter().filter(|e| *e == event).count()
    }

    /// Total delay requested, in nanoseconds.
    pub fn total_delay_ns(&self) -> u64 {
        self.journal
            .borrow()
            .iter()
            .map(|e| match e {
                BoardEvent::Delay { ns } => u64::from(*ns),
                _ => 0,
            })
            .sum()
    }

    /// Current LED channels.
    pub fn indicator(&self) -> IndicatorState {
        self.indicator
    }

    /// Last level written to `pin`, if any.
    pub fn pin_level(&self, pin: PinId) -> Option<PinState> {
        self.pins
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, s)| *s)
    }

    /// Last rail state recorded for `rail`.
    pub fn rail_enabled(&self, rail: RailId) -> Option<bool> {
        self.journal.borrow().iter().rev().find_map(|e| match e {
            BoardEvent::Rail(r, on) if *r == rail => Some(*on),
            _ => None,
        })
    }

    /// Set the simulated VBUS presence signal.
    pub fn set_vbus(&mut self, present: bool) {
        self.vbus = present;
    }
}

impl GpioController for MockBoard {
    fn configure(&mut self, entry: &GpioInitEntry) {
        if let PinMode::Output { initial } = entry.mode {
            self.pins.push((entry.pin, initial));
        }
        self.record(BoardEvent::GpioConfigured(*entry));
    }

    fn write(&mut self, pin: PinId, state: PinState) {
        self.pins.push((pin, state));
        self.record(BoardEvent::GpioWritten(pin, state));
    }

    fn read(&mut self, pin: PinId) -> PinState {
        self.pin_level(pin).unwrap_or(PinState::Low)
    }
}

impl RailControl for MockBoard {
    fn set_rail(&mut self, rail: RailId, on: bool) {
        self.record(BoardEvent::Rail(rail, on));
    }
}

impl PeripheralBus for MockBoard {
    fn configure_chip_selects(&mut self) {
        self.record(BoardEvent::ChipSelectsConfigured);
    }

    fn init_sdcard(&mut self) -> Result<(), ErrorCode> {
        self.record(BoardEvent::SdCardInit);
        self.fail_sdcard.map_or(Ok(()), Err)
    }

    fn init_spi_bus(&mut self) -> Result<(), ErrorCode> {
        self.record(BoardEvent::SpiBusInit);
        self.fail_spi.map_or(Ok(()), Err)
    }
}

impl SystemServices for MockBoard {
    fn init_board_timers(&mut self) {
        self.record(BoardEvent::BoardTimers);
    }

    fn init_language_runtime(&mut self) {
        self.record(BoardEvent::LanguageRuntime);
    }

    fn init_param_store(&mut self) {
        self.record(BoardEvent::ParamStore);
    }

    fn init_timebase(&mut self) {
        self.record(BoardEvent::Timebase);
    }

    fn init_dma_allocator(&mut self) -> Result<(), AllocError> {
        self.record(BoardEvent::DmaAllocator);
        self.fail_dma.map_or(Ok(()), Err)
    }

    fn init_cpu_load(&mut self) {
        self.record(BoardEvent::CpuLoad);
    }

    fn init_automount(&mut self) {
        self.record(BoardEvent::Automount);
    }
}

impl StatusLed for MockBoard {
    fn start(&mut self) {
        self.record(BoardEvent::LedStarted);
    }

    fn set(&mut self, color: LedColor, on: bool) {
        self.indicator.set(color, on);
        self.record(BoardEvent::Led(color, on));
    }
}

impl PeriodicRegistrar for MockBoard {
    fn call_every(
        &mut self,
        delay: Duration,
        interval: Duration,
        callout: Callout,
    ) -> Result<PeriodicPollHandle, ScheduleError> {
        self.record(BoardEvent::PeriodicRegistered { delay, interval });
        if let Some(err) = self.fail_registration {
            return Err(err);
        }
        self.scheduler.call_every(delay, interval, callout)
    }
}

impl VbusSense for MockBoard {
    fn vbus_present(&mut self) -> bool {
        self.vbus
    }
}

/// Delay provider that records requests instead of sleeping.
pub struct MockDelay {
    journal: Journal,
}

impl MockDelay {
    /// Standalone delay with its own journal.
    pub fn new() -> Self {
        Self {
            journal: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Total delay requested, in nanoseconds.
    pub fn total_ns(&self) -> u64 {
        self.journal
            .borrow()
            .iter()
            .map(|e| match e {
                BoardEvent::Delay { ns } => u64::from(*ns),
                _ => 0,
            })
            .sum()
    }
}

impl Default for MockDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.journal.borrow_mut().push(BoardEvent::Delay { ns });
    }
}
