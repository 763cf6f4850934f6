//! Kinetis K66 implementations of the board traits.
//! Only compiled when targeting real hardware (`--features hardware`).
//!
//! Register addresses follow the K66 Sub-Family Reference Manual (K66P144M180SF5RMV2).
//! Every peripheral touched here has its SIM clock gate opened first; an
//! access to an ungated peripheral is a bus fault.

#![allow(unsafe_code)]

use core::cell::Cell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{DCB, DWT, SYST};
use cortex_m_rt::exception;
use critical_section::Mutex;
use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use platform::register::Mmio;
use platform::{
    AllocError, Callout, ErrorCode, GpioController, GpioInitEntry, GpioRails, GpioVbusSense,
    LedColor, PeriodicPollHandle, PeriodicRegistrar, PeripheralBus, PinId, PinMode, PinState, Port,
    Pull, RailControl, RailId, RegisterAccess, ScheduleError, SharedScheduler, StatusLed,
    SystemServices, VbusSense,
};

use crate::board::{on_reset, rail_switches, vbus_sense};
use crate::board_config::{
    LED_INIT_TABLE, LED_PINS, RAIL_COUNT, RC_UART_BASE, SD_CARD_DETECT_PIN, SPI_CHIP_SELECTS,
};
use crate::sequencer::apply_gpio_table;

/// Core clock out of reset (FEI mode, FLL at 640 × 32.768 kHz).
pub const CORE_CLOCK_HZ: u32 = 20_971_520;

/// SysTick rate driving [`SCHEDULER`].
pub const TICK_HZ: u32 = 1_000;

/// Callout table slots.
pub const SCHEDULER_SLOTS: usize = 4;

/// Process-wide callout table, ticked from SysTick.
pub static SCHEDULER: SharedScheduler<SCHEDULER_SLOTS> = SharedScheduler::new();

static TICKS_MS: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));

/// Idle-line events drained by [`serial_dma_poll`].
pub static RX_IDLE_EVENTS: AtomicU32 = AtomicU32::new(0);

static DMA_POOL_RESERVED: AtomicBool = AtomicBool::new(false);

/// Bytes reserved for DMA-capable buffers.
pub const DMA_POOL_SIZE: usize = 4096;

#[repr(C, align(32))]
struct DmaPool([u8; DMA_POOL_SIZE]);

#[link_section = ".bss.dma_pool"]
static mut DMA_POOL: DmaPool = DmaPool([0; DMA_POOL_SIZE]);

mod regs {
    // SIM clock gates
    pub const SIM_SCGC3: usize = 0x4004_8030;
    pub const SIM_SCGC4: usize = 0x4004_8034;
    pub const SIM_SCGC5: usize = 0x4004_8038;
    pub const SIM_SCGC6: usize = 0x4004_803C;
    pub const SIM_SCGC7: usize = 0x4004_8040;

    pub const SCGC3_SDHC: u32 = 1 << 17;
    pub const SCGC3_FTM3: u32 = 1 << 25;
    pub const SCGC4_UART1: u32 = 1 << 11;
    pub const SCGC5_PORTS: u32 = 0b1_1111 << 9;
    pub const SCGC6_DMAMUX: u32 = 1 << 1;
    pub const SCGC6_SPI0: u32 = 1 << 12;
    pub const SCGC6_SPI1: u32 = 1 << 13;
    pub const SCGC6_FTM0: u32 = 1 << 24;
    pub const SCGC7_DMA: u32 = 1 << 1;

    // PORTx_PCRn
    pub const PORT_BASE: usize = 0x4004_9000;
    pub const PORT_STRIDE: usize = 0x1000;
    pub const PCR_PS: u32 = 1 << 0;
    pub const PCR_PE: u32 = 1 << 1;
    pub const PCR_MUX_SHIFT: u32 = 8;
    pub const PCR_MUX_GPIO: u32 = 1 << PCR_MUX_SHIFT;

    // GPIOx
    pub const GPIO_BASE: usize = 0x400F_F000;
    pub const GPIO_STRIDE: usize = 0x40;
    pub const GPIO_PSOR: usize = 0x04;
    pub const GPIO_PCOR: usize = 0x08;
    pub const GPIO_PDIR: usize = 0x10;
    pub const GPIO_PDDR: usize = 0x14;

    // WDOG (16-bit registers)
    pub const WDOG_STCTRLH: usize = 0x4005_2000;
    pub const WDOG_UNLOCK: usize = 0x4005_200E;
    pub const WDOG_UNLOCK_KEY1: u16 = 0xC520;
    pub const WDOG_UNLOCK_KEY2: u16 = 0xD928;
    pub const WDOG_STCTRLH_DISABLED: u16 = 0x01D2;

    // SPI (DSPI)
    pub const SPI_BASES: [usize; 2] = [0x4002_C000, 0x4002_D000];
    pub const SPI_MCR_MSTR: u32 = 1 << 31;
    pub const SPI_MCR_PCSIS_ALL: u32 = 0x3F << 16;
    pub const SPI_MCR_HALT: u32 = 1 << 0;

    // SDHC
    pub const SDHC_SYSCTL: usize = 0x400B_102C;
    pub const SDHC_SYSCTL_RSTA: u32 = 1 << 24;
    pub const SDHC_RESET_POLLS: u32 = 10_000;

    // UART byte registers
    pub const UART_S1: usize = 0x04;
    pub const UART_D: usize = 0x07;
    pub const UART_S1_IDLE: u8 = 1 << 4;
}

/// # Safety
///
/// `addr` must be a 32-bit peripheral register whose clock gate is open.
unsafe fn read32(addr: usize) -> u32 {
    // SAFETY: upheld by the caller.
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

/// # Safety
///
/// See [`read32`].
unsafe fn write32(addr: usize, value: u32) {
    // SAFETY: upheld by the caller.
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

/// # Safety
///
/// See [`read32`]. Not atomic: callers serialise with interrupts that touch
/// the same register.
unsafe fn modify32(addr: usize, f: impl FnOnce(u32) -> u32) {
    // SAFETY: upheld by the caller.
    unsafe { write32(addr, f(read32(addr))) }
}

fn port_index(port: Port) -> usize {
    port.index()
}

fn pcr_addr(pin: PinId) -> usize {
    regs::PORT_BASE
        .wrapping_add(port_index(pin.port).wrapping_mul(regs::PORT_STRIDE))
        .wrapping_add(usize::from(pin.pin & 0x1F).wrapping_mul(4))
}

fn gpio_addr(port: Port, offset: usize) -> usize {
    regs::GPIO_BASE
        .wrapping_add(port_index(port).wrapping_mul(regs::GPIO_STRIDE))
        .wrapping_add(offset)
}

fn gpio_write(pin: PinId, state: PinState) {
    let offset = match state {
        PinState::High => regs::GPIO_PSOR,
        PinState::Low => regs::GPIO_PCOR,
    };
    // SAFETY: set/clear registers are write-one, no read-modify-write. GPIO
    // is always clocked.
    unsafe { write32(gpio_addr(pin.port, offset), pin.mask()) };
}

fn gpio_read(pin: PinId) -> PinState {
    // SAFETY: read-only data input register.
    let pdir = unsafe { read32(gpio_addr(pin.port, regs::GPIO_PDIR)) };
    PinState::from(pdir & pin.mask() != 0)
}

/// One K66 GPIO line as an `embedded-hal` pin.
///
/// Direction and mux come from the GPIO init table; this only moves the
/// level.
pub struct K66Pin(PinId);

impl K66Pin {
    /// Wrap `pin`.
    pub const fn new(pin: PinId) -> Self {
        Self(pin)
    }
}

impl ErrorType for K66Pin {
    type Error = Infallible;
}

impl OutputPin for K66Pin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.0, PinState::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.0, PinState::High);
        Ok(())
    }
}

impl InputPin for K66Pin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(gpio_read(self.0) == PinState::High)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(gpio_read(self.0) == PinState::Low)
    }
}

/// Disable the COP watchdog, which is armed out of reset.
///
/// Must run within the first few hundred cycles after reset and with
/// interrupts masked: the unlock sequence has a 20 bus-cycle window.
pub fn disable_watchdog() {
    critical_section::with(|_| {
        // SAFETY: WDOG registers are always clocked; 16-bit accesses as the
        // reference manual requires.
        unsafe {
            core::ptr::write_volatile(regs::WDOG_UNLOCK as *mut u16, regs::WDOG_UNLOCK_KEY1);
            core::ptr::write_volatile(regs::WDOG_UNLOCK as *mut u16, regs::WDOG_UNLOCK_KEY2);
            core::ptr::write_volatile(
                regs::WDOG_STCTRLH as *mut u16,
                regs::WDOG_STCTRLH_DISABLED,
            );
        }
    });
}

/// Busy-wait delay on the core clock.
pub struct CycleDelay;

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = u64::from(ns)
            .saturating_mul(u64::from(CORE_CLOCK_HZ))
            .checked_div(1_000_000_000)
            .unwrap_or(0);
        cortex_m::asm::delay(u32::try_from(cycles).unwrap_or(u32::MAX));
    }
}

/// The fmuk66-v3 board.
pub struct K66Board {
    syst: SYST,
    dcb: DCB,
    dwt: DWT,
    rails: GpioRails<K66Pin, RAIL_COUNT>,
    vbus: GpioVbusSense<K66Pin>,
    scheduler: &'static SharedScheduler<SCHEDULER_SLOTS>,
}

impl K66Board {
    /// Take ownership of the core peripherals and open the PORT and RC UART
    /// clock gates.
    ///
    /// # Safety
    ///
    /// At most one `K66Board` may exist: it assumes exclusive ownership of the
    /// PORT, GPIO, SPI and SDHC register blocks.
    pub unsafe fn new(core: cortex_m::Peripherals) -> Self {
        // SAFETY: SIM is always clocked; caller guarantees exclusivity.
        unsafe {
            modify32(regs::SIM_SCGC5, |v| v | regs::SCGC5_PORTS);
            modify32(regs::SIM_SCGC4, |v| v | regs::SCGC4_UART1);
        }
        Self {
            syst: core.SYST,
            dcb: core.DCB,
            dwt: core.DWT,
            rails: rail_switches(K66Pin::new),
            vbus: vbus_sense(K66Pin::new),
            scheduler: &SCHEDULER,
        }
    }

    /// System reset entry: park the PWM outputs, wait for the ESCs unless
    /// `status` is negative (bootloader jump), then reset the core.
    pub fn system_reset(&mut self, status: i32) -> ! {
        on_reset(status, self, &mut CycleDelay);
        cortex_m::peripheral::SCB::sys_reset()
    }
}

impl GpioController for K66Board {
    fn configure(&mut self, entry: &GpioInitEntry) {
        let pin = entry.pin;
        let mask = pin.mask();
        let pddr = gpio_addr(pin.port, regs::GPIO_PDDR);
        // SAFETY: PORT gates opened in `new`; GPIO is always clocked.
        unsafe {
            match entry.mode {
                PinMode::Output { initial } => {
                    self.write(pin, initial);
                    write32(pcr_addr(pin), regs::PCR_MUX_GPIO);
                    modify32(pddr, |v| v | mask);
                }
                PinMode::Input { pull } => {
                    let pull_bits = match pull {
                        Pull::Floating => 0,
                        Pull::Up => regs::PCR_PE | regs::PCR_PS,
                        Pull::Down => regs::PCR_PE,
                    };
                    modify32(pddr, |v| v & !mask);
                    write32(pcr_addr(pin), regs::PCR_MUX_GPIO | pull_bits);
                }
                PinMode::Alternate(alt) => {
                    write32(
                        pcr_addr(pin),
                        u32::from(alt & 0x7).wrapping_shl(regs::PCR_MUX_SHIFT),
                    );
                }
                PinMode::Analog => write32(pcr_addr(pin), 0),
            }
        }
    }

    fn write(&mut self, pin: PinId, state: PinState) {
        gpio_write(pin, state);
    }

    fn read(&mut self, pin: PinId) -> PinState {
        gpio_read(pin)
    }
}

impl RailControl for K66Board {
    fn set_rail(&mut self, rail: RailId, on: bool) {
        self.rails.set_rail(rail, on);
    }
}

impl StatusLed for K66Board {
    fn start(&mut self) {
        apply_gpio_table(self, LED_INIT_TABLE);
    }

    fn set(&mut self, color: LedColor, on: bool) {
        if let Some((_, pin)) = LED_PINS.iter().find(|(c, _)| *c == color) {
            // Active low.
            self.write(*pin, PinState::from(!on));
        }
    }
}

impl PeripheralBus for K66Board {
    fn configure_chip_selects(&mut self) {
        for cs in SPI_CHIP_SELECTS {
            self.configure(&GpioInitEntry::new(*cs, PinMode::OUTPUT_HIGH));
        }
    }

    fn init_sdcard(&mut self) -> Result<(), ErrorCode> {
        // SAFETY: gate opened before the first SDHC access.
        unsafe {
            modify32(regs::SIM_SCGC3, |v| v | regs::SCGC3_SDHC);
            modify32(regs::SDHC_SYSCTL, |v| v | regs::SDHC_SYSCTL_RSTA);
        }
        let mut polls = 0u32;
        // SAFETY: SDHC gate is open.
        while unsafe { read32(regs::SDHC_SYSCTL) } & regs::SDHC_SYSCTL_RSTA != 0 {
            polls = polls.saturating_add(1);
            if polls >= regs::SDHC_RESET_POLLS {
                return Err(ErrorCode::ETIMEDOUT);
            }
        }
        if self.read(SD_CARD_DETECT_PIN) == PinState::High {
            log_warn!("no SD card inserted");
        }
        Ok(())
    }

    fn init_spi_bus(&mut self) -> Result<(), ErrorCode> {
        // SAFETY: gates opened before the first DSPI access.
        unsafe { modify32(regs::SIM_SCGC6, |v| v | regs::SCGC6_SPI0 | regs::SCGC6_SPI1) };
        for base in regs::SPI_BASES {
            let mcr = regs::SPI_MCR_MSTR | regs::SPI_MCR_PCSIS_ALL | regs::SPI_MCR_HALT;
            // SAFETY: DSPI gate is open; MCR is at offset 0.
            let readback = unsafe {
                write32(base, mcr);
                read32(base)
            };
            if readback & regs::SPI_MCR_MSTR == 0 {
                return Err(ErrorCode::ENODEV);
            }
        }
        Ok(())
    }
}

impl SystemServices for K66Board {
    fn init_board_timers(&mut self) {
        // SAFETY: SIM is always clocked.
        unsafe {
            modify32(regs::SIM_SCGC6, |v| v | regs::SCGC6_FTM0);
            modify32(regs::SIM_SCGC3, |v| v | regs::SCGC3_FTM3);
        }
    }

    fn init_language_runtime(&mut self) {
        // cortex-m-rt has already initialised .data and .bss; this image has
        // no constructor table.
    }

    fn init_param_store(&mut self) {
        log_info!("parameters: compiled-in defaults");
    }

    fn init_timebase(&mut self) {
        let reload = CORE_CLOCK_HZ.checked_div(TICK_HZ).unwrap_or(1).saturating_sub(1);
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.set_reload(reload);
        self.syst.clear_current();
        self.syst.enable_interrupt();
        self.syst.enable_counter();
    }

    fn init_dma_allocator(&mut self) -> Result<(), AllocError> {
        // SAFETY: SIM is always clocked.
        unsafe {
            modify32(regs::SIM_SCGC6, |v| v | regs::SCGC6_DMAMUX);
            modify32(regs::SIM_SCGC7, |v| v | regs::SCGC7_DMA);
        }
        if DMA_POOL_RESERVED.swap(true, Ordering::AcqRel) {
            return Err(AllocError::Exhausted);
        }
        // SAFETY: address-of only; the pool is handed out once, guarded above.
        let pool = unsafe { core::ptr::addr_of!(DMA_POOL) } as usize;
        log_debug!("DMA pool at {}, {} bytes", pool, DMA_POOL_SIZE);
        Ok(())
    }

    fn init_cpu_load(&mut self) {
        self.dcb.enable_trace();
        self.dwt.enable_cycle_counter();
    }

    fn init_automount(&mut self) {
        log_info!("automount: no filesystem in this image");
    }
}

impl PeriodicRegistrar for K66Board {
    fn call_every(
        &mut self,
        delay: Duration,
        interval: Duration,
        callout: Callout,
    ) -> Result<PeriodicPollHandle, ScheduleError> {
        self.scheduler.call_every(delay, interval, callout)
    }
}

impl VbusSense for K66Board {
    fn vbus_present(&mut self) -> bool {
        self.vbus.vbus_present()
    }
}

/// Serial DMA poll: drain an idle RC UART so short frames are not left
/// sitting in the receive path until the next half-buffer interrupt.
///
/// Runs from SysTick every millisecond. Two byte accesses, never blocks.
pub fn serial_dma_poll(_deadline: Instant) {
    // SAFETY: the RC UART gate is opened in `K66Board::new`, before the poll
    // can be registered; S1 and D are byte registers.
    let mmio = unsafe { Mmio::new() };
    let s1 = mmio.read8(RC_UART_BASE.wrapping_add(regs::UART_S1));
    if s1 & regs::UART_S1_IDLE != 0 {
        // S1 read followed by D read clears IDLE.
        let _ = mmio.read8(RC_UART_BASE.wrapping_add(regs::UART_D));
        RX_IDLE_EVENTS.fetch_add(1, Ordering::Relaxed);
    }
}

#[exception]
fn SysTick() {
    let now_ms = critical_section::with(|cs| {
        let ticks = TICKS_MS.borrow(cs);
        let next = ticks.get().wrapping_add(1);
        ticks.set(next);
        next
    });
    SCHEDULER.tick(Instant::from_millis(now_ms));
}
