//! fmuk66 Bring-Up Firmware - Main Entry Point
//!
//! Hardware-only entry point for the Kinetis K66 (MK66FN2M0VLQ18).

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use firmware::hardware::{self, K66Board};
use firmware::{board_bootstrap, board_initialize, read_vbus_state, BringUpOptions};

// Logging transport and panic handler
use defmt_rtt as _;
use panic_probe as _;

/// Kinetis flash configuration field (0x400..0x410).
///
/// Backdoor key all ones, no protection, FSEC = 0xFE (unsecured, mass erase
/// enabled), FOPT and FEPROT/FDPROT left erased.
#[link_section = ".flash_config"]
#[used]
static FLASH_CONFIG: [u8; 16] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // backdoor key
    0xFF, 0xFF, 0xFF, 0xFF, // FPROT3..0
    0xFE, // FSEC
    0xFF, // FOPT
    0xFF, // FEPROT
    0xFF, // FDPROT
];

#[entry]
fn main() -> ! {
    // Step 0: the COP watchdog is armed out of reset and must be disabled
    // before anything slow runs.
    hardware::disable_watchdog();

    defmt::info!("fmuk66 bring-up v{=str}", env!("CARGO_PKG_VERSION"));

    let Some(core) = cortex_m::Peripherals::take() else {
        defmt::panic!("core peripherals already taken");
    };
    // SAFETY: the only K66Board in the image, created before any interrupt
    // that touches its registers is enabled.
    let mut board = unsafe { K66Board::new(core) };

    // Step 1: early board init, PWM outputs parked first.
    let sequencer = board_initialize(&mut board);

    // Step 2: application bring-up.
    match board_bootstrap(
        sequencer,
        &mut board,
        BringUpOptions::FMUK66_V3,
        hardware::serial_dma_poll,
    ) {
        Ok(()) => defmt::info!("board ready"),
        Err(code) => defmt::error!("bring-up failed: errno {=i32}", code.get()),
    }

    defmt::info!(
        "USB VBUS {=str}",
        if read_vbus_state(&mut board) == 0 {
            "present"
        } else {
            "absent"
        }
    );

    // The serial DMA poll keeps running from SysTick.
    loop {
        cortex_m::asm::wfi();
    }
}
