//! Cortex-M exception handlers for the fmuk66 bring-up firmware.
//!
//! - **HardFault**: bus faults on an unclocked peripheral (touching a PORT or
//!   UART register before its SIM clock gate is open is the classic one during
//!   bring-up), illegal instructions, and escalated usage faults.
//!
//! The `#[cortex_m_rt::exception]` attribute requires ARM target intrinsics,
//! so the handler only exists with `--features hardware`.

#![allow(clippy::doc_markdown)] // Exception handler docs use hardware terminology (HardFault, SIM) as plain text

/// HardFault exception handler (hardware target only).
///
/// Reports the stacked PC and the exception frame address over RTT, then
/// halts. A fault during bring-up leaves every rail in whatever state the
/// sequencer had reached; the PWM outputs are already parked low by then.
///
/// # Safety
///
/// Must never return: returning from a HardFault handler is undefined
/// behavior on Cortex-M.
#[cfg(feature = "hardware")]
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::panic!(
        "HardFault at pc={:#x}, frame at {:#x}. \
         Check for an unclocked peripheral access.",
        ef.pc(),
        ef as *const _ as u32
    );
}
