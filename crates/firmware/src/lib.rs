//! fmuk66 Board Bring-Up Firmware
//!
//! One-shot bring-up of the fmuk66 flight-management unit (NXP Kinetis K66):
//! PWM outputs parked, rails switched on in dependency order, host services
//! initialised, the serial DMA poll registered, storage and SPI buses brought
//! up, and the status LED driven from the outcome.
//!
//! # Architecture
//!
//! ```text
//! Host runtime hooks (board_initialize, board_bootstrap, on_reset, ...)
//!         ↓
//! Bring-up orchestrator (bringup)
//!         ↓
//! Power sequencer → bus initializer → poll registrar
//!         ↓
//! Platform traits (platform crate) ← hardware::K66Board | platform::mocks
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the K66 target (cortex-m-rt, defmt-rtt)
//! - `simulator` - Desktop bring-up simulator (mock board, tracing output)
//! - `std` - Enable standard library; library logs go to `tracing`
//! - `defmt` - Library logs go to `defmt`
//!
//! # Examples
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```
//!
//! ## Simulator
//!
//! ```bash
//! RUST_LOG=debug cargo run --example bringup_simulator --features simulator
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]

#[macro_use]
mod logging;

pub mod board;
pub mod board_config;
pub mod bringup;
pub mod bus;
pub mod poll;
pub mod sequencer;

#[cfg(feature = "hardware")]
pub mod exception_handlers;
#[cfg(feature = "hardware")]
pub mod hardware;

// Re-export key types
pub use board::{
    board_bootstrap, board_initialize, on_reset, rail_switches, read_vbus_state,
    reset_peripheral_rail, set_uart_line_inversion, vbus_sense,
};
pub use board_config::BringUpOptions;
pub use bringup::{
    Board, BringUpError, BringUpReport, BringUpStage, BringUpState, Orchestrator, StageOutcome,
};
pub use bus::BusInitializer;
pub use sequencer::{EarlyInit, PowerSequencer, RailsLive, Reset};
