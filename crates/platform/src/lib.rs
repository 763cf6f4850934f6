//! Board support abstractions for the fmuk66 flight controller bring-up.
//!
//! This crate provides the trait seams and pure logic that the bring-up
//! orchestrator in the `firmware` crate drives, so that the whole boot
//! sequence can be exercised on the host without a board attached.
//!
//! # Architecture Layers
//!
//! ```text
//! Host runtime (RTOS board-support hooks)
//!         ↓
//! Bring-up orchestrator (firmware crate)
//!         ↓
//! Board support abstractions (this crate - traits + register layer)
//!         ↓
//! Kinetis K66 registers (firmware::hardware)
//! ```
//!
//! # Modules
//!
//! ## Leaf primitives
//! - [`register`] - Register access layer and critical-section guard
//! - [`timer`] - Periodic callout table driven by the high-resolution tick
//! - [`error`] - Negated errno codes and allocation failures
//!
//! ## Collaborator interfaces
//! - [`gpio`] - Pin identifiers and boot-time pin tables
//! - [`power`] - Switched power rails and VBUS sensing
//! - [`peripheral`] - SPI and SD/MMC controller bring-up
//! - [`led`] - Tri-color status indicator
//! - [`services`] - System services invoked (not implemented) by bring-up
//!
//! # Features
//!
//! - `std`: host support, enables [`mocks`]
//! - `defmt`: `defmt::Format` derives for hardware logging

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware support crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod gpio;
pub mod led;
pub mod peripheral;
pub mod power;
pub mod register;
pub mod services;
pub mod timer;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export error types
pub use error::{AllocError, ErrorCode};

// Re-export register access types
pub use register::{with_critical_section, CriticalSectionGuard, RegisterAccess, UartRegisters};

// Re-export GPIO types
pub use gpio::{GpioController, GpioInitEntry, PinId, PinMode, PinState, Port, Pull};

// Re-export power types
pub use power::{GpioRails, GpioVbusSense, RailControl, RailId, VbusSense};

// Re-export collaborator traits
pub use led::{IndicatorState, LedColor, StatusLed};
pub use peripheral::PeripheralBus;
pub use services::SystemServices;

// Re-export timer types
pub use timer::{
    Callout, PeriodicPollHandle, PeriodicRegistrar, PeriodicScheduler, ScheduleError,
    SharedScheduler,
};
