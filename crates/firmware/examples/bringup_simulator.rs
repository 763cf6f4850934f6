//! Bring-up simulator: runs the full fmuk66 bring-up against the mock board
//! and prints the stage trace.
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run -p firmware --example bringup_simulator --features simulator
//! RUST_LOG=debug cargo run -p firmware --example bringup_simulator --features simulator -- --fail-sd
//! ```
//!
//! Flags:
//! - `--fail-sd`   SD driver returns `-EIO`
//! - `--fail-spi`  SPI driver returns `-ENODEV`
//! - `--fail-dma`  DMA pool exhausted (non-fatal)
//! - `--minimal`   only the mandatory stages

#![allow(clippy::print_stdout, clippy::use_debug)]

use std::sync::atomic::{AtomicU32, Ordering};

use embassy_time::Instant;
use firmware::board_config::PERIPHERAL_RESET_DEFAULT_MS;
use firmware::{
    board_initialize, read_vbus_state, reset_peripheral_rail, BringUpOptions, Orchestrator,
};
use platform::mocks::MockBoard;
use platform::{AllocError, ErrorCode};
use tracing_subscriber::EnvFilter;

static POLLS: AtomicU32 = AtomicU32::new(0);

fn serial_dma_poll(_deadline: Instant) {
    POLLS.fetch_add(1, Ordering::Relaxed);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let flag = |name: &str| args.iter().any(|a| a == name);

    let mut board = MockBoard::new();
    if flag("--fail-sd") {
        board.fail_sdcard = Some(ErrorCode::EIO);
    }
    if flag("--fail-spi") {
        board.fail_spi = Some(ErrorCode::ENODEV);
    }
    if flag("--fail-dma") {
        board.fail_dma = Some(AllocError::Exhausted);
    }
    let options = if flag("--minimal") {
        BringUpOptions::MINIMAL
    } else {
        BringUpOptions::FMUK66_V3
    };

    let sequencer = board_initialize(&mut board);
    let report = Orchestrator::new(options, serial_dma_poll).run(sequencer, &mut board);

    println!("{:<24} outcome", "stage");
    for record in report.trace() {
        println!("{:<24} {:?}", record.stage.name(), record.outcome);
    }
    println!("state:  {:?}", report.state());
    println!("status: {}", report.status_code());
    println!("LEDs:   {:?}", board.indicator());

    if report.serial_poll().is_some() {
        for ms in 1..=10 {
            board.scheduler.tick(Instant::from_millis(ms));
        }
        println!("serial DMA polls in 10 ms: {}", POLLS.load(Ordering::Relaxed));
    }

    let mut delay = board.delay();
    reset_peripheral_rail(&mut board, &mut delay, PERIPHERAL_RESET_DEFAULT_MS);
    println!("VBUS state: {}", read_vbus_state(&mut board));
    println!("events recorded: {}", board.events().len());
}
