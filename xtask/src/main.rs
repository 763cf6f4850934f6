// Host tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod flash;
mod sim;
mod step;
mod test;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Firmware target triple for the Cortex-M4F core.
pub const TARGET: &str = "thumbv7em-none-eabihf";

/// probe-rs chip name.
pub const CHIP: &str = "MK66FN2M0VLQ18";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "fmuk66 bring-up development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flash firmware to the FMUK66 via probe-rs
    Flash {
        /// Build and flash release version
        #[arg(short, long)]
        release: bool,
    },
    /// Run the bring-up sequence against the mock board
    Sim {
        /// Inject an SD card driver failure
        #[arg(long)]
        fail_sd: bool,
        /// Inject an SPI bus failure
        #[arg(long)]
        fail_spi: bool,
        /// Exhaust the DMA pool
        #[arg(long)]
        fail_dma: bool,
        /// Only the mandatory stages
        #[arg(long)]
        minimal: bool,
        /// RUST_LOG filter passed to the simulator
        #[arg(long, default_value = "debug")]
        log: String,
    },
    /// Check firmware builds for both hardware and host targets
    Check,
    /// Run all tests (unit and integration)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Flash { release } => flash::run(release),
        Commands::Sim {
            fail_sd,
            fail_spi,
            fail_dma,
            minimal,
            log,
        } => sim::run(
            &sim::Faults {
                fail_sd,
                fail_spi,
                fail_dma,
                minimal,
            },
            &log,
        ),
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
    }
}
