use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, OnFailure};
use crate::TARGET;

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking firmware builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    cargo(
        "Hardware target (K66)",
        &["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"],
        OnFailure::Abort,
    )?;

    cargo(
        "Host simulator",
        &["check", "-p", "firmware", "--features", "simulator", "--examples"],
        OnFailure::Abort,
    )?;

    // The platform crate must stay no_std without its mocks.
    cargo(
        "Platform crate (no_std)",
        &["check", "-p", "platform", "--target", TARGET, "--no-default-features"],
        OnFailure::Abort,
    )?;

    cargo(
        "Clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;

    if cargo("Formatting", &["fmt", "--all", "--check"], OnFailure::Warn)?.is_none() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
