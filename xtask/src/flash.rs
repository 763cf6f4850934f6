use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

use crate::step::{cargo, OnFailure};
use crate::{CHIP, TARGET};

fn binary_path(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{TARGET}/{profile}/firmware")
}

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({mode} mode)...").cyan().bold()
    );
    println!();

    let mut args = vec!["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"];
    if release {
        args.push("--release");
    }
    cargo("Firmware build", &args, OnFailure::Abort)?;

    show_binary_size(release);
    println!();

    println!("{}", format!("📡 Flashing to {CHIP}...").cyan().bold());
    println!("   {}", "Connecting to probe...".dimmed());

    let flash_start = Instant::now();
    let flash_output = Command::new("probe-rs")
        .arg("run")
        .arg(binary_path(release))
        .args(["--chip", CHIP, "--probe-index", "0"])
        .output()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !flash_output.status.success() {
        eprintln!("{}", "✗ Flash failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&flash_output.stderr));
        anyhow::bail!(
            "Flash failed - check the probe connection; a secured K66 needs a mass erase first"
        );
    }

    println!(
        "{}",
        format!(
            "✓ Flash successful in {:.2}s",
            flash_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    println!(
        "   {}",
        format!("Use 'probe-rs attach --chip {CHIP}' to view the RTT bring-up trace").dimmed()
    );
    println!();

    Ok(())
}

fn show_binary_size(release: bool) {
    let output = Command::new("rust-size")
        .arg(binary_path(release))
        .arg("-A")
        .output();

    if let Ok(out) = output {
        if out.status.success() {
            println!("{}", "📊 Binary size:".cyan());
            for line in String::from_utf8_lossy(&out.stdout).lines() {
                println!("   {}", line.dimmed());
            }
        }
    }
}
