use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;

/// Failure injection switches forwarded to the simulator example.
pub struct Faults {
    pub fail_sd: bool,
    pub fail_spi: bool,
    pub fail_dma: bool,
    pub minimal: bool,
}

impl Faults {
    fn args(&self) -> Vec<&'static str> {
        [
            (self.fail_sd, "--fail-sd"),
            (self.fail_spi, "--fail-spi"),
            (self.fail_dma, "--fail-dma"),
            (self.minimal, "--minimal"),
        ]
        .into_iter()
        .filter_map(|(on, flag)| on.then_some(flag))
        .collect()
    }
}

pub fn run(faults: &Faults, log: &str) -> Result<()> {
    println!();
    println!("{}", "🛠  Running bring-up simulator...".cyan().bold());
    println!();

    let status = Command::new("cargo")
        .args([
            "run",
            "-p",
            "firmware",
            "--example",
            "bringup_simulator",
            "--features",
            "simulator",
            "--",
        ])
        .args(faults.args())
        .env("RUST_LOG", log)
        .status()
        .context("Failed to run the bring-up simulator")?;

    if !status.success() {
        anyhow::bail!("Simulator exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Faults;

    #[test]
    fn only_enabled_faults_are_forwarded() {
        let faults = Faults {
            fail_sd: true,
            fail_spi: false,
            fail_dma: true,
            minimal: false,
        };
        assert_eq!(faults.args(), vec!["--fail-sd", "--fail-dma"]);
    }
}
