use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, OnFailure};

/// Host integration test binaries, one per file under `crates/*/tests`.
const INTEGRATION_TESTS: &[(&str, &str)] = &[
    ("platform", "register_access"),
    ("platform", "periodic_scheduler"),
    ("firmware", "integration_bringup"),
    ("firmware", "integration_board_entry"),
    ("firmware", "memory_layout"),
];

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !integration_only {
        if let Some(output) = cargo("Unit tests", &["test", "--lib", "--workspace"], OnFailure::Abort)? {
            println!("    {}", extract_test_summary(&String::from_utf8_lossy(&output.stdout)).dimmed());
        }
    }

    if !unit_only {
        for (package, test) in INTEGRATION_TESTS {
            let label = format!("{package}::{test}");
            cargo(&label, &["test", "-p", package, "--test", test], OnFailure::Abort)?;
        }
    }

    cargo("Doc tests", &["test", "--doc", "--workspace"], OnFailure::Warn)?;

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

fn extract_test_summary(output: &str) -> String {
    // "test result: ok. 5 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out"
    output
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .map(str::trim)
        .last()
        .map_or_else(|| "(summary not available)".to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::extract_test_summary;

    #[test]
    fn summary_is_taken_from_last_result_line() {
        let out = "running 2 tests\ntest result: ok. 2 passed; 0 failed\n\
                   running 1 test\ntest result: ok. 1 passed; 0 failed\n";
        assert_eq!(extract_test_summary(out), "ok. 1 passed; 0 failed");
    }

    #[test]
    fn missing_summary() {
        assert_eq!(extract_test_summary("nothing here"), "(summary not available)");
    }
}
