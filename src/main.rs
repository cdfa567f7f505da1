//! Main entry point for the zipalign CLI application.
//!
//! Aligns a ZIP archive into a new file, or with `-c` only checks whether
//! it is already aligned. Exits with 0 on success, 1 on failure or when the
//! archive is not aligned.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zipalign::{Cli, align_archive, verify_archive};

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("zipalign: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run the requested mode.
///
/// # Returns
///
/// `Ok(false)` when the archive checked is not aligned.
fn run(cli: &Cli) -> Result<bool> {
    if cli.check {
        return Ok(verify_archive(&cli.input, cli.alignment, cli.verbose)?.is_aligned());
    }

    // clap guarantees an output outside check mode
    let Some(output) = cli.output.as_deref() else {
        anyhow::bail!("missing output file");
    };

    let report = align_archive(&cli.input, output, cli.alignment, cli.force).with_context(|| {
        format!(
            "failed rewriting '{}' to '{}'",
            cli.input.display(),
            output.display()
        )
    })?;

    if report.misaligned().next().is_some() || cli.verbose {
        return Ok(verify_archive(output, cli.alignment, cli.verbose)?.is_aligned());
    }

    Ok(true)
}
