use std::path::PathBuf;

use clap::Parser;

use crate::align::Alignment;

#[derive(Parser, Debug)]
#[command(name = "zipalign")]
#[command(version)]
#[command(about = "Align stored ZIP entries to a byte boundary", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipalign 4 app.apk app-aligned.apk       align stored entries to 4 bytes\n  \
  zipalign -f -v 4096 in.zip out.zip       overwrite out.zip and show the result\n  \
  zipalign -c -v 4 app-aligned.apk        check alignment only")]
pub struct Cli {
    /// Alignment in bytes, e.g. 4
    #[arg(value_name = "ALIGN")]
    pub alignment: Alignment,

    /// Input ZIP archive
    #[arg(value_name = "INFILE")]
    pub input: PathBuf,

    /// Output ZIP archive
    #[arg(
        value_name = "OUTFILE",
        required_unless_present = "check",
        conflicts_with = "check"
    )]
    pub output: Option<PathBuf>,

    /// Check alignment only, don't write anything
    #[arg(short = 'c')]
    pub check: bool,

    /// Overwrite existing outfile
    #[arg(short = 'f')]
    pub force: bool,

    /// Verbose output
    #[arg(short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "zipalign=debug" } else { "warn" }
    }
}
