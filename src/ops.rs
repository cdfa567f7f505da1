//! File-level operations: align an archive on disk into a new file, or
//! check one in place.

use std::path::Path;

use tracing::{debug, info};

use crate::align::{self, AlignReport, Alignment, VerifyReport, align_entries};
use crate::error::AlignError;
use crate::zip::{ZipArchive, ZipWriter};

/// Rewrite `input` into `output` with every stored entry aligned.
///
/// `output` must differ from `input`, and must not exist unless `force` is
/// set, in which case it is truncated. On failure `output` may be left
/// partially written.
pub fn align_archive(
    input: &Path,
    output: &Path,
    alignment: Alignment,
    force: bool,
) -> Result<AlignReport, AlignError> {
    if same_file(input, output) {
        return Err(AlignError::SamePath);
    }

    // Don't overwrite existing unless given permission
    if !force && output.exists() {
        return Err(AlignError::OutputExists(output.to_path_buf()));
    }

    let source = ZipArchive::open(input).map_err(|e| AlignError::open(input, e))?;
    let comment = source.comment().map_err(|e| AlignError::open(input, e))?;
    let mut dest = ZipWriter::create(output).map_err(|e| AlignError::open(output, e))?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        %alignment,
        entries = source.len(),
        "aligning archive"
    );

    let report = align_entries(&source, &mut dest, alignment)?;

    dest.set_comment(comment);
    dest.finish().map_err(|e| AlignError::Finish {
        path: output.to_path_buf(),
        source: e.into(),
    })?;

    info!(
        output = %output.display(),
        entries = report.entries.len(),
        padding = report.total_padding,
        "archive aligned"
    );

    Ok(report)
}

/// Check the alignment of the archive at `path`, printing a per-entry
/// report to stdout when `verbose`.
pub fn verify_archive(
    path: &Path,
    alignment: Alignment,
    verbose: bool,
) -> Result<VerifyReport, AlignError> {
    if verbose {
        println!("Verifying alignment of {} ({})...", path.display(), alignment);
    }

    let archive = ZipArchive::open(path).map_err(|e| AlignError::open(path, e))?;
    let report = align::verify_report(&archive, alignment, verbose)?;

    if verbose {
        println!(
            "Verification {}",
            if report.is_aligned() { "successful" } else { "FAILED" }
        );
    }

    debug!(path = %path.display(), bad = report.bad_count(), "archive verified");
    Ok(report)
}

/// Whether every stored entry of the archive at `path` is aligned.
pub fn is_archive_aligned(path: &Path, alignment: Alignment) -> Result<bool, AlignError> {
    Ok(verify_archive(path, alignment, false)?.is_aligned())
}

/// Same path as written, or two names for one existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
