//! Alignment verifier: checks the offsets an archive already records.
//!
//! Every entry is judged on its own; nothing is rewritten, so there is no
//! bias to carry between entries.

use std::fmt;

use crate::error::AlignError;

use super::entry::EntryKind;
use super::padding::Alignment;
use super::source::EntrySource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Ok,
    /// Compressed data, exempt from alignment
    Compressed,
    /// Stored data this many bytes past a boundary
    Bad(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryVerdict {
    pub name: String,
    pub offset: u64,
    pub status: VerdictStatus,
}

impl EntryVerdict {
    pub fn is_bad(&self) -> bool {
        matches!(self.status, VerdictStatus::Bad(_))
    }
}

impl fmt::Display for EntryVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8} {} ", self.offset, self.name)?;
        match self.status {
            VerdictStatus::Ok => write!(f, "(OK)"),
            VerdictStatus::Compressed => write!(f, "(OK - compressed)"),
            VerdictStatus::Bad(remainder) => write!(f, "(BAD - {remainder})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub alignment: Alignment,
    pub entries: Vec<EntryVerdict>,
}

impl VerifyReport {
    /// True when no stored entry is off a boundary.
    pub fn is_aligned(&self) -> bool {
        !self.entries.iter().any(EntryVerdict::is_bad)
    }

    pub fn bad_entries(&self) -> impl Iterator<Item = &EntryVerdict> {
        self.entries.iter().filter(|v| v.is_bad())
    }

    /// Number of stored entries off a boundary.
    pub fn bad_count(&self) -> usize {
        self.bad_entries().count()
    }
}

/// Judge every entry of `source` against `alignment`.
pub fn verify_entries<S: EntrySource + ?Sized>(
    source: &S,
    alignment: Alignment,
) -> Result<VerifyReport, AlignError> {
    let mut entries = Vec::with_capacity(source.entry_count());

    for index in 0..source.entry_count() {
        let entry = source
            .entry_at(index)
            .ok_or(AlignError::MissingEntry(index))?;

        let status = match entry.kind {
            EntryKind::Compressed => VerdictStatus::Compressed,
            EntryKind::Stored => match alignment.remainder(entry.file_offset) {
                0 => VerdictStatus::Ok,
                remainder => VerdictStatus::Bad(remainder),
            },
        };

        entries.push(EntryVerdict {
            name: entry.name,
            offset: entry.file_offset,
            status,
        });
    }

    Ok(VerifyReport { alignment, entries })
}

/// Check `source` and, when `verbose`, print one line per entry to stdout.
///
/// Returns whether the archive is fully aligned.
pub fn verify<S: EntrySource + ?Sized>(
    source: &S,
    alignment: Alignment,
    verbose: bool,
) -> Result<bool, AlignError> {
    Ok(verify_report(source, alignment, verbose)?.is_aligned())
}

/// [`verify`], keeping the full report.
pub(crate) fn verify_report<S: EntrySource + ?Sized>(
    source: &S,
    alignment: Alignment,
    verbose: bool,
) -> Result<VerifyReport, AlignError> {
    let report = verify_entries(source, alignment)?;

    if verbose {
        for verdict in &report.entries {
            println!("{verdict}");
        }
    }

    Ok(report)
}
