//! Alignment of stored ZIP entries.
//!
//! Two passes run over the same [`EntrySource`] abstraction:
//!
//! - [`align_entries`] copies every entry into an [`EntrySink`], inserting
//!   padding so stored entries start on an [`Alignment`] boundary.
//! - [`verify_entries`] reports which stored entries of an existing archive
//!   are off a boundary.
//!
//! Compressed entries are never padded and always pass verification: they
//! have to be inflated into memory before use, so where they sit on disk
//! does not matter.

mod copier;
mod entry;
mod padding;
mod source;
mod verifier;

#[cfg(test)]
pub(crate) mod fake;

pub use copier::{AlignReport, Bias, CopiedEntry, align_entries, copy_aligned, entry_padding};
pub use entry::{EntryInfo, EntryKind};
pub use padding::{Alignment, ParseAlignmentError, padding_for};
pub use source::{EntrySink, EntrySource};
pub use verifier::{EntryVerdict, VerdictStatus, VerifyReport, verify, verify_entries};
pub(crate) use verifier::verify_report;
