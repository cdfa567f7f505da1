//! Aligning copier: rewrites every entry of a source archive into a
//! destination, padding stored entries so their data starts on a boundary.
//!
//! Padding for a stored entry is computed from where the destination says
//! its data will start. A destination that cannot say ahead of time gets
//! the source offset shifted by the drift measured on the entries copied
//! before it. Gaps between entries in the source, or headers that change
//! size on the way, only stay aligned on the first path.

use tracing::{debug, warn};

use crate::error::AlignError;

use super::entry::{EntryInfo, EntryKind};
use super::padding::Alignment;
use super::source::{EntrySink, EntrySource};

/// Running offset correction for one copy pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Bias {
    /// Total padding inserted so far. Never decreases.
    inserted: u64,
    /// Measured distance between destination and source offsets of the
    /// last copied entry.
    drift: i64,
}

impl Bias {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn drift(&self) -> i64 {
        self.drift
    }

    /// Where data found at `source_offset` is expected to land.
    pub fn project(&self, source_offset: u64) -> u64 {
        source_offset.saturating_add_signed(self.drift)
    }

    /// Account for a finished copy.
    pub fn record(&mut self, padding: u64, source_offset: u64, landed_offset: u64) {
        self.inserted += padding;
        self.drift = landed_offset.wrapping_sub(source_offset) as i64;
    }
}

/// Outcome of copying one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedEntry {
    pub name: String,
    pub kind: EntryKind,
    pub source_offset: u64,
    pub padding: u64,
    pub landed_offset: u64,
    /// Stored entry whose data still ended up off a boundary
    pub misaligned: bool,
}

/// Summary of a full copy pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AlignReport {
    pub entries: Vec<CopiedEntry>,
    pub total_padding: u64,
}

impl AlignReport {
    pub fn misaligned(&self) -> impl Iterator<Item = &CopiedEntry> {
        self.entries.iter().filter(|e| e.misaligned)
    }
}

/// Padding to insert in front of `entry` when its data would otherwise
/// start at `data_offset` in the destination.
pub fn entry_padding(entry: &EntryInfo, alignment: Alignment, data_offset: u64) -> u64 {
    match entry.kind {
        // Consumers inflate compressed data into memory anyway
        EntryKind::Compressed => 0,
        EntryKind::Stored => alignment.padding_for(data_offset),
    }
}

fn copy_error(entry: &EntryInfo, err: anyhow::Error) -> AlignError {
    AlignError::Copy {
        index: entry.index,
        name: entry.name.clone(),
        source: err.into(),
    }
}

/// Copy a single entry with whatever padding it needs and fold the result
/// into `bias`.
pub fn copy_aligned<S, D>(
    source: &S,
    dest: &mut D,
    entry: &EntryInfo,
    alignment: Alignment,
    bias: &mut Bias,
) -> Result<CopiedEntry, AlignError>
where
    S: EntrySource + ?Sized,
    D: EntrySink<S> + ?Sized,
{
    let target = dest
        .next_data_offset(source, entry)
        .map_err(|e| copy_error(entry, e))?
        .unwrap_or_else(|| bias.project(entry.file_offset));
    let padding = entry_padding(entry, alignment, target);

    debug!(
        name = %entry.name,
        offset = entry.file_offset,
        target,
        drift = bias.drift(),
        len = entry.uncompressed_len,
        padding,
        compressed = entry.is_compressed(),
        "copying entry"
    );

    let new_entry = dest
        .copy_entry(source, entry, padding)
        .map_err(|e| copy_error(entry, e))?;

    let expected = target + padding;
    if new_entry.file_offset != expected {
        warn!(
            name = %entry.name,
            expected,
            landed = new_entry.file_offset,
            "destination placed entry data away from the expected offset"
        );
    }
    bias.record(padding, entry.file_offset, new_entry.file_offset);

    let misaligned = entry.kind == EntryKind::Stored && !alignment.is_aligned(new_entry.file_offset);
    if misaligned {
        warn!(
            name = %entry.name,
            offset = new_entry.file_offset,
            remainder = alignment.remainder(new_entry.file_offset),
            "stored entry landed off alignment"
        );
    }

    debug!(name = %new_entry.name, offset = new_entry.file_offset, padding, "added entry");

    Ok(CopiedEntry {
        name: entry.name.clone(),
        kind: entry.kind,
        source_offset: entry.file_offset,
        padding,
        landed_offset: new_entry.file_offset,
        misaligned,
    })
}

/// Copy every entry of `source` into `dest`, in order, padding stored
/// entries onto `alignment` boundaries.
///
/// Stops at the first entry that cannot be retrieved or copied; `dest` is
/// then left partially written and should be discarded.
pub fn align_entries<S, D>(
    source: &S,
    dest: &mut D,
    alignment: Alignment,
) -> Result<AlignReport, AlignError>
where
    S: EntrySource + ?Sized,
    D: EntrySink<S> + ?Sized,
{
    let mut bias = Bias::new();
    let mut report = AlignReport::default();

    for index in 0..source.entry_count() {
        let entry = source
            .entry_at(index)
            .ok_or(AlignError::MissingEntry(index))?;
        report
            .entries
            .push(copy_aligned(source, dest, &entry, alignment, &mut bias)?);
    }

    report.total_padding = bias.inserted();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::fake::{FakeArchive, FakeWriter};
    use proptest::prelude::*;

    fn align(v: u64) -> Alignment {
        Alignment::new(v).unwrap()
    }

    #[test]
    fn single_stored_entry_is_padded() {
        let source = FakeArchive::new().stored("a", 10);
        let mut dest = FakeWriter::new();

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        assert_eq!(report.entries[0].padding, 2);
        assert_eq!(report.entries[0].landed_offset, 12);
        assert_eq!(report.total_padding, 2);
        assert_eq!(dest.offsets(), vec![12]);
    }

    #[test]
    fn single_compressed_entry_is_not_padded() {
        let source = FakeArchive::new().compressed("a", 10);
        let mut dest = FakeWriter::new();

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        assert_eq!(report.entries[0].padding, 0);
        assert_eq!(dest.offsets(), vec![10]);
    }

    #[test]
    fn bias_carries_between_entries() {
        let source = FakeArchive::new()
            .stored("a", 0)
            .stored("b", 7)
            .stored("c", 15);
        let mut dest = FakeWriter::new();

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        let paddings: Vec<_> = report.entries.iter().map(|e| e.padding).collect();
        assert_eq!(paddings, vec![0, 1, 0]);
        assert_eq!(dest.offsets(), vec![0, 8, 16]);
        assert_eq!(report.total_padding, 1);
        assert_eq!(report.misaligned().count(), 0);
    }

    #[test]
    fn compressed_entries_shift_but_never_pad() {
        let source = FakeArchive::new()
            .stored("a", 1)
            .compressed("b", 30)
            .stored("c", 61);
        let mut dest = FakeWriter::new();

        let report = align_entries(&source, &mut dest, align(8)).unwrap();
        let paddings: Vec<_> = report.entries.iter().map(|e| e.padding).collect();
        // a: 1 -> 8 (+7), b: 30 -> 37, c: 61 + 7 = 68 -> 72 (+4)
        assert_eq!(paddings, vec![7, 0, 4]);
        assert_eq!(dest.offsets(), vec![8, 37, 72]);
    }

    #[test]
    fn empty_archive_succeeds() {
        let source = FakeArchive::new();
        let mut dest = FakeWriter::new();

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        assert!(report.entries.is_empty());
        assert_eq!(report.total_padding, 0);
        assert!(dest.offsets().is_empty());
    }

    #[test]
    fn already_aligned_archive_needs_no_padding() {
        let source = FakeArchive::new()
            .stored("a", 4)
            .compressed("b", 9)
            .stored("c", 64);
        let mut dest = FakeWriter::new();

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        assert_eq!(report.total_padding, 0);
        assert_eq!(dest.offsets(), vec![4, 9, 64]);
    }

    #[test]
    fn copy_failure_aborts_the_pass() {
        let source = FakeArchive::new()
            .stored("a", 3)
            .stored("b", 9)
            .stored("c", 20);
        let mut dest = FakeWriter::new().fail_at(1);

        let err = align_entries(&source, &mut dest, align(4)).unwrap_err();
        assert!(matches!(err, AlignError::Copy { index: 1, ref name, .. } if name == "b"));
        // Only the entry before the failure made it across
        assert_eq!(dest.offsets(), vec![4]);
    }

    #[test]
    fn missing_entry_aborts_the_pass() {
        let source = FakeArchive::new()
            .stored("a", 3)
            .stored("b", 9)
            .hide(1);
        let mut dest = FakeWriter::new();

        let err = align_entries(&source, &mut dest, align(4)).unwrap_err();
        assert!(matches!(err, AlignError::MissingEntry(1)));
        assert_eq!(dest.offsets(), vec![4]);
    }

    #[test]
    fn measured_offset_overrides_projection() {
        // The destination writes a header 3 bytes shorter for the first entry
        let source = FakeArchive::new()
            .compressed("a", 10)
            .stored("b", 50)
            .stored("c", 100);
        let mut dest = FakeWriter::new().header_delta(0, -3);

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        assert_eq!(dest.offsets(), vec![7, 48, 100]);
        assert_eq!(report.total_padding, 3);
        assert_eq!(report.misaligned().count(), 0);
    }

    #[test]
    fn entry_landing_off_boundary_is_reported() {
        let source = FakeArchive::new().stored("a", 8).stored("b", 16);
        let mut dest = FakeWriter::new().header_delta(0, 1);

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        let misaligned: Vec<_> = report.misaligned().map(|e| e.name.as_str()).collect();
        assert_eq!(misaligned, vec!["a"]);
        // b is projected from the measured drift of a
        assert_eq!(dest.offsets(), vec![9, 20]);
    }

    #[test]
    fn predicted_offset_absorbs_header_change() {
        let source = FakeArchive::new().stored("a", 8).stored("b", 16);
        let mut dest = FakeWriter::new().predicting().header_delta(0, 1);

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        assert_eq!(report.misaligned().count(), 0);
        // a would start at 9, so 3 bytes of padding; b follows 4 bytes later
        assert_eq!(dest.offsets(), vec![12, 20]);
        assert_eq!(report.total_padding, 3);
    }

    #[test]
    fn gap_dropped_by_destination_stays_aligned() {
        // One byte of junk sits in front of b in the source but not in the
        // destination, which a drift measured on a cannot know about
        let source = FakeArchive::new().stored("a", 31).stored("b", 73);
        let mut dest = FakeWriter::new().predicting().header_delta(1, -1);

        let report = align_entries(&source, &mut dest, align(4)).unwrap();
        assert_eq!(dest.offsets(), vec![32, 76]);
        assert_eq!(report.misaligned().count(), 0);
        assert_eq!(report.total_padding, 4);
    }

    #[test]
    fn prediction_failure_aborts_the_pass() {
        let source = FakeArchive::new().stored("a", 3).stored("b", 9);
        let mut dest = FakeWriter::new().predicting().fail_at(0);

        let err = align_entries(&source, &mut dest, align(4)).unwrap_err();
        assert!(matches!(err, AlignError::Copy { index: 0, .. }));
        assert!(dest.offsets().is_empty());
    }

    #[test]
    fn bias_record_tracks_padding() {
        let mut bias = Bias::new();
        bias.record(2, 10, 12);
        assert_eq!(bias.project(20), 22);
        bias.record(0, 30, 32);
        bias.record(1, 40, 40);
        assert_eq!(bias.inserted(), 3);
        assert_eq!(bias.drift(), 0);
    }

    fn stored_layout() -> impl Strategy<Value = (Vec<u64>, u64)> {
        (prop::collection::vec(1u64..200, 0..24), 1u64..64)
    }

    proptest! {
        #[test]
        fn bias_is_monotonic_and_sums_padding((gaps, alignment) in stored_layout()) {
            let mut source = FakeArchive::new();
            let mut offset = 0;
            for (i, gap) in gaps.iter().enumerate() {
                offset += gap;
                source = if i % 3 == 2 {
                    source.compressed(&format!("e{i}"), offset)
                } else {
                    source.stored(&format!("e{i}"), offset)
                };
            }

            let a = align(alignment);
            let mut dest = FakeWriter::new();
            let mut bias = Bias::new();
            let mut applied = 0;
            for index in 0..source.entry_count() {
                let entry = source.entry_at(index).unwrap();
                let before = bias.inserted();
                let copied = copy_aligned(&source, &mut dest, &entry, a, &mut bias).unwrap();
                applied += copied.padding;
                prop_assert!(bias.inserted() >= before);
                prop_assert_eq!(bias.inserted(), applied);
                prop_assert!(copied.padding < alignment);
                if entry.kind == EntryKind::Stored {
                    prop_assert!(a.is_aligned(copied.landed_offset));
                } else {
                    prop_assert_eq!(copied.padding, 0);
                }
            }
        }
    }
}
