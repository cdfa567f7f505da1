//! The narrow seam between the alignment passes and an archive library.

use std::io::Write;

use anyhow::{Result, anyhow};

use crate::io::ReadAt;
use crate::zip::{ZipArchive, ZipWriter};

use super::entry::EntryInfo;

/// Ordered, read-only access to an archive's entries.
pub trait EntrySource {
    fn entry_count(&self) -> usize;

    /// `None` when `index` does not name an entry.
    fn entry_at(&self, index: usize) -> Option<EntryInfo>;
}

/// Destination that can take entries copied out of an `S`.
pub trait EntrySink<S: EntrySource + ?Sized> {
    /// Append `entry` from `source` with `padding` filler bytes in front of
    /// its data, leaving everything else about the entry unchanged.
    ///
    /// Returns the new entry, whose `file_offset` is where the data really
    /// landed in this archive.
    fn copy_entry(&mut self, source: &S, entry: &EntryInfo, padding: u64) -> Result<EntryInfo>;

    /// Where the data of `entry` would start if it were the next entry
    /// copied, with no padding.
    ///
    /// `None` when the sink cannot tell before writing. The copier then
    /// projects the offset from what earlier copies measured.
    fn next_data_offset(&self, _source: &S, _entry: &EntryInfo) -> Result<Option<u64>> {
        Ok(None)
    }
}

impl<R: ReadAt> EntrySource for ZipArchive<R> {
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn entry_at(&self, index: usize) -> Option<EntryInfo> {
        self.by_index(index).map(|e| EntryInfo::from_zip(index, e))
    }
}

impl<R: ReadAt, W: Write> EntrySink<ZipArchive<R>> for ZipWriter<W> {
    fn copy_entry(
        &mut self,
        source: &ZipArchive<R>,
        entry: &EntryInfo,
        padding: u64,
    ) -> Result<EntryInfo> {
        let zip_entry = source
            .by_index(entry.index)
            .ok_or_else(|| anyhow!("No entry at index {}", entry.index))?;

        let copied = self.raw_copy_entry(source.parser(), zip_entry, padding)?;
        Ok(EntryInfo::from_zip(self.entries().len() - 1, &copied))
    }

    fn next_data_offset(&self, source: &ZipArchive<R>, entry: &EntryInfo) -> Result<Option<u64>> {
        let zip_entry = source
            .by_index(entry.index)
            .ok_or_else(|| anyhow!("No entry at index {}", entry.index))?;

        // The local header is copied as is, so its length is known up front
        let header = source.parser().read_local_header(zip_entry)?;
        Ok(Some(self.position() + header.encoded_len()))
    }
}
