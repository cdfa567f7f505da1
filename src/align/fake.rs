//! In-memory archive used to drive the alignment passes in tests.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};

use super::entry::{EntryInfo, EntryKind};
use super::source::{EntrySink, EntrySource};

#[derive(Debug, Default)]
pub struct FakeArchive {
    entries: Vec<EntryInfo>,
    hidden: HashSet<usize>,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, kind: EntryKind, offset: u64) -> Self {
        self.entries.push(EntryInfo {
            index: self.entries.len(),
            name: name.to_string(),
            kind,
            file_offset: offset,
            uncompressed_len: 16,
        });
        self
    }

    pub fn stored(self, name: &str, offset: u64) -> Self {
        self.push(name, EntryKind::Stored, offset)
    }

    pub fn compressed(self, name: &str, offset: u64) -> Self {
        self.push(name, EntryKind::Compressed, offset)
    }

    /// Make `entry_at(index)` come back empty while still counting it.
    pub fn hide(mut self, index: usize) -> Self {
        self.hidden.insert(index);
        self
    }
}

impl EntrySource for FakeArchive {
    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_at(&self, index: usize) -> Option<EntryInfo> {
        if self.hidden.contains(&index) {
            return None;
        }
        self.entries.get(index).cloned()
    }
}

/// Destination that mirrors the source layout, shifted by padding and by
/// any header size differences configured with [`FakeWriter::header_delta`].
#[derive(Debug, Default)]
pub struct FakeWriter {
    entries: Vec<EntryInfo>,
    shift: i64,
    header_deltas: HashMap<usize, i64>,
    fail_at: Option<usize>,
    predicting: bool,
}

impl FakeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to copy, or to place, the source entry at `index`.
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Write the header of source entry `index` `delta` bytes longer.
    pub fn header_delta(mut self, index: usize, delta: i64) -> Self {
        self.header_deltas.insert(index, delta);
        self
    }

    /// Answer `next_data_offset` instead of leaving the copier to project.
    pub fn predicting(mut self) -> Self {
        self.predicting = true;
        self
    }

    fn header_delta_of(&self, index: usize) -> i64 {
        self.header_deltas.get(&index).copied().unwrap_or(0)
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.file_offset).collect()
    }
}

impl<S: EntrySource + ?Sized> EntrySink<S> for FakeWriter {
    fn copy_entry(&mut self, _source: &S, entry: &EntryInfo, padding: u64) -> Result<EntryInfo> {
        if self.fail_at == Some(entry.index) {
            bail!("simulated write failure");
        }

        self.shift += padding as i64 + self.header_delta_of(entry.index);

        let mut new_entry = entry.clone();
        new_entry.index = self.entries.len();
        new_entry.file_offset = entry.file_offset.saturating_add_signed(self.shift);
        self.entries.push(new_entry.clone());
        Ok(new_entry)
    }

    fn next_data_offset(&self, _source: &S, entry: &EntryInfo) -> Result<Option<u64>> {
        if !self.predicting {
            return Ok(None);
        }
        if self.fail_at == Some(entry.index) {
            bail!("simulated read failure");
        }
        let shift = self.shift + self.header_delta_of(entry.index);
        Ok(Some(entry.file_offset.saturating_add_signed(shift)))
    }
}
