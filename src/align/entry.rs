use crate::zip::ZipFileEntry;

/// Payload kind of an entry. Only stored payloads get padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Stored,
    Compressed,
}

/// Entry metadata the alignment passes work from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Position in the owning archive's entry list
    pub index: usize,
    /// Used for diagnostics only
    pub name: String,
    pub kind: EntryKind,
    /// Offset of the entry's data within its archive
    pub file_offset: u64,
    pub uncompressed_len: u64,
}

impl EntryInfo {
    pub fn is_compressed(&self) -> bool {
        self.kind == EntryKind::Compressed
    }

    pub fn from_zip(index: usize, entry: &ZipFileEntry) -> Self {
        let kind = if entry.compression_method.is_compressed() {
            EntryKind::Compressed
        } else {
            EntryKind::Stored
        };

        Self {
            index,
            name: entry.file_name.clone(),
            kind,
            file_offset: entry.data_offset,
            uncompressed_len: entry.uncompressed_size,
        }
    }
}
