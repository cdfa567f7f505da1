use std::io::Read;
use std::path::Path;

use anyhow::{Result, bail};
use flate2::Crc;
use flate2::read::DeflateDecoder;

use crate::io::{LocalFileReader, ReadAt};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// A ZIP archive opened read-only, with its entry list loaded.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
}

impl ZipArchive<LocalFileReader> {
    /// Open the archive at `path` read-only.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_reader(LocalFileReader::new(path)?)
    }
}

impl<R: ReadAt> ZipArchive<R> {
    /// Parse the central directory and every local header up front.
    pub fn from_reader(reader: R) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files()?;
        Ok(Self { parser, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn by_index(&self, index: usize) -> Option<&ZipFileEntry> {
        self.entries.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&ZipFileEntry> {
        self.entries.iter().find(|e| e.file_name == name)
    }

    pub fn parser(&self) -> &ZipParser<R> {
        &self.parser
    }

    /// Archive comment stored after the end of central directory record
    pub fn comment(&self) -> Result<Vec<u8>> {
        self.parser.comment()
    }

    /// Read and decode an entry's data, checking its CRC-32.
    pub fn read_entry(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let raw = self.parser.read_raw_data(entry)?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(&raw[..]).read_to_end(&mut out)?;
                out
            }
            CompressionMethod::Unknown(v) => bail!(
                "Unsupported compression method: {} (only STORED and DEFLATE are supported)",
                v
            ),
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!(
                "CRC mismatch for '{}': expected {:08x}, got {:08x}",
                entry.file_name,
                entry.crc32,
                crc.sum()
            );
        }

        Ok(data)
    }
}
