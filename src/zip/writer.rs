//! ZIP archive writer.
//!
//! Entries are laid out back to back in the order they are added, the
//! central directory and EOCD are emitted by [`ZipWriter::finish`].
//! Copied entries keep their local header verbatim apart from the
//! requested padding, which is appended to the local extra field as zero
//! bytes so the entry data moves forward by exactly that amount.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;

use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::*;

/// Copy buffer for moving entry payloads between archives
const COPY_CHUNK: usize = 64 * 1024;

/// 1980-01-01 00:00 in MS-DOS format, used for entries added from memory
const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;
const DOS_EPOCH_TIME: u16 = 0;

/// General purpose flag: file name is UTF-8
const FLAG_UTF8: u16 = 1 << 11;

/// Writes a new ZIP archive sequentially.
pub struct ZipWriter<W: Write> {
    inner: W,
    /// Bytes written so far; also the offset of the next local header
    position: u64,
    entries: Vec<ZipFileEntry>,
    comment: Vec<u8>,
}

impl ZipWriter<BufWriter<File>> {
    /// Create `path` for writing, truncating any existing file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            entries: Vec::new(),
            comment: Vec::new(),
        }
    }

    /// Offset at which the next entry's local header will be written
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Entries written so far, in order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn set_comment(&mut self, comment: Vec<u8>) {
        self.comment = comment;
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Copy `entry` from `source` without recompressing it, inserting
    /// `padding` bytes in front of its data.
    ///
    /// # Returns
    ///
    /// The entry as recorded in this archive, with the local header and
    /// data offsets it actually landed at.
    pub fn raw_copy_entry<R: ReadAt>(
        &mut self,
        source: &ZipParser<R>,
        entry: &ZipFileEntry,
        padding: u64,
    ) -> Result<ZipFileEntry> {
        let mut header = source.read_local_header(entry)?;

        let extra_len = header.extra_field.len() as u64 + padding;
        if extra_len > u16::MAX as u64 {
            bail!(
                "Padding of {} bytes does not fit the extra field of '{}'",
                padding,
                entry.file_name
            );
        }
        header.extra_field.resize(extra_len as usize, 0);

        let lfh_offset = self.position;
        let data_offset = lfh_offset + header.encoded_len();

        let mut new_entry = entry.clone();
        new_entry.lfh_offset = lfh_offset;
        new_entry.data_offset = data_offset;
        if new_entry.needs_zip64() {
            bail!("Entry '{}' requires ZIP64, which is not supported for output", entry.file_name);
        }

        let mut encoded = Vec::with_capacity(header.encoded_len() as usize);
        header.write_to(&mut encoded)?;
        self.write_bytes(&encoded)?;

        // Stream the payload across without holding it all in memory
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut remaining = entry.compressed_size;
        let mut offset = entry.data_offset;
        while remaining > 0 {
            let n = remaining.min(COPY_CHUNK as u64) as usize;
            source
                .reader()
                .read_exact_at(offset, &mut buf[..n])
                .with_context(|| format!("Reading data of '{}'", entry.file_name))?;
            self.write_bytes(&buf[..n])?;
            offset += n as u64;
            remaining -= n as u64;
        }

        if let Some(descriptor) = source.read_data_descriptor(entry)? {
            self.write_bytes(&descriptor)?;
        }

        self.entries.push(new_entry.clone());
        Ok(new_entry)
    }

    /// Add a new entry from memory.
    pub fn add_bytes(
        &mut self,
        name: &str,
        data: &[u8],
        method: CompressionMethod,
    ) -> Result<ZipFileEntry> {
        let mut crc = Crc::new();
        crc.update(data);

        let (payload, version_needed) = match method {
            CompressionMethod::Stored => (data.to_vec(), 10),
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                (encoder.finish()?, 20)
            }
            CompressionMethod::Unknown(v) => bail!("Unsupported compression method: {}", v),
        };

        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };

        let header = LocalFileHeader {
            version_needed,
            flags,
            compression_method: method.as_u16(),
            last_mod_time: DOS_EPOCH_TIME,
            last_mod_date: DOS_EPOCH_DATE,
            crc32: crc.sum(),
            compressed_size: u32::try_from(payload.len())?,
            uncompressed_size: u32::try_from(data.len())?,
            file_name: name.as_bytes().to_vec(),
            extra_field: Vec::new(),
        };

        let lfh_offset = self.position;
        let entry = ZipFileEntry {
            file_name: name.to_string(),
            compression_method: method,
            compressed_size: payload.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32: crc.sum(),
            lfh_offset,
            data_offset: lfh_offset + header.encoded_len(),
            last_mod_time: DOS_EPOCH_TIME,
            last_mod_date: DOS_EPOCH_DATE,
            is_directory: name.ends_with('/'),
            version_made_by: 20,
            version_needed,
            flags,
            internal_attrs: 0,
            external_attrs: 0,
            raw_name: name.as_bytes().to_vec(),
            extra_field: Vec::new(),
            comment: Vec::new(),
        };
        if entry.needs_zip64() {
            bail!("Entry '{}' requires ZIP64, which is not supported for output", name);
        }

        let mut encoded = Vec::with_capacity(header.encoded_len() as usize);
        header.write_to(&mut encoded)?;
        self.write_bytes(&encoded)?;
        self.write_bytes(&payload)?;

        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Write the central directory and EOCD, flush, and hand back the
    /// underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if self.entries.len() >= ZIP64_MARKER_U16 as usize {
            bail!("{} entries require ZIP64, which is not supported for output", self.entries.len());
        }
        let comment_len = u16::try_from(self.comment.len()).context("Archive comment too long")?;

        let cd_offset = self.position;
        let mut cd = Vec::new();
        for entry in &self.entries {
            entry.write_cdfh(&mut cd)?;
        }
        self.write_bytes(&cd)?;

        let cd_size = cd.len() as u64;
        if cd_offset + cd_size >= ZIP64_MARKER_U32 as u64 {
            bail!("Archive requires ZIP64, which is not supported for output");
        }

        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: self.entries.len() as u16,
            total_entries: self.entries.len() as u16,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            comment_len,
        };
        let mut tail = Vec::with_capacity(EndOfCentralDirectory::SIZE + self.comment.len());
        eocd.write_to(&mut tail)?;
        tail.extend_from_slice(&self.comment);
        self.write_bytes(&tail)?;

        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    fn source() -> ZipParser<MemoryReader> {
        let mut writer = ZipWriter::new(Vec::new());
        writer
            .add_bytes("a.txt", b"0123456789", CompressionMethod::Stored)
            .unwrap();
        writer
            .add_bytes("b.txt", &[b'b'; 200], CompressionMethod::Deflate)
            .unwrap();
        ZipParser::new(MemoryReader::new(writer.finish().unwrap()))
    }

    #[test]
    fn copy_without_padding_keeps_layout() {
        let parser = source();
        let entries = parser.list_files().unwrap();

        let mut out = ZipWriter::new(Vec::new());
        for entry in &entries {
            let copied = out.raw_copy_entry(&parser, entry, 0).unwrap();
            assert_eq!(copied.lfh_offset, entry.lfh_offset);
            assert_eq!(copied.data_offset, entry.data_offset);
        }
        let bytes = out.finish().unwrap();
        assert_eq!(bytes.len() as u64, parser.reader().size());
    }

    #[test]
    fn padding_moves_data_forward() {
        let parser = source();
        let entries = parser.list_files().unwrap();

        let mut out = ZipWriter::new(Vec::new());
        let first = out.raw_copy_entry(&parser, &entries[0], 3).unwrap();
        assert_eq!(first.data_offset, entries[0].data_offset + 3);
        let second = out.raw_copy_entry(&parser, &entries[1], 0).unwrap();
        assert_eq!(second.data_offset, entries[1].data_offset + 3);

        let copied = ZipParser::new(MemoryReader::new(out.finish().unwrap()));
        let listed = copied.list_files().unwrap();
        assert_eq!(listed[0].data_offset, first.data_offset);
        assert_eq!(listed[1].data_offset, second.data_offset);
        assert_eq!(copied.read_raw_data(&listed[0]).unwrap(), b"0123456789");
    }

    #[test]
    fn oversized_padding_is_rejected() {
        let parser = source();
        let entries = parser.list_files().unwrap();

        let mut out = ZipWriter::new(Vec::new());
        assert!(out.raw_copy_entry(&parser, &entries[0], 70_000).is_err());
    }

    #[test]
    fn empty_archive_is_just_eocd() {
        let bytes = ZipWriter::new(Vec::new()).finish().unwrap();
        assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);

        let parser = ZipParser::new(MemoryReader::new(bytes));
        assert!(parser.list_files().unwrap().is_empty());
    }

    #[test]
    fn data_descriptor_is_carried_over() {
        // Hand-build a stored entry with a signed data descriptor
        let data = b"descriptor";
        let mut crc = Crc::new();
        crc.update(data);
        let header = LocalFileHeader {
            version_needed: 20,
            flags: FLAG_DATA_DESCRIPTOR,
            compression_method: 0,
            last_mod_time: 0,
            last_mod_date: DOS_EPOCH_DATE,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: b"d.bin".to_vec(),
            extra_field: Vec::new(),
        };
        let mut archive = Vec::new();
        header.write_to(&mut archive).unwrap();
        archive.extend_from_slice(data);
        archive.extend_from_slice(DATA_DESCRIPTOR_SIGNATURE);
        archive.extend_from_slice(&crc.sum().to_le_bytes());
        archive.extend_from_slice(&(data.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(data.len() as u32).to_le_bytes());

        let entry = ZipFileEntry {
            file_name: "d.bin".to_string(),
            compression_method: CompressionMethod::Stored,
            compressed_size: data.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32: crc.sum(),
            lfh_offset: 0,
            data_offset: 0,
            last_mod_time: 0,
            last_mod_date: DOS_EPOCH_DATE,
            is_directory: false,
            version_made_by: 20,
            version_needed: 20,
            flags: FLAG_DATA_DESCRIPTOR,
            internal_attrs: 0,
            external_attrs: 0,
            raw_name: b"d.bin".to_vec(),
            extra_field: Vec::new(),
            comment: Vec::new(),
        };
        let cd_offset = archive.len();
        entry.write_cdfh(&mut archive).unwrap();
        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: 1,
            total_entries: 1,
            cd_size: (archive.len() - cd_offset) as u32,
            cd_offset: cd_offset as u32,
            comment_len: 0,
        };
        eocd.write_to(&mut archive).unwrap();

        let parser = ZipParser::new(MemoryReader::new(archive));
        let entries = parser.list_files().unwrap();
        assert_eq!(parser.read_data_descriptor(&entries[0]).unwrap().unwrap().len(), 16);

        let mut out = ZipWriter::new(Vec::new());
        out.raw_copy_entry(&parser, &entries[0], 2).unwrap();
        // 30 + 5 name + 2 pad + 10 data + 16 descriptor
        assert_eq!(out.position(), 63);
        let next = out.add_bytes("after", b"x", CompressionMethod::Stored).unwrap();
        assert_eq!(next.lfh_offset, 63);

        let copied = ZipParser::new(MemoryReader::new(out.finish().unwrap()));
        let listed = copied.list_files().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(copied.read_raw_data(&listed[0]).unwrap(), data);
    }
}
