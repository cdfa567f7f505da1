//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. Read each file's Local File Header to find where its data starts
//!
//! Step 4 matters for alignment: the local header may carry a different
//! extra field than the central directory, so only the local header tells
//! the real data offset.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Location and size of the central directory, resolved from the EOCD
/// (or its ZIP64 counterpart).
#[derive(Debug, Clone, Copy)]
pub struct CentralDirectory {
    pub offset: u64,
    pub size: u64,
    pub total_entries: u64,
}

/// Low-level ZIP file parser.
///
/// This struct handles reading and parsing ZIP structures from
/// a data source. It's generic over the reader type to support
/// both files on disk and archives held in memory.
///
/// ## Usage
///
/// Typically used through [`ZipArchive`](super::ZipArchive)
/// rather than directly.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// Returns an error if no valid EOCD can be found, indicating
    /// the file is not a valid ZIP archive.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        // Optimization: First try the simple case where there's no comment.
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf)?;

            // Check for signature and zero-length comment
            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        // EOCD not at expected location - search backwards for it,
        // it sits in front of the archive comment.
        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf)?;

        if buf.len() < EndOfCentralDirectory::SIZE {
            bail!("Not a valid ZIP file");
        }

        // Search backwards for EOCD signature (PK\x05\x06)
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length field must match the remaining bytes.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD indicates ZIP64 extensions are needed
    /// (fields set to 0xFFFF or 0xFFFFFFFF).
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        // The ZIP64 EOCD Locator is located immediately before the regular EOCD
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
            bail!("Invalid ZIP64 format");
        };
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader.read_exact_at(locator_offset, &mut locator_buf)?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        // Read the actual ZIP64 EOCD from the offset specified in the locator
        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Resolve where the central directory lives, using ZIP64 if needed.
    pub fn central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        let cd = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            CentralDirectory {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                total_entries: eocd64.total_entries,
            }
        } else {
            CentralDirectory {
                offset: eocd.cd_offset as u64,
                size: eocd.cd_size as u64,
                total_entries: eocd.total_entries as u64,
            }
        };

        if cd.offset.saturating_add(cd.size) > eocd_offset {
            bail!("Central Directory extends past End of Central Directory");
        }
        if cd.total_entries.saturating_mul(CDFH_MIN_SIZE as u64) > cd.size {
            bail!("Central Directory too small for {} entries", cd.total_entries);
        }

        Ok(cd)
    }

    /// Read the archive comment stored after the EOCD.
    pub fn comment(&self) -> Result<Vec<u8>> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        let mut comment = vec![0u8; eocd.comment_len as usize];
        self.reader
            .read_exact_at(eocd_offset + EndOfCentralDirectory::SIZE as u64, &mut comment)?;
        Ok(comment)
    }

    /// List all files in the ZIP archive, in central directory order.
    ///
    /// Reads the Central Directory to get metadata for all entries, then
    /// each Local File Header to resolve the data offset.
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let cd = self.central_directory()?;

        // Read the entire Central Directory in one go
        let mut cd_data = vec![0u8; cd.size as usize];
        self.reader.read_exact_at(cd.offset, &mut cd_data)?;

        let mut entries = Vec::with_capacity(cd.total_entries as usize);
        let mut cursor = Cursor::new(&cd_data);

        for index in 0..cd.total_entries {
            let mut entry = self
                .parse_cdfh(&mut cursor)
                .with_context(|| format!("Central Directory entry {index}"))?;
            entry.data_offset = self
                .get_data_offset(&entry)
                .with_context(|| format!("Local File Header of '{}'", entry.file_name))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Parse a Central Directory File Header from a cursor.
    ///
    /// The returned entry has `data_offset` set to `lfh_offset`; the
    /// caller fixes it up from the local header.
    fn parse_cdfh(&self, cursor: &mut Cursor<&Vec<u8>>) -> Result<ZipFileEntry> {
        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut raw_name = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut raw_name)?;
        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(&raw_name).to_string();

        // Directory entries end with '/'
        let is_directory = file_name.ends_with('/');

        let mut extra_field = vec![0u8; extra_field_length as usize];
        cursor.read_exact(&mut extra_field)?;

        // ZIP64 extended information lives in extra field ID 0x0001
        let mut extra = Cursor::new(&extra_field[..]);
        let extra_end = extra_field.len() as u64;
        while extra.position() + 4 <= extra_end {
            let header_id = extra.read_u16::<LittleEndian>()?;
            let field_size = extra.read_u16::<LittleEndian>()? as u64;
            let field_end = (extra.position() + field_size).min(extra_end);

            if header_id == ZIP64_EXTRA_ID {
                // Fields are present only if corresponding header field is 0xFFFFFFFF
                if uncompressed_size == ZIP64_MARKER_U32 as u64 && extra.position() + 8 <= field_end {
                    uncompressed_size = extra.read_u64::<LittleEndian>()?;
                }
                if compressed_size == ZIP64_MARKER_U32 as u64 && extra.position() + 8 <= field_end {
                    compressed_size = extra.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == ZIP64_MARKER_U32 as u64 && extra.position() + 8 <= field_end {
                    lfh_offset = extra.read_u64::<LittleEndian>()?;
                }
            }
            extra.set_position(field_end);
        }

        let mut comment = vec![0u8; file_comment_length as usize];
        cursor.read_exact(&mut comment)?;

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            data_offset: lfh_offset,
            last_mod_time,
            last_mod_date,
            is_directory,
            version_made_by,
            version_needed,
            flags,
            internal_attrs,
            external_attrs,
            raw_name,
            extra_field,
            comment,
        })
    }

    /// Read the complete Local File Header of an entry, including its
    /// name and extra field.
    pub fn read_local_header(&self, entry: &ZipFileEntry) -> Result<LocalFileHeader> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh_buf)?;

        let (mut header, file_name_length, extra_field_length) =
            LocalFileHeader::from_fixed_bytes(&lfh_buf)?;

        let mut variable = vec![0u8; file_name_length as usize + extra_field_length as usize];
        self.reader
            .read_exact_at(entry.lfh_offset + LFH_SIZE as u64, &mut variable)?;
        header.extra_field = variable.split_off(file_name_length as usize);
        header.file_name = variable;

        Ok(header)
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins.
    pub fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh_buf)?;

        let (_, file_name_length, extra_field_length) = LocalFileHeader::from_fixed_bytes(&lfh_buf)?;

        // Data starts after: LFH (30 bytes) + filename + extra field
        let data_offset = entry.lfh_offset
            + LFH_SIZE as u64
            + file_name_length as u64
            + extra_field_length as u64;

        if data_offset.saturating_add(entry.compressed_size) > self.size {
            bail!("Entry '{}' data extends past end of archive", entry.file_name);
        }

        Ok(data_offset)
    }

    /// Read the raw (possibly compressed) payload of an entry.
    pub fn read_raw_data(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; entry.compressed_size as usize];
        self.reader.read_exact_at(entry.data_offset, &mut buf)?;
        Ok(buf)
    }

    /// Read the data descriptor that follows an entry's payload, if the
    /// entry declares one. The signature is optional in the format, so
    /// both layouts are accepted.
    pub fn read_data_descriptor(&self, entry: &ZipFileEntry) -> Result<Option<Vec<u8>>> {
        if !entry.has_data_descriptor() {
            return Ok(None);
        }

        let offset = entry.data_offset + entry.compressed_size;
        let mut sig = [0u8; 4];
        self.reader.read_exact_at(offset, &mut sig)?;

        // crc32 + compressed size + uncompressed size, sizes are 8 bytes wide for ZIP64
        let wide = entry.compressed_size >= ZIP64_MARKER_U32 as u64
            || entry.uncompressed_size >= ZIP64_MARKER_U32 as u64
            || self.read_local_header(entry)?.has_zip64_extra();
        let sizes_len = if wide { 16 } else { 8 };
        let mut body_len = 4 + sizes_len;
        if sig == DATA_DESCRIPTOR_SIGNATURE {
            body_len += 4;
        }
        let mut descriptor = vec![0u8; body_len];
        self.reader.read_exact_at(offset, &mut descriptor)?;

        Ok(Some(descriptor))
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }
}
