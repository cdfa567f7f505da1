use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// Anything other than STORED needs decoding before use.
    pub fn is_compressed(&self) -> bool {
        !matches!(self, CompressionMethod::Stored)
    }
}

/// General purpose flag: sizes and CRC follow the data in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// Marker used by the 32-bit fields when the real value lives in the ZIP64 extra field
pub const ZIP64_MARKER_U32: u32 = 0xFFFF_FFFF;
pub const ZIP64_MARKER_U16: u16 = 0xFFFF;
/// Header ID of the ZIP64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.disk_number)?;
        w.write_u16::<LittleEndian>(self.disk_with_cd)?;
        w.write_u16::<LittleEndian>(self.disk_entries)?;
        w.write_u16::<LittleEndian>(self.total_entries)?;
        w.write_u32::<LittleEndian>(self.cd_size)?;
        w.write_u32::<LittleEndian>(self.cd_offset)?;
        w.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_MARKER_U16
            || self.total_entries == ZIP64_MARKER_U16
            || self.cd_size == ZIP64_MARKER_U32
            || self.cd_offset == ZIP64_MARKER_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            bail!("Invalid ZIP64 format");
        }

        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 format");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Optional signature in front of a data descriptor
pub const DATA_DESCRIPTOR_SIGNATURE: &[u8] = b"PK\x07\x08";

/// Local File Header as stored in front of each entry's data
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
}

impl LocalFileHeader {
    /// Parse the fixed 30-byte part. Name and extra field are left empty,
    /// their lengths are returned alongside.
    pub fn from_fixed_bytes(data: &[u8]) -> Result<(Self, u16, u16)> {
        if data.len() < LFH_SIZE {
            bail!("Invalid Local File Header");
        }

        // Verify LFH signature (PK\x03\x04)
        if &data[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header");
        }

        let mut cursor = Cursor::new(&data[4..]);

        let header = Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name: Vec::new(),
            extra_field: Vec::new(),
        };
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;

        Ok((header, file_name_length, extra_field_length))
    }

    /// Total on-disk length of the header including name and extra field.
    pub fn encoded_len(&self) -> u64 {
        (LFH_SIZE + self.file_name.len() + self.extra_field.len()) as u64
    }

    /// Whether the extra field carries a ZIP64 record. A data descriptor
    /// following such an entry has 8-byte sizes.
    pub fn has_zip64_extra(&self) -> bool {
        let extra = &self.extra_field;
        let mut pos = 0;
        while pos + 4 <= extra.len() {
            if u16::from_le_bytes([extra[pos], extra[pos + 1]]) == ZIP64_EXTRA_ID {
                return true;
            }
            pos += 4 + u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        }
        false
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let name_len = u16::try_from(self.file_name.len())?;
        let extra_len = u16::try_from(self.extra_field.len())?;

        w.write_all(LFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method)?;
        w.write_u16::<LittleEndian>(self.last_mod_time)?;
        w.write_u16::<LittleEndian>(self.last_mod_date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size)?;
        w.write_u16::<LittleEndian>(name_len)?;
        w.write_u16::<LittleEndian>(extra_len)?;
        w.write_all(&self.file_name)?;
        w.write_all(&self.extra_field)?;
        Ok(())
    }
}

/// Parsed ZIP file entry information
///
/// Carries every central directory field so an entry can be re-emitted
/// into a new archive without loss.
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    /// Offset of the first byte of entry data, just past the local header
    pub data_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    /// Raw name bytes, kept verbatim for rewriting
    pub raw_name: Vec<u8>,
    pub extra_field: Vec<u8>,
    pub comment: Vec<u8>,
}

impl ZipFileEntry {
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Serialize the central directory record for this entry.
    ///
    /// ZIP64 values cannot be represented here; callers must check
    /// [`ZipFileEntry::needs_zip64`] first.
    pub fn write_cdfh<W: Write>(&self, w: &mut W) -> Result<()> {
        if self.needs_zip64() {
            bail!("Entry '{}' requires ZIP64, which is not supported for output", self.file_name);
        }

        let extra_field = strip_zip64_extra(&self.extra_field);

        w.write_all(CDFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.version_made_by)?;
        w.write_u16::<LittleEndian>(self.version_needed)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        w.write_u16::<LittleEndian>(self.last_mod_time)?;
        w.write_u16::<LittleEndian>(self.last_mod_date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size as u32)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        w.write_u16::<LittleEndian>(u16::try_from(self.raw_name.len())?)?;
        w.write_u16::<LittleEndian>(u16::try_from(extra_field.len())?)?;
        w.write_u16::<LittleEndian>(u16::try_from(self.comment.len())?)?;
        w.write_u16::<LittleEndian>(0)?; // disk number start
        w.write_u16::<LittleEndian>(self.internal_attrs)?;
        w.write_u32::<LittleEndian>(self.external_attrs)?;
        w.write_u32::<LittleEndian>(self.lfh_offset as u32)?;
        w.write_all(&self.raw_name)?;
        w.write_all(&extra_field)?;
        w.write_all(&self.comment)?;
        Ok(())
    }

    /// Whether any size or offset overflows the 32-bit central directory fields
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size >= ZIP64_MARKER_U32 as u64
            || self.uncompressed_size >= ZIP64_MARKER_U32 as u64
            || self.lfh_offset >= ZIP64_MARKER_U32 as u64
    }
}

/// Drop the ZIP64 extended information field (ID 0x0001) from an extra field
/// block. Every value it carried fits the 32-bit fields once written back.
fn strip_zip64_extra(extra: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(extra.len());
    let mut pos = 0;

    while pos + 4 <= extra.len() {
        let header_id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let size = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let end = pos + 4 + size;
        if end > extra.len() {
            // Not a well-formed field list; keep the tail untouched
            break;
        }
        if header_id != ZIP64_EXTRA_ID {
            out.extend_from_slice(&extra[pos..end]);
        }
        pos = end;
    }
    out.extend_from_slice(&extra[pos..]);
    out
}
