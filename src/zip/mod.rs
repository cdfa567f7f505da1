//! ZIP archive reading and writing.
//!
//! This module is the archive library the alignment code runs on top of.
//! It reads existing archives, including ZIP64 ones, and writes new ones
//! entry by entry, copying entries raw with optional padding in front of
//! their data.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`writer`]: Sequential writer producing a new archive
//! - [`archive`]: Read-only archive handle built on the parser
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - Only STORED and DEFLATE can be decoded; other methods can still be copied raw
//! - ZIP64 archives can be read but not written

mod archive;
mod parser;
mod structures;
mod writer;

pub use archive::ZipArchive;
pub use parser::{CentralDirectory, ZipParser};
pub use structures::*;
pub use writer::ZipWriter;
