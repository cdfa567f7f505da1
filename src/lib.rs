//! # zipalign
//!
//! Rewrites a ZIP archive so the data of every stored (uncompressed) entry
//! starts at an offset that is a multiple of a chosen alignment, and checks
//! whether an existing archive already has that property.
//!
//! Loaders that memory-map resources straight out of an archive, Android's
//! resource loader being the usual example, need those resources aligned.
//! Compressed entries are left alone since they are inflated into memory
//! before use.
//!
//! ## Features
//!
//! - Copy an archive entry by entry, padding stored entries via the local
//!   extra field; compressed data is copied raw, never recompressed
//! - Verify an archive's alignment with a per-entry report
//! - Read ZIP64 archives; STORED and DEFLATE entries can be decoded
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use zipalign::{Alignment, align_archive, is_archive_aligned};
//!
//! fn main() -> anyhow::Result<()> {
//!     let alignment = Alignment::new(4).unwrap();
//!     let out = Path::new("app-aligned.apk");
//!
//!     let report = align_archive(Path::new("app.apk"), out, alignment, false)?;
//!     println!("inserted {} bytes of padding", report.total_padding);
//!
//!     assert!(is_archive_aligned(out, alignment)?);
//!     Ok(())
//! }
//! ```

pub mod align;
pub mod cli;
pub mod error;
pub mod io;
pub mod ops;
pub mod zip;

pub use align::{AlignReport, Alignment, EntryInfo, EntryKind, VerifyReport};
pub use cli::Cli;
pub use error::{AlignError, ErrorClass};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use ops::{align_archive, is_archive_aligned, verify_archive};
pub use zip::{ZipArchive, ZipFileEntry, ZipWriter};
