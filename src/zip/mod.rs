//! ZIP archive reading and extraction.
//!
//! ## Architecture
//!
//! The module is organized into four components:
//!
//! - [`records`]: fixed-layout binary records (trailer, central and local
//!   headers, data descriptor) and their parsers
//! - [`parser`]: locating the trailer and walking the central directory
//!   through positioned reads
//! - [`tree`]: the hierarchical directory/file view built from the central
//!   directory, and path resolution against it
//! - [`extractor`]: the archive handle tying it together, plus the
//!   decompress-verify-write pipeline
//!
//! ## ZIP format overview
//!
//! A ZIP file consists of:
//! 1. Local file headers, each followed by one entry's compressed data
//! 2. A Central Directory with metadata for all entries
//! 3. An End of Central Directory record (the trailer) at the end
//!
//! The central directory is the authoritative index: the whole hierarchy is
//! reconstructed from it without touching any local file data. Local
//! headers are only consulted when an entry is actually extracted.
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - Stored and DEFLATE entries only

mod extractor;
mod parser;
mod records;
#[cfg(test)]
mod testsupport;
mod tree;

pub use extractor::{CancelFlag, ExtractOptions, ExtractSummary, ZipArchive};
pub use parser::ZipParser;
pub use records::*;
pub use tree::{DirectoryEntry, FileEntry, Node};
