//! # zipread
//!
//! A ZIP archive reader and extractor driven by central directory metadata.
//!
//! This library locates an archive's trailer by backward scan, parses the
//! central directory it points at, and rebuilds the archive's directory
//! hierarchy from that metadata alone, without scanning any local file
//! data. Paths are resolved against the in-memory tree; extraction
//! decompresses entries (stored or deflate), verifies their CRC-32, and
//! writes them under a destination directory.
//!
//! ## Features
//!
//! - Trailer location tolerant of trailing archive comments
//! - Strict cross-validation of trailer and central directory metadata
//! - Path resolution with separator normalization
//! - Parallel extraction over a shared read-only handle
//! - Cooperative cancellation and per-entry failure reporting
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use zipread::{ExtractOptions, LocalFileReader, ZipArchive};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::open(Path::new("archive.zip"))?);
//!     let archive = ZipArchive::open(reader).await?;
//!
//!     if let Some(node) = archive.resolve("docs/readme.md")? {
//!         println!("found {}", node.name());
//!     }
//!
//!     let summary = archive
//!         .extract_to(".", Path::new("extracted"), &ExtractOptions::default())
//!         .await?;
//!     println!("{} files written", summary.written.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::ZipError;
pub use io::{LocalFileReader, ReadAt};
pub use zip::{
    CancelFlag, DirectoryEntry, ExtractOptions, ExtractSummary, FileEntry, Node, ZipArchive,
};
