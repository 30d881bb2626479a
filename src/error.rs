use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while opening, resolving, or extracting a ZIP archive.
///
/// Structural failures (signature, size, trailer, and offset checks) are
/// fatal to the archive-open operation. Extraction failures are scoped to a
/// single entry and are collected per entry by
/// [`ZipArchive::extract_to`](crate::zip::ZipArchive::extract_to).
#[derive(Debug, Error)]
pub enum ZipError {
    /// A fixed record's magic constant did not match.
    #[error("bad record signature: expected {expected:#010x}, found {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    /// A fixed record was handed a buffer of the wrong length.
    #[error("bad record size: expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },

    /// The backward scan exhausted the archive tail without finding the
    /// end-of-central-directory magic.
    #[error("end of central directory record not found")]
    TrailerNotFound,

    /// The trailer references more than one disk.
    #[error("multi-disk archives are not supported")]
    UnsupportedMultiDisk,

    /// A cross-check between independent metadata fields failed.
    #[error("corrupt archive at offset {offset:#x}: {reason}")]
    Corrupt { offset: u64, reason: &'static str },

    /// The entry uses a compression method other than stored or deflate.
    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),

    /// Extraction was asked for a path that resolves to nothing.
    #[error("path not found in archive: {0}")]
    NotFound(String),

    /// A non-directory file sits where a destination directory is needed.
    #[error("destination {} exists and is not a directory", .0.display())]
    DestinationConflict(PathBuf),

    /// The entry name would escape the destination directory.
    #[error("entry name is not safe to extract: {0}")]
    UnsafeEntryName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Cancellation was observed before the entry was attempted.
    #[error("extraction cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ZipError>;
