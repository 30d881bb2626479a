//! Low-level ZIP archive parsing.
//!
//! ZIP archives are read from the end:
//! 1. Scan backward from the end of the file for the trailer (the End of
//!    Central Directory record), which a variable-length comment may trail.
//! 2. Read the Central Directory the trailer points at, one fixed header
//!    plus name/extra/comment tail per entry.
//! 3. At extraction time, read each entry's Local File Header to find the
//!    start of its compressed payload.
//!
//! Every read is a positioned read through [`ReadAt`]; the parser holds no
//! cursor, so a cloned parser can serve concurrent extraction workers.

use std::sync::Arc;

use log::debug;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::records::{
    CentralDirectoryFileHeader, DataDescriptor, EndOfCentralDirectory, LocalFileHeader,
};

/// Maximum trailer comment size allowed by the format (65535 bytes).
///
/// Bounds the backward scan: a trailer further from the end than this plus
/// the fixed record could not belong to a well-formed archive.
const MAX_COMMENT_LEN: u64 = u16::MAX as u64;

/// Low-level ZIP archive parser.
///
/// Wraps a shared reader and the archive's total length. Cloning is cheap
/// and shares the underlying reader.
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> Clone for ZipParser<R> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            size: self.size,
        }
    }
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Find, decode, and cross-validate the archive trailer.
    ///
    /// The trailer's start offset is not fixed because a comment of up to
    /// 65535 bytes may follow it, so the magic is searched for backward,
    /// one byte at a time, from the last offset a full record could start
    /// at. The archive tail is fetched once and the scan runs in memory.
    ///
    /// Returns the trailer (comment attached) and its absolute offset.
    ///
    /// # Errors
    ///
    /// * [`ZipError::TrailerNotFound`] if the scan exhausts the tail.
    /// * [`ZipError::UnsupportedMultiDisk`] if any disk field is nonzero or
    ///   the per-disk entry count disagrees with the total.
    /// * [`ZipError::Corrupt`] if the central directory does not end
    ///   exactly where the trailer begins, or the comment overruns the
    ///   file.
    pub async fn locate_trailer(&self) -> Result<(EndOfCentralDirectory, u64)> {
        const RECORD: u64 = EndOfCentralDirectory::SIZE as u64;

        if self.size < RECORD {
            return Err(ZipError::TrailerNotFound);
        }

        let window = (MAX_COMMENT_LEN + RECORD).min(self.size);
        let window_start = self.size - window;
        let mut tail = vec![0u8; window as usize];
        self.reader.read_exact_at(window_start, &mut tail).await?;

        let mut pos = self.size - RECORD;
        let trailer_pos = loop {
            let i = (pos - window_start) as usize;
            let magic = u32::from_le_bytes([tail[i], tail[i + 1], tail[i + 2], tail[i + 3]]);
            if magic == EndOfCentralDirectory::SIGNATURE {
                break pos;
            }
            if pos == window_start {
                return Err(ZipError::TrailerNotFound);
            }
            pos -= 1;
        };

        let record_start = (trailer_pos - window_start) as usize;
        let mut eocd =
            EndOfCentralDirectory::from_bytes(&tail[record_start..record_start + RECORD as usize])?;

        if trailer_pos + RECORD + eocd.comment_len as u64 > self.size {
            return Err(ZipError::Corrupt {
                offset: trailer_pos,
                reason: "trailer comment runs past the end of the file",
            });
        }
        if eocd.comment_len > 0 {
            let start = record_start + RECORD as usize;
            let bytes = &tail[start..start + eocd.comment_len as usize];
            eocd.comment = String::from_utf8_lossy(bytes).into_owned();
        }

        if eocd.disk_number != 0
            || eocd.cd_start_disk != 0
            || eocd.disk_entries != eocd.total_entries
        {
            return Err(ZipError::UnsupportedMultiDisk);
        }

        // The central directory must run right up to the trailer.
        if trailer_pos != eocd.cd_offset as u64 + eocd.cd_size as u64 {
            return Err(ZipError::Corrupt {
                offset: trailer_pos,
                reason: "central directory does not end at the trailer",
            });
        }

        debug!(
            "trailer at {trailer_pos:#x}: {} entries, central directory at {:#x}+{}",
            eocd.total_entries, eocd.cd_offset, eocd.cd_size
        );

        Ok((eocd, trailer_pos))
    }

    /// Walk the central directory, producing one header per entry.
    ///
    /// The whole directory region is read in one request, then exactly
    /// `eocd.total_entries` headers are decoded from it, each followed by
    /// its name, extra field, and comment. Overrunning the declared region
    /// is corruption.
    pub async fn read_central_directory(
        &self,
        eocd: &EndOfCentralDirectory,
    ) -> Result<Vec<CentralDirectoryFileHeader>> {
        let mut region = vec![0u8; eocd.cd_size as usize];
        self.reader
            .read_exact_at(eocd.cd_offset as u64, &mut region)
            .await?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut pos = 0usize;

        while entries.len() < eocd.total_entries as usize {
            let overrun = ZipError::Corrupt {
                offset: eocd.cd_offset as u64 + pos as u64,
                reason: "central directory overruns its declared size",
            };

            let fixed_end = pos + CentralDirectoryFileHeader::SIZE;
            if fixed_end > region.len() {
                return Err(overrun);
            }
            let mut header = CentralDirectoryFileHeader::from_bytes(&region[pos..fixed_end])?;
            pos = fixed_end;

            if pos + header.variable_len() > region.len() {
                return Err(overrun);
            }

            // Lossy conversion keeps non-UTF8 names addressable.
            let name_end = pos + header.name_len as usize;
            header.name = String::from_utf8_lossy(&region[pos..name_end]).into_owned();
            pos = name_end;

            let extra_end = pos + header.extra_len as usize;
            header.extra = region[pos..extra_end].to_vec();
            pos = extra_end;

            let comment_end = pos + header.comment_len as usize;
            header.comment = String::from_utf8_lossy(&region[pos..comment_end]).into_owned();
            pos = comment_end;

            entries.push(header);
        }

        debug!(
            "central directory: {} entries in {} bytes",
            entries.len(),
            pos
        );

        Ok(entries)
    }

    /// Read and validate the local header at `offset`, returning it with
    /// the absolute offset of the first payload byte.
    ///
    /// The local header's name and extra field may differ in length from
    /// the central directory's copy, so the payload offset can only be
    /// computed here.
    pub async fn read_local_header(&self, offset: u64) -> Result<(LocalFileHeader, u64)> {
        let mut buf = [0u8; LocalFileHeader::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        let header = LocalFileHeader::from_bytes(&buf)?;
        let data_offset = offset + LocalFileHeader::SIZE as u64 + header.variable_len();

        Ok((header, data_offset))
    }

    /// Read the data descriptor trailing an entry's payload at `offset`.
    ///
    /// Writers may emit the descriptor with or without its signature word;
    /// both layouts are accepted.
    pub async fn read_data_descriptor(&self, offset: u64) -> Result<DataDescriptor> {
        let mut sig = [0u8; 4];
        self.reader.read_exact_at(offset, &mut sig).await?;

        let body_offset = if u32::from_le_bytes(sig) == DataDescriptor::SIGNATURE {
            offset + 4
        } else {
            offset
        };

        let mut buf = [0u8; DataDescriptor::SIZE];
        self.reader.read_exact_at(body_offset, &mut buf).await?;
        DataDescriptor::from_bytes(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::testsupport::{EntrySpec, MemoryReader, build_archive};

    fn parser_for(data: Vec<u8>) -> ZipParser<MemoryReader> {
        ZipParser::new(Arc::new(MemoryReader::new(data)))
    }

    #[tokio::test]
    async fn trailer_position_matches_directory_extent() {
        let data = build_archive(&[EntrySpec::file("a.txt", b"test")], b"");
        let parser = parser_for(data);

        let (eocd, pos) = parser.locate_trailer().await.unwrap();
        assert_eq!(pos, eocd.cd_offset as u64 + eocd.cd_size as u64);
        assert_eq!(eocd.total_entries, 1);
        assert!(eocd.comment.is_empty());
    }

    #[tokio::test]
    async fn trailer_comment_is_read_back() {
        let data = build_archive(&[EntrySpec::file("a.txt", b"test")], b"built by tests");
        let parser = parser_for(data);

        let (eocd, _) = parser.locate_trailer().await.unwrap();
        assert_eq!(eocd.comment_len, 14);
        assert_eq!(eocd.comment, "built by tests");
    }

    #[tokio::test]
    async fn missing_trailer_is_reported() {
        let parser = parser_for(vec![0u8; 256]);
        let err = parser.locate_trailer().await.unwrap_err();
        assert!(matches!(err, ZipError::TrailerNotFound));

        let parser = parser_for(vec![0u8; 4]);
        let err = parser.locate_trailer().await.unwrap_err();
        assert!(matches!(err, ZipError::TrailerNotFound));
    }

    #[tokio::test]
    async fn multi_disk_trailer_is_rejected() {
        let mut data = build_archive(&[EntrySpec::file("a.txt", b"test")], b"");
        // No comment, so the fixed record occupies the last 22 bytes; the
        // disk number field sits 4 bytes in.
        let trailer = data.len() - 22;
        data[trailer + 4] = 1;

        let err = parser_for(data).locate_trailer().await.unwrap_err();
        assert!(matches!(err, ZipError::UnsupportedMultiDisk));
    }

    #[tokio::test]
    async fn mismatched_entry_counts_are_rejected() {
        let mut data = build_archive(&[EntrySpec::file("a.txt", b"test")], b"");
        let trailer = data.len() - 22;
        data[trailer + 10] = 9; // total entries != entries on this disk

        let err = parser_for(data).locate_trailer().await.unwrap_err();
        assert!(matches!(err, ZipError::UnsupportedMultiDisk));
    }

    #[tokio::test]
    async fn displaced_directory_offset_is_corrupt() {
        let mut data = build_archive(&[EntrySpec::file("a.txt", b"test")], b"");
        let trailer = data.len() - 22;
        data[trailer + 16] = data[trailer + 16].wrapping_add(1);

        let err = parser_for(data).locate_trailer().await.unwrap_err();
        assert!(matches!(err, ZipError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn entry_count_matches_trailer() {
        let data = build_archive(
            &[
                EntrySpec::file("a.txt", b"alpha"),
                EntrySpec::directory("docs/"),
                EntrySpec::deflated("docs/readme.md", b"# readme\n\nbody text"),
            ],
            b"",
        );
        let parser = parser_for(data);

        let (eocd, _) = parser.locate_trailer().await.unwrap();
        let entries = parser.read_central_directory(&eocd).await.unwrap();
        assert_eq!(entries.len(), eocd.total_entries as usize);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[1].name, "docs/");
        assert!(entries[1].is_directory());
        assert_eq!(entries[2].name, "docs/readme.md");
    }

    #[tokio::test]
    async fn corrupt_directory_signature_is_rejected() {
        let mut data = build_archive(&[EntrySpec::file("a.txt", b"test")], b"");
        let parser = parser_for(data.clone());
        let (eocd, _) = parser.locate_trailer().await.unwrap();

        data[eocd.cd_offset as usize] = 0xFF;
        let parser = parser_for(data);
        let err = parser.read_central_directory(&eocd).await.unwrap_err();
        assert!(matches!(err, ZipError::InvalidSignature { .. }));
    }

    #[tokio::test]
    async fn local_header_yields_payload_offset() {
        let data = build_archive(&[EntrySpec::file("a.txt", b"test")], b"");
        let parser = parser_for(data);

        let (eocd, _) = parser.locate_trailer().await.unwrap();
        let entries = parser.read_central_directory(&eocd).await.unwrap();

        let offset = entries[0].local_header_offset as u64;
        let (local, data_offset) = parser.read_local_header(offset).await.unwrap();
        assert_eq!(local.name_len, 5);
        assert_eq!(data_offset, offset + 30 + 5);

        let mut payload = vec![0u8; local.compressed_size as usize];
        parser
            .reader()
            .read_exact_at(data_offset, &mut payload)
            .await
            .unwrap();
        assert_eq!(payload, b"test");
    }
}
