//! Deterministic archive builder and in-memory reader for tests.
//!
//! Emits classic Zip32 archives byte by byte with fixed timestamps, so
//! offsets are stable and tests can patch known positions.

use std::io::Write;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::io::ReadAt;

use super::records::GP_FLAG_DATA_DESCRIPTOR;

/// One entry to place in a built archive.
pub struct EntrySpec {
    name: &'static str,
    payload: &'static [u8],
    deflate: bool,
    data_descriptor: bool,
    crc_override: Option<u32>,
    method_override: Option<u16>,
}

impl EntrySpec {
    pub fn file(name: &'static str, payload: &'static [u8]) -> Self {
        Self {
            name,
            payload,
            deflate: false,
            data_descriptor: false,
            crc_override: None,
            method_override: None,
        }
    }

    pub fn deflated(name: &'static str, payload: &'static [u8]) -> Self {
        Self {
            deflate: true,
            ..Self::file(name, payload)
        }
    }

    /// An explicit directory entry; `name` should end with `/`.
    pub fn directory(name: &'static str) -> Self {
        Self::file(name, b"")
    }

    /// Zero the local header's CRC and sizes and emit a signed data
    /// descriptor after the payload instead.
    pub fn with_data_descriptor(mut self) -> Self {
        self.data_descriptor = true;
        self
    }

    /// Record a wrong CRC in both headers.
    pub fn with_crc(mut self, crc: u32) -> Self {
        self.crc_override = Some(crc);
        self
    }

    /// Record an arbitrary compression method while storing the payload
    /// verbatim.
    pub fn with_method(mut self, method: u16) -> Self {
        self.method_override = Some(method);
        self
    }
}

/// Build archive bytes: local records and payloads, then the central
/// directory, then the trailer with `comment`.
pub fn build_archive(entries: &[EntrySpec], comment: &[u8]) -> Vec<u8> {
    fn u16le(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }
    fn u32le(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    let mut out = Vec::new();
    let mut cd = Vec::new();

    for entry in entries {
        let name = entry.name.as_bytes();
        let method = entry
            .method_override
            .unwrap_or(if entry.deflate { 8 } else { 0 });
        let flags: u16 = if entry.data_descriptor {
            GP_FLAG_DATA_DESCRIPTOR
        } else {
            0
        };

        let data = if entry.deflate {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(entry.payload).unwrap();
            encoder.finish().unwrap()
        } else {
            entry.payload.to_vec()
        };
        let crc = entry
            .crc_override
            .unwrap_or_else(|| crc32fast::hash(entry.payload));

        let local_off = out.len() as u32;

        out.extend_from_slice(&u32le(0x04034b50));
        out.extend_from_slice(&u16le(20));
        out.extend_from_slice(&u16le(flags));
        out.extend_from_slice(&u16le(method));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(&u16le(0));
        if entry.data_descriptor {
            out.extend_from_slice(&u32le(0));
            out.extend_from_slice(&u32le(0));
            out.extend_from_slice(&u32le(0));
        } else {
            out.extend_from_slice(&u32le(crc));
            out.extend_from_slice(&u32le(data.len() as u32));
            out.extend_from_slice(&u32le(entry.payload.len() as u32));
        }
        out.extend_from_slice(&u16le(name.len() as u16));
        out.extend_from_slice(&u16le(0));
        out.extend_from_slice(name);
        out.extend_from_slice(&data);

        if entry.data_descriptor {
            out.extend_from_slice(&u32le(0x08074b50));
            out.extend_from_slice(&u32le(crc));
            out.extend_from_slice(&u32le(data.len() as u32));
            out.extend_from_slice(&u32le(entry.payload.len() as u32));
        }

        cd.extend_from_slice(&u32le(0x02014b50));
        cd.extend_from_slice(&u16le(20));
        cd.extend_from_slice(&u16le(20));
        cd.extend_from_slice(&u16le(flags));
        cd.extend_from_slice(&u16le(method));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u32le(crc));
        cd.extend_from_slice(&u32le(data.len() as u32));
        cd.extend_from_slice(&u32le(entry.payload.len() as u32));
        cd.extend_from_slice(&u16le(name.len() as u16));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u16le(0));
        cd.extend_from_slice(&u32le(0));
        cd.extend_from_slice(&u32le(local_off));
        cd.extend_from_slice(name);
    }

    let cd_start = out.len() as u32;
    let cd_size = cd.len() as u32;
    out.extend_from_slice(&cd);

    out.extend_from_slice(&u32le(0x06054b50));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(0));
    out.extend_from_slice(&u16le(entries.len() as u16));
    out.extend_from_slice(&u16le(entries.len() as u16));
    out.extend_from_slice(&u32le(cd_size));
    out.extend_from_slice(&u32le(cd_start));
    out.extend_from_slice(&u16le(comment.len() as u16));
    out.extend_from_slice(comment);

    out
}

/// In-memory [`ReadAt`] source.
pub struct MemoryReader(Vec<u8>);

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        if offset >= self.0.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.0.len() - start);
        buf[..n].copy_from_slice(&self.0[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.0.len() as u64
    }
}
