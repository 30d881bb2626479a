mod local;

pub use local::LocalFileReader;

use std::io;

use async_trait::async_trait;

/// Trait for random access reading from an archive's backing store.
///
/// Every read names its absolute offset, so there is no shared cursor to
/// coordinate: independent tasks can read through one `Arc`'d source
/// concurrently.
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer, returning the
    /// number of bytes read. A return of 0 means the offset is at or past
    /// the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Read at `offset` until `buf` is full, failing on end-of-source.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .read_at(offset + filled as u64, &mut buf[filled..])
                .await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "read past end of archive",
                ));
            }
            filled += n;
        }
        Ok(())
    }
}
