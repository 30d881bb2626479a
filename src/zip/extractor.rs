use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use flate2::read::DeflateDecoder;
use log::{debug, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::records::{CentralDirectoryFileHeader, CompressionMethod, EndOfCentralDirectory};
use super::tree::{DirectoryEntry, Node};

/// Cooperative cancellation shared between a caller and extraction workers.
///
/// Checked between entries, never inside one, so every file is either fully
/// written or never begun.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Knobs for a single extraction call.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Concurrent extraction workers. Each worker issues its own positioned
    /// reads against the shared reader.
    pub jobs: usize,
    pub cancel: CancelFlag,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            cancel: CancelFlag::new(),
        }
    }
}

/// Outcome of an extraction call.
///
/// A failed entry never aborts its siblings; it is recorded here and the
/// rest of the subtree is still attempted.
#[derive(Debug, Default)]
pub struct ExtractSummary {
    /// Archive names written to disk.
    pub written: Vec<String>,
    /// Entries that failed, each with the error that stopped it.
    pub failures: Vec<(String, ZipError)>,
    /// Entries not attempted because cancellation was observed first.
    pub skipped: usize,
    pub cancelled: bool,
}

impl ExtractSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// One file queued for extraction.
struct FileJob {
    dest: PathBuf,
    header: CentralDirectoryFileHeader,
}

/// An open ZIP archive: validated trailer, parsed central directory, and
/// the entry tree built from it.
///
/// All metadata is parsed up front by [`ZipArchive::open`]; afterwards the
/// tree is immutable and extraction only issues positioned reads, so one
/// archive can serve many tasks concurrently.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    eocd: EndOfCentralDirectory,
    root: DirectoryEntry,
    entry_count: usize,
}

impl<R: ReadAt + 'static> ZipArchive<R> {
    /// Open an archive: locate the trailer, walk the central directory,
    /// and build the entry tree.
    ///
    /// Any structural failure aborts the open; there is no partial archive.
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let (eocd, _) = parser.locate_trailer().await?;
        let entries = parser.read_central_directory(&eocd).await?;
        let entry_count = entries.len();
        let root = DirectoryEntry::build(entries);

        Ok(Self {
            parser,
            eocd,
            root,
            entry_count,
        })
    }

    /// Archive comment from the trailer, empty if none was stored.
    pub fn comment(&self) -> &str {
        &self.eocd.comment
    }

    pub fn root(&self) -> &DirectoryEntry {
        &self.root
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Resolve an archive path to a tree node. A miss is `Ok(None)`, not
    /// an error.
    pub fn resolve(&self, path: &str) -> Result<Option<Node<'_>>> {
        self.root.resolve(path)
    }

    /// Extract the entry at `path` into `dest`.
    ///
    /// A file node is written as `dest/<name>`. A directory node is
    /// mirrored under `dest/<name>` (under `dest` itself when the node is
    /// the root), with implied directories created along the way. Files
    /// are extracted by a pool of `opts.jobs` workers; an existing file at
    /// a target path is overwritten.
    ///
    /// Fails up front with [`ZipError::NotFound`] when `path` resolves to
    /// nothing and [`ZipError::DestinationConflict`] when `dest` exists
    /// but is not a directory. Per-entry failures are collected in the
    /// returned [`ExtractSummary`] instead of aborting the call.
    pub async fn extract_to(
        &self,
        path: &str,
        dest: &Path,
        opts: &ExtractOptions,
    ) -> Result<ExtractSummary> {
        let node = self
            .resolve(path)?
            .ok_or_else(|| ZipError::NotFound(path.to_string()))?;

        ensure_directory(dest).await?;

        let mut summary = ExtractSummary::default();
        let mut dirs = Vec::new();
        let mut jobs = Vec::new();

        match node {
            Node::File(file) => {
                jobs.push(FileJob {
                    dest: dest.join(file.name()),
                    header: file.header().clone(),
                });
            }
            Node::Directory(dir) => {
                let base = if dir.name() == "." {
                    dest.to_path_buf()
                } else {
                    dest.join(dir.name())
                };
                collect_jobs(dir, &base, &mut dirs, &mut jobs, &mut summary);
            }
        }

        for dir in &dirs {
            ensure_directory(dir).await?;
        }

        debug!(
            "extracting {} files into {} ({} workers)",
            jobs.len(),
            dest.display(),
            opts.jobs.max(1)
        );

        let semaphore = Arc::new(Semaphore::new(opts.jobs.max(1)));
        let mut tasks = JoinSet::new();

        for job in jobs {
            if opts.cancel.is_cancelled() {
                summary.cancelled = true;
                summary.skipped += 1;
                continue;
            }
            if let Err(err) = check_entry_name(&job.header.name) {
                summary.failures.push((job.header.name.clone(), err));
                continue;
            }

            let semaphore = semaphore.clone();
            let cancel = opts.cancel.clone();
            let parser = self.parser.clone();
            tasks.spawn(async move {
                let name = job.header.name.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (name, Err(ZipError::Cancelled)),
                };
                if cancel.is_cancelled() {
                    return (name, Err(ZipError::Cancelled));
                }
                let result = extract_entry(parser, job.header, job.dest).await;
                (name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => summary.written.push(name),
                Ok((_, Err(ZipError::Cancelled))) => {
                    summary.cancelled = true;
                    summary.skipped += 1;
                }
                Ok((name, Err(err))) => {
                    warn!("failed to extract {name}: {err}");
                    summary.failures.push((name, err));
                }
                Err(join_err) => {
                    summary.failures.push((
                        "worker".to_string(),
                        ZipError::Io(std::io::Error::other(join_err)),
                    ));
                }
            }
        }

        Ok(summary)
    }
}

/// Gather the directory skeleton and file jobs beneath `dir`.
///
/// Subtrees whose directory name cannot be mapped to a single safe path
/// segment are recorded as failures and skipped whole.
fn collect_jobs(
    dir: &DirectoryEntry,
    base: &Path,
    dirs: &mut Vec<PathBuf>,
    jobs: &mut Vec<FileJob>,
    summary: &mut ExtractSummary,
) {
    dirs.push(base.to_path_buf());

    for file in dir.files() {
        jobs.push(FileJob {
            dest: base.join(file.name()),
            header: file.header().clone(),
        });
    }

    for child in dir.dirs() {
        if !safe_segment(child.name()) {
            summary.failures.push((
                child.name().to_string(),
                ZipError::UnsafeEntryName(child.name().to_string()),
            ));
            continue;
        }
        collect_jobs(child, &base.join(child.name()), dirs, jobs, summary);
    }
}

/// Idempotently create `path` as a directory, ancestors included.
async fn ensure_directory(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ZipError::DestinationConflict(path.to_path_buf())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(path).await?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Reject entry names that could escape the destination directory: parent
/// or root components, Windows prefixes, and backslash separators.
fn check_entry_name(name: &str) -> Result<()> {
    if name.contains('\\') {
        return Err(ZipError::UnsafeEntryName(name.to_string()));
    }
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(ZipError::UnsafeEntryName(name.to_string())),
        }
    }
    Ok(())
}

/// True when `name` is usable as one relative path segment.
fn safe_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}

/// Extract one entry: local header, payload, decompress, verify, write.
async fn extract_entry<R: ReadAt>(
    parser: ZipParser<R>,
    header: CentralDirectoryFileHeader,
    dest: PathBuf,
) -> Result<()> {
    // Base offset is 0 for the single-disk, non-self-extracting archives
    // in scope, so the central directory's relative offset is absolute.
    let offset = header.local_header_offset as u64;
    let (local, data_offset) = parser.read_local_header(offset).await?;

    let mut payload = vec![0u8; header.compressed_size as usize];
    if !payload.is_empty() {
        parser
            .reader()
            .read_exact_at(data_offset, &mut payload)
            .await?;
    }

    // Flag bit 3: the local header was written before the sizes were
    // known; the descriptor after the payload is authoritative.
    let (expected_crc, expected_len) = if local.has_data_descriptor() {
        let descriptor = parser
            .read_data_descriptor(data_offset + payload.len() as u64)
            .await?;
        if descriptor.compressed_size != header.compressed_size {
            return Err(ZipError::Corrupt {
                offset: data_offset,
                reason: "data descriptor disagrees with the central directory",
            });
        }
        (descriptor.crc32, descriptor.uncompressed_size)
    } else {
        (header.crc32, header.uncompressed_size)
    };

    let output = match header.compression() {
        CompressionMethod::Stored => payload,
        CompressionMethod::Deflate => {
            let mut decoder = DeflateDecoder::new(payload.as_slice());
            let mut inflated = Vec::with_capacity(expected_len as usize);
            decoder
                .read_to_end(&mut inflated)
                .map_err(|_| ZipError::Corrupt {
                    offset: data_offset,
                    reason: "deflate stream is invalid",
                })?;
            inflated
        }
        CompressionMethod::Unknown(method) => {
            return Err(ZipError::UnsupportedCompression(method));
        }
    };

    if output.len() as u64 != expected_len as u64 {
        return Err(ZipError::Corrupt {
            offset: data_offset,
            reason: "decompressed size disagrees with the header",
        });
    }
    if crc32fast::hash(&output) != expected_crc {
        return Err(ZipError::Corrupt {
            offset: data_offset,
            reason: "CRC-32 mismatch",
        });
    }

    let mut file = fs::File::create(&dest).await?;
    file.write_all(&output).await?;
    file.flush().await?;

    Ok(())
}
