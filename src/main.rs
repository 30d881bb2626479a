//! Main entry point for the zipread CLI application.
//!
//! Opens a ZIP archive, prints its directory tree or entry listing, and
//! extracts entries or whole subtrees on request.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use zipread::{
    CancelFlag, Cli, DirectoryEntry, ExtractOptions, LocalFileReader, Node, ZipArchive,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let reader = LocalFileReader::open(Path::new(&cli.archive))
        .with_context(|| format!("cannot open {}", cli.archive))?;
    let archive = ZipArchive::open(Arc::new(reader))
        .await
        .with_context(|| format!("cannot read {}", cli.archive))?;

    if let Some(ref path) = cli.extract {
        return extract(&archive, path, &cli).await;
    }

    if cli.list || cli.verbose {
        list_entries(&archive, cli.verbose);
        return Ok(());
    }

    print_tree(archive.root(), 0);
    if !archive.comment().is_empty() && !cli.is_quiet() {
        println!("\n{}", archive.comment());
    }

    Ok(())
}

/// Extract `path` into the destination directory from the CLI options.
///
/// Ctrl-C flips the cancellation flag; entries already in flight finish and
/// everything else is skipped. Any per-entry failure makes the exit status
/// non-zero after all siblings have been attempted.
async fn extract(archive: &ZipArchive<LocalFileReader>, path: &str, cli: &Cli) -> Result<()> {
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let opts = ExtractOptions {
        jobs: cli.jobs,
        cancel,
    };
    let summary = archive
        .extract_to(path, Path::new(&cli.dest), &opts)
        .await?;

    if !cli.is_quiet() {
        for name in &summary.written {
            println!("  extracted: {name}");
        }
    }
    for (name, err) in &summary.failures {
        eprintln!("failed: {name}: {err}");
    }

    if summary.cancelled {
        bail!(
            "extraction cancelled, {} entries not attempted",
            summary.skipped
        );
    }
    if !summary.failures.is_empty() {
        bail!(
            "{} of {} entries failed",
            summary.failures.len(),
            summary.failures.len() + summary.written.len()
        );
    }

    Ok(())
}

/// List archive entries, mirroring the central directory.
///
/// The short format prints one name per line. The verbose format adds
/// sizes, compression ratio, and the DOS timestamp, with a totals row at
/// the bottom. Directories synthesized from deeper entry paths carry no
/// header and appear only in the verbose format's name column.
fn list_entries(archive: &ZipArchive<LocalFileReader>, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    archive.root().walk(&mut |path, node| {
        let header = match node {
            Node::File(file) => Some(file.header()),
            Node::Directory(dir) => dir.meta(),
        };

        if !verbose {
            if header.is_some() {
                println!("{path}");
            }
            return;
        }

        let Some(header) = header else {
            println!("{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  {}", "", "", "", "", "", path);
            return;
        };

        let (year, month, day) = header.mod_date();
        let (hour, minute, _second) = header.mod_time();

        let ratio = if header.uncompressed_size > 0 {
            format!(
                "{:>4}%",
                100u64.saturating_sub(
                    header.compressed_size as u64 * 100 / header.uncompressed_size as u64
                )
            )
        } else {
            "  0%".to_string()
        };

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            header.uncompressed_size,
            header.compressed_size,
            ratio,
            year,
            month,
            day,
            hour,
            minute,
            path
        );

        if matches!(node, Node::File(_)) {
            total_uncompressed += header.uncompressed_size as u64;
            total_compressed += header.compressed_size as u64;
            file_count += 1;
        }
    });

    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = if total_uncompressed > 0 {
            format!(
                "{:>4}%",
                100u64.saturating_sub(total_compressed * 100 / total_uncompressed)
            )
        } else {
            "  0%".to_string()
        };
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );
    }
}

/// Print the archive's directory tree with two-space indentation.
fn print_tree(dir: &DirectoryEntry, depth: usize) {
    if depth == 0 {
        println!("{}", dir.name());
    }
    for file in dir.files() {
        println!("{}{}", "  ".repeat(depth + 1), file.name());
    }
    for child in dir.dirs() {
        println!("{}{}/", "  ".repeat(depth + 1), child.name());
        print_tree(child, depth + 1);
    }
}
