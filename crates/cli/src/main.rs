//! # CLI - single-file archiver
//!
//! Runs exactly one operation against an archive file and exits.
//!
//! ## Usage
//!
//! ```text
//! archiver <ARCHIVE> -i, --input <FILE>     Append FILE to the archive
//! archiver <ARCHIVE> -e, --extract <NAME>   Extract NAME into the current
//!                                           directory and drop it from the archive
//! archiver <ARCHIVE> -s, --stat             List live entries
//! archiver <ARCHIVE> -c, --compact          Reclaim space held by removed entries
//! ```
//!
//! ## Configuration
//!
//! ```text
//! ARCHIVER_MAX_EXTRACT_BYTES   Largest extractable payload  (default: 1 GiB)
//! ARCHIVER_COMPACT_ON_EXTRACT  Compact after each extract   (default: "true")
//! ARCHIVER_SYNC                fsync archive writes         (default: "true")
//! RUST_LOG                     Log filter, overrides -v/-q
//! ```
//!
//! ## Exit status
//!
//! ```text
//! 0  success, or a reported not-found / size-limit condition
//! 1  I/O or archive format error
//! 2  usage error
//! ```

use anyhow::Result;
use archive::{path_to_name, Archive, ExtractOutcome};
use clap::{ArgGroup, Parser};
use config::ArchiveConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Store files with their metadata inside a single archive file.
#[derive(Parser, Debug)]
#[command(name = "archiver", version, long_about = None)]
#[command(group(
    ArgGroup::new("operation")
        .required(true)
        .args(["input", "extract", "stat", "compact"]),
))]
struct Cli {
    /// Archive file to operate on
    archive: PathBuf,

    /// Append FILE to the archive (created if absent)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Extract NAME into the current directory and remove it from the archive
    #[arg(short, long, value_name = "NAME")]
    extract: Option<OsString>,

    /// List the live contents of the archive
    #[arg(short, long)]
    stat: bool,

    /// Rewrite the archive without removed entries
    #[arg(short, long)]
    compact: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// The single operation requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operation {
    Append(PathBuf),
    Extract(OsString),
    Stat,
    Compact,
}

impl Cli {
    fn operation(&self) -> Operation {
        if let Some(input) = &self.input {
            Operation::Append(input.clone())
        } else if let Some(name) = &self.extract {
            Operation::Extract(name.clone())
        } else if self.compact {
            Operation::Compact
        } else {
            Operation::Stat
        }
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = ArchiveConfig::from_env()?;
    let archive = Archive::new(&cli.archive, config);
    let operation = cli.operation();
    debug!(archive = %archive.path().display(), ?operation, config = ?archive.config(), "running");

    match operation {
        Operation::Append(input) => {
            let header = archive.append(&input)?;
            println!(
                "added '{}' ({} bytes) to '{}'",
                header.name_lossy(),
                header.size(),
                archive.path().display()
            );
        }
        Operation::Extract(name) => {
            let shown = name.to_string_lossy();
            match archive.extract(&path_to_name(Path::new(&name)), ".")? {
                ExtractOutcome::Extracted { path, size, .. } => {
                    println!(
                        "extracted '{}' ({} bytes) to {} and removed it from '{}'",
                        shown,
                        size,
                        path.display(),
                        archive.path().display()
                    );
                }
                ExtractOutcome::NotFound => {
                    println!("'{}' not found in '{}'", shown, archive.path().display());
                }
                ExtractOutcome::TooLarge { size, limit } => {
                    println!(
                        "'{}' is too large to extract ({} bytes, limit {})",
                        shown, size, limit
                    );
                }
            }
        }
        Operation::Stat => print_listing(&archive)?,
        Operation::Compact => {
            let stats = archive.compact()?;
            println!(
                "compacted '{}': kept {}, dropped {}, reclaimed {} bytes",
                archive.path().display(),
                stats.kept,
                stats.dropped,
                stats.reclaimed()
            );
        }
    }

    Ok(())
}

const RULE: &str = "------------------------------------------------------------------";

fn print_listing(archive: &Archive) -> Result<()> {
    println!("Contents of '{}':", archive.path().display());
    println!("{}", RULE);
    println!("{:<30} {:>14}  {:<19}", "NAME", "SIZE (bytes)", "MODIFIED");
    println!("{}", RULE);

    for entry in archive.list()? {
        let entry = entry?;
        println!(
            "{:<30} {:>14}  {:<19}",
            entry.name_lossy(),
            entry.size,
            entry.modified_display()
        );
    }

    let stats = archive.stats()?;
    println!("{}", RULE);
    println!(
        "{} live, {} removed ({} bytes reclaimable by --compact)",
        stats.live, stats.tombstoned, stats.dead_bytes
    );
    Ok(())
}
