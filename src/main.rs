//! ar-mrzip — the archive tool.
//!
//! Creation writes the archive to standard output; extraction and listing
//! read it from standard input.  The archive engine itself never touches a
//! compressor — pipe the output through one (and through `rs-mrzip` for
//! media hardening) as the job requires.

use clap::{ArgGroup, Parser};
use regex::Regex;
use std::error::Error;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use arzip::container::{self, Clobber, ExtractOptions, PathRewrite};
use arzip::{dedup, hasher, order, scan};

#[derive(Parser)]
#[command(
    name = "ar-mrzip",
    version,
    about = "Content-addressed, similarity-ordered archiver"
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["extract", "create", "list", "dry_create"])
))]
#[command(group(ArgGroup::new("clobber").args(["force", "skip"])))]
struct Cli {
    /// Extract an archive read from standard input
    #[arg(short = 'x', long)]
    extract: bool,

    /// Create an archive on standard output from DIR, or from a path list
    /// on standard input when DIR is omitted
    #[arg(short = 'c', long)]
    create: bool,

    /// List the contents of an archive read from standard input
    #[arg(short = 'l', long)]
    list: bool,

    /// Enumerate and hash DIR like -c, but write nothing
    #[arg(short = 'd', long = "dry-create", value_name = "DIR")]
    dry_create: Option<PathBuf>,

    /// Only process files whose full path matches REGEX
    #[arg(short = 'r', long, value_name = "REGEX")]
    regex: Option<String>,

    /// Rewrite stored paths during creation; SPEC is from/to with `/`
    /// escaped by `\`
    #[arg(short = 't', long, value_name = "SPEC")]
    translate: Option<String>,

    /// Change the working directory before doing anything else
    #[arg(short = 'D', long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Progress reporting on standard error
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Overwrite existing files on extraction without a warning
    #[arg(short = 'f', long)]
    force: bool,

    /// Skip existing files on extraction
    #[arg(short = 's', long)]
    skip: bool,

    /// Source directory for -c
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("ar-mrzip: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)?;
    }
    let selector = cli.regex.as_deref().map(Regex::new).transpose()?;

    if cli.extract {
        let clobber = if cli.force {
            Clobber::Force
        } else if cli.skip {
            Clobber::Skip
        } else {
            Clobber::Warn
        };
        let mut input = io::stdin().lock();
        let records = container::read_metadata(&mut input)?;
        container::extract(
            &mut input,
            records,
            &ExtractOptions {
                selector: selector.as_ref(),
                clobber,
                verbose: cli.verbose,
            },
        )?;
    } else if cli.list {
        let mut input = io::stdin().lock();
        let records = container::read_metadata(&mut input)?;
        let stdout = io::stdout().lock();
        let mut out = BufWriter::new(stdout);
        container::list_records(&mut out, &records, selector.as_ref(), cli.verbose)?;
        out.flush()?;
    } else if cli.create {
        let rewrite = cli.translate.as_deref().map(PathRewrite::parse).transpose()?;
        let (base, mut records) = enumerate(cli.dir.as_deref(), selector.as_ref(), cli.verbose)?;

        hasher::hash_records(base.as_deref(), &mut records, cli.verbose)?;
        if cli.verbose {
            eprintln!("* Ordering files...");
        }
        order::order_by_similarity(&mut records, cli.verbose);
        let stats = dedup::assign_offsets(&mut records);
        if cli.verbose {
            eprintln!(
                "{} KB / {} KB deduped",
                stats.duplicate_bytes / 1024,
                (stats.body_size + stats.duplicate_bytes) / 1024
            );
        }

        let stdout = io::stdout().lock();
        let mut out = BufWriter::new(stdout);
        container::write_archive(
            &mut out,
            base.as_deref(),
            &records,
            rewrite.as_ref(),
            cli.verbose,
        )?;
        out.flush()?;
    } else if let Some(dir) = cli.dry_create.as_deref() {
        let (base, mut records) = enumerate(Some(dir), selector.as_ref(), cli.verbose)?;
        hasher::hash_records(base.as_deref(), &mut records, cli.verbose)?;
        order::order_by_similarity(&mut records, cli.verbose);
        let stats = dedup::assign_offsets(&mut records);
        eprintln!(
            "{} files, {} KB total, {} KB after deduplication",
            records.len(),
            (stats.body_size + stats.duplicate_bytes) / 1024,
            stats.body_size / 1024
        );
    }

    Ok(())
}

/// Directory walk when a source directory is given, path list on standard
/// input otherwise.
fn enumerate(
    dir: Option<&std::path::Path>,
    selector: Option<&Regex>,
    verbose: bool,
) -> io::Result<(Option<PathBuf>, Vec<arzip::FileRecord>)> {
    match dir {
        Some(d) => {
            if verbose {
                eprintln!("Creating an archive out of {}.", d.display());
                eprintln!("* Scanning files...");
            }
            let (base, records) = scan::scan_directory(d, selector)?;
            if verbose {
                eprintln!("* Computing checksums...");
            }
            Ok((Some(base), records))
        }
        None => {
            if verbose {
                eprintln!("* Reading the file list...");
            }
            let records = scan::scan_list(io::stdin().lock(), selector)?;
            if verbose {
                eprintln!("* Computing checksums...");
            }
            Ok((None, records))
        }
    }
}
