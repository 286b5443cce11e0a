//! Container writer / reader — the ARZIP on-disk format.
//!
//! # On-disk layout
//!
//! ```text
//! +----------------------------------------------------------+
//! | 5 bytes : magic "ARZIP"                                  |
//! | 8 bytes : metadata_size (big-endian u64)                 |
//! | metadata_size bytes : concatenated file records          |
//! | body region : concatenated unique file bodies            |
//! +----------------------------------------------------------+
//! ```
//!
//! Record layout is documented in `record.rs`.  Bodies appear in the order
//! their records were written; a record whose checksum duplicates an
//! earlier one contributes no body bytes, so the distinct `(offset, size)`
//! pairs tile the body region contiguously from offset 0.
//!
//! # Writer
//! [`write_archive`] emits the magic, the metadata table (after the
//! optional `-t` path rewrite — the rewritten bytes are what appears on
//! the wire), then streams each unique body.  A source file that vanished
//! after the header was committed is fatal; one that was merely modified
//! gets a warning and is written anyway.
//!
//! # Reader
//! [`read_metadata`] validates the magic and parses records until exactly
//! `metadata_size` bytes are consumed; every stored path must be relative
//! and lexically normalized.  [`extract`] then sorts by archive offset and
//! streams each body once, teeing it into every member of a duplicate
//! group, verifying the group's BLAKE2b digest, and restoring mtimes.
//! Output paths are fenced twice: lexically at parse time and again by
//! comparing the canonicalized parent against the working directory.

use regex::Regex;
use std::env;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use thiserror::Error;

use crate::record::{validate_stored_path, FileRecord, RecordError, CHECKSUM_LEN};
use crate::scan;
use crate::wire;

/// What to do when an extraction target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clobber {
    /// Overwrite and say so on stderr (the default).
    Warn,
    /// Overwrite silently (`-f`).
    Force,
    /// Leave the existing file alone (`-s`).
    Skip,
}

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Invalid header.")]
    InvalidHeader,
    #[error("metadata does not line up: declared {declared} bytes, records end at {consumed}")]
    MetadataMisaligned { declared: u64, consumed: u64 },
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("archive offsets do not tile the body region: offset {offset} with cursor at {cursor}")]
    OffsetMismatch { offset: u64, cursor: u64 },
    #[error("File {0} does not exist anymore, the header has been written already.")]
    SourceVanished(String),
    #[error("Checksum mismatch for {0}")]
    ChecksumMismatch(String),
    #[error("path escapes the working directory: {0}")]
    PathEscapes(String),
    #[error("invalid translate specification: {0}")]
    BadRewrite(String),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Path rewriting (-t) ──────────────────────────────────────────────────────

/// A `from/to` rewrite applied to stored paths during creation.
///
/// The separator `/` is escaped as `\/` (and `\` as `\\`) inside either
/// component; exactly two components are required.  `from` is a regex and
/// `to` its replacement, so capture groups work (`$1`, `${name}`).
#[derive(Debug)]
pub struct PathRewrite {
    pattern:     Regex,
    replacement: String,
}

impl PathRewrite {
    pub fn parse(spec: &str) -> Result<Self, ContainerError> {
        let mut parts = vec![String::new()];
        let mut chars = spec.chars();
        while let Some(ch) = chars.next() {
            match ch {
                // `\` unescapes only the separator and itself; every other
                // escape (`\w`, `\.`, …) belongs to the regex and passes
                // through untouched.
                '\\' => match chars.next() {
                    Some(escaped @ ('/' | '\\')) => {
                        parts.last_mut().unwrap().push(escaped)
                    }
                    Some(other) => {
                        let part = parts.last_mut().unwrap();
                        part.push('\\');
                        part.push(other);
                    }
                    None => {
                        return Err(ContainerError::BadRewrite(
                            "trailing escape character".into(),
                        ))
                    }
                },
                '/' => parts.push(String::new()),
                other => parts.last_mut().unwrap().push(other),
            }
        }
        let [from, to]: [String; 2] = parts.try_into().map_err(|_| {
            ContainerError::BadRewrite("expected exactly two /-separated components".into())
        })?;
        Ok(Self {
            pattern:     Regex::new(&from)?,
            replacement: to,
        })
    }

    pub fn apply(&self, path: &str) -> String {
        self.pattern
            .replace_all(path, self.replacement.as_str())
            .into_owned()
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Serialize the archive: magic, metadata table, then the unique bodies.
///
/// `records` must already be ordered and offset-assigned.  `base` is the
/// canonical base directory (directory mode) or `None` (list mode).
pub fn write_archive<W: Write>(
    out: &mut W,
    base: Option<&Path>,
    records: &[FileRecord],
    rewrite: Option<&PathRewrite>,
    verbose: bool,
) -> Result<(), ContainerError> {
    wire::write_magic(out)?;

    // The stored paths on the wire are the rewritten ones; body streaming
    // below keeps using the original paths to find the sources.
    let wire_records: Vec<FileRecord> = match rewrite {
        Some(rw) => records
            .iter()
            .map(|r| {
                let rewritten = rw.apply(&r.path);
                validate_stored_path(&rewritten)?;
                Ok(r.with_path(rewritten))
            })
            .collect::<Result<_, RecordError>>()?,
        None => records.to_vec(),
    };

    let metadata_size: u64 = wire_records.iter().map(|r| r.wire_len()).sum();
    wire::write_u64(out, metadata_size)?;

    if verbose {
        eprintln!("* Writing metadata ({} KB)...", metadata_size / 1024);
    }
    for record in &wire_records {
        record.write_to(out)?;
    }

    if verbose {
        eprintln!("* Writing the archive...");
    }
    let body_size: u64 = {
        // Records with a duplicate checksum contribute nothing.
        let mut cursor_probe = 0u64;
        for r in records {
            if r.archive_offset >= cursor_probe {
                cursor_probe += r.size;
            }
        }
        cursor_probe
    };

    let mut cursor = 0u64;
    let mut since_report = 0u64;
    let mut buf = [0u8; 4096];
    for record in records {
        if record.archive_offset < cursor {
            // Duplicate of an earlier record; its body is already out.
            continue;
        }
        if record.archive_offset != cursor {
            return Err(ContainerError::OffsetMismatch {
                offset: record.archive_offset,
                cursor,
            });
        }

        let path = source_path(base, &record.path);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ContainerError::SourceVanished(record.path.clone()))
            }
            Err(e) => {
                return Err(io::Error::new(
                    e.kind(),
                    format!("open({}) failed: {e}", path.display()),
                )
                .into())
            }
        };
        if scan::mtime_of(&file.metadata()?) != record.mtime {
            eprintln!(
                "warning: file {} has been modified since the archive was created.",
                record.path
            );
        }

        let mut left = record.size;
        while left > 0 {
            let n = left.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..n]).map_err(|e| {
                io::Error::new(e.kind(), format!("read({}) failed: {e}", path.display()))
            })?;
            out.write_all(&buf[..n])?;
            cursor += n as u64;
            left -= n as u64;
            since_report += n as u64;
        }

        if verbose && since_report > 100_000_000 {
            eprint!("\x1b[2K\r{} KB / {} KB written", cursor / 1024, body_size / 1024);
            since_report = 0;
        }
    }

    out.flush()?;
    if verbose {
        eprintln!("* Done.");
    }
    Ok(())
}

fn source_path(base: Option<&Path>, stored: &str) -> PathBuf {
    match base {
        Some(b) => b.join(stored),
        None => PathBuf::from(stored),
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Validate the magic and parse the metadata table.
///
/// Records are returned in wire order; paths have already passed the
/// lexical checks (relative, normalized, UTF-8).
pub fn read_metadata<R: Read>(input: &mut R) -> Result<Vec<FileRecord>, ContainerError> {
    if !wire::check_magic(input)? {
        return Err(ContainerError::InvalidHeader);
    }

    let metadata_size = wire::read_u64(input)?;
    let mut consumed = 0u64;
    let mut records = Vec::new();
    while consumed < metadata_size {
        let record = FileRecord::read_from(input)?;
        consumed += record.wire_len();
        records.push(record);
    }
    if consumed != metadata_size {
        return Err(ContainerError::MetadataMisaligned {
            declared: metadata_size,
            consumed,
        });
    }
    Ok(records)
}

/// Extraction switches.
pub struct ExtractOptions<'a> {
    /// Only records matching this pattern produce output files; the body
    /// bytes of everything else are still consumed (the stream has no
    /// seek) and still verified.
    pub selector: Option<&'a Regex>,
    pub clobber:  Clobber,
    pub verbose:  bool,
}

/// Stream the body region, recreating every selected file.
///
/// Records are emitted in ascending offset order; adjacent records with
/// the same offset and checksum form a duplicate group whose single body
/// is teed into every open target.  A checksum mismatch aborts after the
/// offending group's files are already on disk.
pub fn extract<R: Read>(
    input: &mut R,
    mut records: Vec<FileRecord>,
    opts: &ExtractOptions,
) -> Result<(), ContainerError> {
    // Zero-length records share their offset with the next real body (the
    // dedup cursor does not advance past them), so groups are keyed on
    // offset AND checksum, and empty groups sort first at each offset.
    records.sort_by(|a, b| {
        (a.archive_offset, a.size, a.checksum).cmp(&(b.archive_offset, b.size, b.checksum))
    });

    let mut cursor = 0u64;
    let mut buf = [0u8; 4096];
    let mut i = 0;
    while i < records.len() {
        let mut j = i + 1;
        while j < records.len()
            && records[j].archive_offset == records[i].archive_offset
            && records[j].checksum == records[i].checksum
        {
            j += 1;
        }
        let group = &records[i..j];
        if group[0].archive_offset != cursor {
            return Err(ContainerError::OffsetMismatch {
                offset: group[0].archive_offset,
                cursor,
            });
        }
        let size = group[0].size;

        let mut outputs: Vec<(File, &FileRecord)> = Vec::new();
        for record in group {
            if let Some(re) = opts.selector {
                if !re.is_match(&record.path) {
                    continue;
                }
            }
            let path = Path::new(&record.path);
            if path.exists() {
                match opts.clobber {
                    Clobber::Skip => {
                        eprintln!("File {} already exists, skipping.", record.path);
                        continue;
                    }
                    Clobber::Warn => {
                        eprintln!("File {} already exists, overwriting.", record.path)
                    }
                    Clobber::Force => {}
                }
            }
            if let Some(parent) = nonempty_parent(path) {
                fs::create_dir_all(parent)?;
            }
            guard_parent(path)?;
            let file = File::create(path).map_err(|e| {
                io::Error::new(e.kind(), format!("open({}) failed: {e}", record.path))
            })?;
            outputs.push((file, record));
        }

        // One pass over the body: hash always, write to whoever is open.
        let mut hash = blake2b_simd::Params::new()
            .hash_length(CHECKSUM_LEN)
            .to_state();
        let mut left = size;
        while left > 0 {
            let n = left.min(buf.len() as u64) as usize;
            input.read_exact(&mut buf[..n])?;
            hash.update(&buf[..n]);
            for (file, _) in outputs.iter_mut() {
                file.write_all(&buf[..n])?;
            }
            left -= n as u64;
        }
        if hash.finalize().as_bytes() != &group[0].checksum.0[..] {
            return Err(ContainerError::ChecksumMismatch(group[0].path.clone()));
        }

        // Restore mtimes only after the last body byte is on disk.
        for (file, record) in &outputs {
            file.set_modified(UNIX_EPOCH + Duration::from_nanos(record.mtime))?;
        }

        cursor += size;
        i = j;
    }

    Ok(())
}

fn nonempty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Second fence after the lexical path checks: the canonicalized parent of
/// an output must be at least as long as the canonicalized working
/// directory, otherwise the target escaped upward.
fn guard_parent(path: &Path) -> Result<(), ContainerError> {
    let cwd = env::current_dir()?.canonicalize()?;
    let parent = match nonempty_parent(path) {
        Some(p) => p.canonicalize()?,
        None => cwd.clone(),
    };
    if parent.as_os_str().len() < cwd.as_os_str().len() {
        return Err(ContainerError::PathEscapes(path.display().to_string()));
    }
    Ok(())
}

// ── Listing ──────────────────────────────────────────────────────────────────

/// Print the archive's paths (plus metadata when verbose), sorted by
/// archive offset like extraction would emit them.
pub fn list_records<W: Write>(
    out: &mut W,
    records: &[FileRecord],
    selector: Option<&Regex>,
    verbose: bool,
) -> io::Result<()> {
    let mut sorted: Vec<&FileRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.archive_offset);

    if verbose {
        writeln!(
            out,
            "{:>14} {:>14}  {:16}  Name",
            "Offset", "Size", "BLAKE2b"
        )?;
    }
    for record in sorted {
        if let Some(re) = selector {
            if !re.is_match(&record.path) {
                continue;
            }
        }
        if verbose {
            writeln!(
                out,
                "{:>14} {:>14}  {}  {}",
                record.archive_offset,
                record.size,
                hex::encode(&record.checksum.0[..8]),
                record.path
            )?;
        } else {
            writeln!(out, "{}", record.path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_spec_requires_two_components() {
        assert!(PathRewrite::parse("only-one").is_err());
        assert!(PathRewrite::parse("a/b/c").is_err());
        assert!(PathRewrite::parse("a/b").is_ok());
    }

    #[test]
    fn rewrite_unescapes_separators() {
        let rw = PathRewrite::parse(r"src\/lib/lib\/src").unwrap();
        assert_eq!(rw.apply("src/lib/x.rs"), "lib/src/x.rs");
    }

    #[test]
    fn rewrite_supports_capture_groups() {
        let rw = PathRewrite::parse(r"^(\w+)\.o$/obj-$1.bin").unwrap();
        assert_eq!(rw.apply("main.o"), "obj-main.bin");
        assert_eq!(rw.apply("keep.c"), "keep.c");
    }

    #[test]
    fn metadata_size_mismatch_is_fatal() {
        let mut bytes = Vec::new();
        wire::write_magic(&mut bytes).unwrap();
        // Declare one byte less than the single record occupies: parsing
        // the record overshoots the declared table size.
        let record = FileRecord::new("x".into(), 0, 0);
        wire::write_u64(&mut bytes, record.wire_len() - 1).unwrap();
        record.write_to(&mut bytes).unwrap();

        let err = read_metadata(&mut io::Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ContainerError::MetadataMisaligned { .. }));
    }

    #[test]
    fn bad_magic_is_invalid_header() {
        let err = read_metadata(&mut io::Cursor::new(b"ARZIQ\0\0\0\0\0\0\0\0".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidHeader));
        assert_eq!(err.to_string(), "Invalid header.");
    }
}
