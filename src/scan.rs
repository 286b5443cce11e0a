//! File enumeration — the candidate set for one archive run.
//!
//! Two modes, matching the two shapes of `ar-mrzip -c`:
//!
//! - **directory mode**: recursive walk of a root directory.  The root is
//!   canonicalized once up front; stored paths are relative to it.
//! - **list mode**: one path per line on the input stream; the stored path
//!   is the line as given.
//!
//! In both modes directories are skipped silently, non-regular files
//! (symlinks included) are skipped with a warning, and an optional regex
//! selector is tested against the full path.  Failing to canonicalize the
//! root or to stat an entry is fatal.

use regex::Regex;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::record::FileRecord;

/// Modification time as the opaque integer stored in the archive:
/// nanoseconds since the Unix epoch, 0 for anything the platform cannot
/// express that way.
pub fn mtime_of(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Recursively enumerate regular files under `root`.
///
/// Returns the canonicalized base directory and the records in walk order.
/// Stored paths are relative to the base and must be valid UTF-8.
pub fn scan_directory(
    root: &Path,
    selector: Option<&Regex>,
) -> io::Result<(PathBuf, Vec<FileRecord>)> {
    let base = root.canonicalize()?;
    if !base.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        ));
    }
    let mut records = Vec::new();

    for entry in WalkDir::new(&base) {
        let entry = entry.map_err(io::Error::from)?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            eprintln!(
                "skipping non-regular file, symlinks presently unsupported: {}",
                entry.path().display()
            );
            continue;
        }
        if let Some(re) = selector {
            if !re.is_match(&entry.path().to_string_lossy()) {
                continue;
            }
        }

        let meta = entry.metadata().map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(&base)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let path = rel
            .to_str()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("path is not valid UTF-8: {}", rel.display()),
                )
            })?
            .to_owned();

        records.push(FileRecord::new(path, meta.len(), mtime_of(&meta)));
    }

    Ok((base, records))
}

/// Enumerate from a line-delimited path list.
///
/// Paths are stored as given and opened as given (relative to the current
/// directory, or absolute while archiving — absolute stored paths are
/// rejected on extraction, so list-mode callers use relative lists).
pub fn scan_list<R: BufRead>(input: R, selector: Option<&Regex>) -> io::Result<Vec<FileRecord>> {
    let mut records = Vec::new();

    for line in input.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        if let Some(re) = selector {
            if !re.is_match(&line) {
                continue;
            }
        }

        let meta = fs::symlink_metadata(&line)?;
        if meta.is_dir() {
            continue;
        }
        if !meta.is_file() {
            eprintln!(
                "skipping non-regular file, symlinks presently unsupported: {line}"
            );
            continue;
        }

        let mtime = mtime_of(&meta);
        records.push(FileRecord::new(line, meta.len(), mtime));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Cursor, Write};

    #[test]
    fn directory_scan_yields_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("a.txt"))
            .unwrap()
            .write_all(b"alpha")
            .unwrap();
        File::create(dir.path().join("sub/b.txt"))
            .unwrap()
            .write_all(b"beta")
            .unwrap();

        let (base, records) = scan_directory(dir.path(), None).unwrap();
        assert!(base.is_absolute());
        let mut paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, ["a.txt", "sub/b.txt"]);
        let a = records.iter().find(|r| r.path == "a.txt").unwrap();
        assert_eq!(a.size, 5);
        assert!(a.mtime > 0);
    }

    #[test]
    fn selector_filters_by_full_path() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("keep.rs")).unwrap();
        File::create(dir.path().join("drop.o")).unwrap();

        let re = Regex::new(r"\.rs$").unwrap();
        let (_, records) = scan_directory(dir.path(), Some(&re)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "keep.rs");
    }

    #[test]
    fn list_mode_stores_paths_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("listed.bin");
        File::create(&file).unwrap().write_all(&[0u8; 7]).unwrap();

        let listing = format!("{}\n\n{}\n", file.display(), dir.path().display());
        let records = scan_list(Cursor::new(listing), None).unwrap();
        // The directory line is skipped silently, the blank line ignored.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, file.display().to_string());
        assert_eq!(records[0].size, 7);
    }

    #[test]
    fn list_mode_missing_file_is_fatal() {
        let err = scan_list(Cursor::new("definitely/not/here\n"), None);
        assert!(err.is_err());
    }
}
