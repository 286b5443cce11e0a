//! Per-file records — the unit of the metadata table.
//!
//! # On-disk layout (one record, all integers big-endian)
//!
//! ```text
//! Offset   Size  Field
//!    0       8   modification timestamp (ns since the Unix epoch, opaque)
//!    8       8   file size in bytes
//!   16       8   archive offset (assigned by dedup)
//!   24      64   BLAKE2b-512 digest of the file body
//!   88     140   TLSH digest, printable form; all-zero for files <= 500 B
//!  228       4   path length L
//!  232       L   path bytes (UTF-8, no NUL terminator)
//! ```
//!
//! Two records share an archive offset if and only if they share a BLAKE2b
//! digest; the dedup pass enforces this and the extractor relies on it to
//! fan one body stream out to every duplicate.

use std::io::{self, Read, Write};
use thiserror::Error;

use crate::wire;

/// BLAKE2b output width used for content addressing.
pub const CHECKSUM_LEN: usize = 64;

/// Printable TLSH digest width (256-bucket, 3-byte-checksum configuration).
pub const TLSH_DIGEST_LEN: usize = 140;

/// Wire size of a record excluding the trailing path bytes.
pub const RECORD_FIXED_LEN: usize = 88 + TLSH_DIGEST_LEN + 4;

// ── Checksum ─────────────────────────────────────────────────────────────────

/// Content identity: a BLAKE2b-512 digest, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum(pub [u8; CHECKSUM_LEN]);

impl Checksum {
    pub const ZERO: Checksum = Checksum([0u8; CHECKSUM_LEN]);
}

// ── Similarity digest ────────────────────────────────────────────────────────

/// The locality-sensitive digest in its printable form.
///
/// Files at or below the TLSH minimum size carry the all-zero digest; they
/// compare as identical to each other and dissimilar to everything else,
/// which clusters them at one end of the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityDigest(pub [u8; TLSH_DIGEST_LEN]);

impl SimilarityDigest {
    pub const ZERO: SimilarityDigest = SimilarityDigest([0u8; TLSH_DIGEST_LEN]);

    /// Number of byte positions at which the two digests agree.
    ///
    /// This is the ordering metric: higher means more similar.  It is NOT
    /// TLSH's native distance — substituting that would change orderings.
    pub fn agreement(&self, other: &SimilarityDigest) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a == b)
            .count() as u32
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; TLSH_DIGEST_LEN]
    }
}

// ── Record parse errors ──────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("archive metadata is truncated")]
    Truncated,
    #[error("path in archive is not valid UTF-8")]
    PathNotUtf8,
    #[error("Absolute path in archive: {0}")]
    AbsolutePath(String),
    #[error("Path not normalized: {0}")]
    PathNotNormalized(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── File record ──────────────────────────────────────────────────────────────

/// One archived file.  Created by the enumerator, filled in by the hasher,
/// permuted by the orderer, offset-assigned by dedup, then read-only.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Stored path: relative, lexically normalized, `/`-separated as the
    /// platform produced it at creation.
    pub path:           String,
    /// Modification time as reported by the platform, ns since the epoch.
    /// Opaque: round-trips verbatim, not portable across platforms.
    pub mtime:          u64,
    /// Body length in bytes.
    pub size:           u64,
    /// Byte offset of the body within the archive's body region.
    pub archive_offset: u64,
    pub checksum:       Checksum,
    pub digest:         SimilarityDigest,
}

impl FileRecord {
    /// A fresh record as the enumerator produces it: digests and offset
    /// still unset.
    pub fn new(path: String, size: u64, mtime: u64) -> Self {
        Self {
            path,
            mtime,
            size,
            archive_offset: 0,
            checksum: Checksum::ZERO,
            digest: SimilarityDigest::ZERO,
        }
    }

    /// Wire size of this record, including the path bytes.
    #[inline]
    pub fn wire_len(&self) -> u64 {
        (RECORD_FIXED_LEN + self.path.len()) as u64
    }

    /// The same record under a different stored path (used by `-t`).
    pub fn with_path(&self, path: String) -> Self {
        Self { path, ..self.clone() }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        wire::write_u64(w, self.mtime)?;
        wire::write_u64(w, self.size)?;
        wire::write_u64(w, self.archive_offset)?;
        w.write_all(&self.checksum.0)?;
        w.write_all(&self.digest.0)?;
        wire::write_u32(w, self.path.len() as u32)?;
        w.write_all(self.path.as_bytes())
    }

    /// Parse one record and validate its path.
    ///
    /// Path rules (all fatal): non-empty, valid UTF-8, relative, lexically
    /// normalized — no `.` or `..` segments survive in a stored path.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, RecordError> {
        let mtime = wire::read_u64(r).map_err(eof_as_truncated)?;
        let size = wire::read_u64(r).map_err(eof_as_truncated)?;
        let archive_offset = wire::read_u64(r).map_err(eof_as_truncated)?;

        let mut checksum = [0u8; CHECKSUM_LEN];
        r.read_exact(&mut checksum).map_err(eof_as_truncated)?;
        let mut digest = [0u8; TLSH_DIGEST_LEN];
        r.read_exact(&mut digest).map_err(eof_as_truncated)?;

        let path_len = wire::read_u32(r).map_err(eof_as_truncated)? as usize;
        let mut path_bytes = vec![0u8; path_len];
        r.read_exact(&mut path_bytes).map_err(eof_as_truncated)?;
        let path = String::from_utf8(path_bytes).map_err(|_| RecordError::PathNotUtf8)?;

        validate_stored_path(&path)?;

        Ok(Self {
            path,
            mtime,
            size,
            archive_offset,
            checksum: Checksum(checksum),
            digest: SimilarityDigest(digest),
        })
    }
}

fn eof_as_truncated(e: io::Error) -> RecordError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        RecordError::Truncated
    } else {
        RecordError::Io(e)
    }
}

/// Reject absolute and non-normalized stored paths.
pub fn validate_stored_path(path: &str) -> Result<(), RecordError> {
    use std::path::Component;

    if path.is_empty() {
        return Err(RecordError::PathNotNormalized(path.to_owned()));
    }
    for component in std::path::Path::new(path).components() {
        match component {
            Component::Normal(_) => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(RecordError::AbsolutePath(path.to_owned()));
            }
            Component::CurDir | Component::ParentDir => {
                return Err(RecordError::PathNotNormalized(path.to_owned()));
            }
        }
    }
    Ok(())
}
