//! # arzip — content-addressed, similarity-ordered archiver
//!
//! Format guarantees (frozen):
//! - The container starts with the five bytes `ARZIP`; no version field,
//!   any other prefix is rejected
//! - All integers are big-endian; strings are length-prefixed raw bytes
//! - File identity is BLAKE2b-512; two records share a body offset if and
//!   only if they share a digest
//! - Bodies are laid out in similarity order (greedy TLSH nearest-neighbor)
//!   so a downstream solid compressor sees related files adjacently
//! - Unique bodies tile the body region contiguously from offset 0
//! - Stored paths are relative, lexically normalized UTF-8; extraction
//!   rejects everything else and re-checks against the working directory
//! - The outer code is the CCSDS (255, 223) Reed–Solomon code in Berlekamp
//!   dual basis, interleaved so a burst of up to `BLK_LEN` bytes costs each
//!   codeword at most one symbol
//!
//! The archiver does not compress: its output is piped into an external
//! compressor, and the RS encoder wraps whatever that emits.

pub mod container;
pub mod dedup;
pub mod ecc;
pub mod hasher;
pub mod order;
pub mod record;
pub mod scan;
pub mod wire;

// Flat re-exports for the most common types.
pub use container::{Clobber, ContainerError, ExtractOptions, PathRewrite};
pub use dedup::DedupStats;
pub use ecc::{DecodeReport, EccError, Repair, BLK_LEN};
pub use record::{Checksum, FileRecord, SimilarityDigest, CHECKSUM_LEN, TLSH_DIGEST_LEN};
