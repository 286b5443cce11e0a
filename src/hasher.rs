//! Parallel dual-hashing: BLAKE2b-512 identity plus TLSH similarity.
//!
//! # Concurrency model
//!
//! The only coordination primitive on the data path is one atomic index
//! counter.  The record table is pre-sized and never reallocated while
//! workers run; each worker fetch-and-increments the counter to claim a
//! record, hashes that file to completion, and repeats.  A claimed slot is
//! touched by exactly one worker, so the slots need no locks.
//!
//! A second, optional thread renders progress.  It reads two byte counters
//! and sleeps 10 ms between polls; it never touches the record table.

use std::cell::UnsafeCell;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::record::{Checksum, FileRecord, SimilarityDigest, CHECKSUM_LEN};

/// TLSH is bypassed entirely for files at or below this many bytes; the
/// collaborator's behavior on tiny inputs is undefined, so their similarity
/// digest is all zeros instead.
pub const TLSH_MIN_FILE_SIZE: u64 = 500;

/// Progress is printed each time this many bytes have been hashed since the
/// previous report.
const PROGRESS_BYTE_STEP: u64 = 100_000_000;

/// Worker-pool size: hardware concurrency, 4 when it cannot be queried.
fn worker_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

// ── Slot table ───────────────────────────────────────────────────────────────

/// Shared view of the record table that hands out exclusive slot access.
///
/// Safety contract: the atomic work counter yields every index at most
/// once, so no two workers ever hold the same slot, and the table itself
/// (length, slot addresses) is frozen while workers run.
struct SlotTable<'a> {
    slots: &'a [UnsafeCell<FileRecord>],
}

unsafe impl Sync for SlotTable<'_> {}

impl<'a> SlotTable<'a> {
    fn new(records: &'a mut [FileRecord]) -> Self {
        // UnsafeCell<T> has the same in-memory representation as T.
        let slots = unsafe {
            &*(records as *mut [FileRecord] as *const [UnsafeCell<FileRecord>])
        };
        Self { slots }
    }

    #[inline]
    fn len(&self) -> usize {
        self.slots.len()
    }

    /// Exclusive access to one slot.
    ///
    /// Callers must hold a freshly claimed index from the work counter.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slot(&self, index: usize) -> &mut FileRecord {
        &mut *self.slots[index].get()
    }
}

// ── Hashing ──────────────────────────────────────────────────────────────────

/// Compute both digests for every record, in parallel.
///
/// `base` is the canonical base directory in directory mode; in list mode
/// it is `None` and stored paths are opened as given.  Any `open`/`read`
/// failure aborts the run.
pub fn hash_records(
    base: Option<&Path>,
    records: &mut [FileRecord],
    verbose: bool,
) -> io::Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let table = SlotTable::new(records);
    let next = AtomicUsize::new(0);
    let total_bytes = AtomicU64::new(0);
    let running_bytes = AtomicU64::new(0);
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        let mut workers = Vec::new();
        for _ in 0..worker_count() {
            workers.push(s.spawn(|| -> io::Result<()> {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= table.len() {
                        return Ok(());
                    }
                    // Sole owner of this slot: `next` never repeats an index.
                    let record = unsafe { table.slot(index) };
                    let path = source_path(base, &record.path);
                    hash_one(record, &path)?;
                    total_bytes.fetch_add(record.size, Ordering::Relaxed);
                    running_bytes.fetch_add(record.size, Ordering::Relaxed);
                }
            }));
        }

        let reporter = verbose.then(|| {
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    if running_bytes.load(Ordering::Relaxed) > PROGRESS_BYTE_STEP {
                        eprint!(
                            "\x1b[2K\r{} MB hashed...",
                            total_bytes.load(Ordering::Relaxed) / 1_000_000
                        );
                        running_bytes.store(0, Ordering::Relaxed);
                    }
                    thread::sleep(Duration::from_millis(10));
                }
            })
        });

        let mut result = Ok(());
        for worker in workers {
            if let Err(e) = worker.join().expect("hasher worker panicked") {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        stop.store(true, Ordering::Relaxed);
        if let Some(r) = reporter {
            r.join().expect("progress reporter panicked");
            eprintln!();
        }
        result
    })
}

fn source_path(base: Option<&Path>, stored: &str) -> PathBuf {
    match base {
        Some(b) => b.join(stored),
        None => PathBuf::from(stored),
    }
}

/// Hash one file: BLAKE2b-512 over everything, TLSH only past the minimum
/// size.  Reads sequentially in 4 KiB chunks.
fn hash_one(record: &mut FileRecord, path: &Path) -> io::Result<()> {
    let mut file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("open({}) failed: {e}", path.display()))
    })?;

    let mut blake = blake2b_simd::Params::new().hash_length(CHECKSUM_LEN).to_state();
    let mut tlsh =
        (record.size > TLSH_MIN_FILE_SIZE).then(tlsh2::TlshBuilder256_3::new);

    let mut buf = [0u8; 4096];
    loop {
        let n = file.read(&mut buf).map_err(|e| {
            io::Error::new(e.kind(), format!("read({}) failed: {e}", path.display()))
        })?;
        if n == 0 {
            break;
        }
        blake.update(&buf[..n]);
        if let Some(t) = tlsh.as_mut() {
            t.update(&buf[..n]);
        }
    }

    record.checksum = Checksum(blake.finalize().as_bytes().try_into().unwrap());
    // TLSH can decline low-variation input; such files fall back to the
    // zero digest and cluster with the small files.
    record.digest = match tlsh.and_then(|t| t.build()) {
        Some(t) => SimilarityDigest(t.hash()),
        None => SimilarityDigest::ZERO,
    };

    Ok(())
}
